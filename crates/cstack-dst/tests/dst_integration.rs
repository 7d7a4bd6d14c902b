//! DST integration tests for `TrackedStack`.
//!
//! Runs the stack through the DST runner with fault injection and checks
//! the `cstack-core` properties. Reproduce a failure with the printed
//! `DST_SEED=<seed>`.

use cstack::TrackedStack;
use cstack_core::{PropertyChecker, StackProperties, StackPropertyChecker};
use cstack_dst::{
    init_test_tracing, run_dst_scenario, DeterministicRng, DstConfig, DstEnv, DstOp, DstRunner,
    FaultConfig,
};

fn config() -> DstConfig {
    init_test_tracing();
    DstConfig::from_env().unwrap()
}

#[test]
fn test_dst_single_threaded() {
    let config = config();
    let env = DstEnv::with_fault_config(config.seed, FaultConfig::none());
    let mut runner = DstRunner::with_env(TrackedStack::new(), env);
    let ops = DstOp::random_sequence(runner.env().rng(), config.iterations as usize);

    for (i, op) in ops.into_iter().enumerate() {
        runner.apply(op).unwrap();

        if i % 50 == 0 {
            let checker = StackPropertyChecker::new(runner.stack()).with_seed(config.seed);
            assert!(
                checker.all_hold(),
                "Invariant violated at step {} DST_SEED={}: {:?}",
                i,
                config.seed,
                checker.violations()
            );
        }
    }

    let failed: Vec<_> = runner.check().into_iter().filter(|p| !p.holds).collect();
    assert!(failed.is_empty(), "DST_SEED={}: {:?}", config.seed, failed);
    println!("DST completed: {}", runner.stats());
}

#[test]
fn test_dst_with_faults() {
    let config = config();
    let mut env = DstEnv::from_config(&config);
    let ops = DstOp::random_sequence(env.rng(), config.iterations as usize);

    let result = run_dst_scenario::<TrackedStack>(env, ops);
    assert!(result.passed, "{}", result.format());
    println!("DST with faults completed: {}", result.stats);
}

#[test]
fn test_dst_shuffled_pushes_then_drain() {
    let config = config();
    let mut env = DstEnv::from_config(&config);

    let mut values: Vec<u64> = (1..=100).collect();
    env.rng().shuffle(&mut values);
    let mut ops: Vec<DstOp> = values.iter().copied().map(DstOp::Push).collect();
    ops.extend(std::iter::repeat(DstOp::Pop).take(150));
    ops.push(DstOp::Peek);

    let result = run_dst_scenario::<TrackedStack>(env, ops);
    assert!(result.passed, "{}", result.format());
}

#[test]
fn test_stack_history_matches_runner_history() {
    let seed = 4242;
    let env = DstEnv::with_fault_config(seed, FaultConfig::none());
    let mut runner = DstRunner::with_env(TrackedStack::new(), env);

    for op in DstOp::random_sequence(&mut DeterministicRng::new(seed), 300) {
        runner.apply(op).unwrap();
    }

    assert_eq!(runner.stack().history().operations, runner.history().operations);
    assert_eq!(runner.stack().operation_count(), 300);
}
