//! # cstack-dst
//!
//! Deterministic Simulation Testing and stress testing for `cstack`.
//!
//! All randomness in a simulation flows from one seed, so any failure
//! can be replayed exactly.
//!
//! ## Harnesses
//!
//! - `fault_injection`: single-threaded workloads with faults injected at
//!   operation boundaries, checked against the `cstack-core` properties
//! - `stress`: many producer and consumer threads on one `ConcurrentStack`,
//!   checked for loss, duplication, and fabrication
//!
//! ## Usage
//!
//! ```rust
//! use cstack::TrackedStack;
//! use cstack_dst::{run_dst_scenario, DeterministicRng, DstEnv, DstOp};
//!
//! let seed = 12345;
//! let ops = DstOp::random_sequence(&mut DeterministicRng::new(seed), 100);
//! let result = run_dst_scenario::<TrackedStack>(DstEnv::new(seed), ops);
//! assert!(result.passed, "{}", result.format());
//! ```
//!
//! ## Reproducibility
//!
//! ```bash
//! DST_SEED=12345 cargo test -p cstack-dst
//! ```

pub mod config;
pub mod env;
pub mod fault;
pub mod fault_injection;
pub mod random;
pub mod stress;

pub use config::{ConfigError, DstConfig, StressConfig};
pub use env::{DstEnv, DstEnvStats};
pub use fault::{FaultConfig, FaultInjector};
pub use fault_injection::{
    run_dst_scenario, DstOp, DstResult, DstRunner, DstStats, DstTestableStack, FaultPoint,
    FaultType,
};
pub use random::DeterministicRng;
pub use stress::{run_stress, run_stress_on, StressReport};

use tracing_subscriber::EnvFilter;

/// Get DST seed from environment or generate random one.
///
/// Prints the seed for reproduction. Use `DST_SEED=<seed>` to reproduce.
pub fn get_or_generate_seed() -> Result<u64, ConfigError> {
    match config::seed_from_lookup(|var| std::env::var(var).ok())? {
        Some(seed) => {
            println!("DST_SEED={} (from environment)", seed);
            Ok(seed)
        }
        None => {
            let seed = rand::random::<u64>();
            println!("DST_SEED={} (randomly generated)", seed);
            Ok(seed)
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install a stderr `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Like [`init_tracing`], but writes through the test harness so output is
/// captured per test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}
