//! Multi-threaded stress harness for `ConcurrentStack`.
//!
//! Producer `p` pushes the values `p * pushes_per_producer .. (p + 1) * pushes_per_producer`,
//! so every value in `0..total` is pushed exactly once. Consumers pop until
//! the producers are finished and the stack reports empty. The report then
//! compares what came out with what went in.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use cstack::ConcurrentStack;

use crate::config::StressConfig;

/// Outcome of a stress run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressReport {
    pub config: StressConfig,
    pub pushed: u64,
    pub popped: u64,
    /// Values popped more than once
    pub duplicates: u64,
    /// Values popped that were never pushed
    pub fabricated: u64,
    /// Values pushed but never popped
    pub missing: u64,
    /// Values still in the stack after the consumers stopped
    pub remaining: u64,
    /// Wrapping sum of all pushed values
    pub pushed_checksum: u64,
    /// Wrapping sum of all popped values
    pub popped_checksum: u64,
    pub panicked_threads: u64,
    pub elapsed_us: u64,
}

impl StressReport {
    /// No loss, no duplication, no fabrication, no panics.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0
            && self.fabricated == 0
            && self.missing == 0
            && self.remaining == 0
            && self.panicked_threads == 0
            && self.pushed == self.popped
            && self.pushed_checksum == self.popped_checksum
    }

    /// Push and pop operations per second.
    #[must_use]
    pub fn ops_per_sec(&self) -> f64 {
        if self.elapsed_us == 0 {
            return 0.0;
        }
        (self.pushed + self.popped) as f64 * 1_000_000.0 / self.elapsed_us as f64
    }
}

impl fmt::Display for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_clean() { "PASS" } else { "FAIL" };
        write!(
            f,
            "[{}] producers={} consumers={} overlap={} pushed={} popped={} \
             duplicates={} fabricated={} missing={} remaining={} panicked={} \
             checksum={}/{} elapsed={}us ({:.0} ops/s)",
            status,
            self.config.producers,
            self.config.consumers,
            self.config.overlap,
            self.pushed,
            self.popped,
            self.duplicates,
            self.fabricated,
            self.missing,
            self.remaining,
            self.panicked_threads,
            self.pushed_checksum,
            self.popped_checksum,
            self.elapsed_us,
            self.ops_per_sec()
        )
    }
}

/// Stress a fresh stack.
///
/// `config` must have passed [`StressConfig::validate`].
#[must_use]
pub fn run_stress(config: &StressConfig) -> StressReport {
    run_stress_on(&ConcurrentStack::new(), config)
}

/// Stress `stack`, which must start empty.
#[must_use]
pub fn run_stress_on(stack: &ConcurrentStack<u64>, config: &StressConfig) -> StressReport {
    debug_assert!(stack.is_empty(), "stress runs need an empty stack");
    let total = config.total_pushes().unwrap_or(0);
    let per_producer = config.pushes_per_producer;
    let producers_done = AtomicBool::new(false);
    let started = Instant::now();

    let (batches, panicked_threads) = thread::scope(|scope| {
        let done = &producers_done;
        let mut panicked: u64 = 0;
        let mut consumers = Vec::with_capacity(config.consumers);

        if config.overlap {
            for _ in 0..config.consumers {
                consumers.push(scope.spawn(move || drain(stack, done)));
            }
        }

        let producers: Vec<_> = (0..config.producers as u64)
            .map(|p| {
                scope.spawn(move || {
                    let base = p * per_producer;
                    for i in 0..per_producer {
                        stack.push(base + i);
                    }
                })
            })
            .collect();

        for handle in producers {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        producers_done.store(true, Ordering::Release);

        if !config.overlap {
            for _ in 0..config.consumers {
                consumers.push(scope.spawn(move || drain(stack, done)));
            }
        }

        let mut batches = Vec::with_capacity(consumers.len());
        for handle in consumers {
            match handle.join() {
                Ok(batch) => batches.push(batch),
                Err(_) => panicked += 1,
            }
        }
        (batches, panicked)
    });

    let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    let mut seen = vec![false; total];
    let mut popped: u64 = 0;
    let mut duplicates: u64 = 0;
    let mut fabricated: u64 = 0;
    let mut popped_checksum: u64 = 0;

    for value in batches.into_iter().flatten() {
        popped += 1;
        popped_checksum = popped_checksum.wrapping_add(value);
        match usize::try_from(value).ok().and_then(|idx| seen.get_mut(idx)) {
            Some(slot) if *slot => duplicates += 1,
            Some(slot) => *slot = true,
            None => fabricated += 1,
        }
    }

    let report = StressReport {
        config: config.clone(),
        pushed: total as u64,
        popped,
        duplicates,
        fabricated,
        missing: seen.iter().filter(|s| !**s).count() as u64,
        remaining: stack.len() as u64,
        pushed_checksum: (0..total as u64).fold(0u64, u64::wrapping_add),
        popped_checksum,
        panicked_threads,
        elapsed_us,
    };

    if report.is_clean() {
        info!(%report, "stress run finished");
    } else {
        warn!(%report, "stress run found violations");
    }
    report
}

/// Pop until the producers are finished and the stack is empty.
fn drain(stack: &ConcurrentStack<u64>, producers_done: &AtomicBool) -> Vec<u64> {
    let mut popped = Vec::new();
    loop {
        // Read the flag BEFORE popping: an empty pop that follows a set flag
        // means every push has already happened.
        let finished = producers_done.load(Ordering::Acquire);
        match stack.pop() {
            Some(value) => popped.push(value),
            None if finished => return popped,
            None => thread::yield_now(),
        }
    }
}
