//! The simulation environment: one seed, and everything derived from it.

use std::fmt;

use crate::config::DstConfig;
use crate::fault::{FaultConfig, FaultInjector};
use crate::random::DeterministicRng;

/// Deterministic simulation environment.
///
/// Owns the workload RNG and the fault injector. The fault injector gets
/// its own generator forked from the seed, so changing how often faults
/// fire does not change the generated workload.
#[derive(Debug, Clone)]
pub struct DstEnv {
    seed: u64,
    rng: DeterministicRng,
    fault: FaultInjector,
}

/// Counters describing a DST environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstEnvStats {
    pub seed: u64,
    pub faults_injected: u64,
}

impl fmt::Display for DstEnvStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DST_SEED={} faults={}", self.seed, self.faults_injected)
    }
}

impl DstEnv {
    /// Environment with the default fault configuration.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_fault_config(seed, FaultConfig::default())
    }

    #[must_use]
    pub fn with_fault_config(seed: u64, fault_config: FaultConfig) -> Self {
        let mut rng = DeterministicRng::new(seed);
        let fault = FaultInjector::new(rng.fork(), fault_config);
        Self { seed, rng, fault }
    }

    #[must_use]
    pub fn from_config(config: &DstConfig) -> Self {
        Self::with_fault_config(config.seed, config.fault_config())
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    pub fn fault(&mut self) -> &mut FaultInjector {
        &mut self.fault
    }

    /// Reproduction line, e.g. `DST_SEED=42`.
    #[must_use]
    pub fn format_seed(&self) -> String {
        format!("DST_SEED={}", self.seed)
    }

    #[must_use]
    pub fn stats(&self) -> DstEnvStats {
        DstEnvStats {
            seed: self.seed,
            faults_injected: self.fault.injected(),
        }
    }
}
