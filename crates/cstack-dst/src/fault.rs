//! Fault decisions for DST runs.

use crate::random::DeterministicRng;

/// How often faults fire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultConfig {
    /// Probability in `[0, 1]` that a fault fires at a fault point
    pub probability: f64,
}

impl FaultConfig {
    /// Default fault probability.
    pub const PROBABILITY_DEFAULT: f64 = 0.05;

    /// Never inject faults.
    #[must_use]
    pub const fn none() -> Self {
        Self { probability: 0.0 }
    }

    #[must_use]
    pub const fn with_probability(probability: f64) -> Self {
        Self { probability }
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::with_probability(Self::PROBABILITY_DEFAULT)
    }
}

/// Decides, deterministically, whether a fault fires.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    injected: u64,
}

impl FaultInjector {
    #[must_use]
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        Self {
            rng,
            config,
            injected: 0,
        }
    }

    /// Roll for a fault.
    pub fn should_fail(&mut self) -> bool {
        if self.config.probability <= 0.0 {
            return false;
        }
        let fail = self.rng.gen_bool(self.config.probability.min(1.0));
        if fail {
            self.injected += 1;
        }
        fail
    }

    /// Faults injected so far.
    #[must_use]
    pub fn injected(&self) -> u64 {
        self.injected
    }

    #[must_use]
    pub fn config(&self) -> FaultConfig {
        self.config
    }
}
