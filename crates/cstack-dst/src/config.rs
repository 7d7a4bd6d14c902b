//! Run configuration, read from the environment.
//!
//! | Variable | Default | Used by |
//! |----------|---------|---------|
//! | `DST_SEED` | random | `DstConfig` |
//! | `DST_ITERATIONS` | 1000 | `DstConfig` |
//! | `DST_FAULT_PROBABILITY` | 0.05 | `DstConfig` |
//! | `STRESS_PRODUCERS` | 8 | `StressConfig` |
//! | `STRESS_CONSUMERS` | 4 | `StressConfig` |
//! | `STRESS_PUSHES` | 10000 | `StressConfig` |
//!
//! Every loader has a `from_lookup` form taking the variable source as a
//! closure, so tests never touch the process environment.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::fault::FaultConfig;

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got {value:?}")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{name} must be {requirement}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: String,
        requirement: &'static str,
    },
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var,
                value: raw,
                expected,
            }),
    }
}

fn env_lookup(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Read `DST_SEED`, returning `None` when it is unset.
pub fn seed_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<u64>, ConfigError> {
    parse_var(&lookup, "DST_SEED", "u64")
}

/// Configuration for a deterministic simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DstConfig {
    pub seed: u64,
    pub iterations: u64,
    pub fault_probability: f64,
}

impl DstConfig {
    pub const ITERATIONS_DEFAULT: u64 = 1_000;

    /// Defaults with the given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            iterations: Self::ITERATIONS_DEFAULT,
            fault_probability: FaultConfig::PROBABILITY_DEFAULT,
        }
    }

    /// Read the environment. The seed comes from
    /// [`get_or_generate_seed`](crate::get_or_generate_seed), which prints it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let seed = crate::get_or_generate_seed()?;
        Self::with_lookup(seed, &env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let seed = match seed_from_lookup(&lookup)? {
            Some(seed) => seed,
            None => rand::random::<u64>(),
        };
        Self::with_lookup(seed, &lookup)
    }

    /// Everything but the seed, which is already resolved.
    fn with_lookup(
        seed: u64,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            seed,
            iterations: parse_var(lookup, "DST_ITERATIONS", "u64")?
                .unwrap_or(Self::ITERATIONS_DEFAULT),
            fault_probability: parse_var(lookup, "DST_FAULT_PROBABILITY", "f64")?
                .unwrap_or(FaultConfig::PROBABILITY_DEFAULT),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.fault_probability) {
            return Err(ConfigError::OutOfRange {
                name: "fault_probability",
                value: self.fault_probability.to_string(),
                requirement: "in [0, 1]",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn fault_config(&self) -> FaultConfig {
        FaultConfig::with_probability(self.fault_probability)
    }
}

/// Configuration for a multi-threaded stress run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressConfig {
    /// Threads pushing values
    pub producers: usize,
    /// Threads popping until the stack is drained
    pub consumers: usize,
    /// Values pushed by each producer
    pub pushes_per_producer: u64,
    /// Start consumers alongside producers instead of after them
    pub overlap: bool,
}

impl StressConfig {
    pub const PRODUCERS_DEFAULT: usize = 8;
    pub const CONSUMERS_DEFAULT: usize = 4;
    pub const PUSHES_DEFAULT: u64 = 10_000;

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self {
            producers: parse_var(&lookup, "STRESS_PRODUCERS", "usize")?
                .unwrap_or(Self::PRODUCERS_DEFAULT),
            consumers: parse_var(&lookup, "STRESS_CONSUMERS", "usize")?
                .unwrap_or(Self::CONSUMERS_DEFAULT),
            pushes_per_producer: parse_var(&lookup, "STRESS_PUSHES", "u64")?
                .unwrap_or(Self::PUSHES_DEFAULT),
            overlap: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.producers == 0 {
            return Err(ConfigError::OutOfRange {
                name: "producers",
                value: self.producers.to_string(),
                requirement: "at least 1",
            });
        }
        if self.consumers == 0 {
            return Err(ConfigError::OutOfRange {
                name: "consumers",
                value: self.consumers.to_string(),
                requirement: "at least 1",
            });
        }
        if self.total_pushes().is_none() {
            return Err(ConfigError::OutOfRange {
                name: "pushes_per_producer",
                value: self.pushes_per_producer.to_string(),
                requirement: "small enough that producers * pushes fits in memory",
            });
        }
        Ok(())
    }

    /// Total values pushed, or `None` if it does not fit a `usize`.
    #[must_use]
    pub fn total_pushes(&self) -> Option<usize> {
        usize::try_from(self.pushes_per_producer)
            .ok()?
            .checked_mul(self.producers)
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            producers: Self::PRODUCERS_DEFAULT,
            consumers: Self::CONSUMERS_DEFAULT,
            pushes_per_producer: Self::PUSHES_DEFAULT,
            overlap: false,
        }
    }
}
