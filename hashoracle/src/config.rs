//! Top-level configuration for the engine.
//!
//! This module aggregates configuration for:
//!
//! - settlement (how long oracles may reveal after the observation date),
//! - the decomposition solver (sampling density and amount precision),
//! - oracle ladders (default table size).
//!
//! Every section has defaults, so a config file only needs to name what it
//! changes. Binaries load the file from the path in `HASHORACLE_CONFIG`,
//! falling back to [`EngineConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "HASHORACLE_CONFIG";

/// Settlement window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Seconds after the observation date during which reveals are
    /// accepted. After that, unrevealed levels count as absent.
    pub window_secs: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { window_secs: 3_600 }
    }
}

/// Decomposition solver tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Check points per region, evenly spaced from the region's lower
    /// threshold.
    pub samples_per_region: usize,
    /// Decimal places leg amounts are rounded to.
    pub amount_scale: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            samples_per_region: 1,
            amount_scale: 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    /// Levels per published table when the caller does not say otherwise.
    pub default_levels: usize,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self { default_levels: 24 }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub settlement: SettlementConfig,
    pub solver: SolverConfig,
    pub ladder: LadderConfig,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Loads from `$HASHORACLE_CONFIG` if set, defaults otherwise.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [settlement]
            window_secs = 600

            [solver]
            samples_per_region = 4
            "#,
        )
        .expect("valid config");

        assert_eq!(cfg.settlement.window_secs, 600);
        assert_eq!(cfg.solver.samples_per_region, 4);
        assert_eq!(cfg.solver.amount_scale, 8);
        assert_eq!(cfg.ladder, LadderConfig::default());
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let err = EngineConfig::from_toml_str("[solver]\namount_scale = \"eight\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
