//! Generator configuration
//!
//! Loaded from a JSON file (`--config`), with every field optional; command
//! line flags then override individual values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default solver character budget per query
pub const DEFAULT_MAX_EXPR_CHARS: usize = 700;
/// Length the solver rejects outright
pub const DEFAULT_HARD_CEILING: usize = 800;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What the validator does when an execution violates its constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationPolicy {
    /// Count the violation and report `false`
    #[default]
    Advisory,
    /// Fail the validation call
    Halt,
}

/// External solver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Driver executable invoked as `<driver> <query-file>`.
    /// `None` selects the built-in search backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<PathBuf>,
    /// Wall-clock limit per query, in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            driver: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Generation settings shared by the library and the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Maximum conjunction length per component
    pub max_expr_chars: usize,
    /// Absolute limit of the downstream solver; `max_expr_chars` may not exceed it
    pub hard_ceiling: usize,
    /// Operand width in nibbles (8 for 32-bit words)
    pub word_nibbles: u8,
    /// Worker threads per generation wave
    pub workers: usize,
    /// Addressable bits; higher address bits must be zero
    pub memory_address_bits: u8,
    /// Word size in bytes: alignment for memory, stack pointer step
    pub word_bytes: u8,
    pub violation_policy: ViolationPolicy,
    pub solver: SolverConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_expr_chars: DEFAULT_MAX_EXPR_CHARS,
            hard_ceiling: DEFAULT_HARD_CEILING,
            word_nibbles: 8,
            workers: 8,
            memory_address_bits: 16,
            word_bytes: 4,
            violation_policy: ViolationPolicy::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Read and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GeneratorConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_expr_chars == 0 {
            return Err(ConfigError::Invalid("max_expr_chars must be positive".into()));
        }
        if self.max_expr_chars > self.hard_ceiling {
            return Err(ConfigError::Invalid(format!(
                "max_expr_chars ({}) exceeds hard_ceiling ({})",
                self.max_expr_chars, self.hard_ceiling
            )));
        }
        if !(1..=8).contains(&self.word_nibbles) {
            return Err(ConfigError::Invalid(format!(
                "word_nibbles must be within 1..=8, got {}",
                self.word_nibbles
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.memory_address_bits > 32 {
            return Err(ConfigError::Invalid(format!(
                "memory_address_bits must be at most 32, got {}",
                self.memory_address_bits
            )));
        }
        if ![1, 2, 4, 8].contains(&self.word_bytes) {
            return Err(ConfigError::Invalid(format!(
                "word_bytes must be 1, 2, 4 or 8, got {}",
                self.word_bytes
            )));
        }
        Ok(())
    }

    /// Number of bits in an operand word
    pub fn word_bits(&self) -> u32 {
        self.word_nibbles as u32 * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = GeneratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_expr_chars, 700);
        assert_eq!(config.hard_ceiling, 800);
        assert_eq!(config.word_bits(), 32);
        assert_eq!(config.violation_policy, ViolationPolicy::Advisory);
        assert_eq!(config.solver.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_budget_above_ceiling_rejected() {
        let config = GeneratorConfig {
            max_expr_chars: 900,
            ..GeneratorConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hard_ceiling"));
    }

    #[test]
    fn test_width_and_word_size_rejected() {
        for config in [
            GeneratorConfig { word_nibbles: 0, ..GeneratorConfig::default() },
            GeneratorConfig { word_nibbles: 9, ..GeneratorConfig::default() },
            GeneratorConfig { word_bytes: 3, ..GeneratorConfig::default() },
            GeneratorConfig { workers: 0, ..GeneratorConfig::default() },
            GeneratorConfig { memory_address_bits: 40, ..GeneratorConfig::default() },
        ] {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 2, "violation_policy": "halt", "solver": {{"driver": "/opt/tau/run_tau.sh"}}}}"#).unwrap();

        let config = GeneratorConfig::load(file.path()).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.max_expr_chars, 700);
        assert_eq!(config.violation_policy, ViolationPolicy::Halt);
        assert_eq!(config.solver.driver, Some(PathBuf::from("/opt/tau/run_tau.sh")));
        assert_eq!(config.solver.timeout_secs, 5);
    }

    #[test]
    fn test_malformed_json_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = GeneratorConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
