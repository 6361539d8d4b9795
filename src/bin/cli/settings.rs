//! Configuration shared by the subcommands
//!
//! A JSON file (`--config`) is read first, then individual flags override it.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use nibble_compose::{GeneratorConfig, ViolationPolicy};

/// Command-line values that replace configuration fields when present
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_expr_chars: Option<usize>,
    pub word_nibbles: Option<u8>,
    pub workers: Option<usize>,
    pub driver: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub halt_on_violation: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut GeneratorConfig) {
        if let Some(max) = self.max_expr_chars {
            config.max_expr_chars = max;
        }
        if let Some(width) = self.word_nibbles {
            config.word_nibbles = width;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(driver) = &self.driver {
            config.solver.driver = Some(driver.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.solver.timeout_secs = secs;
        }
        if self.halt_on_violation {
            config.violation_policy = ViolationPolicy::Halt;
        }
    }
}

pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<GeneratorConfig> {
    let mut config = match path {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };
    overrides.apply(&mut config);
    config
        .validate()
        .context("configuration rejected after command-line overrides")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_expr_chars": 600, "workers": 2}"#).unwrap();

        let overrides = ConfigOverrides {
            workers: Some(4),
            halt_on_violation: true,
            ..ConfigOverrides::default()
        };
        let config = load_config(Some(&path), &overrides).unwrap();
        assert_eq!(config.max_expr_chars, 600);
        assert_eq!(config.workers, 4);
        assert_eq!(config.word_nibbles, 8);
        assert_eq!(config.violation_policy, ViolationPolicy::Halt);
    }

    #[test]
    fn test_override_that_breaks_config_is_rejected() {
        let overrides = ConfigOverrides {
            max_expr_chars: Some(900),
            ..ConfigOverrides::default()
        };
        assert!(load_config(None, &overrides).is_err());
    }
}
