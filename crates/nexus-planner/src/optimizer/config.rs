//! Optimizer configuration.
//!
//! Configuration can be built in code or loaded from a TOML file. Missing
//! keys fall back to their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::gc_substitute::GC_SUBSTITUTE_RULE_NAME;

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this configuration.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered.
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration for the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Maximum number of optimization passes.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Whether to rewrite expressions into indexed generated columns.
    #[serde(default = "default_true")]
    pub enable_gc_substitute: bool,

    /// Rules that must not run, by rule name.
    #[serde(default)]
    pub disabled_rules: Vec<String>,

    /// Whether to keep a step-by-step trace of every rewrite.
    #[serde(default)]
    pub enable_trace: bool,

    /// Whether string comparison honours declared collations.
    #[serde(default = "default_true")]
    pub new_collation_enabled: bool,
}

fn default_max_iterations() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            enable_gc_substitute: true,
            disabled_rules: Vec::new(),
            enable_trace: false,
            new_collation_enabled: true,
        }
    }
}

impl OptimizerConfig {
    /// Creates a minimal config with all optimizations disabled.
    pub fn minimal() -> Self {
        Self {
            max_iterations: 1,
            enable_gc_substitute: false,
            ..Self::default()
        }
    }

    /// Creates a config with all optimizations enabled.
    pub fn full() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true if the named rule may run.
    pub fn is_rule_enabled(&self, name: &str) -> bool {
        if name == GC_SUBSTITUTE_RULE_NAME && !self.enable_gc_substitute {
            return false;
        }
        !self
            .disabled_rules
            .iter()
            .any(|r| r.eq_ignore_ascii_case(name))
    }

    /// Sets the maximum number of passes.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Adds a rule to the block-list.
    pub fn with_disabled_rule(mut self, name: impl Into<String>) -> Self {
        self.disabled_rules.push(name.into());
        self
    }

    /// Enables or disables step tracing.
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.enable_trace = enabled;
        self
    }

    /// Enables or disables collation-aware comparison.
    pub fn with_new_collation(mut self, enabled: bool) -> Self {
        self.new_collation_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_optimizer_config_default() {
        let config = OptimizerConfig::default();
        assert_eq!(config.max_iterations, 2);
        assert!(config.enable_gc_substitute);
        assert!(config.new_collation_enabled);
        assert!(config.is_rule_enabled(GC_SUBSTITUTE_RULE_NAME));
    }

    #[test]
    fn test_optimizer_config_minimal() {
        let config = OptimizerConfig::minimal();
        assert!(!config.is_rule_enabled(GC_SUBSTITUTE_RULE_NAME));
        assert!(config.is_rule_enabled("some_other_rule"));
    }

    #[test]
    fn test_block_list() {
        let config = OptimizerConfig::default().with_disabled_rule("GENERATE_COLUMN_SUBSTITUTE");
        assert!(!config.is_rule_enabled(GC_SUBSTITUTE_RULE_NAME));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = OptimizerConfig::from_toml("enable_trace = true\n").unwrap();
        assert!(config.enable_trace);
        assert_eq!(config.max_iterations, 2);
        assert!(config.enable_gc_substitute);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            OptimizerConfig::from_toml("max_iterations = \"many\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            OptimizerConfig::from_toml("max_iterations = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("optimizer.toml");

        let config = OptimizerConfig::default()
            .with_max_iterations(4)
            .with_disabled_rule("generate_column_substitute")
            .with_new_collation(false);
        config.save(&path).unwrap();

        let loaded = OptimizerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
