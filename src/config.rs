use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::model::position::Validation;

/// Construction-time settings for an
/// [`IntervalTree`](crate::model::interval_tree::IntervalTree)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TreeConfig {
    /// How `IntervalTree::add` treats an interval whose start is not before
    /// its end: "repair" extends it to one column, "strict" rejects it
    pub validation: Validation,
}

impl TreeConfig {
    /// A config that rejects degenerate intervals
    pub fn strict() -> Self {
        Self {
            validation: Validation::Strict,
        }
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: TreeConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        tracing::debug!(
            "Loaded tree config from {}: {:?}",
            path.as_ref().display(),
            config
        );
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {msg}"),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ConfigError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_repairs() {
        let config = TreeConfig::default();
        assert_eq!(config.validation, Validation::Repair);
        assert_eq!(TreeConfig::strict().validation, Validation::Strict);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("tree.json");

        let config = TreeConfig::strict();
        config.save_to_file(&config_path).unwrap();

        let saved = std::fs::read_to_string(&config_path).unwrap();
        assert!(saved.contains("\"strict\""));

        let loaded = TreeConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: TreeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TreeConfig::default());
    }

    #[test]
    fn test_load_errors() {
        let temp_dir = tempfile::tempdir().unwrap();

        let missing = TreeConfig::load_from_file(temp_dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ConfigError::IoError(_))));

        let bad_path = temp_dir.path().join("bad.json");
        std::fs::write(&bad_path, r#"{"validation": "lenient"}"#).unwrap();
        let err = TreeConfig::load_from_file(&bad_path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
        assert!(err.to_string().starts_with("Parse error:"));
    }

    #[test]
    fn test_schema_lists_validation_modes() {
        let schema = schemars::schema_for!(TreeConfig);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("validation"));
        assert!(json.contains("repair"));
        assert!(json.contains("strict"));
    }
}
