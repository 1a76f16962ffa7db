//! Pipeline and logging configuration.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter level, overridden by `RUST_LOG`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Sets the level.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Enables or disables JSON output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// The static, process-lifetime description of a pipeline.
///
/// Stage names are resolved against the kinds registered in the root
/// container when the pipeline is built. Duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// The pipeline name, used in logs and events.
    pub name: String,
    /// Stage kind names in pipeline order.
    pub stages: Vec<String>,
    /// Logging settings.
    pub logging: LogConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "pipeline".to_string(),
            stages: Vec::new(),
            logging: LogConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with the given name and no stages.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stages.push(stage.into());
        self
    }

    /// Sets the logging settings.
    #[must_use]
    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed JSON, or a validation error.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Checks the configuration for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline name must not be empty".into()));
        }
        if let Some(index) = self.stages.iter().position(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "stage at position {index} has an empty name"
            )));
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = PipelineConfig::from_json_str(r#"{"name": "hello", "stages": ["greet", "echo"]}"#)
            .unwrap();
        assert_eq!(config.stages, vec!["greet", "echo"]);
        assert_eq!(config.logging, LogConfig::default());
    }

    #[test]
    fn test_builder_setters() {
        let config = PipelineConfig::new("demo")
            .with_stage("greet")
            .with_stage("greet")
            .with_logging(LogConfig::default().with_level("debug").with_json(true));
        assert_eq!(config.stages.len(), 2);
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let empty_name = PipelineConfig::new(" ");
        assert!(matches!(empty_name.validate(), Err(ConfigError::Invalid(_))));

        let empty_stage = PipelineConfig::new("demo").with_stage("");
        let err = empty_stage.validate().unwrap_err();
        assert!(err.to_string().contains("position 0"));

        let bad_level = PipelineConfig::new("demo").with_logging(LogConfig::default().with_level("loud"));
        assert!(bad_level.validate().unwrap_err().to_string().contains("loud"));
    }

    #[test]
    fn test_malformed_json() {
        let err = PipelineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name": "from-file", "stages": ["greet"], "logging": {{"level": "warn", "json": true}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.logging.level, "warn");

        let missing = PipelineConfig::from_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
