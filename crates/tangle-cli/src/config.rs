use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Default, Deserialize)]
pub struct TangleConfig {
    /// Builder name patterns to instantiate.
    #[serde(default)]
    pub requests: Vec<String>,
    /// Exit non-zero when any error was reported.
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".into()
}

impl TangleConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_empty_config() {
        let config: TangleConfig = toml::from_str("").unwrap();
        assert!(config.requests.is_empty());
        assert!(!config.strict);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn parses_full_config() {
        let toml_str = r#"
requests = ["http_server", "backup"]
strict = true

[log]
filter = "tangle_core=debug"
"#;
        let config: TangleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.requests, vec!["http_server", "backup"]);
        assert!(config.strict);
        assert_eq!(config.log.filter, "tangle_core=debug");
    }

    #[test]
    fn log_section_without_filter_uses_default() {
        let config: TangleConfig = toml::from_str("[log]\n").unwrap();
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = TangleConfig::from_file(Path::new("/nonexistent/tangle.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/tangle.toml"));
    }

    #[test]
    fn rejects_wrong_types() {
        let err = toml::from_str::<TangleConfig>("strict = \"yes\"").unwrap_err();
        assert!(ConfigError::from(err).to_string().contains("parse"));
    }

    #[test]
    fn load_without_path_uses_defaults() {
        let config = TangleConfig::load(None).unwrap();
        assert!(config.requests.is_empty());
    }
}
