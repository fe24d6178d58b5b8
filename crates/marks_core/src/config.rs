//! Portal runtime configuration.
//!
//! # Responsibility
//! - Load database and logging settings from a TOML file.
//! - Apply environment overrides for deployment.
//!
//! # Invariants
//! - `log_level` is one of `trace|debug|info|warn|error` after validation.
//! - `db_path` is never empty after validation.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `db_path`.
pub const DB_PATH_ENV: &str = "MARKS_DB_PATH";
const DEFAULT_DB_FILE_NAME: &str = "marks.sqlite3";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Settings shared by every portal entry point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalConfig {
    /// SQLite file holding students, subjects and marks.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_level_string")]
    pub log_level: String,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_level_string(),
            log_dir: None,
        }
    }
}

impl PortalConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parses and validates config text.
    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces `db_path` with `MARKS_DB_PATH` when it is set and non-blank.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(DB_PATH_ENV) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.db_path = PathBuf::from(trimmed);
            }
        }
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path cannot be empty".to_string()));
        }
        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "warning" | "error" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unsupported log_level `{other}`"
                )))
            }
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_FILE_NAME)
}

fn default_level_string() -> String {
    default_log_level().to_string()
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, PortalConfig};
    use std::path::PathBuf;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PortalConfig::from_toml_str("").unwrap();
        assert_eq!(config, PortalConfig::default());
    }

    #[test]
    fn parses_all_fields() {
        let config = PortalConfig::from_toml_str(
            r#"
            db_path = "/var/lib/portal/marks.db"
            log_level = "warn"
            log_dir = "/var/log/portal"
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/portal/marks.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/portal")));
    }

    #[test]
    fn rejects_unknown_level_and_relative_log_dir() {
        let level = PortalConfig::from_toml_str(r#"log_level = "verbose""#).unwrap_err();
        assert!(matches!(level, ConfigError::Invalid(_)));

        let dir = PortalConfig::from_toml_str(r#"log_dir = "logs""#).unwrap_err();
        assert!(dir.to_string().contains("absolute"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = PortalConfig::from_toml_str(r#"theme = "dark""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PortalConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
