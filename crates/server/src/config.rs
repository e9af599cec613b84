//! Server configuration
//!
//! Read from `draftboard.toml`. The file is located through
//! `DRAFTBOARD_CONFIG`, then the platform config directory; when neither
//! exists the built-in defaults apply. `DRAFTBOARD_PORT` overrides the port.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{debug, info};

use draftboard_core::{DraftLayout, MAX_DURATION_MS};
use draftboard_net::DEFAULT_PORT;

pub const CONFIG_ENV: &str = "DRAFTBOARD_CONFIG";
pub const PORT_ENV: &str = "DRAFTBOARD_PORT";
const CONFIG_FILE: &str = "draftboard.toml";
const DATABASE_FILE: &str = "draftboard.db";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("Could not determine the platform data directory")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    /// Defaults to the platform data directory
    pub database_path: Option<PathBuf>,
    pub owners: u32,
    pub rounds: u32,
    pub clock_minutes: f64,
    pub session_hours: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: None,
            owners: 12,
            rounds: 17,
            clock_minutes: 2.0,
            session_hours: 24,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "draftboard", "draftboard")
}

impl ServerConfig {
    /// Resolve, read and validate the configuration for this process
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE)));

        let config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config
            .with_port_override(std::env::var(PORT_ENV).ok().as_deref())?
            .validated()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        info!(path = %path.display(), "Loaded config file");
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply a `DRAFTBOARD_PORT` value, if set
    pub fn with_port_override(mut self, value: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(value) = value {
            self.port = value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: PORT_ENV,
                reason: format!("{:?} is not a port number", value),
            })?;
        }
        Ok(self)
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.owners == 0 {
            return Err(invalid("owners", "must be at least 1"));
        }
        if self.rounds == 0 {
            return Err(invalid("rounds", "must be at least 1"));
        }
        if !self.clock_minutes.is_finite() || self.clock_minutes <= 0.0 {
            return Err(invalid("clock_minutes", "must be a positive number"));
        }
        if self.clock_minutes * 60_000.0 > MAX_DURATION_MS as f64 {
            return Err(invalid("clock_minutes", "must be at most one day"));
        }
        if self.session_hours <= 0 {
            return Err(invalid("session_hours", "must be positive"));
        }
        Ok(self)
    }

    pub fn layout(&self) -> DraftLayout {
        DraftLayout {
            owners: self.owners,
            rounds: self.rounds,
        }
    }

    pub fn clock_duration_ms(&self) -> u64 {
        (self.clock_minutes * 60_000.0).round() as u64
    }

    /// Database location, falling back to the platform data directory
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => project_dirs()
                .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
                .ok_or(ConfigError::NoDataDir),
        }
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_standard_league() {
        let config = ServerConfig::default().validated().unwrap();
        assert_eq!(config.port, 7340);
        assert_eq!(config.layout(), DraftLayout { owners: 12, rounds: 17 });
        assert_eq!(config.clock_duration_ms(), 120_000);
        assert_eq!(config.session_hours, 24);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            owners = 10
            clock_minutes = 1.5
            database_path = "/var/lib/draftboard/league.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.owners, 10);
        assert_eq!(config.rounds, 17);
        assert_eq!(config.clock_duration_ms(), 90_000);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/var/lib/draftboard/league.db")
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            ServerConfig::from_toml("teams = 12"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_port_override() {
        let config = ServerConfig::default()
            .with_port_override(Some("9000"))
            .unwrap();
        assert_eq!(config.port, 9000);

        let unchanged = ServerConfig::default().with_port_override(None).unwrap();
        assert_eq!(unchanged.port, DEFAULT_PORT);

        assert!(matches!(
            ServerConfig::default().with_port_override(Some("ninety")),
            Err(ConfigError::Invalid { key: PORT_ENV, .. })
        ));
    }

    #[test]
    fn test_validation() {
        let zero_rounds = ServerConfig {
            rounds: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(
            zero_rounds.validated(),
            Err(ConfigError::Invalid { key: "rounds", .. })
        ));

        let negative_clock = ServerConfig {
            clock_minutes: -1.0,
            ..ServerConfig::default()
        };
        assert!(negative_clock.validated().is_err());

        let week_long_clock = ServerConfig {
            clock_minutes: 7.0 * 24.0 * 60.0,
            ..ServerConfig::default()
        };
        assert!(matches!(
            week_long_clock.validated(),
            Err(ConfigError::Invalid { key: "clock_minutes", .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 8123\nrounds = 15").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 8123);
        assert_eq!(config.rounds, 15);
    }
}
