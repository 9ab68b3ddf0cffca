use crate::domain::{OtpChannel, OtpPolicy};
use chrono::TimeDelta;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const BASE_URL_ENV: &str = "FORMSTAGE_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings read from `config.toml`.
///
/// ```toml
/// [backend]
/// base_url = "https://api.example.com"
/// timeout_secs = 10
///
/// [otp]
/// max_attempts = 3
/// ttl_secs = 300
/// channel = "mobile"
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub otp: OtpConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Absent means run against the offline simulated backend.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 10,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    pub max_attempts: u32,
    pub ttl_secs: i64,
    pub code_length: usize,
    pub channel: OtpChannel,
}

impl Default for OtpConfig {
    fn default() -> Self {
        let policy = OtpPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            ttl_secs: policy.ttl.num_seconds(),
            code_length: policy.code_length,
            channel: OtpChannel::Email,
        }
    }
}

impl OtpConfig {
    pub fn policy(&self) -> OtpPolicy {
        OtpPolicy {
            max_attempts: self.max_attempts.max(1),
            ttl: TimeDelta::seconds(self.ttl_secs.max(1)),
            code_length: self.code_length.clamp(4, 10),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed delay standing in for network latency.
    pub delay_ms: u64,
    pub reject_registrations: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1500,
            reject_registrations: false,
        }
    }
}

impl SimulationConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Default location: `<config dir>/formstage/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("formstage").join("config.toml"))
    }

    /// Loads from `path`, or from the default location when `None`.
    ///
    /// A missing file at the default location yields the defaults; an
    /// explicit `path` must exist. The `FORMSTAGE_BASE_URL` environment
    /// variable overrides `backend.base_url`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        if let Ok(url) = std::env::var(BASE_URL_ENV)
            && !url.trim().is_empty()
        {
            config.backend.base_url = Some(url.trim().to_string());
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.backend.base_url.is_none());
        assert_eq!(config.backend.timeout(), Duration::from_secs(10));
        assert_eq!(config.otp.policy(), OtpPolicy::default());
        assert_eq!(config.simulation.delay(), Duration::from_millis(1500));
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[otp]\nmax_attempts = 5\nchannel = \"mobile\"\n\n[simulation]\ndelay_ms = 0"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.otp.max_attempts, 5);
        assert_eq!(config.otp.channel, OtpChannel::Mobile);
        assert_eq!(config.otp.ttl_secs, 300);
        assert_eq!(config.simulation.delay_ms, 0);
        assert_eq!(config.backend.timeout_secs, 10);
    }

    #[test]
    fn test_policy_is_clamped() {
        let otp = OtpConfig {
            max_attempts: 0,
            ttl_secs: -5,
            code_length: 40,
            channel: OtpChannel::Email,
        };
        let policy = otp.policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.ttl, TimeDelta::seconds(1));
        assert_eq!(policy.code_length, 10);
    }

    #[test]
    fn test_parse_error_names_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[otp\nmax_attempts = ").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.toml");
        let err = Config::load(Some(&absent)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { ref path, .. } if *path == absent));
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[otp]\nmax_attempts = 5").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.otp.max_attempts, 5);
    }
}
