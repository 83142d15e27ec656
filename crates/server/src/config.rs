//! Typed configuration read from environment variables.
//!
//! `main` calls `dotenvy::dotenv()` first so a local `.env` file can supply
//! any of these.

use std::path::PathBuf;

use directories::ProjectDirs;
use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 14;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
    #[error("Could not determine a data directory; set TASK_MANAGER_DATA_DIR")]
    NoDataDir,
}

/// Credentials for a worker that is created at start-up if missing.
#[derive(Debug)]
pub struct BootstrapWorker {
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub database_url: String,
    pub session_ttl: chrono::Duration,
    pub bootstrap_worker: Option<BootstrapWorker>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match var("BACKEND_PORT").or_else(|| var("PORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { name: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };

        let data_dir = match var("TASK_MANAGER_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("", "", "task-manager")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or(ConfigError::NoDataDir)?,
        };

        let database_url = var("DATABASE_URL").unwrap_or_else(|| {
            format!(
                "sqlite://{}?mode=rwc",
                data_dir.join("db.sqlite").to_string_lossy()
            )
        });

        let session_ttl_secs = match var("SESSION_TTL_SECS") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "SESSION_TTL_SECS",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_SESSION_TTL_SECS,
        };

        let bootstrap_worker = match (
            var("TASK_MANAGER_BOOTSTRAP_USERNAME"),
            var("TASK_MANAGER_BOOTSTRAP_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(BootstrapWorker {
                username,
                password: SecretString::from(password),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete(
                    "TASK_MANAGER_BOOTSTRAP_USERNAME",
                    "TASK_MANAGER_BOOTSTRAP_PASSWORD",
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete(
                    "TASK_MANAGER_BOOTSTRAP_PASSWORD",
                    "TASK_MANAGER_BOOTSTRAP_USERNAME",
                ));
            }
        };

        Ok(Self {
            host,
            port,
            data_dir,
            database_url,
            session_ttl: chrono::Duration::seconds(session_ttl_secs),
            bootstrap_worker,
        })
    }
}
