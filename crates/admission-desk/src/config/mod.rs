use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::admissions::intake::DEFAULT_EXAM_FORM;
use crate::workflows::admissions::ParticipantId;

const DEFAULT_DB_PATH: &str = "admission_desk.db";
const DEFAULT_OUTBOX_CAPACITY: usize = 1024;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub review: ReviewConfig,
    pub storage: StorageConfig,
    pub outbox: OutboxConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            review: ReviewConfig::from_env()?,
            storage: StorageConfig::from_env(),
            outbox: OutboxConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// The single reviewer allowed to decide applications, plus intake defaults.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub reviewer: ParticipantId,
    pub exam_form: String,
}

impl ReviewConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = env::var("ADMIN_CHAT_ID").unwrap_or_default();
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingReviewer);
        }

        let chat_id = raw
            .parse::<i64>()
            .map_err(|source| ConfigError::InvalidReviewer {
                value: raw.to_string(),
                source,
            })?;

        let exam_form = env::var("EXAM_FORM")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXAM_FORM.to_string());

        Ok(Self {
            reviewer: ParticipantId::from(chat_id),
            exam_form,
        })
    }
}

/// Location of the SQLite application database.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl StorageConfig {
    /// Resolve the database location without requiring the rest of the configuration.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    fn from_env() -> Self {
        let db_path = env::var("DB_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        Self {
            db_path: PathBuf::from(db_path),
        }
    }
}

/// Bound on outbound messages waiting for the chat transport.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    pub capacity: usize,
}

impl OutboxConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let capacity = match env::var("OUTBOX_CAPACITY") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or(ConfigError::InvalidOutboxCapacity)?,
            Err(_) => DEFAULT_OUTBOX_CAPACITY,
        };
        Ok(Self { capacity })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    MissingReviewer,
    InvalidReviewer {
        value: String,
        source: std::num::ParseIntError,
    },
    InvalidOutboxCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingReviewer => {
                write!(f, "ADMIN_CHAT_ID must be set to the reviewer's chat id")
            }
            ConfigError::InvalidReviewer { value, .. } => {
                write!(f, "ADMIN_CHAT_ID must be an integer chat id, got '{value}'")
            }
            ConfigError::InvalidOutboxCapacity => {
                write!(f, "OUTBOX_CAPACITY must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidReviewer { source, .. } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::MissingReviewer
            | ConfigError::InvalidOutboxCapacity => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "ADMIN_CHAT_ID",
            "DB_PATH",
            "EXAM_FORM",
            "OUTBOX_CAPACITY",
        ] {
            env::remove_var(key);
        }
        env::set_var("ADMIN_CHAT_ID", "1001");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.review.reviewer, ParticipantId::new("1001"));
        assert_eq!(config.review.exam_form, DEFAULT_EXAM_FORM);
        assert_eq!(config.storage.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.outbox.capacity, DEFAULT_OUTBOX_CAPACITY);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn reviewer_must_be_configured() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::remove_var("ADMIN_CHAT_ID");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::MissingReviewer)
        ));
    }

    #[test]
    fn reviewer_must_be_numeric() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADMIN_CHAT_ID", "@dean");
        match AppConfig::load() {
            Err(ConfigError::InvalidReviewer { value, .. }) => assert_eq!(value, "@dean"),
            other => panic!("expected invalid reviewer, got {other:?}"),
        }
    }

    #[test]
    fn outbox_capacity_must_be_positive() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("OUTBOX_CAPACITY", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidOutboxCapacity)
        ));
    }
}
