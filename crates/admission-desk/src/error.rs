use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::admissions::StoreError;

/// Failures that abort a gateway command before or while it runs.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("application store error: {0}")]
    Storage(#[from] StoreError),
}
