//! Centralized error types for zentao-notify.
//!
//! This module aggregates the errors of the API client, the configuration
//! loader and the notifier into one application error with user-facing
//! messages. All error types use `thiserror`.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::notify::NotifyError;

/// Anything that can stop a run of the poller.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid settings.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// ZenTao API errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Feishu webhook errors.
    #[error("{0}")]
    Notify(#[from] NotifyError),
}

impl AppError {
    /// A short hint for the operator, printed on stderr.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(ConfigError::NoDataDir) => {
                "Could not find a data directory for the state file. Set STATE_FILE.".to_string()
            }
            AppError::Config(ConfigError::ReadError(_)) => {
                "Could not read the .env file. Check that it is readable.".to_string()
            }
            AppError::Config(ConfigError::ValidationError(msg)) => {
                format!("Configuration error: {}", msg)
            }
            AppError::Api(ApiError::Configuration(msg)) => format!("Configuration error: {}", msg),
            AppError::Api(ApiError::Authentication(_))
            | AppError::Api(ApiError::SessionExpired(_)) => {
                "ZenTao login failed. Check ZENTAO_ACCOUNT and ZENTAO_PASSWORD.".to_string()
            }
            AppError::Api(ApiError::Network(_)) => {
                "Could not reach ZenTao. Check ZENTAO_BASE_URL and the network.".to_string()
            }
            AppError::Api(e) => format!("ZenTao request failed: {}", e),
            AppError::Notify(e) => format!("Feishu notification failed: {}", e),
        }
    }
}

/// Result alias used by the binary.
pub type Result<T> = std::result::Result<T, AppError>;
