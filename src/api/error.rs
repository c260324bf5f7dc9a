//! API error types for the ZenTao client.

use thiserror::Error;

/// Errors that can occur when interacting with the ZenTao API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Required connection settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Login was rejected for a reason other than "dialect not supported".
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The token or session cookie was invalidated mid-operation.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// The requested endpoint does not exist on this server (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// A well-formed failure response from the server.
    #[error("ZenTao API error: {0}")]
    Api(String),

    /// Network or HTTP transport error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create an error from a non-success HTTP status code.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            401 | 403 => ApiError::SessionExpired(format!("HTTP {}: {}", status, context)),
            404 => ApiError::NotFound(format!("HTTP {}: {}", status, context)),
            _ => ApiError::Api(format!("HTTP {}: {}", status, context)),
        }
    }

    /// Whether this is one of the structured client errors.
    ///
    /// Batch fetches tolerate only non-core failures (response shapes the
    /// client does not understand); everything else aborts the batch.
    pub fn is_core(&self) -> bool {
        !matches!(self, ApiError::InvalidResponse(_))
    }

    /// Whether the server answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Whether this error signals an expired session.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_from_status_401() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "test");
        assert!(err.is_session_expired());
    }

    #[test]
    fn test_error_from_status_403() {
        let err = ApiError::from_status(StatusCode::FORBIDDEN, "test");
        assert!(err.is_session_expired());
    }

    #[test]
    fn test_error_from_status_404() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, "product-all.json");
        assert!(err.is_not_found());
        assert!(err.is_core());
        assert!(err.to_string().contains("product-all.json"));
    }

    #[test]
    fn test_error_from_status_500() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "products");
        match err {
            ApiError::Api(msg) => assert!(msg.contains("500")),
            _ => panic!("Expected Api error"),
        }
    }

    #[test]
    fn test_invalid_response_is_not_core() {
        assert!(!ApiError::InvalidResponse("bugs is not a list".to_string()).is_core());
        assert!(ApiError::Api("boom".to_string()).is_core());
        assert!(ApiError::SessionExpired("expired".to_string()).is_core());
        assert!(ApiError::Authentication("denied".to_string()).is_core());
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::Authentication("wrong password".to_string());
        assert_eq!(err.to_string(), "Authentication failed: wrong password");

        let err = ApiError::Configuration("ZENTAO_ACCOUNT is not set".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: ZENTAO_ACCOUNT is not set"
        );
    }
}
