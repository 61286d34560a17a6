use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TmcError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid header: {name}")]
    InvalidHeader { name: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Api,
    Data,
    Configuration,
    Authentication,
}

impl TmcError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TmcError::Http { status, .. } => Some(*status),
            TmcError::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Transport failures and 5xx answers are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            TmcError::Transport(e) => !e.is_builder() && !e.is_decode(),
            TmcError::Http { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            TmcError::Transport(_) => ErrorCategory::Network,
            TmcError::Http { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN =>
            {
                ErrorCategory::Authentication
            }
            TmcError::Http { .. } => ErrorCategory::Api,
            TmcError::Serialization(_) | TmcError::Io(_) => ErrorCategory::Data,
            TmcError::Url(_)
            | TmcError::InvalidHeader { .. }
            | TmcError::Config { .. }
            | TmcError::InvalidConfigValue { .. }
            | TmcError::MissingConfig { .. } => ErrorCategory::Configuration,
            TmcError::Auth { .. } => ErrorCategory::Authentication,
        }
    }
}

pub type Result<T> = std::result::Result<T, TmcError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> TmcError {
        TmcError::Http {
            status: StatusCode::from_u16(status).unwrap(),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
        assert!(!http(400).is_retryable());
        assert!(!http(404).is_retryable());
    }

    #[test]
    fn test_not_found_detection() {
        assert!(http(404).is_not_found());
        assert!(!http(409).is_not_found());
        assert!(!TmcError::Config {
            message: "x".to_string()
        }
        .is_not_found());
    }

    #[test]
    fn test_category() {
        assert_eq!(http(401).category(), ErrorCategory::Authentication);
        assert_eq!(http(409).category(), ErrorCategory::Api);
        assert_eq!(
            TmcError::MissingConfig {
                field: "endpoint".to_string()
            }
            .category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_http_error_display_carries_status() {
        let message = http(409).to_string();
        assert!(message.contains("409"));
        assert!(message.contains("boom"));
    }
}
