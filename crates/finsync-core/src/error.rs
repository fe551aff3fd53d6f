//! Error types for the finsync pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using finsync's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a banking-provider failure.
///
/// Produced only by the provider-client layer; every downstream decision
/// (error budget, retry, escalation) matches on this enum rather than
/// inspecting message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Session or credential is no longer valid; the connection requires
    /// user re-authentication. Consumes the per-account error budget.
    Disconnected,
    /// Provider rejected the call for rate-limiting reasons.
    RateLimited,
    /// Provider or transport is temporarily unavailable.
    Unavailable,
    /// The request itself was malformed or unsupported.
    InvalidRequest,
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::InvalidRequest => write!(f, "invalid_request"),
        }
    }
}

/// Core error type for finsync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bank connection not found
    #[error("Connection not found: {0}")]
    ConnectionNotFound(Uuid),

    /// Bank account not found
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// Banking provider call failed, with closed classification
    #[error("Provider error ({kind}): {message}")]
    Provider {
        kind: ProviderErrorKind,
        message: String,
    },

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Enrichment model call failed
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// Job queue error
    #[error("Job error: {0}")]
    Job(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (wrong environment, missing tenant id, bad env var)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Construct a provider error with the given classification.
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Error::Provider {
            kind,
            message: message.into(),
        }
    }

    /// Whether this error is a provider failure classified as disconnected.
    ///
    /// This is the only provider error class that consumes the per-account
    /// error budget and propagates out of the balance phase.
    pub fn is_disconnected(&self) -> bool {
        matches!(
            self,
            Error::Provider {
                kind: ProviderErrorKind::Disconnected,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = Error::provider(ProviderErrorKind::Disconnected, "session expired");
        assert_eq!(
            err.to_string(),
            "Provider error (disconnected): session expired"
        );
    }

    #[test]
    fn test_is_disconnected() {
        assert!(Error::provider(ProviderErrorKind::Disconnected, "x").is_disconnected());
        assert!(!Error::provider(ProviderErrorKind::RateLimited, "x").is_disconnected());
        assert!(!Error::provider(ProviderErrorKind::Unavailable, "x").is_disconnected());
        assert!(!Error::Internal("x".into()).is_disconnected());
    }

    #[test]
    fn test_provider_error_kind_display() {
        assert_eq!(ProviderErrorKind::Disconnected.to_string(), "disconnected");
        assert_eq!(ProviderErrorKind::RateLimited.to_string(), "rate_limited");
        assert_eq!(ProviderErrorKind::Unavailable.to_string(), "unavailable");
        assert_eq!(
            ProviderErrorKind::InvalidRequest.to_string(),
            "invalid_request"
        );
    }

    #[test]
    fn test_provider_error_kind_serde() {
        let json = serde_json::to_string(&ProviderErrorKind::RateLimited).unwrap();
        assert_eq!(json, "\"rate_limited\"");
        let back: ProviderErrorKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ProviderErrorKind::RateLimited);
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing tenant id".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing tenant id");
    }

    #[test]
    fn test_connection_not_found_display() {
        let id = Uuid::nil();
        let err = Error::ConnectionNotFound(id);
        assert_eq!(err.to_string(), format!("Connection not found: {}", id));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
