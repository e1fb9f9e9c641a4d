//! Error types for fleet-core

use thiserror::Error;

use crate::remote::RemoteError;
use crate::session::AuthError;

/// Result type alias using fleet-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in fleet-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Create/update/delete rejected by the remote tree
    #[error("Remote write failed: {0}")]
    RemoteWrite(String),

    /// One-shot read rejected by the remote tree
    #[error("Remote read failed: {0}")]
    RemoteRead(String),

    /// Remote operation did not complete within the configured timeout
    #[error("Remote operation timed out after {0} ms")]
    RemoteTimeout(u128),

    /// Listener-level failure (permission revoked, malformed snapshot)
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Caller-supplied data rejected before any remote call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// OTP cooldown or quota exhausted
    #[error("Rate limited: {0}")]
    RateLimit(String),

    /// Authentication failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Classify a transport failure raised while writing.
    pub fn write(error: RemoteError) -> Self {
        Self::RemoteWrite(error.to_string())
    }

    /// Classify a transport failure raised while reading.
    pub fn read(error: RemoteError) -> Self {
        Self::RemoteRead(error.to_string())
    }

    /// Whether a failed operation may be attempted again.
    ///
    /// Validation and auth failures are final.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RemoteTimeout(_) | Self::RemoteWrite(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_remote_write_and_timeout_are_transient() {
        assert!(Error::RemoteTimeout(20_000).is_transient());
        assert!(Error::RemoteWrite("offline".to_string()).is_transient());
        assert!(!Error::Validation("id is required".to_string()).is_transient());
        assert!(!Error::Auth(AuthError::InvalidCredentials).is_transient());
        assert!(!Error::RemoteRead("denied".to_string()).is_transient());
    }

    #[test]
    fn remote_error_classification_keeps_message() {
        let error = Error::write(RemoteError::PermissionDenied("rules".to_string()));
        assert!(error.to_string().contains("Permission denied"));
        assert!(matches!(error, Error::RemoteWrite(_)));
    }
}
