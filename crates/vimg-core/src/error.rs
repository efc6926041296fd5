//! Error types for the remote session collaborator and picture sources

use thiserror::Error;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Failures reported by a `VehicleSession`.
///
/// This is a closed set: session implementations classify their own
/// failures into one of these variants and the refresh coordinator matches
/// on the kind instead of guessing from error text.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Remote service rejected the credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Session expired in a way that needs a fresh login with new credentials
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Network-level failure (DNS, connect, reset)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Remote call did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Anything else the remote side reported
    #[error("Remote service error: {0}")]
    Remote(String),
}

impl SessionError {
    /// Whether the user has to re-enter credentials
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            SessionError::AuthenticationFailed(_) | SessionError::SessionExpired(_)
        )
    }

    /// Whether the failure is a network or timeout condition
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SessionError::Connection(_) | SessionError::Timeout)
    }
}

/// Failures while dereferencing a lazy picture handle
#[derive(Debug, Error)]
pub enum PictureError {
    /// The handle no longer points at any picture data
    #[error("Picture data missing")]
    Missing,

    /// Reading the backing data failed
    #[error("Failed to read picture: {0}")]
    Io(#[from] std::io::Error),

    /// The data could not be decoded as an image
    #[error("Failed to decode picture: {0}")]
    Decode(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(SessionError::AuthenticationFailed("bad password".into()).requires_reauth());
        assert!(SessionError::SessionExpired("token revoked".into()).requires_reauth());
        assert!(!SessionError::Timeout.requires_reauth());
        assert!(!SessionError::Remote("500".into()).requires_reauth());

        assert!(SessionError::Connection("reset".into()).is_connectivity());
        assert!(SessionError::Timeout.is_connectivity());
        assert!(!SessionError::Remote("500".into()).is_connectivity());
    }
}
