//! Refresh engine errors

use thiserror::Error;
use vimg_core::{SessionError, VinError};

/// Outcome of a failed refresh.
///
/// `Clone` because every caller that joined an in-flight refresh receives
/// the same value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// Credentials or session rejected; the user has to re-enter credentials
    #[error("Reauthentication required: {0}")]
    Auth(String),

    /// Network, timeout or unclassified remote failure; last-known data stays
    #[error("Refresh failed: {0}")]
    Transient(String),
}

impl RefreshError {
    pub fn requires_reauth(&self) -> bool {
        matches!(self, RefreshError::Auth(_))
    }
}

impl From<SessionError> for RefreshError {
    fn from(err: SessionError) -> Self {
        if err.requires_reauth() {
            RefreshError::Auth(err.to_string())
        } else {
            RefreshError::Transient(err.to_string())
        }
    }
}

/// Account registry and credential flow errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Account entry not found: {0}")]
    UnknownEntry(String),

    #[error("Account already configured: {0}")]
    AlreadyConfigured(String),

    #[error("Invalid credentials: {0}")]
    InvalidAuth(String),

    #[error("Cannot connect to the remote service: {0}")]
    CannotConnect(String),
}

impl RegistryError {
    /// Stable key for credential forms
    pub fn key(&self) -> &'static str {
        match self {
            RegistryError::UnknownEntry(_) => "unknown_entry",
            RegistryError::AlreadyConfigured(_) => "already_configured",
            RegistryError::InvalidAuth(_) => "invalid_auth",
            RegistryError::CannotConnect(_) => "cannot_connect",
        }
    }
}

/// Command surface errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Invalid VIN: {0}")]
    InvalidVin(#[from] VinError),
}
