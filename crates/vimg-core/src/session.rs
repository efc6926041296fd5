//! VehicleSession trait - the remote account collaborator
//!
//! The refresh engine never talks HTTP itself. Everything that involves the
//! manufacturer's cloud (login, keep-alive, fetching picture bytes) lives
//! behind these two traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SessionResult;
use crate::snapshot::Fleet;

/// Account credentials. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated connection to the remote account
#[async_trait]
pub trait VehicleSession: Send + Sync {
    /// Authenticate against the remote service
    async fn login(&self) -> SessionResult<()>;

    /// Fetch the current state of every vehicle in the account
    async fn refresh_vehicles(&self) -> SessionResult<Fleet>;

    /// End the session. Best-effort: implementations swallow their own errors.
    async fn logout(&self);
}

/// Creates fresh, not yet logged-in sessions for an account
pub trait SessionConnector: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Arc<dyn VehicleSession>;
}
