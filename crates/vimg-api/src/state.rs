//! Application state for the vehicle images API

use std::sync::Arc;

use vimg_core::{SessionConnector, Vin};
use vimg_refresh::{create_connector, AccountRegistry, SessionConfig};

use crate::error::ApiError;

/// Builds the session connector for an account added at runtime
pub type ConnectorFactory = Arc<dyn Fn(&SessionConfig) -> Arc<dyn SessionConnector> + Send + Sync>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    registry: Arc<AccountRegistry>,
    connector_factory: ConnectorFactory,
}

impl AppState {
    pub fn new(registry: Arc<AccountRegistry>) -> Self {
        let connector_factory: ConnectorFactory = Arc::new(create_connector);
        Self {
            registry,
            connector_factory,
        }
    }

    /// Replace how connectors for new accounts are created
    pub fn with_connector_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&SessionConfig) -> Arc<dyn SessionConnector> + Send + Sync + 'static,
    {
        self.connector_factory = Arc::new(factory);
        self
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn connector_for(&self, session: &SessionConfig) -> Arc<dyn SessionConnector> {
        (self.connector_factory)(session)
    }
}

/// Parse a VIN from a path segment
pub fn parse_vin(raw: &str) -> Result<Vin, ApiError> {
    Vin::parse(raw).map_err(|e| ApiError::BadRequest(format!("Invalid VIN: {}", e)))
}
