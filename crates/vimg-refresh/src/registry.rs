//! Account registry - lifecycle of configured accounts
//!
//! Each entry owns one coordinator and the entities built from its first
//! successful refresh. Entries move between these states:
//!
//! ```text
//!   NotLoaded --setup ok--> Loaded --unload--> NotLoaded
//!       |                                 ^
//!       |--transient failure--> SetupRetry |
//!       '--auth failure-------> SetupError (reauthentication required)
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use vimg_core::{Credentials, PictureKind, SessionConnector, Vin};

use crate::codec::ImageCodec;
use crate::config::RefreshConfig;
use crate::coordinator::{CoordinatorPhase, RefreshCoordinator};
use crate::entities::{RefreshButton, VehicleEntities, VehicleImage};
use crate::error::{RefreshError, RegistryError};

/// Title given to every account entry
pub const ENTRY_TITLE: &str = "VW Images";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    NotLoaded,
    Loaded,
    /// First refresh failed transiently; setup can be retried
    SetupRetry,
    /// First refresh was rejected; credentials must be re-entered
    SetupError,
}

/// Serializable view of an entry
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub entry_id: Uuid,
    pub title: String,
    pub username: String,
    pub state: EntryState,
    pub reauth_required: bool,
    pub vehicles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Clone)]
struct EntryRuntime {
    coordinator: RefreshCoordinator,
    entities: Arc<VehicleEntities>,
}

struct EntryStatus {
    state: EntryState,
    last_error: Option<String>,
}

/// One configured account
pub struct AccountEntry {
    entry_id: Uuid,
    connector: Arc<dyn SessionConnector>,
    credentials: RwLock<Credentials>,
    status: RwLock<EntryStatus>,
    runtime: RwLock<Option<EntryRuntime>>,
    /// Serializes setup, unload and reload of this entry
    lifecycle: tokio::sync::Mutex<()>,
}

impl fmt::Debug for AccountEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountEntry")
            .field("entry_id", &self.entry_id)
            .field("username", &self.username())
            .field("state", &self.state())
            .finish()
    }
}

impl AccountEntry {
    fn new(credentials: Credentials, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            connector,
            credentials: RwLock::new(credentials),
            status: RwLock::new(EntryStatus {
                state: EntryState::NotLoaded,
                last_error: None,
            }),
            runtime: RwLock::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn entry_id(&self) -> Uuid {
        self.entry_id
    }

    pub fn title(&self) -> &'static str {
        ENTRY_TITLE
    }

    pub fn username(&self) -> String {
        self.credentials.read().username.clone()
    }

    pub fn state(&self) -> EntryState {
        self.status.read().state
    }

    /// Whether the user has to re-enter credentials for this account
    pub fn reauth_required(&self) -> bool {
        if self.state() == EntryState::SetupError {
            return true;
        }
        self.coordinator()
            .is_some_and(|c| c.phase() == CoordinatorPhase::AuthRequired)
    }

    /// Coordinator of a loaded entry
    pub fn coordinator(&self) -> Option<RefreshCoordinator> {
        self.runtime.read().as_ref().map(|r| r.coordinator.clone())
    }

    /// Entities of a loaded entry
    pub fn entities(&self) -> Option<Arc<VehicleEntities>> {
        self.runtime.read().as_ref().map(|r| r.entities.clone())
    }

    pub fn summary(&self) -> EntrySummary {
        let (state, last_error) = {
            let status = self.status.read();
            (status.state, status.last_error.clone())
        };
        let vehicles = self
            .coordinator()
            .and_then(|c| c.fleet())
            .map(|fleet| fleet.vins().map(|vin| vin.to_string()).collect())
            .unwrap_or_default();
        EntrySummary {
            entry_id: self.entry_id,
            title: ENTRY_TITLE.to_string(),
            username: self.username(),
            state,
            reauth_required: self.reauth_required(),
            vehicles,
            last_error,
        }
    }

    fn set_status(&self, state: EntryState, last_error: Option<String>) {
        *self.status.write() = EntryStatus { state, last_error };
    }

    /// Create the coordinator, run the first refresh and build entities
    pub async fn setup(&self, config: &RefreshConfig, codec: &ImageCodec) -> EntryState {
        let _guard = self.lifecycle.lock().await;
        self.setup_locked(config, codec).await
    }

    async fn setup_locked(&self, config: &RefreshConfig, codec: &ImageCodec) -> EntryState {
        if self.state() == EntryState::Loaded {
            return EntryState::Loaded;
        }

        let credentials = self.credentials.read().clone();
        let coordinator = RefreshCoordinator::new(credentials, self.connector.clone(), config);

        match coordinator.request_refresh().await {
            Ok(fleet) => {
                let entities = Arc::new(VehicleEntities::build(&coordinator, &fleet, codec));
                info!(
                    entry_id = %self.entry_id,
                    vehicles = fleet.len(),
                    images = entities.images().len(),
                    "Account loaded"
                );
                *self.runtime.write() = Some(EntryRuntime {
                    coordinator,
                    entities,
                });
                self.set_status(EntryState::Loaded, None);
                EntryState::Loaded
            }
            Err(err) => {
                coordinator.teardown().await;
                let state = match err {
                    RefreshError::Auth(_) => EntryState::SetupError,
                    RefreshError::Transient(_) => EntryState::SetupRetry,
                };
                warn!(entry_id = %self.entry_id, error = %err, ?state, "Account setup failed");
                self.set_status(state, Some(err.to_string()));
                state
            }
        }
    }

    /// Tear the coordinator down and drop the entities
    pub async fn unload(&self) {
        let _guard = self.lifecycle.lock().await;
        self.unload_locked().await;
    }

    async fn unload_locked(&self) {
        let runtime = self.runtime.write().take();
        if let Some(runtime) = runtime {
            runtime.coordinator.teardown().await;
            info!(entry_id = %self.entry_id, "Account unloaded");
        }
        self.set_status(EntryState::NotLoaded, None);
    }

    /// Unload and set up again
    pub async fn reload(&self, config: &RefreshConfig, codec: &ImageCodec) -> EntryState {
        let _guard = self.lifecycle.lock().await;
        self.unload_locked().await;
        self.setup_locked(config, codec).await
    }
}

/// Check credentials with a throwaway session: login, then logout
pub async fn validate_credentials(
    connector: &dyn SessionConnector,
    credentials: &Credentials,
) -> Result<(), RegistryError> {
    let session = connector.connect(credentials);
    match session.login().await {
        Ok(()) => {
            session.logout().await;
            Ok(())
        }
        Err(err) if err.is_connectivity() => Err(RegistryError::CannotConnect(err.to_string())),
        Err(err) => Err(RegistryError::InvalidAuth(err.to_string())),
    }
}

/// All configured accounts
pub struct AccountRegistry {
    config: RefreshConfig,
    codec: ImageCodec,
    entries: RwLock<Vec<Arc<AccountEntry>>>,
}

impl AccountRegistry {
    pub fn new(config: RefreshConfig) -> Self {
        let codec = ImageCodec::from_config(&config);
        Self {
            config,
            codec,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.entries
            .read()
            .iter()
            .any(|e| Some(e.entry_id) != except && e.username() == username)
    }

    /// Register an account without validating it first and set it up.
    /// Setup failures leave the entry in place in a failed state.
    pub async fn register(
        &self,
        credentials: Credentials,
        connector: Arc<dyn SessionConnector>,
    ) -> Result<Arc<AccountEntry>, RegistryError> {
        let entry = {
            let mut entries = self.entries.write();
            if entries.iter().any(|e| e.username() == credentials.username) {
                return Err(RegistryError::AlreadyConfigured(credentials.username));
            }
            let entry = Arc::new(AccountEntry::new(credentials, connector));
            entries.push(entry.clone());
            entry
        };

        entry.setup(&self.config, &self.codec).await;
        Ok(entry)
    }

    /// Credential flow: validate with a throwaway session, reject duplicate
    /// usernames, then register and set up the account
    pub async fn add_account(
        &self,
        credentials: Credentials,
        connector: Arc<dyn SessionConnector>,
    ) -> Result<Arc<AccountEntry>, RegistryError> {
        if self.username_taken(&credentials.username, None) {
            return Err(RegistryError::AlreadyConfigured(credentials.username));
        }
        validate_credentials(connector.as_ref(), &credentials).await?;
        self.register(credentials, connector).await
    }

    /// Reauthentication flow: validate new credentials, store them on the
    /// existing entry and reload it
    pub async fn reauthenticate(
        &self,
        entry_id: Uuid,
        credentials: Credentials,
    ) -> Result<EntryState, RegistryError> {
        let entry = self.entry(entry_id)?;
        if self.username_taken(&credentials.username, Some(entry_id)) {
            return Err(RegistryError::AlreadyConfigured(credentials.username));
        }
        validate_credentials(entry.connector.as_ref(), &credentials).await?;

        {
            // Checked again under the write lock: another entry may have
            // claimed the username while validation was in progress
            let entries = self.entries.write();
            if entries
                .iter()
                .any(|e| e.entry_id != entry_id && e.username() == credentials.username)
            {
                return Err(RegistryError::AlreadyConfigured(credentials.username));
            }
            *entry.credentials.write() = credentials;
        }
        info!(entry_id = %entry_id, "Credentials updated, reloading account");
        Ok(entry.reload(&self.config, &self.codec).await)
    }

    /// Set up an entry again, e.g. after a transient setup failure
    pub async fn reload(&self, entry_id: Uuid) -> Result<EntryState, RegistryError> {
        let entry = self.entry(entry_id)?;
        Ok(entry.reload(&self.config, &self.codec).await)
    }

    /// Unload and forget an entry
    pub async fn remove(&self, entry_id: Uuid) -> Result<(), RegistryError> {
        let entry = self.entry(entry_id)?;
        entry.unload().await;
        self.entries.write().retain(|e| e.entry_id != entry_id);
        Ok(())
    }

    /// Unload every entry, logging out of every remote session
    pub async fn shutdown(&self) {
        for entry in self.entries() {
            entry.unload().await;
        }
    }

    pub fn entries(&self) -> Vec<Arc<AccountEntry>> {
        self.entries.read().clone()
    }

    pub fn entry(&self, entry_id: Uuid) -> Result<Arc<AccountEntry>, RegistryError> {
        self.entries
            .read()
            .iter()
            .find(|e| e.entry_id == entry_id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownEntry(entry_id.to_string()))
    }

    /// Loaded entries, in registration order
    pub fn loaded(&self) -> Vec<Arc<AccountEntry>> {
        self.entries()
            .into_iter()
            .filter(|e| e.state() == EntryState::Loaded)
            .collect()
    }

    pub fn find_image(&self, vin: &Vin, kind: PictureKind) -> Option<Arc<VehicleImage>> {
        self.loaded()
            .iter()
            .filter_map(|e| e.entities())
            .find_map(|entities| entities.image(vin, kind).cloned())
    }

    pub fn find_button(&self, vin: &Vin) -> Option<Arc<RefreshButton>> {
        self.loaded()
            .iter()
            .filter_map(|e| e.entities())
            .find_map(|entities| entities.button(vin).cloned())
    }
}
