//! Mock session collaborator for testing and demos
//!
//! Sessions created by one `MockConnector` share its state, so tests can
//! script failures and read call counters while the coordinator owns the
//! session.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use vimg_core::{
    Credentials, FilePicture, Fleet, PictureHandle, SessionConnector, SessionError,
    SessionResult, VehicleRecord, VehicleSession,
};

use crate::config::{MockSessionConfig, SessionConfig};

/// Create a session connector from configuration
pub fn create_connector(config: &SessionConfig) -> Arc<dyn SessionConnector> {
    match config {
        SessionConfig::Mock(mock) => Arc::new(MockConnector::from_config(mock)),
    }
}

#[derive(Default)]
struct MockState {
    vehicles: RwLock<Vec<VehicleRecord>>,
    accepted_password: RwLock<Option<String>>,
    latency_ms: AtomicU64,
    login_failures: Mutex<VecDeque<SessionError>>,
    refresh_failures: Mutex<VecDeque<SessionError>>,
    connects: AtomicUsize,
    logins: AtomicUsize,
    refreshes: AtomicUsize,
    logouts: AtomicUsize,
}

impl MockState {
    async fn simulate_latency(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

/// Mock account shared by every session it creates
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new(vehicles: Vec<VehicleRecord>) -> Self {
        let connector = Self::default();
        connector.set_vehicles(vehicles);
        connector
    }

    pub fn from_config(config: &MockSessionConfig) -> Self {
        let vehicles = config
            .vehicles
            .iter()
            .map(|vehicle| VehicleRecord {
                vin: vehicle.vin.clone(),
                model: vehicle.model.clone(),
                nickname: vehicle.nickname.clone(),
                pictures: vehicle
                    .pictures
                    .iter()
                    .map(|(key, path)| {
                        let handle: PictureHandle = Arc::new(FilePicture::new(path));
                        (key.clone(), handle)
                    })
                    .collect(),
            })
            .collect();

        let connector = Self::new(vehicles).with_latency(Duration::from_millis(config.latency_ms));
        if let Some(password) = &config.password {
            connector.set_accepted_password(Some(password.clone()));
        }
        connector
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.state
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
        self
    }

    /// Replace the vehicles reported by subsequent refreshes
    pub fn set_vehicles(&self, vehicles: Vec<VehicleRecord>) {
        *self.state.vehicles.write() = vehicles;
    }

    /// Restrict logins to one password, or accept any with `None`
    pub fn set_accepted_password(&self, password: Option<String>) {
        *self.state.accepted_password.write() = password;
    }

    /// Make the next login fail with the given error
    pub fn fail_next_login(&self, error: SessionError) {
        self.state.login_failures.lock().push_back(error);
    }

    /// Make the next vehicle refresh fail with the given error
    pub fn fail_next_refresh(&self, error: SessionError) {
        self.state.refresh_failures.lock().push_back(error);
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn login_count(&self) -> usize {
        self.state.logins.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.state.refreshes.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> usize {
        self.state.logouts.load(Ordering::SeqCst)
    }
}

impl SessionConnector for MockConnector {
    fn connect(&self, credentials: &Credentials) -> Arc<dyn VehicleSession> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Arc::new(MockSession {
            state: self.state.clone(),
            credentials: credentials.clone(),
            logged_in: AtomicBool::new(false),
        })
    }
}

/// One mock session
pub struct MockSession {
    state: Arc<MockState>,
    credentials: Credentials,
    logged_in: AtomicBool,
}

#[async_trait]
impl VehicleSession for MockSession {
    async fn login(&self) -> SessionResult<()> {
        self.state.simulate_latency().await;
        self.state.logins.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.state.login_failures.lock().pop_front() {
            return Err(error);
        }
        if let Some(expected) = self.state.accepted_password.read().as_deref() {
            if expected != self.credentials.password {
                return Err(SessionError::AuthenticationFailed(
                    "invalid username or password".to_string(),
                ));
            }
        }

        debug!(username = %self.credentials.username, "Mock login");
        self.logged_in.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn refresh_vehicles(&self) -> SessionResult<Fleet> {
        self.state.simulate_latency().await;
        self.state.refreshes.fetch_add(1, Ordering::SeqCst);

        if !self.logged_in.load(Ordering::SeqCst) {
            return Err(SessionError::SessionExpired("not logged in".to_string()));
        }
        if let Some(error) = self.state.refresh_failures.lock().pop_front() {
            return Err(error);
        }

        let records = self.state.vehicles.read().clone();
        Ok(Fleet::from_records(records))
    }

    async fn logout(&self) {
        self.state.logouts.fetch_add(1, Ordering::SeqCst);
        self.logged_in.store(false, Ordering::SeqCst);
    }
}
