//! Refresh coordinator - on-demand, coalesced, rate-limited vehicle refresh
//!
//! There is no polling. A refresh runs only when something asks for one:
//! account setup, a refresh button, or the `update_images` command.
//!
//! - Concurrent requests share one in-flight refresh and all receive its
//!   outcome.
//! - A request inside the minimum interval after a successful refresh is
//!   answered with the last snapshot and publishes nothing.
//! - The remote session is created lazily and destroyed on any failure, so
//!   the next refresh after a failure starts with a fresh login.
//! - Every successful network refresh publishes a new generation to
//!   subscribers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use vimg_core::{Credentials, Fleet, SessionConnector, SessionError, VehicleSession};

use crate::config::RefreshConfig;
use crate::error::RefreshError;

/// Result of one refresh, shared by every caller that joined it
pub type RefreshResult = Result<Arc<Fleet>, RefreshError>;

type PendingRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// Coordinator phase, for status reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorPhase {
    Idle,
    Refreshing,
    /// Last refresh was rejected for authentication reasons
    AuthRequired,
}

/// One published refresh generation
#[derive(Debug)]
pub struct Publication {
    /// Increases by one with every successful network refresh
    pub generation: u64,
    pub fleet: Arc<Fleet>,
    pub published_at: DateTime<Utc>,
}

struct RefreshState {
    session: Option<Arc<dyn VehicleSession>>,
    last_refresh: Option<Instant>,
    generation: u64,
    closed: bool,
}

struct Inner {
    label: String,
    credentials: Credentials,
    connector: Arc<dyn SessionConnector>,
    min_interval: Duration,
    /// Held for the whole refresh, so session and timestamps are only ever
    /// touched by one refresh (or teardown) at a time
    state: tokio::sync::Mutex<RefreshState>,
    in_flight: Mutex<Option<PendingRefresh>>,
    phase: RwLock<CoordinatorPhase>,
    publisher: watch::Sender<Option<Arc<Publication>>>,
}

/// Per-account refresh coordinator. Cheap to clone.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        credentials: Credentials,
        connector: Arc<dyn SessionConnector>,
        config: &RefreshConfig,
    ) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                label: credentials.username.clone(),
                credentials,
                connector,
                min_interval: config.min_refresh_interval(),
                state: tokio::sync::Mutex::new(RefreshState {
                    session: None,
                    last_refresh: None,
                    generation: 0,
                    closed: false,
                }),
                in_flight: Mutex::new(None),
                phase: RwLock::new(CoordinatorPhase::Idle),
                publisher,
            }),
        }
    }

    /// Request a refresh, joining the in-flight one if there is one.
    ///
    /// The refresh itself runs in a spawned task, so a caller that gives up
    /// waiting does not cancel it for the others.
    pub async fn request_refresh(&self) -> RefreshResult {
        let pending = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(pending) => {
                    debug!(account = %self.inner.label, "Joining in-flight refresh");
                    pending.clone()
                }
                None => {
                    let pending = self.start_refresh();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn start_refresh(&self) -> PendingRefresh {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let result = inner.refresh_once().await;
            inner.in_flight.lock().take();
            result
        });

        let inner = self.inner.clone();
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    // The task never reached its own cleanup
                    inner.in_flight.lock().take();
                    warn!(account = %inner.label, error = %e, "Refresh task aborted");
                    Err(RefreshError::Transient(format!("refresh task aborted: {}", e)))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Subscribe to published generations. The receiver starts at the
    /// current value.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Publication>>> {
        self.inner.publisher.subscribe()
    }

    /// Most recent publication, if any
    pub fn latest(&self) -> Option<Arc<Publication>> {
        self.inner.latest()
    }

    /// Most recent fleet, if any
    pub fn fleet(&self) -> Option<Arc<Fleet>> {
        self.latest().map(|publication| publication.fleet.clone())
    }

    pub fn phase(&self) -> CoordinatorPhase {
        *self.inner.phase.read()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// End the remote session and drop all state.
    ///
    /// Waits for an in-flight refresh to finish. Afterwards every refresh
    /// request fails with a transient error.
    pub async fn teardown(&self) {
        let mut state = self.inner.state.lock().await;
        state.closed = true;
        state.last_refresh = None;

        if let Some(session) = state.session.take() {
            debug!(account = %self.inner.label, "Logging out");
            session.logout().await;
        }

        self.inner.publisher.send_replace(None);
        self.inner.set_phase(CoordinatorPhase::Idle);
        info!(account = %self.inner.label, "Coordinator shut down");
    }
}

impl Inner {
    fn latest(&self) -> Option<Arc<Publication>> {
        self.publisher.borrow().clone()
    }

    fn set_phase(&self, phase: CoordinatorPhase) {
        *self.phase.write() = phase;
    }

    async fn refresh_once(&self) -> RefreshResult {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(RefreshError::Transient(
                "coordinator has been shut down".to_string(),
            ));
        }

        if let (Some(last), Some(current)) = (state.last_refresh, self.latest()) {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                debug!(
                    account = %self.label,
                    wait_secs = (self.min_interval - elapsed).as_secs(),
                    "Refresh rate limited, serving last snapshot"
                );
                return Ok(current.fleet.clone());
            }
        }

        self.set_phase(CoordinatorPhase::Refreshing);
        match self.fetch(&mut state).await {
            Ok(fleet) => {
                let fleet = Arc::new(fleet);
                state.last_refresh = Some(Instant::now());
                state.generation += 1;
                self.publisher.send_replace(Some(Arc::new(Publication {
                    generation: state.generation,
                    fleet: fleet.clone(),
                    published_at: Utc::now(),
                })));
                self.set_phase(CoordinatorPhase::Idle);
                info!(
                    account = %self.label,
                    generation = state.generation,
                    vehicles = fleet.len(),
                    "Vehicle data refreshed"
                );
                Ok(fleet)
            }
            Err(err) => {
                state.session = None;
                if err.requires_reauth() {
                    self.set_phase(CoordinatorPhase::AuthRequired);
                    warn!(account = %self.label, error = %err, "Authentication rejected, reauthentication required");
                } else {
                    self.set_phase(CoordinatorPhase::Idle);
                    if err.is_connectivity() {
                        warn!(account = %self.label, error = %err, "Remote service unreachable, session reset");
                    } else {
                        warn!(account = %self.label, error = %err, "Refresh failed, session reset");
                    }
                }
                Err(err.into())
            }
        }
    }

    async fn fetch(&self, state: &mut RefreshState) -> Result<Fleet, SessionError> {
        let session = match &state.session {
            Some(session) => session.clone(),
            None => {
                debug!(account = %self.label, "Creating remote session");
                let session = self.connector.connect(&self.credentials);
                session.login().await?;
                info!(account = %self.label, "Logged in");
                state.session = Some(session.clone());
                session
            }
        };
        session.refresh_vehicles().await
    }
}

#[cfg(test)]
mod tests {
    use vimg_core::{VehicleRecord, Vin};

    use super::*;
    use crate::mock::MockConnector;

    const VIN: &str = "WVWZZZ1JZXW000001";

    fn record(model: &str) -> VehicleRecord {
        VehicleRecord {
            vin: VIN.to_string(),
            model: Some(model.to_string()),
            ..Default::default()
        }
    }

    fn coordinator(connector: &MockConnector) -> RefreshCoordinator {
        RefreshCoordinator::new(
            Credentials::new("driver@example.com", "secret"),
            Arc::new(connector.clone()),
            &RefreshConfig::default(),
        )
    }

    fn model_of(fleet: &Fleet) -> Option<String> {
        let vin = Vin::parse(VIN).unwrap();
        fleet.get(&vin).and_then(|s| s.model().map(str::to_string))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_logs_in_and_publishes() {
        let connector = MockConnector::new(vec![record("ID.3")]);
        let coordinator = coordinator(&connector);
        let mut updates = coordinator.subscribe();

        let fleet = coordinator.request_refresh().await.unwrap();
        assert_eq!(model_of(&fleet).as_deref(), Some("ID.3"));
        assert_eq!(connector.login_count(), 1);
        assert_eq!(connector.refresh_count(), 1);

        assert!(updates.has_changed().unwrap());
        let published = updates.borrow_and_update().clone().unwrap();
        assert_eq!(published.generation, 1);
        assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_refresh() {
        let connector =
            MockConnector::new(vec![record("ID.3")]).with_latency(Duration::from_millis(500));
        let coordinator = coordinator(&connector);

        let (a, b, c) = tokio::join!(
            coordinator.request_refresh(),
            coordinator.request_refresh(),
            coordinator.request_refresh()
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(connector.login_count(), 1);
        assert_eq!(connector.refresh_count(), 1);
        assert_eq!(coordinator.latest().unwrap().generation, 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_failure() {
        let connector =
            MockConnector::new(vec![record("ID.3")]).with_latency(Duration::from_millis(100));
        connector.fail_next_login(SessionError::AuthenticationFailed("bad password".into()));
        let coordinator = coordinator(&connector);

        let (a, b) = tokio::join!(coordinator.request_refresh(), coordinator.request_refresh());
        let (a, b) = (a.unwrap_err(), b.unwrap_err());
        assert!(matches!(a, RefreshError::Auth(_)));
        assert_eq!(a, b);
        assert_eq!(connector.login_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_serves_cached_snapshot() {
        let connector = MockConnector::new(vec![record("ID.3")]);
        let coordinator = coordinator(&connector);

        coordinator.request_refresh().await.unwrap();
        connector.set_vehicles(vec![record("ID.7")]);

        let updates = coordinator.subscribe();
        tokio::time::advance(Duration::from_secs(30)).await;
        let cached = coordinator.request_refresh().await.unwrap();

        assert_eq!(model_of(&cached).as_deref(), Some("ID.3"));
        assert_eq!(connector.refresh_count(), 1);
        assert!(!updates.has_changed().unwrap());

        tokio::time::advance(Duration::from_secs(31)).await;
        let fresh = coordinator.request_refresh().await.unwrap();
        assert_eq!(model_of(&fresh).as_deref(), Some("ID.7"));
        assert_eq!(connector.refresh_count(), 2);
        assert_eq!(connector.login_count(), 1);
        assert!(updates.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_clears_session_and_relogs() {
        let connector = MockConnector::new(vec![record("ID.3")]);
        let coordinator = coordinator(&connector);
        coordinator.request_refresh().await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        connector.fail_next_refresh(SessionError::SessionExpired("token revoked".into()));
        let err = coordinator.request_refresh().await.unwrap_err();
        assert!(err.requires_reauth());
        assert_eq!(coordinator.phase(), CoordinatorPhase::AuthRequired);

        // Last-known data survives the failure
        assert_eq!(coordinator.latest().unwrap().generation, 1);

        let fleet = coordinator.request_refresh().await.unwrap();
        assert_eq!(model_of(&fleet).as_deref(), Some("ID.3"));
        assert_eq!(connector.login_count(), 2);
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_keeps_latest_and_resets_session() {
        let connector = MockConnector::new(vec![record("ID.3")]);
        let coordinator = coordinator(&connector);
        coordinator.request_refresh().await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        connector.fail_next_refresh(SessionError::Connection("connection reset".into()));
        let err = coordinator.request_refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::Transient(_)));
        assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);
        assert_eq!(coordinator.latest().unwrap().generation, 1);

        // The window still counts from the last success, so this goes out
        coordinator.request_refresh().await.unwrap();
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(coordinator.latest().unwrap().generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_login_is_classified_by_kind() {
        let connector = MockConnector::new(vec![record("ID.3")]);
        connector.fail_next_login(SessionError::Timeout);
        let coordinator = coordinator(&connector);

        let err = coordinator.request_refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::Transient(_)));
        assert!(coordinator.latest().is_none());
        assert_eq!(connector.refresh_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_logs_out_once() {
        let connector = MockConnector::new(vec![record("ID.3")]);
        let coordinator = coordinator(&connector);
        coordinator.request_refresh().await.unwrap();

        coordinator.teardown().await;
        assert_eq!(connector.logout_count(), 1);
        assert!(coordinator.latest().is_none());

        coordinator.teardown().await;
        assert_eq!(connector.logout_count(), 1);

        let err = coordinator.request_refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::Transient(_)));
        assert_eq!(connector.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_without_session_skips_logout() {
        let connector = MockConnector::new(vec![record("ID.3")]);
        let coordinator = coordinator(&connector);
        coordinator.teardown().await;
        assert_eq!(connector.logout_count(), 0);
    }
}
