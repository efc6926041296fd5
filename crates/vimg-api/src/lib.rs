//! vimg-api - REST API for on-demand vehicle images
//!
//! Serves the entities of every loaded account: PNG images, refresh
//! buttons, the `update_images` service and the account credential flows.
//!
//! # Usage
//!
//! ```ignore
//! use vimg_api::{create_router, AppState};
//! use vimg_refresh::{AccountRegistry, RefreshConfig};
//!
//! let registry = Arc::new(AccountRegistry::new(RefreshConfig::default()));
//! let router = create_router(AppState::new(registry));
//! ```

pub mod error;
pub mod handlers;
pub mod state;
pub mod testing;

pub use error::ApiError;
pub use state::{AppState, ConnectorFactory};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the REST API router with the given application state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        // Vehicle entities
        .route("/vehicles", get(handlers::vehicles::list_vehicles))
        .route("/vehicles/{vin}", get(handlers::vehicles::get_vehicle))
        .route(
            "/vehicles/{vin}/images/{kind}",
            get(handlers::vehicles::get_image),
        )
        .route(
            "/vehicles/{vin}/refresh",
            post(handlers::vehicles::refresh_vehicle),
        )
        // Services
        .route(
            "/services/update_images",
            post(handlers::services::update_images),
        )
        // Accounts
        .route(
            "/accounts",
            get(handlers::accounts::list_accounts).post(handlers::accounts::add_account),
        )
        .route(
            "/accounts/{entry_id}",
            get(handlers::accounts::get_account).delete(handlers::accounts::remove_account),
        )
        .route(
            "/accounts/{entry_id}/reauth",
            post(handlers::accounts::reauthenticate),
        )
        .route(
            "/accounts/{entry_id}/reload",
            post(handlers::accounts::reload_account),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
