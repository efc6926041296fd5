//! End-to-end tests for the vehicle images API
//!
//! Each test serves the real router on an ephemeral port, backed by an
//! account registry whose sessions come from a `MockConnector`.

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageBuffer, ImageFormat, Rgba};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{json, Value};
use vimg_core::{
    Credentials, EncodedPicture, PictureHandle, SessionConnector, SessionError, VehicleRecord,
};
use vimg_refresh::{AccountRegistry, MockConnector, RefreshConfig};

use vimg_api::testing::TestServer;
use vimg_api::{create_router, AppState};

const VIN: &str = "WVWZZZ1JZXW000001";

// =============================================================================
// Helpers
// =============================================================================

fn png(width: u32, height: u32) -> PictureHandle {
    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(width, height, Rgba([30, 60, 90, 255]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    Arc::new(EncodedPicture::new(buffer.into_inner()))
}

fn mock_account() -> MockConnector {
    MockConnector::new(vec![VehicleRecord {
        vin: VIN.to_string(),
        model: Some("ID.4".to_string()),
        nickname: Some("Daily".to_string()),
        pictures: vec![
            ("car".to_string(), png(16, 9)),
            ("status".to_string(), png(8, 8)),
        ],
    }])
}

/// Refreshes are never rate limited unless a test asks for it
fn unthrottled() -> RefreshConfig {
    RefreshConfig {
        min_refresh_interval_secs: 0,
        ..RefreshConfig::default()
    }
}

async fn start(registry: Arc<AccountRegistry>, factory: MockConnector) -> TestServer {
    let state = AppState::new(registry)
        .with_connector_factory(move |_| Arc::new(factory.clone()) as Arc<dyn SessionConnector>);
    TestServer::start(create_router(state))
        .await
        .expect("Failed to start test server")
}

async fn loaded_server(config: RefreshConfig) -> (TestServer, MockConnector) {
    let registry = Arc::new(AccountRegistry::new(config));
    let mock = mock_account();
    registry
        .register(
            Credentials::new("driver@example.com", "secret"),
            Arc::new(mock.clone()),
        )
        .await
        .unwrap();
    (start(registry, mock_account()).await, mock)
}

// =============================================================================
// Vehicles and images
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (server, _) = loaded_server(unthrottled()).await;
    let body = reqwest::get(server.url("/health")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_list_vehicles() {
    let (server, _) = loaded_server(unthrottled()).await;

    let body: Value = reqwest::get(server.url("/vehicles"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let vehicle = &body["items"][0];
    assert_eq!(vehicle["vin"], VIN);
    assert_eq!(vehicle["name"], "Daily");
    assert_eq!(vehicle["device"]["manufacturer"], "Volkswagen");
    assert_eq!(vehicle["device"]["model"], "ID.4");
    assert_eq!(
        vehicle["refresh_button"]["unique_id"],
        format!("vw_images_{}_update_button", VIN)
    );

    let kinds: Vec<&str> = vehicle["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["car", "status"]);
}

#[tokio::test]
async fn test_get_image_returns_png() {
    let (server, _) = loaded_server(unthrottled()).await;

    let response = reqwest::get(server.url(&format!("/vehicles/{}/images/car", VIN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");

    let bytes = response.bytes().await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 9));
}

#[tokio::test]
async fn test_image_errors() {
    let (server, _) = loaded_server(unthrottled()).await;

    let missing_kind = reqwest::get(server.url(&format!("/vehicles/{}/images/carWithBadge", VIN)))
        .await
        .unwrap();
    assert_eq!(missing_kind.status(), StatusCode::NOT_FOUND);

    let unknown_kind = reqwest::get(server.url(&format!("/vehicles/{}/images/interior", VIN)))
        .await
        .unwrap();
    assert_eq!(unknown_kind.status(), StatusCode::NOT_FOUND);

    let bad_vin = reqwest::get(server.url("/vehicles/not-a-vin/images/car"))
        .await
        .unwrap();
    assert_eq!(bad_vin.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Refresh triggers
// =============================================================================

#[tokio::test]
async fn test_refresh_button() {
    let (server, mock) = loaded_server(unthrottled()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url(&format!("/vehicles/{}/refresh", VIN)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.refresh_count(), 2);
}

#[tokio::test]
async fn test_refresh_is_rate_limited() {
    let (server, mock) = loaded_server(RefreshConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url(&format!("/vehicles/{}/refresh", VIN)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.refresh_count(), 1);
}

#[tokio::test]
async fn test_refresh_failures_map_to_status() {
    let (server, mock) = loaded_server(unthrottled()).await;
    let client = reqwest::Client::new();
    let url = server.url(&format!("/vehicles/{}/refresh", VIN));

    mock.fail_next_refresh(SessionError::Timeout);
    let response = client.post(&url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    mock.fail_next_login(SessionError::AuthenticationFailed("password changed".into()));
    let response = client.post(&url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "reauth_required");

    let accounts: Value = client
        .get(server.url("/accounts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(accounts["items"][0]["reauth_required"], true);
}

#[tokio::test]
async fn test_update_images_service() {
    let (server, mock) = loaded_server(unthrottled()).await;
    let client = reqwest::Client::new();
    let url = server.url("/services/update_images");

    let response = client.post(&url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["refreshed"].as_array().unwrap().len(), 1);
    assert_eq!(mock.refresh_count(), 2);

    let response = client
        .post(&url)
        .json(&json!({ "vin": "WVWZZZ1JZXW00000I" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(mock.refresh_count(), 2);

    let response = client
        .post(&url)
        .json(&json!({ "vin": "WVWZZZ1JZXW999999" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.unwrap();
    assert!(report["refreshed"].as_array().unwrap().is_empty());
    assert_eq!(mock.refresh_count(), 2);
}

// =============================================================================
// Accounts
// =============================================================================

#[tokio::test]
async fn test_add_account_flow() {
    let registry = Arc::new(AccountRegistry::new(unthrottled()));
    let mock = mock_account();
    mock.set_accepted_password(Some("right".to_string()));
    let server = start(registry, mock.clone()).await;
    let client = reqwest::Client::new();
    let url = server.url("/accounts");

    let response = client
        .post(&url)
        .json(&json!({ "username": "new@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_auth");

    let response = client
        .post(&url)
        .json(&json!({ "username": "new@example.com", "password": "right" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let entry: Value = response.json().await.unwrap();
    assert_eq!(entry["title"], "VW Images");
    assert_eq!(entry["state"], "loaded");

    let response = client
        .post(&url)
        .json(&json!({ "username": "new@example.com", "password": "right" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "already_configured");

    let vehicles: Value = client
        .get(server.url("/vehicles"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(vehicles["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reauthenticate_account() {
    let registry = Arc::new(AccountRegistry::new(unthrottled()));
    let mock = mock_account();
    mock.set_accepted_password(Some("rotated".to_string()));
    let entry = registry
        .register(
            Credentials::new("driver@example.com", "stale"),
            Arc::new(mock.clone()),
        )
        .await
        .unwrap();
    let server = start(registry, mock.clone()).await;
    let client = reqwest::Client::new();

    let summary: Value = client
        .get(server.url(&format!("/accounts/{}", entry.entry_id())))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["state"], "setup_error");
    assert_eq!(summary["reauth_required"], true);

    let response = client
        .post(server.url(&format!("/accounts/{}/reauth", entry.entry_id())))
        .json(&json!({ "username": "driver@example.com", "password": "rotated" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"], "reauth_successful");
    assert_eq!(body["state"], "loaded");
}

#[tokio::test]
async fn test_remove_account_logs_out() {
    let (server, mock) = loaded_server(unthrottled()).await;
    let client = reqwest::Client::new();

    let accounts: Value = client
        .get(server.url("/accounts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry_id = accounts["items"][0]["entry_id"].as_str().unwrap().to_string();

    let response = client
        .delete(server.url(&format!("/accounts/{}", entry_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(mock.logout_count(), 1);

    let response = client
        .get(server.url(&format!("/accounts/{}", entry_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
