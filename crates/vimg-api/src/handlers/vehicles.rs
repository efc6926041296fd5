//! Vehicle, image and refresh button handlers

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use vimg_core::{PictureKind, Vin};
use vimg_refresh::{DeviceInfo, VehicleEntities};

use crate::error::ApiError;
use crate::state::{parse_vin, AppState};

#[derive(Serialize)]
pub struct VehiclesResponse {
    pub items: Vec<VehicleInfo>,
}

#[derive(Serialize)]
pub struct VehicleInfo {
    pub vin: String,
    pub name: String,
    pub entry_id: Uuid,
    pub device: DeviceInfo,
    pub refresh_button: ButtonInfo,
    pub images: Vec<ImageInfo>,
    pub href: String,
}

#[derive(Serialize)]
pub struct ButtonInfo {
    pub unique_id: String,
    pub name: String,
    pub icon: String,
    pub available: bool,
}

#[derive(Serialize)]
pub struct ImageInfo {
    pub kind: PictureKind,
    pub unique_id: String,
    pub name: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub href: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub vin: String,
    pub vehicles: usize,
}

fn vehicle_infos(entry_id: Uuid, entities: &VehicleEntities) -> Vec<VehicleInfo> {
    entities
        .buttons()
        .iter()
        .map(|button| {
            let vin = button.vin();
            let images = entities
                .images()
                .iter()
                .filter(|image| image.vin() == vin)
                .map(|image| ImageInfo {
                    kind: image.kind(),
                    unique_id: image.unique_id().to_string(),
                    name: image.name().to_string(),
                    content_type: image.content_type().to_string(),
                    last_updated: image.image_last_updated(),
                    href: format!("/vehicles/{}/images/{}", vin, image.kind()),
                })
                .collect();

            VehicleInfo {
                vin: vin.to_string(),
                name: button.device().name.clone(),
                entry_id,
                device: button.device().clone(),
                refresh_button: ButtonInfo {
                    unique_id: button.unique_id().to_string(),
                    name: button.name().to_string(),
                    icon: vimg_refresh::RefreshButton::ICON.to_string(),
                    available: button.available(),
                },
                images,
                href: format!("/vehicles/{}", vin),
            }
        })
        .collect()
}

fn all_vehicles(state: &AppState) -> Vec<VehicleInfo> {
    state
        .registry()
        .loaded()
        .iter()
        .filter_map(|entry| {
            entry
                .entities()
                .map(|entities| vehicle_infos(entry.entry_id(), &entities))
        })
        .flatten()
        .collect()
}

fn find_vehicle(state: &AppState, vin: &Vin) -> Result<VehicleInfo, ApiError> {
    all_vehicles(state)
        .into_iter()
        .find(|v| v.vin == vin.as_str())
        .ok_or_else(|| ApiError::NotFound(format!("Vehicle not found: {}", vin.masked())))
}

/// GET /vehicles
/// List vehicles of every loaded account
pub async fn list_vehicles(State(state): State<AppState>) -> Json<VehiclesResponse> {
    Json(VehiclesResponse {
        items: all_vehicles(&state),
    })
}

/// GET /vehicles/{vin}
pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(vin): Path<String>,
) -> Result<Json<VehicleInfo>, ApiError> {
    let vin = parse_vin(&vin)?;
    Ok(Json(find_vehicle(&state, &vin)?))
}

/// GET /vehicles/{vin}/images/{kind}
/// Current PNG for one picture kind. 404 when the vehicle has no such
/// picture or it could not be converted.
pub async fn get_image(
    State(state): State<AppState>,
    Path((vin, kind)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let vin = parse_vin(&vin)?;
    let kind: PictureKind = kind.parse().map_err(ApiError::NotFound)?;

    let image = state
        .registry()
        .find_image(&vin, kind)
        .ok_or_else(|| ApiError::NotFound(format!("No {} image for {}", kind, vin.masked())))?;

    let bytes = image
        .image()
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No {} image available", kind)))?;

    Ok((
        [
            (header::CONTENT_TYPE, image.content_type()),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        bytes,
    )
        .into_response())
}

/// POST /vehicles/{vin}/refresh
/// Press the vehicle's refresh button
pub async fn refresh_vehicle(
    State(state): State<AppState>,
    Path(vin): Path<String>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let vin = parse_vin(&vin)?;
    let button = state
        .registry()
        .find_button(&vin)
        .ok_or_else(|| ApiError::NotFound(format!("Vehicle not found: {}", vin.masked())))?;

    let fleet = button.press().await?;
    Ok(Json(RefreshResponse {
        vin: vin.to_string(),
        vehicles: fleet.len(),
    }))
}
