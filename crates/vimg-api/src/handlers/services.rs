//! Service call handlers

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use vimg_refresh::{update_images as run_update_images, UpdateImagesCall, UpdateImagesReport};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /services/update_images
/// Body is optional: `{}` or `{"vin": "..."}`
pub async fn update_images(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<UpdateImagesReport>, ApiError> {
    let call = if body.iter().all(u8::is_ascii_whitespace) {
        UpdateImagesCall::all()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let report = run_update_images(state.registry(), &call).await?;
    Ok(Json(report))
}
