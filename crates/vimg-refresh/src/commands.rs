//! `update_images` command - refresh every loaded account, or only the
//! accounts that currently report a given vehicle

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use vimg_core::Vin;

use crate::error::CommandError;
use crate::registry::AccountRegistry;

pub const SERVICE_UPDATE_IMAGES: &str = "update_images";

/// Command payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateImagesCall {
    /// Restrict the refresh to accounts whose latest snapshot has this VIN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
}

impl UpdateImagesCall {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_vin(vin: impl Into<String>) -> Self {
        Self {
            vin: Some(vin.into()),
        }
    }

    /// Parsed target VIN. Surrounding whitespace is ignored and an empty
    /// value means "all accounts".
    pub fn target(&self) -> Result<Option<Vin>, CommandError> {
        match self.vin.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(Vin::parse(raw)?)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryFailure {
    pub entry_id: Uuid,
    pub error: String,
    pub reauth_required: bool,
}

/// What one command invocation did
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateImagesReport {
    pub refreshed: Vec<Uuid>,
    pub failed: Vec<EntryFailure>,
}

/// Run the command. The VIN is validated before any coordinator is asked to
/// refresh; refresh failures are reported per account and never abort the
/// remaining accounts.
pub async fn update_images(
    registry: &AccountRegistry,
    call: &UpdateImagesCall,
) -> Result<UpdateImagesReport, CommandError> {
    let target = call.target()?;

    let entries = registry.loaded();
    if entries.is_empty() {
        warn!("No loaded accounts to update");
        return Ok(UpdateImagesReport::default());
    }

    let mut report = UpdateImagesReport::default();
    for entry in entries {
        let Some(coordinator) = entry.coordinator() else {
            continue;
        };

        if let Some(vin) = &target {
            let has_vehicle = coordinator.fleet().is_some_and(|fleet| fleet.contains(vin));
            if !has_vehicle {
                continue;
            }
        }

        match coordinator.request_refresh().await {
            Ok(_) => report.refreshed.push(entry.entry_id()),
            Err(err) => report.failed.push(EntryFailure {
                entry_id: entry.entry_id(),
                error: err.to_string(),
                reauth_required: err.requires_reauth(),
            }),
        }
    }

    info!(
        vin = target.as_ref().map(|v| v.masked()).unwrap_or_else(|| "all".to_string()),
        refreshed = report.refreshed.len(),
        failed = report.failed.len(),
        "Image update requested"
    );
    Ok(report)
}
