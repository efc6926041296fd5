//! Host-facing entities: one image per (vehicle, picture kind) and one
//! refresh button per vehicle, grouped under a device per vehicle.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;
use vimg_core::{Fleet, PictureKind, VehicleSnapshot, Vin, DOMAIN, MANUFACTURER};

use crate::cache::ImageCache;
use crate::codec::ImageCodec;
use crate::coordinator::{Publication, RefreshCoordinator, RefreshResult};

pub const IMAGE_CONTENT_TYPE: &str = "image/png";

/// Device registry information for one vehicle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// `(DOMAIN, VIN)`
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl DeviceInfo {
    pub fn for_vehicle(snapshot: &VehicleSnapshot) -> Self {
        Self {
            identifiers: (DOMAIN.to_string(), snapshot.vin().to_string()),
            name: snapshot.display_name().to_string(),
            manufacturer: MANUFACTURER.to_string(),
            model: snapshot.model().map(str::to_string),
        }
    }
}

/// Suffix used in image unique ids and friendly names
fn image_suffix(kind: PictureKind) -> &'static str {
    match kind {
        PictureKind::Car => "image",
        PictureKind::CarWithBadge => "badge_image",
        PictureKind::Status => "status_image",
        PictureKind::StatusWithBadge => "status_badge_image",
    }
}

fn image_label(kind: PictureKind) -> &'static str {
    match kind {
        PictureKind::Car => "Image",
        PictureKind::CarWithBadge => "Badge image",
        PictureKind::Status => "Status image",
        PictureKind::StatusWithBadge => "Status badge image",
    }
}

pub fn image_unique_id(vin: &Vin, kind: PictureKind) -> String {
    format!("{}_{}_{}", DOMAIN, vin, image_suffix(kind))
}

pub fn button_unique_id(vin: &Vin) -> String {
    format!("{}_{}_update_button", DOMAIN, vin)
}

/// Image entity backed by a per-(vehicle, kind) cache
pub struct VehicleImage {
    unique_id: String,
    name: String,
    device: DeviceInfo,
    cache: ImageCache,
}

impl VehicleImage {
    pub fn new(
        snapshot: &VehicleSnapshot,
        kind: PictureKind,
        coordinator: &RefreshCoordinator,
        codec: ImageCodec,
    ) -> Self {
        let vin = snapshot.vin().clone();
        Self {
            unique_id: image_unique_id(&vin, kind),
            name: format!("{} {}", snapshot.display_name(), image_label(kind)),
            device: DeviceInfo::for_vehicle(snapshot),
            cache: ImageCache::new(vin, kind, coordinator, codec),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vin(&self) -> &Vin {
        self.cache.vin()
    }

    pub fn kind(&self) -> PictureKind {
        self.cache.kind()
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn content_type(&self) -> &'static str {
        IMAGE_CONTENT_TYPE
    }

    /// Time of the last publication that invalidated this image
    pub fn image_last_updated(&self) -> Option<DateTime<Utc>> {
        self.cache.last_invalidated()
    }

    /// Current PNG bytes, computed on first read after an update
    pub async fn image(&self) -> Option<Bytes> {
        self.cache.image_bytes().await
    }

    pub fn on_coordinator_update(&self, publication: &Publication) {
        self.cache.on_coordinator_update(publication);
    }
}

/// Per-vehicle button that triggers a coordinator refresh
pub struct RefreshButton {
    unique_id: String,
    name: String,
    vin: Vin,
    device: DeviceInfo,
    coordinator: RefreshCoordinator,
}

impl RefreshButton {
    pub const ICON: &'static str = "mdi:refresh";

    pub fn new(snapshot: &VehicleSnapshot, coordinator: &RefreshCoordinator) -> Self {
        Self {
            unique_id: button_unique_id(snapshot.vin()),
            name: format!("{} Update image", snapshot.display_name()),
            vin: snapshot.vin().clone(),
            device: DeviceInfo::for_vehicle(snapshot),
            coordinator: coordinator.clone(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vin(&self) -> &Vin {
        &self.vin
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Buttons stay pressable while the account is in a failed state
    pub fn available(&self) -> bool {
        true
    }

    pub async fn press(&self) -> RefreshResult {
        debug!(vin = %self.vin.masked(), "Refresh button pressed");
        self.coordinator.request_refresh().await
    }
}

/// Every entity of one account, plus the task that forwards coordinator
/// publications to the image caches
pub struct VehicleEntities {
    images: Vec<Arc<VehicleImage>>,
    buttons: Vec<Arc<RefreshButton>>,
    listener: JoinHandle<()>,
}

impl VehicleEntities {
    /// Build entities from the fleet of the first successful refresh.
    /// Vehicles added to the account later are not picked up until the
    /// account is reloaded.
    pub fn build(coordinator: &RefreshCoordinator, fleet: &Fleet, codec: &ImageCodec) -> Self {
        let mut images = Vec::new();
        let mut buttons = Vec::new();

        for snapshot in fleet.iter() {
            for kind in snapshot.picture_kinds() {
                images.push(Arc::new(VehicleImage::new(
                    snapshot,
                    kind,
                    coordinator,
                    codec.clone(),
                )));
            }
            buttons.push(Arc::new(RefreshButton::new(snapshot, coordinator)));
        }

        let mut updates = coordinator.subscribe();
        let subscribers = images.clone();
        let listener = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let current = updates.borrow_and_update().clone();
                if let Some(publication) = current {
                    for image in &subscribers {
                        image.on_coordinator_update(&publication);
                    }
                }
            }
        });

        Self {
            images,
            buttons,
            listener,
        }
    }

    pub fn images(&self) -> &[Arc<VehicleImage>] {
        &self.images
    }

    pub fn buttons(&self) -> &[Arc<RefreshButton>] {
        &self.buttons
    }

    pub fn image(&self, vin: &Vin, kind: PictureKind) -> Option<&Arc<VehicleImage>> {
        self.images
            .iter()
            .find(|image| image.vin() == vin && image.kind() == kind)
    }

    pub fn button(&self, vin: &Vin) -> Option<&Arc<RefreshButton>> {
        self.buttons.iter().find(|button| button.vin() == vin)
    }
}

impl Drop for VehicleEntities {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
