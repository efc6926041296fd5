//! Per-(vehicle, kind) PNG cache
//!
//! A cache entry is keyed by the coordinator generation it was computed
//! from. Reading after a new publication recomputes; reading twice within
//! one generation reuses the stored bytes, including a stored "no image".

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};
use vimg_core::{PictureKind, Vin};

use crate::codec::{CodecError, ImageCodec};
use crate::coordinator::{Publication, RefreshCoordinator};

struct Memo {
    generation: u64,
    bytes: Option<Bytes>,
}

#[derive(Default)]
struct Invalidation {
    generation: u64,
    at: Option<DateTime<Utc>>,
}

/// Lazily computed PNG for one vehicle picture
pub struct ImageCache {
    vin: Vin,
    kind: PictureKind,
    codec: ImageCodec,
    updates: watch::Receiver<Option<Arc<Publication>>>,
    /// Held across the encode, so concurrent readers compute once
    memo: Mutex<Option<Memo>>,
    invalidation: RwLock<Invalidation>,
}

impl ImageCache {
    pub fn new(
        vin: Vin,
        kind: PictureKind,
        coordinator: &RefreshCoordinator,
        codec: ImageCodec,
    ) -> Self {
        Self {
            vin,
            kind,
            codec,
            updates: coordinator.subscribe(),
            memo: Mutex::new(None),
            invalidation: RwLock::new(Invalidation::default()),
        }
    }

    pub fn vin(&self) -> &Vin {
        &self.vin
    }

    pub fn kind(&self) -> PictureKind {
        self.kind
    }

    /// Record that a new generation was published. Never blocks and never
    /// touches picture data.
    pub fn on_coordinator_update(&self, publication: &Publication) {
        {
            let mut invalidation = self.invalidation.write();
            if publication.generation > invalidation.generation {
                invalidation.generation = publication.generation;
                invalidation.at = Some(Utc::now());
            }
        }

        // Drop stale bytes early unless a reader is computing right now; the
        // generation check in `image_bytes` covers that case
        if let Ok(mut memo) = self.memo.try_lock() {
            if memo
                .as_ref()
                .is_some_and(|m| m.generation < publication.generation)
            {
                *memo = None;
            }
        }
    }

    /// When the cache was last invalidated by a publication
    pub fn last_invalidated(&self) -> Option<DateTime<Utc>> {
        self.invalidation.read().at
    }

    /// PNG bytes for the current generation, or `None` when the vehicle has
    /// no such picture or it cannot be converted
    pub async fn image_bytes(&self) -> Option<Bytes> {
        let mut memo = self.memo.lock().await;

        let current = self.updates.borrow().clone();
        let Some(publication) = current else {
            *memo = None;
            return None;
        };

        if let Some(stored) = memo.as_ref() {
            if stored.generation == publication.generation {
                return stored.bytes.clone();
            }
        }

        let bytes = self.render(&publication).await;
        *memo = Some(Memo {
            generation: publication.generation,
            bytes: bytes.clone(),
        });
        bytes
    }

    async fn render(&self, publication: &Publication) -> Option<Bytes> {
        let vin = self.vin.masked();
        let Some(picture) = publication.fleet.picture(&self.vin, self.kind).cloned() else {
            debug!(vin = %vin, kind = %self.kind, "No picture for vehicle");
            return None;
        };

        match self.codec.encode(picture).await {
            Ok(bytes) => {
                debug!(
                    vin = %vin,
                    kind = %self.kind,
                    generation = publication.generation,
                    size = bytes.len(),
                    "Picture encoded"
                );
                Some(bytes)
            }
            Err(CodecError::Rejected {
                width,
                height,
                max_pixels,
                ..
            }) => {
                warn!(
                    vin = %vin,
                    kind = %self.kind,
                    width,
                    height,
                    max_pixels,
                    "Picture exceeds pixel budget, skipping"
                );
                None
            }
            Err(CodecError::Decode(e)) => {
                debug!(vin = %vin, kind = %self.kind, error = %e, "Picture could not be decoded");
                None
            }
            Err(e) => {
                warn!(vin = %vin, kind = %self.kind, error = %e, "Picture conversion failed");
                None
            }
        }
    }
}
