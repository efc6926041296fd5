//! Vehicle snapshots - the per-refresh state of every vehicle in an account

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::picture::{PictureHandle, PictureKind};
use crate::vin::{Vin, VinError};

/// Display name used when a vehicle has neither nickname nor model
pub const FALLBACK_DISPLAY_NAME: &str = "VW";

/// Model assumed when the remote service reports none
pub const DEFAULT_MODEL: &str = "VW Fahrzeug";

/// Raw vehicle data as a session implementation receives it from the remote
/// service. Fields are unvalidated; picture keys use the remote names.
#[derive(Debug, Clone, Default)]
pub struct VehicleRecord {
    pub vin: String,
    pub model: Option<String>,
    pub nickname: Option<String>,
    pub pictures: Vec<(String, PictureHandle)>,
}

/// State of one vehicle as of one refresh generation
#[derive(Debug, Clone)]
pub struct VehicleSnapshot {
    vin: Vin,
    model: Option<String>,
    nickname: Option<String>,
    pictures: BTreeMap<PictureKind, PictureHandle>,
}

impl VehicleSnapshot {
    pub fn new(vin: Vin) -> Self {
        Self {
            vin,
            model: None,
            nickname: None,
            pictures: BTreeMap::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = non_blank(Some(model.into()));
        self
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = non_blank(Some(nickname.into()));
        self
    }

    pub fn with_picture(mut self, kind: PictureKind, picture: PictureHandle) -> Self {
        self.pictures.insert(kind, picture);
        self
    }

    /// Validate a raw record. Blank strings become absent, a missing model
    /// becomes `DEFAULT_MODEL`, and picture keys that are not a known
    /// `PictureKind` are dropped.
    pub fn from_record(record: VehicleRecord) -> Result<Self, VinError> {
        let vin = Vin::parse(record.vin.trim())?;

        let mut pictures = BTreeMap::new();
        for (key, handle) in record.pictures {
            match key.parse::<PictureKind>() {
                Ok(kind) => {
                    pictures.insert(kind, handle);
                }
                Err(_) => {
                    debug!(vin = %vin.masked(), key = %key, "Ignoring unknown picture key");
                }
            }
        }

        Ok(Self {
            vin,
            model: non_blank(record.model).or_else(|| Some(DEFAULT_MODEL.to_string())),
            nickname: non_blank(record.nickname),
            pictures,
        })
    }

    pub fn vin(&self) -> &Vin {
        &self.vin
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    /// Nickname, else model, else a generic name
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .or(self.model.as_deref())
            .unwrap_or(FALLBACK_DISPLAY_NAME)
    }

    pub fn picture(&self, kind: PictureKind) -> Option<&PictureHandle> {
        self.pictures.get(&kind)
    }

    /// Picture kinds this vehicle exposes, in declaration order
    pub fn picture_kinds(&self) -> impl Iterator<Item = PictureKind> + '_ {
        self.pictures.keys().copied()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// All vehicles of one account as of one refresh, keyed by VIN
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    vehicles: BTreeMap<Vin, VehicleSnapshot>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fleet from raw records, dropping records with an invalid VIN
    pub fn from_records(records: impl IntoIterator<Item = VehicleRecord>) -> Self {
        let mut fleet = Fleet::new();
        for record in records {
            let raw_vin = record.vin.clone();
            match VehicleSnapshot::from_record(record) {
                Ok(snapshot) => fleet.insert(snapshot),
                Err(e) => {
                    warn!(error = %e, len = raw_vin.len(), "Skipping vehicle with invalid VIN");
                }
            }
        }
        fleet
    }

    /// Add a vehicle, replacing any previous snapshot for the same VIN
    pub fn insert(&mut self, snapshot: VehicleSnapshot) {
        self.vehicles.insert(snapshot.vin.clone(), snapshot);
    }

    pub fn get(&self, vin: &Vin) -> Option<&VehicleSnapshot> {
        self.vehicles.get(vin)
    }

    pub fn contains(&self, vin: &Vin) -> bool {
        self.vehicles.contains_key(vin)
    }

    /// Picture handle for a VIN and kind, if both are present
    pub fn picture(&self, vin: &Vin, kind: PictureKind) -> Option<&PictureHandle> {
        self.get(vin).and_then(|snapshot| snapshot.picture(kind))
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn vins(&self) -> impl Iterator<Item = &Vin> {
        self.vehicles.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VehicleSnapshot> {
        self.vehicles.values()
    }
}

impl FromIterator<VehicleSnapshot> for Fleet {
    fn from_iter<T: IntoIterator<Item = VehicleSnapshot>>(iter: T) -> Self {
        let mut fleet = Fleet::new();
        for snapshot in iter {
            fleet.insert(snapshot);
        }
        fleet
    }
}
