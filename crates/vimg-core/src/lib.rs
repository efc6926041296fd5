//! vimg-core - Core traits and types for on-demand vehicle imagery
//!
//! This crate provides the abstractions shared by the refresh engine and the
//! HTTP surface: vehicle identifiers, picture kinds, lazy picture handles,
//! per-refresh vehicle snapshots, and the `VehicleSession` collaborator trait
//! that hides the remote manufacturer account.

pub mod error;
pub mod picture;
pub mod session;
pub mod snapshot;
pub mod vin;

pub use error::{PictureError, SessionError, SessionResult};
pub use picture::{EncodedPicture, FilePicture, PictureHandle, PictureKind, PictureSource};
pub use session::{Credentials, SessionConnector, VehicleSession};
pub use snapshot::{Fleet, VehicleRecord, VehicleSnapshot};
pub use vin::{Vin, VinError};

/// Integration domain, used as the prefix of every entity identifier
pub const DOMAIN: &str = "vw_images";

/// Manufacturer reported in device info
pub const MANUFACTURER: &str = "Volkswagen";
