//! vimg-refresh - On-demand vehicle imagery engine
//!
//! This crate turns a remote vehicle account into PNG images without ever
//! polling. Data moves only when something asks for it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   press()   ┌────────────────────┐  login/refresh  ┌────────────────┐
//! │ RefreshButton├────────────►│ RefreshCoordinator ├────────────────►│ VehicleSession │
//! └──────────────┘             │ (coalesce, rate    │                 └────────────────┘
//! ┌──────────────┐             │  limit, publish)   │
//! │update_images ├────────────►│                    │
//! └──────────────┘             └─────────┬──────────┘
//!                                        │ watch: Publication{generation, fleet}
//!                              ┌─────────▼──────────┐   encode()   ┌────────────┐
//!                              │ ImageCache per     ├─────────────►│ ImageCodec │
//!                              │ (vehicle, kind)    │              │ (blocking) │
//!                              └────────────────────┘              └────────────┘
//! ```
//!
//! The `AccountRegistry` owns one coordinator per configured account and the
//! entities built from its first successful refresh.

pub mod cache;
pub mod codec;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod entities;
pub mod error;
pub mod mock;
pub mod registry;

pub use cache::ImageCache;
pub use codec::{CodecError, ImageCodec};
pub use commands::{update_images, UpdateImagesCall, UpdateImagesReport, SERVICE_UPDATE_IMAGES};
pub use config::{AccountConfig, MockSessionConfig, MockVehicleConfig, RefreshConfig, SessionConfig};
pub use coordinator::{CoordinatorPhase, Publication, RefreshCoordinator, RefreshResult};
pub use entities::{DeviceInfo, RefreshButton, VehicleEntities, VehicleImage};
pub use error::{CommandError, RefreshError, RegistryError};
pub use mock::{create_connector, MockConnector};
pub use registry::{AccountEntry, AccountRegistry, EntryState, EntrySummary};
