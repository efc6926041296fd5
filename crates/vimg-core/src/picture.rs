//! Picture kinds and lazy picture handles
//!
//! A picture handle is a two-stage value: holding one is cheap, and the
//! pixels only materialize when `decode()` is called. Decoding is blocking
//! and is expected to run on a blocking thread, never on the task that
//! serves trigger requests.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use image::{DynamicImage, ImageReader, Limits};
use serde::{Deserialize, Serialize};

use crate::error::PictureError;

/// Picture variants a vehicle may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PictureKind {
    /// Plain three-quarter view of the vehicle
    Car,
    /// Vehicle view with badge overlays
    CarWithBadge,
    /// Dynamic status rendering (doors, windows, lights)
    Status,
    /// Status rendering with badge overlays
    StatusWithBadge,
}

impl PictureKind {
    pub const ALL: [PictureKind; 4] = [
        PictureKind::Car,
        PictureKind::CarWithBadge,
        PictureKind::Status,
        PictureKind::StatusWithBadge,
    ];

    /// Name used by the remote service and in URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            PictureKind::Car => "car",
            PictureKind::CarWithBadge => "carWithBadge",
            PictureKind::Status => "status",
            PictureKind::StatusWithBadge => "statusWithBadge",
        }
    }
}

impl fmt::Display for PictureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PictureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PictureKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown picture kind: {}", s))
    }
}

/// A lazily decoded picture
pub trait PictureSource: Send + Sync + fmt::Debug {
    /// Width and height read from the image header, if the source can tell
    /// without decoding the pixel data.
    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }

    /// Decode the picture. Blocking; honors the given allocation limits.
    fn decode(&self, limits: &Limits) -> Result<DynamicImage, PictureError>;
}

/// Shared handle to a lazy picture, owned by a vehicle snapshot
pub type PictureHandle = Arc<dyn PictureSource>;

/// Encoded image bytes as delivered by the remote service
#[derive(Clone)]
pub struct EncodedPicture {
    bytes: Bytes,
}

impl EncodedPicture {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for EncodedPicture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedPicture")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl PictureSource for EncodedPicture {
    fn dimensions(&self) -> Option<(u32, u32)> {
        probe_dimensions(&self.bytes)
    }

    fn decode(&self, limits: &Limits) -> Result<DynamicImage, PictureError> {
        decode_bytes(&self.bytes, limits)
    }
}

/// Picture stored in a file, read on every decode
#[derive(Debug, Clone)]
pub struct FilePicture {
    path: PathBuf,
}

impl FilePicture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PictureSource for FilePicture {
    fn dimensions(&self) -> Option<(u32, u32)> {
        ImageReader::open(&self.path)
            .ok()?
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }

    fn decode(&self, limits: &Limits) -> Result<DynamicImage, PictureError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PictureError::Missing)
            }
            Err(e) => return Err(PictureError::Io(e)),
        };
        decode_bytes(&bytes, limits)
    }
}

fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

fn decode_bytes(bytes: &[u8], limits: &Limits) -> Result<DynamicImage, PictureError> {
    if bytes.is_empty() {
        return Err(PictureError::Missing);
    }

    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.limits(limits.clone());
    Ok(reader.decode()?)
}
