//! Refresh engine configuration
//!
//! This module contains configuration types for the refresh coordinator,
//! the PNG codec, and the per-account session collaborator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vimg_core::Credentials;

/// Minimum spacing between two network refreshes of the same account
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 60;

/// Largest accepted picture, in pixels (width × height)
pub const MAX_IMAGE_PIXELS: u64 = 4096 * 4096;

/// Settings shared by every account's coordinator and image caches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Minimum seconds between network refreshes; requests inside the
    /// window are answered from the last snapshot
    #[serde(default = "default_min_refresh_interval_secs")]
    pub min_refresh_interval_secs: u64,
    /// Pixel budget for decoded pictures
    #[serde(default = "default_max_image_pixels")]
    pub max_image_pixels: u64,
    /// Number of pictures encoded at the same time
    #[serde(default = "default_max_concurrent_encodes")]
    pub max_concurrent_encodes: usize,
}

fn default_min_refresh_interval_secs() -> u64 {
    MIN_REFRESH_INTERVAL_SECS
}

fn default_max_image_pixels() -> u64 {
    MAX_IMAGE_PIXELS
}

fn default_max_concurrent_encodes() -> usize {
    2
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            min_refresh_interval_secs: default_min_refresh_interval_secs(),
            max_image_pixels: default_max_image_pixels(),
            max_concurrent_encodes: default_max_concurrent_encodes(),
        }
    }
}

impl RefreshConfig {
    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_refresh_interval_secs)
    }
}

/// One configured manufacturer account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Session collaborator for this account
    #[serde(default)]
    pub session: SessionConfig,
}

/// Session collaborator selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionConfig {
    /// In-process mock account for demos and testing
    Mock(MockSessionConfig),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::Mock(MockSessionConfig::default())
    }
}

impl SessionConfig {
    /// Resolve relative file paths against the directory of the config file
    pub fn resolve_paths(&mut self, base: &Path) {
        match self {
            SessionConfig::Mock(mock) => {
                for vehicle in &mut mock.vehicles {
                    for path in vehicle.pictures.values_mut() {
                        if path.is_relative() {
                            *path = base.join(&*path);
                        }
                    }
                }
            }
        }
    }
}

/// Mock account configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockSessionConfig {
    /// Simulated latency of every remote call, in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
    /// Only this password is accepted at login (any password if unset)
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Vehicles reported by the mock account
    #[serde(default)]
    pub vehicles: Vec<MockVehicleConfig>,
}

/// A vehicle of the mock account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockVehicleConfig {
    pub vin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Remote picture name (`car`, `status`, ...) → image file
    #[serde(default)]
    pub pictures: BTreeMap<String, PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_defaults() {
        let config: RefreshConfig = toml::from_str("").unwrap();
        assert_eq!(config.min_refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.max_image_pixels, 16_777_216);
        assert_eq!(config.max_concurrent_encodes, 2);
    }

    #[test]
    fn test_account_config_parses_mock_session() {
        let toml_str = r#"
username = "driver@example.com"
password = "secret"

[session]
type = "mock"
latency_ms = 25

[[session.vehicles]]
vin = "WVWZZZ1JZXW000001"
model = "ID.3"
pictures = { car = "pictures/id3.png" }
"#;
        let mut account: AccountConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(account.credentials.username, "driver@example.com");
        assert_eq!(account.credentials.password, "secret");

        account.session.resolve_paths(Path::new("/etc/vimgd"));
        let SessionConfig::Mock(mock) = &account.session;
        assert_eq!(mock.latency_ms, 25);
        assert_eq!(mock.vehicles.len(), 1);
        assert_eq!(
            mock.vehicles[0].pictures["car"],
            PathBuf::from("/etc/vimgd/pictures/id3.png")
        );
    }

    #[test]
    fn test_session_defaults_to_mock() {
        let account: AccountConfig =
            toml::from_str("username = \"a@b.c\"\npassword = \"x\"").unwrap();
        assert!(matches!(account.session, SessionConfig::Mock(_)));
    }
}
