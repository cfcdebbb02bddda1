//! Device properties loaded from JSON.
//!
//! Key names match the control-system property block:
//!
//! ```json
//! {
//!   "key": "display-1",
//!   "name": "Lobby Wall",
//!   "properties": {
//!     "pollIntervalMs": 60000,
//!     "warmingTimeMs": 10000,
//!     "coolingTimeMs": 8000,
//!     "supportsUsb": true
//!   }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use planar_core::error::{Error, Result};

use crate::power::MAX_TRANSITION_TIME;

/// Shortest poll interval the driver will use.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(45_000);

/// Tunables for one display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanarQeConfig {
    pub poll_interval_ms: u64,
    pub cooling_time_ms: u64,
    pub warming_time_ms: u64,
    pub supports_usb: bool,
}

impl Default for PlanarQeConfig {
    fn default() -> Self {
        PlanarQeConfig {
            poll_interval_ms: MIN_POLL_INTERVAL.as_millis() as u64,
            cooling_time_ms: MAX_TRANSITION_TIME.as_millis() as u64,
            warming_time_ms: MAX_TRANSITION_TIME.as_millis() as u64,
            supports_usb: false,
        }
    }
}

impl PlanarQeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid properties: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Configured interval, floored at [`MIN_POLL_INTERVAL`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    /// Configured warm-up window, capped at [`MAX_TRANSITION_TIME`].
    pub fn warmup_time(&self) -> Duration {
        Duration::from_millis(self.warming_time_ms).min(MAX_TRANSITION_TIME)
    }

    /// Configured cool-down window, capped at [`MAX_TRANSITION_TIME`].
    pub fn cooldown_time(&self) -> Duration {
        Duration::from_millis(self.cooling_time_ms).min(MAX_TRANSITION_TIME)
    }
}

/// A device entry: identity plus [`PlanarQeConfig`] properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: PlanarQeConfig,
}

impl DeviceConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid device config: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
