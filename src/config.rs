//! Runtime configuration.
//!
//! Every field has a default, so a configuration file only needs the values it
//! changes:
//!
//! ```json
//! {
//!   "touch": { "radius": 0.2 },
//!   "density": { "threshold": 60, "channel": "luma" },
//!   "motion": { "type": "wave", "frequency": 1.5, "amplitude": 4.0 }
//! }
//! ```

use crate::density::Channel;
use crate::error::ConfigError;
use crate::motion::MotionVariant;
use crate::projection::CameraConfig;
use crate::timeline::{FieldParams, TransitionConfig};
use crate::touch::TouchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Overrides applied on top of the performance profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityOverrides {
    /// Fixed threshold; `None` uses the profile's threshold.
    pub threshold: Option<u8>,
    pub channel: Channel,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub touch: TouchConfig,
    pub materialize: TransitionConfig,
    pub dissolve: TransitionConfig,
    pub camera: CameraConfig,
    pub density: DensityOverrides,
    /// Shape parameters of a fully visible field.
    pub steady: FieldParams,
    pub motion: MotionVariant,
    /// Ask the renderer to draw the hit-plane.
    pub debug_hit_plane: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            touch: TouchConfig::default(),
            materialize: TransitionConfig::materialize(1.0),
            dissolve: TransitionConfig::dissolve(0.8),
            camera: CameraConfig::default(),
            density: DensityOverrides::default(),
            steady: FieldParams::default(),
            motion: MotionVariant::default(),
            debug_hit_plane: false,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
