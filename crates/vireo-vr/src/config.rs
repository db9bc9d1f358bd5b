//! Tunables for [`crate::VrSystem`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vireo_common::{load_json, Error, Result};

use crate::controller::{DEFAULT_CLICK_TIMEOUT, DEFAULT_SECTOR_DIVISIONS, DEFAULT_SECTOR_ROTATION};

const MAX_SECTOR_DIVISIONS: u32 = 360;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VrConfig {
    pub near: f32,
    pub far: f32,
    /// Multiplier on the runtime's inter-eye distance.
    pub eye_dist_scale: f32,
    pub click_timeout_secs: f32,
    pub sector_divisions: u32,
    pub sector_rotation: f32,
    /// Reported when the runtime does not know its display frequency.
    pub fallback_frame_rate: f32,
    /// Scales the runtime's recommended render size.
    pub render_size_multiplier: f32,
    pub sensor_period_ms: u64,
}

impl Default for VrConfig {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 100.0,
            eye_dist_scale: 1.0,
            click_timeout_secs: DEFAULT_CLICK_TIMEOUT,
            sector_divisions: DEFAULT_SECTOR_DIVISIONS,
            sector_rotation: DEFAULT_SECTOR_ROTATION,
            fallback_frame_rate: 90.0,
            render_size_multiplier: 1.0,
            sensor_period_ms: 5,
        }
    }
}

impl VrConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: VrConfig = load_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.near > 0.0) {
            return Err(Error::config(format!(
                "near plane must be positive, got {}",
                self.near
            )));
        }
        if !(self.far > self.near) {
            return Err(Error::config(format!(
                "far plane ({}) must lie beyond near plane ({})",
                self.far, self.near
            )));
        }
        if !(self.click_timeout_secs > 0.0) {
            return Err(Error::config("click timeout must be positive"));
        }
        if !(1..=MAX_SECTOR_DIVISIONS).contains(&self.sector_divisions) {
            return Err(Error::config(format!(
                "sector divisions must be between 1 and {MAX_SECTOR_DIVISIONS}, got {}",
                self.sector_divisions
            )));
        }
        if !(self.render_size_multiplier > 0.0) {
            return Err(Error::config("render size multiplier must be positive"));
        }
        Ok(())
    }

    pub fn sensor_period(&self) -> Duration {
        Duration::from_millis(self.sensor_period_ms)
    }
}
