//! JSON replay scripts.

use std::collections::HashSet;
use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use vireo_common::{load_json, Error, Result};
use vireo_vr::{
    ControllerState, DeviceClass, DeviceIndex, EyeSample, Hand, Matrix4, NativeEvent,
    MAX_TRACKED_DEVICES,
};

/// A recorded session: display properties plus one entry per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
    pub display_frequency: Option<f32>,
    pub render_size: Option<[u32; 2]>,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub ipd: f32,
    pub frames: Vec<Frame>,
    /// Fed to [`crate::ReplayEyeSensor`], one per read.
    pub eye_samples: Vec<EyeSample>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            display_frequency: None,
            render_size: None,
            fov_y_degrees: 110.0,
            aspect: 0.9,
            ipd: 0.064,
            frames: Vec::new(),
            eye_samples: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Frame {
    pub devices: Vec<DeviceFrame>,
    pub events: Vec<NativeEvent>,
    pub roles: Roles,
}

impl Frame {
    pub fn device(&self, index: DeviceIndex) -> Option<&DeviceFrame> {
        self.devices.iter().find(|d| d.index == index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roles {
    pub left: Option<DeviceIndex>,
    pub right: Option<DeviceIndex>,
}

impl Roles {
    pub fn get(&self, hand: Hand) -> Option<DeviceIndex> {
        match hand {
            Hand::Left => self.left,
            Hand::Right => self.right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFrame {
    pub index: DeviceIndex,
    pub class: DeviceClass,
    #[serde(default)]
    pub position: [f32; 3],
    /// Rotation about +y.
    #[serde(default)]
    pub yaw_degrees: f32,
    #[serde(default = "default_tracked")]
    pub tracked: bool,
    #[serde(default)]
    pub controller: Option<ControllerState>,
}

fn default_tracked() -> bool {
    true
}

impl DeviceFrame {
    pub fn pose(&self) -> Matrix4 {
        Mat4::from_rotation_translation(
            Quat::from_rotation_y(self.yaw_degrees.to_radians()),
            Vec3::from_array(self.position),
        )
        .into()
    }
}

impl Script {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let script: Script = load_json(path)?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        for (n, frame) in self.frames.iter().enumerate() {
            let mut seen = HashSet::new();
            for device in &frame.devices {
                if device.index >= MAX_TRACKED_DEVICES {
                    return Err(Error::config(format!(
                        "frame {n}: device index {} out of range",
                        device.index
                    )));
                }
                if !seen.insert(device.index) {
                    return Err(Error::config(format!(
                        "frame {n}: device {} listed twice",
                        device.index
                    )));
                }
            }
        }
        if !(self.aspect > 0.0 && self.fov_y_degrees > 0.0 && self.fov_y_degrees < 180.0) {
            return Err(Error::config("field of view and aspect must be positive"));
        }
        Ok(())
    }
}
