//! Device pose tracking and classification.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::controller::Controller;
use crate::runtime::{DeviceClass, DeviceIndex, RawPose, TrackingRuntime, MAX_TRACKED_DEVICES};
use crate::transform::{Matrix4, Vec4};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    Invalid = 0,
    Hmd = 1,
    Controller = 2,
    Tracker = 3,
    TrackingReference = 4,
}

impl DeviceType {
    pub const COUNT: usize = 5;

    /// Every type a device can be classified as.
    pub const CLASSIFIED: [DeviceType; 4] = [
        DeviceType::Hmd,
        DeviceType::Controller,
        DeviceType::Tracker,
        DeviceType::TrackingReference,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn native_class(self) -> DeviceClass {
        match self {
            DeviceType::Invalid => DeviceClass::Invalid,
            DeviceType::Hmd => DeviceClass::Hmd,
            DeviceType::Controller => DeviceClass::Controller,
            DeviceType::Tracker => DeviceClass::GenericTracker,
            DeviceType::TrackingReference => DeviceClass::TrackingReference,
        }
    }
}

impl From<DeviceClass> for DeviceType {
    fn from(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Hmd => DeviceType::Hmd,
            DeviceClass::Controller => DeviceType::Controller,
            DeviceClass::GenericTracker => DeviceType::Tracker,
            DeviceClass::TrackingReference => DeviceType::TrackingReference,
            DeviceClass::Invalid | DeviceClass::DisplayRedirect => DeviceType::Invalid,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceType::Invalid => "INVALID",
            DeviceType::Hmd => "HMD",
            DeviceType::Controller => "CONTROLLER",
            DeviceType::Tracker => "TRACKER",
            DeviceType::TrackingReference => "TRACKING_REFERENCE",
        })
    }
}

/// One device slot: classification plus a one-frame pose history.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackedDevice {
    pub device_type: DeviceType,
    /// World pose (parent transform applied).
    pub pose: Matrix4,
    pub pose_prev: Matrix4,
    /// Tracking-space pose before the parent transform.
    pub pose_absolute: Matrix4,
}

impl TrackedDevice {
    pub fn is_valid(&self) -> bool {
        self.device_type != DeviceType::Invalid
    }

    pub fn update_pose(&mut self, pose: Matrix4) {
        self.pose_prev = self.pose;
        self.pose = pose;
        self.pose_absolute = pose;
    }

    pub fn update_pose_with_parent(&mut self, pose: Matrix4, parent: &Matrix4) {
        self.pose_prev = self.pose;
        self.pose = *parent * pose;
        self.pose_absolute = pose;
    }

    /// Rigid motion since the previous update.
    pub fn pose_diff(&self) -> Matrix4 {
        self.pose * self.pose_prev.inverse_rigid()
    }
}

/// Device indices grouped by type, each list in ascending index order.
#[derive(Debug, Clone, Default)]
pub struct DeviceIndexRegistry {
    indices: [Vec<DeviceIndex>; DeviceType::COUNT],
}

impl DeviceIndexRegistry {
    /// Rebuild from the runtime. The runtime orders devices spatially, which
    /// changes as the user moves; consumers need identity order instead.
    pub fn refresh(&mut self, runtime: &dyn TrackingRuntime) {
        for device_type in DeviceType::CLASSIFIED {
            let mut found = runtime.sorted_device_indices(device_type.native_class());
            found.retain(|&i| i < MAX_TRACKED_DEVICES);
            found.sort_unstable();
            found.dedup();
            self.indices[device_type.index()] = found;
        }
    }

    pub fn indices(&self, device_type: DeviceType) -> &[DeviceIndex] {
        &self.indices[device_type.index()]
    }

    pub fn count(&self, device_type: DeviceType, max: usize) -> usize {
        self.indices(device_type).len().min(max)
    }
}

/// Owns every device slot and controller slot for the session.
#[derive(Debug, Clone)]
pub struct DeviceTracker {
    devices: Vec<TrackedDevice>,
    controllers: Vec<Controller>,
    raw_poses: Vec<RawPose>,
    registry: DeviceIndexRegistry,
    parent: Matrix4,
    view_hmd: Matrix4,
    hmd_index: Option<DeviceIndex>,
    invalid_device: TrackedDevice,
}

impl Default for DeviceTracker {
    fn default() -> Self {
        Self::new(Controller::default())
    }
}

impl DeviceTracker {
    /// Create a tracker whose controller slots start as copies of `template`.
    pub fn new(template: Controller) -> Self {
        Self {
            devices: vec![TrackedDevice::default(); MAX_TRACKED_DEVICES],
            controllers: vec![template; MAX_TRACKED_DEVICES],
            raw_poses: vec![RawPose::default(); MAX_TRACKED_DEVICES],
            registry: DeviceIndexRegistry::default(),
            parent: Matrix4::IDENTITY,
            view_hmd: Matrix4::IDENTITY,
            hmd_index: None,
            invalid_device: TrackedDevice::default(),
        }
    }

    /// Pull one frame of poses from the runtime and reclassify every slot.
    pub fn update(&mut self, runtime: &mut dyn TrackingRuntime) {
        runtime.wait_get_poses(&mut self.raw_poses);
        self.registry.refresh(runtime);

        for (index, raw) in self.raw_poses.iter().enumerate() {
            let device = &mut self.devices[index];
            if !raw.valid {
                if device.is_valid() {
                    debug!("device {index} ({}) lost tracking", device.device_type);
                }
                device.device_type = DeviceType::Invalid;
                self.controllers[index].mark_untracked();
                continue;
            }

            device.update_pose_with_parent(raw.device_to_tracking, &self.parent);
            let device_type = DeviceType::from(runtime.device_class(index));
            if device.device_type != device_type {
                debug!("device {index} classified as {device_type}");
            }
            device.device_type = device_type;

            match device_type {
                DeviceType::Hmd => {
                    self.view_hmd = device.pose.inverse_rigid();
                    self.hmd_index = Some(index);
                }
                DeviceType::Controller => self.controllers[index].set_device(*device),
                _ => {}
            }
        }
    }

    /// Set the transform applied on top of every tracking-space pose.
    ///
    /// Without a live session, every device pose is set to `parent` directly
    /// so callers see a sane pose before the session exists.
    pub fn set_parent(&mut self, parent: Matrix4, connected: bool) {
        self.parent = parent;
        if !connected {
            for device in &mut self.devices {
                device.update_pose(parent);
            }
            self.view_hmd = parent.inverse_rigid();
        }
    }

    pub fn parent(&self) -> &Matrix4 {
        &self.parent
    }

    pub fn device(&self, index: DeviceIndex) -> &TrackedDevice {
        self.devices.get(index).unwrap_or(&self.invalid_device)
    }

    pub fn controller(&self, index: DeviceIndex) -> &Controller {
        &self.controllers[index.min(MAX_TRACKED_DEVICES - 1)]
    }

    pub fn controller_mut(&mut self, index: DeviceIndex) -> &mut Controller {
        &mut self.controllers[index.min(MAX_TRACKED_DEVICES - 1)]
    }

    pub fn registry(&self) -> &DeviceIndexRegistry {
        &self.registry
    }

    /// The `i`-th device of a type in index order, or an invalid device.
    pub fn nth_of_type(&self, device_type: DeviceType, i: usize) -> &TrackedDevice {
        match self.registry.indices(device_type).get(i) {
            Some(&index) => self.device(index),
            None => &self.invalid_device,
        }
    }

    pub fn hmd_index(&self) -> DeviceIndex {
        self.hmd_index.unwrap_or(0)
    }

    pub fn pose_hmd(&self) -> &Matrix4 {
        &self.device(self.hmd_index()).pose
    }

    pub fn pos_hmd(&self) -> Vec4 {
        self.pose_hmd().pos()
    }

    /// World-to-head transform; the inverse of the headset pose.
    pub fn view_hmd(&self) -> &Matrix4 {
        &self.view_hmd
    }

    /// Advance click recognition for every controller in the registry.
    pub fn update_clicks(&mut self, dt: f32) {
        for &index in self.registry.indices(DeviceType::Controller) {
            self.controllers[index].update_clicks(dt);
        }
    }
}
