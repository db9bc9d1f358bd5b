//! Boundary to the tracking runtime.
//!
//! The runtime session (device enumeration, raw pose delivery, the event
//! queue) lives outside this crate. [`TrackingRuntime`] is everything the
//! core consumes from it.

use serde::{Deserialize, Serialize};

use crate::controller::{Hand, MAX_AXES};
use crate::transform::Matrix4;
use crate::view::Eye;
use crate::VrResult;

/// Index of a device slot as assigned by the runtime.
pub type DeviceIndex = usize;

/// Number of device slots the runtime can report.
pub const MAX_TRACKED_DEVICES: usize = 64;

/// Device class as reported by the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    #[default]
    Invalid,
    Hmd,
    Controller,
    GenericTracker,
    TrackingReference,
    DisplayRedirect,
}

/// One device's pose for the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawPose {
    /// Device-to-tracking-space transform. Rigid.
    pub device_to_tracking: Matrix4,
    pub valid: bool,
}

/// An event as drained from the runtime queue, before classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeEvent {
    pub code: u32,
    pub device_index: DeviceIndex,
    /// Seconds since the event occurred.
    #[serde(default)]
    pub age: f32,
    /// Button identifier for button/touch events.
    #[serde(default)]
    pub button: u32,
}

/// Continuous controller state packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    /// Changes whenever the runtime has new input for this controller.
    pub packet_num: u32,
    #[serde(default)]
    pub buttons: u64,
    #[serde(default)]
    pub touches: u64,
    #[serde(default)]
    pub axes: [[f32; 2]; MAX_AXES],
}

/// The tracking-runtime session consumed by [`crate::VrSystem`].
///
/// Implementations are queried synchronously from the frame loop.
pub trait TrackingRuntime: Send {
    fn start(&mut self) -> VrResult<()>;
    fn stop(&mut self);

    /// Block until the next frame's poses are available and fill `poses`,
    /// one entry per device index.
    fn wait_get_poses(&mut self, poses: &mut [RawPose]);

    fn device_class(&self, index: DeviceIndex) -> DeviceClass;

    /// Indices of all devices of `class`, in the runtime's own order
    /// (spatial, right to left relative to the headset).
    fn sorted_device_indices(&self, class: DeviceClass) -> Vec<DeviceIndex>;

    fn poll_next_event(&mut self) -> Option<NativeEvent>;

    /// Eye-to-screen projection for the given clip planes.
    fn projection(&self, eye: Eye, near: f32, far: f32) -> Matrix4;

    /// Eye pose in head space. Rigid, mostly a lateral translation.
    fn head_to_eye(&self, eye: Eye) -> Matrix4;

    /// Device currently assigned to a hand role. Too slow for per-frame use.
    fn controller_index_for_role(&self, hand: Hand) -> Option<DeviceIndex>;

    fn controller_state(&self, index: DeviceIndex) -> Option<ControllerState>;

    /// Fire one haptic pulse. The runtime drops pulses sent less than 5 ms
    /// apart on the same device/axis pair.
    fn trigger_haptic_pulse(&mut self, index: DeviceIndex, axis_id: u32, duration_us: u16);

    fn display_frequency(&self) -> Option<f32> {
        None
    }

    fn recommended_render_size(&self) -> Option<(u32, u32)> {
        None
    }
}
