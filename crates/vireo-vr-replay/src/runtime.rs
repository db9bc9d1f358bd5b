use std::collections::VecDeque;

use glam::Mat4;
use tracing::{debug, info};
use vireo_vr::{
    ControllerState, DeviceClass, DeviceIndex, Eye, Hand, Matrix4, NativeEvent, RawPose,
    TrackingRuntime, VrError, VrResult,
};

use crate::script::{Frame, Script};

/// A haptic pulse as received by the replay runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HapticPulse {
    pub frame: usize,
    pub device_index: DeviceIndex,
    pub axis_id: u32,
    pub duration_us: u16,
}

/// A [`TrackingRuntime`] that plays back a [`Script`].
///
/// Each call to `wait_get_poses` steps to the next frame and queues that
/// frame's events. After the last frame the final frame is held.
pub struct ReplayRuntime {
    script: Script,
    cursor: Option<usize>,
    pending: VecDeque<NativeEvent>,
    pulses: Vec<HapticPulse>,
}

impl ReplayRuntime {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            cursor: None,
            pending: VecDeque::new(),
            pulses: Vec::new(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.script.frames.len()
    }

    /// Index of the frame currently played back.
    pub fn frame_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.cursor.map_or(self.script.frames.is_empty(), |c| {
            c + 1 >= self.script.frames.len()
        })
    }

    pub fn pulses(&self) -> &[HapticPulse] {
        &self.pulses
    }

    fn current(&self) -> Option<&Frame> {
        self.script.frames.get(self.cursor?)
    }
}

impl TrackingRuntime for ReplayRuntime {
    fn start(&mut self) -> VrResult<()> {
        if self.script.frames.is_empty() {
            return Err(VrError::Unavailable("replay script has no frames".to_string()));
        }
        info!("replaying {} frames", self.script.frames.len());
        Ok(())
    }

    fn stop(&mut self) {
        debug!("replay stopped at frame {:?}", self.cursor);
    }

    fn wait_get_poses(&mut self, poses: &mut [RawPose]) {
        let last = self.script.frames.len().saturating_sub(1);
        let next = self.cursor.map_or(0, |c| (c + 1).min(last));
        let advanced = self.cursor != Some(next);
        self.cursor = Some(next);

        poses.fill(RawPose::default());
        let Some(frame) = self.script.frames.get(next) else {
            return;
        };
        for device in frame.devices.iter().filter(|d| d.tracked) {
            if let Some(slot) = poses.get_mut(device.index) {
                *slot = RawPose {
                    device_to_tracking: device.pose(),
                    valid: true,
                };
            }
        }
        if advanced {
            self.pending.extend(frame.events.iter().copied());
        }
    }

    fn device_class(&self, index: DeviceIndex) -> DeviceClass {
        self.current()
            .and_then(|frame| frame.device(index))
            .map_or(DeviceClass::Invalid, |d| d.class)
    }

    /// Right to left by x position, as a headset-relative runtime would.
    fn sorted_device_indices(&self, class: DeviceClass) -> Vec<DeviceIndex> {
        let Some(frame) = self.current() else {
            return Vec::new();
        };
        let mut found: Vec<_> = frame.devices.iter().filter(|d| d.class == class).collect();
        found.sort_by(|a, b| b.position[0].total_cmp(&a.position[0]));
        found.into_iter().map(|d| d.index).collect()
    }

    fn poll_next_event(&mut self) -> Option<NativeEvent> {
        self.pending.pop_front()
    }

    fn projection(&self, _eye: Eye, near: f32, far: f32) -> Matrix4 {
        Mat4::perspective_rh_gl(
            self.script.fov_y_degrees.to_radians(),
            self.script.aspect,
            near,
            far,
        )
        .into()
    }

    fn head_to_eye(&self, eye: Eye) -> Matrix4 {
        let half = self.script.ipd / 2.0;
        match eye {
            Eye::Left => Matrix4::from_translation(-half, 0.0, 0.0),
            Eye::Right => Matrix4::from_translation(half, 0.0, 0.0),
        }
    }

    fn controller_index_for_role(&self, hand: Hand) -> Option<DeviceIndex> {
        self.current()?.roles.get(hand)
    }

    fn controller_state(&self, index: DeviceIndex) -> Option<ControllerState> {
        self.current()?.device(index)?.controller
    }

    fn trigger_haptic_pulse(&mut self, index: DeviceIndex, axis_id: u32, duration_us: u16) {
        debug!("haptic pulse on device {index} axis {axis_id} for {duration_us}us");
        self.pulses.push(HapticPulse {
            frame: self.cursor.unwrap_or(0),
            device_index: index,
            axis_id,
            duration_us,
        });
    }

    fn display_frequency(&self) -> Option<f32> {
        self.script.display_frequency
    }

    fn recommended_render_size(&self) -> Option<(u32, u32)> {
        self.script.render_size.map(|[w, h]| (w, h))
    }
}
