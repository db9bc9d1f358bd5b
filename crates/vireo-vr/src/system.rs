//! The per-frame facade over a tracking-runtime session.

use tracing::{debug, info, warn};

use crate::config::VrConfig;
use crate::controller::{Button, Controller, Hand};
use crate::device::{DeviceTracker, DeviceType, TrackedDevice};
use crate::event::Event;
use crate::runtime::{DeviceIndex, TrackingRuntime, MAX_TRACKED_DEVICES};
use crate::transform::{Matrix4, Vec4};
use crate::view::{Eye, EyeTransforms};
use crate::VrResult;

/// Head, controller and tracker state for one session, refreshed once per
/// frame by its owner.
///
/// Without a runtime the system is headless: every update is a no-op and
/// every query answers with identity poses and empty input.
pub struct VrSystem {
    runtime: Option<Box<dyn TrackingRuntime>>,
    config: VrConfig,
    tracker: DeviceTracker,
    eyes: EyeTransforms,
    event: Event,
    wearing_hmd: bool,
    hand_to_device: [DeviceIndex; 2],
    display: bool,
    render_size: (u32, u32),
}

impl Default for VrSystem {
    fn default() -> Self {
        Self::new(VrConfig::default())
    }
}

impl VrSystem {
    pub fn new(config: VrConfig) -> Self {
        Self {
            runtime: None,
            tracker: DeviceTracker::new(Controller::new(config.click_timeout_secs)),
            eyes: EyeTransforms::new(config.near, config.far, config.eye_dist_scale),
            event: Event::default(),
            wearing_hmd: false,
            hand_to_device: [1, 2],
            display: true,
            render_size: (0, 0),
            config,
        }
    }

    pub fn config(&self) -> &VrConfig {
        &self.config
    }

    /// Start a session on `runtime`. On failure the system stays headless.
    pub fn connect(&mut self, mut runtime: Box<dyn TrackingRuntime>) -> VrResult<()> {
        if self.runtime.is_some() {
            debug!("tracking session already running");
            return Ok(());
        }
        if let Err(err) = runtime.start() {
            warn!("tracking runtime failed to start: {err}");
            return Err(err);
        }
        info!("tracking session started");
        self.runtime = Some(runtime);
        let (w, h) = self.render_size;
        self.set_render_size(w, h, self.config.render_size_multiplier);
        Ok(())
    }

    /// End the session. The last known state stays readable.
    pub fn disconnect(&mut self) {
        if let Some(mut runtime) = self.runtime.take() {
            runtime.stop();
            info!("tracking session stopped");
        }
    }

    pub fn is_valid(&self) -> bool {
        self.runtime.is_some()
    }

    /// Valid and displaying.
    pub fn is_active(&self) -> bool {
        self.is_valid() && self.display
    }

    pub fn display(&self) -> bool {
        self.display
    }

    pub fn set_display(&mut self, display: bool) -> &mut Self {
        self.display = display;
        self
    }

    pub fn toggle_display(&mut self) -> &mut Self {
        self.display = !self.display;
        self
    }

    /// Pull this frame's poses and recompute the eye transforms.
    pub fn update_poses(&mut self) {
        let Some(runtime) = self.runtime.as_deref_mut() else {
            return;
        };
        self.tracker.update(runtime);
        self.eyes
            .update(self.tracker.pose_hmd(), self.tracker.view_hmd(), runtime);
    }

    /// Classify the next queued runtime event.
    ///
    /// Returns `None` once the queue is empty; that same call refreshes the
    /// hand assignment and every controller's continuous state. Call until it
    /// returns `None` once per frame.
    pub fn poll_event(&mut self) -> Option<Event> {
        let runtime = self.runtime.as_deref_mut()?;

        if let Some(raw) = runtime.poll_next_event() {
            let device_type = if raw.device_index < MAX_TRACKED_DEVICES {
                DeviceType::from(runtime.device_class(raw.device_index))
            } else {
                DeviceType::Invalid
            };
            let event = Event::classify(&raw, device_type);
            if let Some(worn) = event.worn_state_change() {
                if worn != self.wearing_hmd {
                    info!("headset {}", if worn { "put on" } else { "taken off" });
                }
                self.wearing_hmd = worn;
            }
            self.event = event;
            return Some(event);
        }

        for hand in Hand::BOTH {
            let Some(index) = runtime.controller_index_for_role(hand) else {
                continue;
            };
            if index >= MAX_TRACKED_DEVICES {
                continue;
            }
            if self.hand_to_device[hand.index()] != index {
                debug!("{hand} hand now on device {index}");
            }
            self.hand_to_device[hand.index()] = index;
            self.tracker.controller_mut(index).set_hand(hand);
        }

        for index in 0..MAX_TRACKED_DEVICES {
            if DeviceType::from(runtime.device_class(index)) != DeviceType::Controller {
                continue;
            }
            let controller = self.tracker.controller_mut(index);
            controller.clear_changes();
            if let Some(state) = runtime.controller_state(index) {
                controller.apply_state(&state);
            }
        }
        None
    }

    /// The most recently classified event.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Advance click timers by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.tracker.update_clicks(dt);
    }

    pub fn wearing_hmd(&self) -> bool {
        self.wearing_hmd
    }

    /// Transform applied on top of all tracking-space poses.
    pub fn set_pose_parent(&mut self, parent: Matrix4) -> &mut Self {
        let connected = self.is_valid();
        self.tracker.set_parent(parent, connected);
        if !connected {
            self.eyes.reset_views(self.tracker.view_hmd());
        }
        self
    }

    pub fn pose_parent(&self) -> &Matrix4 {
        self.tracker.parent()
    }

    pub fn pose_hmd(&self) -> &Matrix4 {
        self.tracker.pose_hmd()
    }

    pub fn pos_hmd(&self) -> Vec4 {
        self.tracker.pos_hmd()
    }

    pub fn view_hmd(&self) -> &Matrix4 {
        self.tracker.view_hmd()
    }

    pub fn tracked_device(&self, index: DeviceIndex) -> &TrackedDevice {
        self.tracker.device(index)
    }

    pub fn device_indices(&self, device_type: DeviceType) -> &[DeviceIndex] {
        self.tracker.registry().indices(device_type)
    }

    pub fn num_tracked_devices(&self, device_type: DeviceType, max: usize) -> usize {
        self.tracker.registry().count(device_type, max)
    }

    pub fn num_controllers(&self) -> usize {
        self.num_tracked_devices(DeviceType::Controller, MAX_TRACKED_DEVICES)
    }

    pub fn num_trackers(&self) -> usize {
        self.num_tracked_devices(DeviceType::Tracker, MAX_TRACKED_DEVICES)
    }

    /// The `i`-th generic tracker in index order.
    pub fn tracker(&self, i: usize) -> &TrackedDevice {
        self.tracker.nth_of_type(DeviceType::Tracker, i)
    }

    /// Device index of the controller for `hand`, by registry position.
    pub fn controller_index(&self, hand: Hand) -> DeviceIndex {
        let indices = self.device_indices(DeviceType::Controller);
        match indices.len() {
            0 => 0,
            1 => indices[0],
            _ => indices[hand.index()],
        }
    }

    pub fn controller(&self, hand: Hand) -> &Controller {
        self.tracker.controller(self.controller_index(hand))
    }

    /// Controller by the runtime's hand-role assignment.
    pub fn controller_for_role(&self, hand: Hand) -> &Controller {
        self.tracker.controller(self.hand_to_device[hand.index()])
    }

    pub fn controller_at(&self, index: DeviceIndex) -> &Controller {
        self.tracker.controller(index)
    }

    /// Sector of an axis on `hand`'s controller, using the configured layout.
    pub fn axis_sector(&self, hand: Hand, button: Button) -> i32 {
        self.controller(hand).axis_sector(
            button,
            self.config.sector_divisions,
            self.config.sector_rotation,
        )
    }

    #[deprecated(note = "use `tracked_device(controller_index(hand)).pose`")]
    pub fn pose_controller(&self, hand: Hand) -> &Matrix4 {
        &self.tracked_device(self.controller_index(hand)).pose
    }

    /// Fire a haptic pulse on `hand`'s controller along an axis button.
    pub fn haptic_pulse(&mut self, hand: Hand, button: Button, micros: u16) {
        let index = self.controller_index(hand);
        let Some(runtime) = self.runtime.as_deref_mut() else {
            return;
        };
        match button.axis_index() {
            Some(axis) => runtime.trigger_haptic_pulse(index, axis as u32, micros),
            None => debug!("haptic pulse ignored: {button} is not an axis"),
        }
    }

    pub fn set_near(&mut self, near: f32) -> &mut Self {
        self.eyes.set_near(near);
        self
    }

    pub fn set_far(&mut self, far: f32) -> &mut Self {
        self.eyes.set_far(far);
        self
    }

    pub fn set_eye_dist_scale(&mut self, scale: f32) -> &mut Self {
        self.eyes.set_eye_dist_scale(scale);
        self
    }

    pub fn eye_transforms(&self) -> &EyeTransforms {
        &self.eyes
    }

    pub fn eye_pass(&self) -> Eye {
        self.eyes.eye_pass()
    }

    pub fn set_eye_pass(&mut self, eye: Eye) -> &mut Self {
        self.eyes.set_eye_pass(eye);
        self
    }

    pub fn view(&self, eye: Eye) -> &Matrix4 {
        self.eyes.view(eye)
    }

    /// Same as [`VrSystem::eye_to_screen`].
    pub fn projection(&self, eye: Eye) -> &Matrix4 {
        self.eyes.eye_to_screen(eye)
    }

    /// World position of an eye.
    pub fn eye(&self, eye: Eye) -> Vec4 {
        self.eyes.eye_pos(eye)
    }

    pub fn head_to_eye(&self, eye: Eye) -> &Matrix4 {
        self.eyes.head_to_eye(eye)
    }

    pub fn eye_to_head(&self, eye: Eye) -> &Matrix4 {
        self.eyes.eye_to_head(eye)
    }

    pub fn eye_to_screen(&self, eye: Eye) -> &Matrix4 {
        self.eyes.eye_to_screen(eye)
    }

    pub fn head_to_screen(&self) -> Matrix4 {
        self.eyes.head_to_screen()
    }

    /// Display refresh rate in Hz.
    pub fn frame_rate(&self) -> f32 {
        self.runtime
            .as_deref()
            .and_then(|runtime| runtime.display_frequency())
            .unwrap_or(self.config.fallback_frame_rate)
    }

    pub fn render_size(&self) -> (u32, u32) {
        self.render_size
    }

    /// Set the per-eye render target size. A zero dimension asks the runtime
    /// for its recommended size, scaled by `mult`.
    pub fn set_render_size(&mut self, w: u32, h: u32, mult: f32) -> &mut Self {
        if w == 0 || h == 0 {
            if let Some((rw, rh)) = self
                .runtime
                .as_deref()
                .and_then(|runtime| runtime.recommended_render_size())
            {
                self.render_size = (scale_dim(rw, mult), scale_dim(rh, mult));
            }
        } else {
            self.render_size = (scale_dim(w, mult), scale_dim(h, mult));
        }
        self
    }
}

impl Drop for VrSystem {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn scale_dim(x: u32, mult: f32) -> u32 {
    (x as f64 * mult as f64 + 0.5) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_defaults() {
        let mut vr = VrSystem::default();
        assert!(!vr.is_valid());
        assert!(!vr.is_active());
        assert!(vr.poll_event().is_none());
        vr.update_poses();
        vr.tick(0.016);
        assert_eq!(*vr.pose_hmd(), Matrix4::IDENTITY);
        assert_eq!(vr.frame_rate(), 90.0);
        assert_eq!(vr.num_controllers(), 0);
        assert_eq!(vr.controller_index(Hand::Right), 0);
        assert!(!vr.controller(Hand::Left).is_valid());
        assert!(!vr.tracker(0).is_valid());
    }

    #[test]
    fn test_explicit_render_size() {
        let mut vr = VrSystem::default();
        vr.set_render_size(1000, 1100, 1.5);
        assert_eq!(vr.render_size(), (1500, 1650));

        // nothing to recommend without a session
        vr.set_render_size(0, 0, 1.0);
        assert_eq!(vr.render_size(), (1500, 1650));
    }

    #[test]
    fn test_scale_dim_rounds() {
        assert_eq!(scale_dim(1511, 1.0), 1511);
        assert_eq!(scale_dim(3, 0.5), 2);
        assert_eq!(scale_dim(5, 0.3), 2);
    }

    #[test]
    fn test_display_toggle() {
        let mut vr = VrSystem::default();
        assert!(vr.display());
        vr.toggle_display();
        assert!(!vr.display());
        vr.set_display(true);
        assert!(vr.display());
    }

    #[test]
    fn test_headless_parent_moves_views() {
        let mut vr = VrSystem::default();
        let parent = Matrix4::from_translation(0.0, 1.0, -2.0);
        vr.set_pose_parent(parent);
        assert_eq!(*vr.pose_hmd(), parent);
        assert_eq!(*vr.view(Eye::Left), parent.inverse_rigid());
        assert_eq!(*vr.view(Eye::Right), parent.inverse_rigid());
    }
}
