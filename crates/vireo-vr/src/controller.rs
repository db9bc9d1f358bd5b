//! Controller input: button and touch edges, analog axes, sectors and
//! multi-click sequences.

use std::f32::consts::TAU;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceType, TrackedDevice};
use crate::runtime::ControllerState;
use crate::transform::{Matrix4, Vec4};

/// Number of analog axes per controller.
pub const MAX_AXES: usize = 5;

pub const DEFAULT_CLICK_TIMEOUT: f32 = 0.2;
pub const DEFAULT_SECTOR_DIVISIONS: u32 = 4;
pub const DEFAULT_SECTOR_ROTATION: f32 = 0.125;

/// A runtime button identifier, bit `id` of the 64-bit button masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Button(u8);

impl Button {
    pub const SYSTEM: Button = Button(0);
    pub const MENU: Button = Button(1);
    pub const GRIP: Button = Button(2);
    pub const DPAD_LEFT: Button = Button(3);
    pub const DPAD_UP: Button = Button(4);
    pub const DPAD_RIGHT: Button = Button(5);
    pub const DPAD_DOWN: Button = Button(6);
    pub const A: Button = Button(7);
    pub const PROXIMITY_SENSOR: Button = Button(31);
    pub const AXIS0: Button = Button(32);
    pub const AXIS1: Button = Button(33);
    pub const AXIS2: Button = Button(34);
    pub const AXIS3: Button = Button(35);
    pub const AXIS4: Button = Button(36);
    pub const TOUCHPAD: Button = Button::AXIS0;
    pub const TRIGGER: Button = Button::AXIS1;

    /// Click recognition scans identifiers below this one.
    pub const CLICK_SCAN_END: u8 = 34;

    pub const fn new(id: u8) -> Option<Button> {
        if id < 64 {
            Some(Button(id))
        } else {
            None
        }
    }

    pub const fn id(self) -> u8 {
        self.0
    }

    pub const fn mask(self) -> u64 {
        1u64 << self.0
    }

    /// Zero-based analog axis for the axis buttons.
    pub fn axis_index(self) -> Option<usize> {
        let id = self.0.checked_sub(Button::AXIS0.0)? as usize;
        (id < MAX_AXES).then_some(id)
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Button::SYSTEM => f.write_str("SYSTEM"),
            Button::MENU => f.write_str("MENU"),
            Button::GRIP => f.write_str("GRIP"),
            Button::DPAD_LEFT => f.write_str("DPAD_LEFT"),
            Button::DPAD_UP => f.write_str("DPAD_UP"),
            Button::DPAD_RIGHT => f.write_str("DPAD_RIGHT"),
            Button::DPAD_DOWN => f.write_str("DPAD_DOWN"),
            Button::A => f.write_str("A"),
            Button::PROXIMITY_SENSOR => f.write_str("PROXIMITY_SENSOR"),
            Button::TOUCHPAD => f.write_str("TOUCHPAD"),
            Button::TRIGGER => f.write_str("TRIGGER"),
            Button(id) => match Button(id).axis_index() {
                Some(axis) => write!(f, "AXIS{axis}"),
                None => write!(f, "BUTTON_{id}"),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    #[default]
    Left = 0,
    Right = 1,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hand::Left => "left",
            Hand::Right => "right",
        })
    }
}

/// Angular sector of a 2D axis position.
///
/// The angle is measured counter-clockwise from +x as a fraction of a full
/// turn, offset by `rotation`, wrapped into [0, 1) and cut into `divisions`
/// equal slices. Returns -1 when the axis rests exactly at the origin.
pub fn axis_sector(axis: [f32; 2], divisions: u32, rotation: f32) -> i32 {
    let [x, y] = axis;
    if x == 0.0 && y == 0.0 {
        return -1;
    }
    if divisions == 0 {
        return 0;
    }
    let mut frac = (y.atan2(x) / TAU + rotation).rem_euclid(1.0);
    if frac >= 1.0 {
        frac = 0.0;
    }
    let last = i32::try_from(divisions).map_or(i32::MAX, |d| d - 1);
    let sector = (frac * divisions as f32) as i32;
    sector.min(last)
}

/// One controller slot: pose plus input state.
#[derive(Debug, Clone)]
pub struct Controller {
    device: TrackedDevice,
    hand: Hand,
    buttons: u64,
    touches: u64,
    button_changes: u64,
    touch_changes: u64,
    axes: [[f32; 2]; MAX_AXES],
    axis_changes: [[f32; 2]; MAX_AXES],
    last_packet: Option<u32>,
    click_seq: Vec<Button>,
    click_seq_finished: Vec<Button>,
    click_timer: f32,
    click_timeout: f32,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(DEFAULT_CLICK_TIMEOUT)
    }
}

impl Controller {
    pub fn new(click_timeout: f32) -> Self {
        Self {
            device: TrackedDevice::default(),
            hand: Hand::Left,
            buttons: 0,
            touches: 0,
            button_changes: 0,
            touch_changes: 0,
            axes: [[0.0; 2]; MAX_AXES],
            axis_changes: [[0.0; 2]; MAX_AXES],
            last_packet: None,
            click_seq: Vec::new(),
            click_seq_finished: Vec::new(),
            click_timer: 0.0,
            click_timeout,
        }
    }

    pub fn device(&self) -> &TrackedDevice {
        &self.device
    }

    pub fn pose(&self) -> &Matrix4 {
        &self.device.pose
    }

    pub fn is_valid(&self) -> bool {
        self.device.is_valid()
    }

    pub(crate) fn set_device(&mut self, device: TrackedDevice) {
        self.device = device;
    }

    pub(crate) fn mark_untracked(&mut self) {
        self.device.device_type = DeviceType::Invalid;
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub(crate) fn set_hand(&mut self, hand: Hand) {
        self.hand = hand;
    }

    pub fn click_timeout(&self) -> f32 {
        self.click_timeout
    }

    pub fn set_click_timeout(&mut self, secs: f32) {
        self.click_timeout = secs;
    }

    pub fn buttons(&self) -> u64 {
        self.buttons
    }

    pub fn button_changes(&self) -> u64 {
        self.button_changes
    }

    pub fn touches(&self) -> u64 {
        self.touches
    }

    pub fn touch_changes(&self) -> u64 {
        self.touch_changes
    }

    pub fn pressed(&self, button: Button) -> bool {
        self.buttons & button.mask() != 0
    }

    pub fn button_changed(&self, button: Button) -> bool {
        self.button_changes & button.mask() != 0
    }

    pub fn went_down(&self, button: Button) -> bool {
        self.button_changed(button) && self.pressed(button)
    }

    pub fn went_up(&self, button: Button) -> bool {
        self.button_changed(button) && !self.pressed(button)
    }

    pub fn touched(&self, button: Button) -> bool {
        self.touches & button.mask() != 0
    }

    pub fn touch_changed(&self, button: Button) -> bool {
        self.touch_changes & button.mask() != 0
    }

    pub fn touch_went_down(&self, button: Button) -> bool {
        self.touch_changed(button) && self.touched(button)
    }

    pub fn touch_went_up(&self, button: Button) -> bool {
        self.touch_changed(button) && !self.touched(button)
    }

    /// Axis position in [-1, 1] (trigger x in [0, 1]). Zero for non-axis
    /// buttons.
    pub fn axis(&self, button: Button) -> [f32; 2] {
        button.axis_index().map_or([0.0; 2], |i| self.axes[i])
    }

    /// Axis delta since the previous state packet.
    pub fn axis_change(&self, button: Button) -> [f32; 2] {
        button.axis_index().map_or([0.0; 2], |i| self.axis_changes[i])
    }

    pub fn axis_sector(&self, button: Button, divisions: u32, rotation: f32) -> i32 {
        axis_sector(self.axis(button), divisions, rotation)
    }

    /// Axis position mapped to the controller's xz-plane and carried into
    /// world space: x to x, y to -z.
    pub fn axis_in_world(&self, button: Button, w: f32) -> Vec4 {
        let [x, y] = self.axis(button);
        self.device.pose * Vec4::new(x, 0.0, -y, w)
    }

    /// Forget last frame's button and touch edges. Axis deltas only move
    /// when a new packet arrives.
    pub fn clear_changes(&mut self) {
        self.button_changes = 0;
        self.touch_changes = 0;
    }

    /// Fold a state packet in. Returns `false` when the packet number has
    /// not moved since the last applied packet.
    pub fn apply_state(&mut self, state: &ControllerState) -> bool {
        if self.last_packet == Some(state.packet_num) {
            return false;
        }
        self.last_packet = Some(state.packet_num);

        self.button_changes = self.buttons ^ state.buttons;
        self.buttons = state.buttons;
        self.touch_changes = self.touches ^ state.touches;
        self.touches = state.touches;
        for (i, axis) in state.axes.iter().enumerate() {
            self.axis_changes[i] = [axis[0] - self.axes[i][0], axis[1] - self.axes[i][1]];
            self.axes[i] = *axis;
        }
        true
    }

    /// Advance multi-click recognition by `dt` seconds.
    ///
    /// Any button change restarts the window and appends whatever is held.
    /// Once the window runs out, the collected sequence is published for a
    /// single tick and collection starts over.
    pub fn update_clicks(&mut self, dt: f32) {
        self.click_seq_finished.clear();
        if self.button_changes != 0 {
            self.click_timer = 0.0;
        }

        if self.click_timer < self.click_timeout {
            if self.button_changes != 0 {
                for id in 0..Button::CLICK_SCAN_END {
                    let button = Button(id);
                    if self.pressed(button) {
                        self.click_seq.push(button);
                    }
                }
            }
        } else {
            self.click_seq_finished = std::mem::take(&mut self.click_seq);
        }

        self.click_timer += dt;
    }

    /// Buttons collected in the current, still open window.
    pub fn click_seq(&self) -> &[Button] {
        &self.click_seq
    }

    /// The sequence finalized on this tick; empty on every other tick.
    pub fn click_seq_finished(&self) -> &[Button] {
        &self.click_seq_finished
    }

    /// How many times `button` appears in the finalized sequence.
    pub fn clicks(&self, button: Button) -> usize {
        self.click_seq_finished
            .iter()
            .filter(|&&b| b == button)
            .count()
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} hand controller ({})", self.hand, self.device.device_type)?;
        writeln!(f, "buttons  {:064b}", self.buttons)?;
        writeln!(f, "touches  {:064b}", self.touches)?;
        for (i, axis) in self.axes.iter().enumerate() {
            writeln!(f, "axis{i}    {:6.3} {:6.3}", axis[0], axis[1])?;
        }
        write!(f, "{}", self.device.pose)
    }
}
