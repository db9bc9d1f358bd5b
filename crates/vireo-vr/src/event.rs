//! Discrete runtime events reduced to a small vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::controller::Button;
use crate::device::DeviceType;
use crate::runtime::{DeviceIndex, NativeEvent};

/// Native event codes understood by [`EventType::from_native`].
pub mod native {
    pub const DEVICE_ACTIVATED: u32 = 100;
    pub const DEVICE_DEACTIVATED: u32 = 101;
    pub const INTERACTION_STARTED: u32 = 103;
    pub const INTERACTION_ENDED: u32 = 104;
    pub const ENTER_STANDBY: u32 = 106;
    pub const LEAVE_STANDBY: u32 = 107;
    pub const ROLE_CHANGED: u32 = 108;
    pub const BUTTON_PRESS: u32 = 200;
    pub const BUTTON_UNPRESS: u32 = 201;
    pub const BUTTON_TOUCH: u32 = 202;
    pub const BUTTON_UNTOUCH: u32 = 203;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Activated,
    Deactivated,
    RoleChanged,
    InteractionStarted,
    InteractionEnded,
    StandbyStarted,
    StandbyEnded,
    ButtonDown,
    ButtonUp,
    Touch,
    Untouch,
    /// A native code with no reduced counterpart, passed through as is.
    Other(u32),
}

impl EventType {
    pub fn from_native(code: u32) -> Self {
        match code {
            native::DEVICE_ACTIVATED => EventType::Activated,
            native::DEVICE_DEACTIVATED => EventType::Deactivated,
            native::ROLE_CHANGED => EventType::RoleChanged,
            native::INTERACTION_STARTED => EventType::InteractionStarted,
            native::INTERACTION_ENDED => EventType::InteractionEnded,
            native::ENTER_STANDBY => EventType::StandbyStarted,
            native::LEAVE_STANDBY => EventType::StandbyEnded,
            native::BUTTON_PRESS => EventType::ButtonDown,
            native::BUTTON_UNPRESS => EventType::ButtonUp,
            native::BUTTON_TOUCH => EventType::Touch,
            native::BUTTON_UNTOUCH => EventType::Untouch,
            other => EventType::Other(other),
        }
    }

    pub fn native_code(self) -> u32 {
        match self {
            EventType::Activated => native::DEVICE_ACTIVATED,
            EventType::Deactivated => native::DEVICE_DEACTIVATED,
            EventType::RoleChanged => native::ROLE_CHANGED,
            EventType::InteractionStarted => native::INTERACTION_STARTED,
            EventType::InteractionEnded => native::INTERACTION_ENDED,
            EventType::StandbyStarted => native::ENTER_STANDBY,
            EventType::StandbyEnded => native::LEAVE_STANDBY,
            EventType::ButtonDown => native::BUTTON_PRESS,
            EventType::ButtonUp => native::BUTTON_UNPRESS,
            EventType::Touch => native::BUTTON_TOUCH,
            EventType::Untouch => native::BUTTON_UNTOUCH,
            EventType::Other(code) => code,
        }
    }

    /// Whether events of this type carry a button.
    pub fn has_button(self) -> bool {
        matches!(
            self,
            EventType::ButtonDown | EventType::ButtonUp | EventType::Touch | EventType::Untouch
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Activated => "ACTIVATED",
            EventType::Deactivated => "DEACTIVATED",
            EventType::RoleChanged => "ROLE_CHANGED",
            EventType::InteractionStarted => "INTERACTION_STARTED",
            EventType::InteractionEnded => "INTERACTION_ENDED",
            EventType::StandbyStarted => "STANDBY_STARTED",
            EventType::StandbyEnded => "STANDBY_ENDED",
            EventType::ButtonDown => "BUTTON_DOWN",
            EventType::ButtonUp => "BUTTON_UP",
            EventType::Touch => "TOUCH",
            EventType::Untouch => "UNTOUCH",
            EventType::Other(code) => return write!(f, "EVENT_{code}"),
        };
        f.write_str(name)
    }
}

/// A classified event, attributed to a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub device_type: DeviceType,
    pub device_index: DeviceIndex,
    /// Seconds since the event occurred.
    pub age: f32,
    /// Set only for button and touch events.
    pub button: Option<Button>,
    /// Reserved.
    pub axis: [f32; 2],
}

impl Default for Event {
    fn default() -> Self {
        Self {
            event_type: EventType::Other(0),
            device_type: DeviceType::Invalid,
            device_index: 0,
            age: 0.0,
            button: None,
            axis: [0.0; 2],
        }
    }
}

impl Event {
    pub fn classify(raw: &NativeEvent, device_type: DeviceType) -> Self {
        let event_type = EventType::from_native(raw.code);
        let button = if event_type.has_button() {
            u8::try_from(raw.button).ok().and_then(Button::new)
        } else {
            None
        };
        Self {
            event_type,
            device_type,
            device_index: raw.device_index,
            age: raw.age,
            button,
            axis: [0.0; 2],
        }
    }

    /// New worn state implied by this event, if any.
    ///
    /// The headset proximity sensor reports as a button on the HMD.
    pub fn worn_state_change(&self) -> Option<bool> {
        if self.device_type != DeviceType::Hmd {
            return None;
        }
        match self.event_type {
            EventType::ButtonDown => Some(true),
            EventType::ButtonUp => Some(false),
            _ => None,
        }
    }

    pub fn is(&self, event_type: EventType) -> bool {
        self.event_type == event_type
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (device {}, {:.3}s ago)",
            self.device_type, self.event_type, self.device_index, self.age
        )?;
        if let Some(button) = self.button {
            write!(f, " {button}")?;
        }
        Ok(())
    }
}
