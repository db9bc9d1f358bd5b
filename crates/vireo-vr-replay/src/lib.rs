//! Scripted playback of a tracking session.
//!
//! [`ReplayRuntime`] implements [`vireo_vr::TrackingRuntime`] from a JSON
//! [`Script`], so the whole frame loop can run without a headset.

#![forbid(unsafe_code)]

pub mod runtime;
pub mod script;
pub mod sensor;

pub use runtime::{HapticPulse, ReplayRuntime};
pub use script::{DeviceFrame, Frame, Roles, Script};
pub use sensor::ReplayEyeSensor;
