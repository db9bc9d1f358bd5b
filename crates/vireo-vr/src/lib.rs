#![forbid(unsafe_code)]

pub mod config;
pub mod controller;
pub mod device;
pub mod event;
pub mod face;
pub mod runtime;
pub mod system;
pub mod transform;
pub mod view;

pub use config::VrConfig;
pub use controller::{axis_sector, Button, Controller, Hand, MAX_AXES};
pub use device::{DeviceIndexRegistry, DeviceTracker, DeviceType, TrackedDevice};
pub use event::{Event, EventType};
pub use face::{EyeData, EyeSample, FaceSensor, FaceTracker, FaceTrackerCallbacks, LipData};
pub use runtime::{
    ControllerState, DeviceClass, DeviceIndex, NativeEvent, RawPose, TrackingRuntime,
    MAX_TRACKED_DEVICES,
};
pub use system::VrSystem;
pub use transform::{Matrix4, Vec4};
pub use view::{Eye, EyeTransforms};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VrError {
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("sensor error: {0}")]
    Sensor(String),
}

pub type VrResult<T> = Result<T, VrError>;
