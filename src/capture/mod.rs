//! Camera platform access.
//!
//! This module provides the device model, the constraint table keyed by
//! device class, and a trait-based abstraction over the platform camera API.
//! The camera is only a source of streams here; decoding happens elsewhere.

mod camera;
mod constraints;
mod device;
#[cfg(feature = "camera")]
mod native;
mod probe;

pub use camera::{
    CameraPlatform, MediaStream, MockCameraPlatform, MockStream, PlatformError, StreamLedger,
    StreamRecord, TrackCapabilities, TrackSettings,
};
pub use constraints::{
    ConstraintError, ConstraintProfile, ConstraintTable, FacingMode, MediaConstraints, PatchSize,
    Range,
};
pub use device::{CameraDevice, DeviceClass, FacingHint};
#[cfg(feature = "camera")]
pub use native::{NokhwaPlatform, NokhwaStream};
pub use probe::{probe_cameras, CameraInfo};
