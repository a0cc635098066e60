//! stereocam-hw: hardware core for a dual-sensor capture device.
//!
//! Opens the device, routes property writes to one sensor at a time,
//! negotiates the BGR target format and turns locked hardware images
//! into tightly packed frames.

pub mod acquire;
pub mod backend;
pub mod camera;
pub mod config;
pub mod device;
pub mod error;
pub mod format;
pub mod frame;
pub mod port;
pub mod property;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use backend::{BackendError, CameraBackend, ConvertedImage, DeviceKey, LockedImage};
pub use camera::{Side, StereoCamera};
pub use config::CameraConfig;
pub use device::Device;
pub use error::{CameraError, ErrorKind};
pub use format::{ColorFormat, ImageFormat, TargetFormat};
pub use frame::{Encoding, Frame};
pub use port::{ActiveSensor, Port, SensorSelect};
pub use property::{Applied, PropertyAttribs, PropertyId, PropertyType, PropertyValue, Sanitized};
