//! The hardware seam: one trait covering the vendor capture library.
//!
//! Every method maps onto a single library call. Nothing here knows about
//! sanitizing, token ordering or packing; that lives in the modules above.

use crate::format::ImageFormat;
use crate::port::{Port, SensorSelect};
use crate::property::{PropertyAttribs, PropertyId, PropertyInfo};
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the capture library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// No image became available on the port within the timeout.
    #[error("no image within {0:?}")]
    Timeout(Duration),
    /// Any other library failure, carrying the library's last-error text.
    #[error("{0}")]
    Library(String),
}

/// One entry of the library's device list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceKey {
    pub serial: u32,
    pub product: String,
    pub manufacturer: String,
    /// Already opened by another process.
    pub busy: bool,
}

/// A source image locked on a port, with the drop count reported alongside it.
#[derive(Debug)]
pub struct LockedImage<I> {
    pub image: I,
    /// Frames the hardware discarded since the previous successful lock on this port.
    pub frames_dropped: u32,
}

/// Read access to a converted image owned by the library.
pub trait ConvertedImage {
    fn format(&self) -> &ImageFormat;
    /// Bytes per row, padding included.
    fn pitch(&self) -> usize;
    fn data(&self) -> &[u8];
}

/// Abstraction over the vendor capture library for a single device handle.
///
/// Per-sensor property calls act on whichever sensor the select register
/// currently names; callers go through [`crate::port::ActiveSensor`] to keep
/// that straight.
pub trait CameraBackend {
    /// Hardware-owned source image returned by a lock.
    type Image;
    /// Library-allocated image in the target format.
    type Converted: ConvertedImage;

    /// Turn on the library's own verbose log output.
    fn enable_logging(&mut self) -> Result<(), BackendError>;
    fn library_version(&self) -> Result<u32, BackendError>;
    /// Scan the bus and list every device the library can see.
    fn device_keys(&mut self) -> Result<Vec<DeviceKey>, BackendError>;
    fn open_device(&mut self, key: &DeviceKey) -> Result<(), BackendError>;
    fn close_device(&mut self) -> Result<(), BackendError>;
    /// Release library-wide resources. Called once, after the device is closed.
    fn cleanup(&mut self);

    fn reset_frame_counter(&mut self) -> Result<(), BackendError>;
    fn start(&mut self) -> Result<(), BackendError>;
    fn stop(&mut self) -> Result<(), BackendError>;

    fn set_sensor_select(&mut self, select: SensorSelect) -> Result<(), BackendError>;
    fn sensor_select(&self) -> Result<SensorSelect, BackendError>;

    fn source_format(&self, port: Port) -> Result<ImageFormat, BackendError>;
    fn target_formats(&self, port: Port) -> Result<Vec<ImageFormat>, BackendError>;

    fn property_supported(&self, id: PropertyId) -> Result<bool, BackendError>;
    fn property_info(&self, id: PropertyId) -> Result<PropertyInfo, BackendError>;
    fn int_attribs(&self, id: PropertyId) -> Result<PropertyAttribs<i32>, BackendError>;
    fn float_attribs(&self, id: PropertyId) -> Result<PropertyAttribs<f32>, BackendError>;
    fn bool_attribs(&self, id: PropertyId) -> Result<PropertyAttribs<bool>, BackendError>;
    fn int_value(&self, id: PropertyId) -> Result<i32, BackendError>;
    fn float_value(&self, id: PropertyId) -> Result<f32, BackendError>;
    fn bool_value(&self, id: PropertyId) -> Result<bool, BackendError>;
    fn set_int(&mut self, id: PropertyId, value: i32) -> Result<(), BackendError>;
    fn set_float(&mut self, id: PropertyId, value: f32) -> Result<(), BackendError>;
    fn set_bool(&mut self, id: PropertyId, value: bool) -> Result<(), BackendError>;

    /// Block for up to `timeout` until the next image on `port` is available.
    fn lock_next_image(
        &mut self,
        port: Port,
        timeout: Duration,
    ) -> Result<LockedImage<Self::Image>, BackendError>;
    fn unlock_image(&mut self, image: Self::Image) -> Result<(), BackendError>;
    fn new_image(&mut self, format: &ImageFormat) -> Result<Self::Converted, BackendError>;
    fn convert_image(
        &mut self,
        source: &Self::Image,
        target: &mut Self::Converted,
    ) -> Result<(), BackendError>;
    fn free_image(&mut self, image: Self::Converted) -> Result<(), BackendError>;
}
