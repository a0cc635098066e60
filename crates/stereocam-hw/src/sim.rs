//! In-memory capture library for tests and bench runs without hardware.
//!
//! Behaves like a four-port board: per-sensor property tables, a single
//! sensor-select register, a padded BGR conversion and a deterministic test
//! pattern. Every hardware write is recorded so callers can assert on what
//! did (or did not) reach the device.

use crate::backend::{BackendError, CameraBackend, ConvertedImage, DeviceKey, LockedImage};
use crate::format::{ColorFormat, ImageFormat};
use crate::port::{Port, SensorSelect};
use crate::property::{PropertyAttribs, PropertyId, PropertyInfo, PropertyType};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fill byte for row padding in converted images.
pub const PADDING_BYTE: u8 = 0xEE;

/// A state change the simulated library was asked to make.
#[derive(Debug, Clone, PartialEq)]
pub enum HwWrite {
    EnableLogging,
    Open(u32),
    Close,
    Cleanup,
    ResetFrameCounter,
    Start,
    Stop,
    SensorSelect(SensorSelect),
    Int(SensorSelect, PropertyId, i32),
    Float(SensorSelect, PropertyId, f32),
    Bool(SensorSelect, PropertyId, bool),
}

#[derive(Debug, Clone, Copy)]
enum Scalar {
    Int(i32),
    Float(f32),
    Bool(bool),
}

/// Range plus current value.
#[derive(Debug, Clone, Copy)]
enum SimValue {
    Int(PropertyAttribs<i32>, i32),
    Float(PropertyAttribs<f32>, f32),
    Bool(PropertyAttribs<bool>, bool),
}

/// One property as a single sensor exposes it.
#[derive(Debug, Clone)]
pub struct SimProperty {
    description: String,
    supported: bool,
    value: SimValue,
}

impl SimProperty {
    pub fn int(description: &str, attribs: PropertyAttribs<i32>) -> Self {
        Self::new(description, SimValue::Int(attribs, attribs.default))
    }

    pub fn float(description: &str, attribs: PropertyAttribs<f32>) -> Self {
        Self::new(description, SimValue::Float(attribs, attribs.default))
    }

    pub fn boolean(description: &str, attribs: PropertyAttribs<bool>) -> Self {
        Self::new(description, SimValue::Bool(attribs, attribs.default))
    }

    fn new(description: &str, value: SimValue) -> Self {
        Self {
            description: description.to_string(),
            supported: true,
            value,
        }
    }

    fn ty(&self) -> PropertyType {
        match self.value {
            SimValue::Int(..) => PropertyType::Int,
            SimValue::Float(..) => PropertyType::Float,
            SimValue::Bool(..) => PropertyType::Bool,
        }
    }
}

/// Source image handle: which port and which frame of that port.
#[derive(Debug)]
pub struct SimImage {
    port: Port,
    frame: u64,
}

/// Converted image with padded rows.
#[derive(Debug)]
pub struct SimConverted {
    format: ImageFormat,
    pitch: usize,
    data: Vec<u8>,
}

impl ConvertedImage for SimConverted {
    fn format(&self) -> &ImageFormat {
        &self.format
    }

    fn pitch(&self) -> usize {
        self.pitch
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Test pattern byte for `channel` of pixel `(x, y)` in frame `frame` of `port`.
pub fn pattern_value(port: Port, frame: u64, x: u32, y: u32, channel: u32) -> u8 {
    let value = u64::from(x) * 3
        + u64::from(channel)
        + u64::from(y) * 7
        + frame * 5
        + u64::from(port.number()) * 40;
    (value % 256) as u8
}

/// Simulated capture library.
pub struct SimBackend {
    version: u32,
    devices: Vec<DeviceKey>,
    opened: Option<u32>,
    streaming: bool,
    selected: SensorSelect,
    properties: HashMap<(SensorSelect, PropertyId), SimProperty>,
    width: u32,
    height: u32,
    source_color: ColorFormat,
    target_formats: Option<Vec<ImageFormat>>,
    padding: usize,
    frame_counters: HashMap<Port, u64>,
    pending_drops: HashMap<Port, u32>,
    starved: HashSet<Port>,
    failing: HashMap<&'static str, BackendError>,
    writes: Vec<HwWrite>,
    outstanding_locks: usize,
    outstanding_images: usize,
    images_allocated: usize,
    cleanups: Arc<AtomicUsize>,
}

impl Default for SimBackend {
    fn default() -> Self {
        Self::stereo_rig()
    }
}

impl SimBackend {
    /// A 754x480 board with one busy and one free device, gain `[0, 1000]`
    /// (default 500) and exposure `[0.1, 100.0]` ms (default 10.0) on every
    /// sensor.
    pub fn stereo_rig() -> Self {
        Self {
            version: 3_600,
            devices: vec![
                DeviceKey {
                    serial: 1001,
                    product: "VRmagic D3 stereo".to_string(),
                    manufacturer: "VRmagic".to_string(),
                    busy: true,
                },
                DeviceKey {
                    serial: 1002,
                    product: "VRmagic D3 stereo".to_string(),
                    manufacturer: "VRmagic".to_string(),
                    busy: false,
                },
            ],
            opened: None,
            streaming: false,
            selected: SensorSelect::Sensor1,
            properties: HashMap::new(),
            width: 754,
            height: 480,
            source_color: ColorFormat::Gray8,
            target_formats: None,
            padding: 10,
            frame_counters: HashMap::new(),
            pending_drops: HashMap::new(),
            starved: HashSet::new(),
            failing: HashMap::new(),
            writes: Vec::new(),
            outstanding_locks: 0,
            outstanding_images: 0,
            images_allocated: 0,
            cleanups: Arc::new(AtomicUsize::new(0)),
        }
        .with_property(
            None,
            PropertyId::GainMonochrome,
            SimProperty::int(
                "Gain",
                PropertyAttribs {
                    default: 500,
                    min: 0,
                    max: 1000,
                },
            ),
        )
        .with_property(
            None,
            PropertyId::ExposureTime,
            SimProperty::float(
                "Exposure Time",
                PropertyAttribs {
                    default: 10.0,
                    min: 0.1,
                    max: 100.0,
                },
            ),
        )
    }

    #[must_use]
    pub fn with_devices(mut self, devices: Vec<DeviceKey>) -> Self {
        self.devices = devices;
        self
    }

    /// Install `property` on one sensor, or on all four when `port` is `None`.
    #[must_use]
    pub fn with_property(mut self, port: Option<Port>, id: PropertyId, property: SimProperty) -> Self {
        let sensors: Vec<SensorSelect> = match port {
            Some(port) => vec![SensorSelect::from(port)],
            None => Port::all().map(SensorSelect::from).collect(),
        };
        for sensor in sensors {
            self.properties.insert((sensor, id), property.clone());
        }
        self
    }

    /// Mark `id` as unsupported on the sensor behind `port`.
    #[must_use]
    pub fn without_property(mut self, port: Port, id: PropertyId) -> Self {
        if let Some(property) = self.properties.get_mut(&(SensorSelect::from(port), id)) {
            property.supported = false;
        }
        self
    }

    #[must_use]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Replace the default target list (gray, RGB, BGR, BGRA at the rig resolution).
    #[must_use]
    pub fn with_target_formats(mut self, formats: Vec<ImageFormat>) -> Self {
        self.target_formats = Some(formats);
        self
    }

    /// Extra bytes at the end of every converted row.
    #[must_use]
    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// Report `count` dropped frames with the next lock on `port`.
    #[must_use]
    pub fn with_dropped_frames(mut self, port: Port, count: u32) -> Self {
        self.pending_drops.insert(port, count);
        self
    }

    /// Every lock on `port` times out.
    #[must_use]
    pub fn starved(mut self, port: Port) -> Self {
        self.starved.insert(port);
        self
    }

    /// Make the library call named `op` fail with `error`.
    #[must_use]
    pub fn failing_on(mut self, op: &'static str, error: BackendError) -> Self {
        self.failing.insert(op, error);
        self
    }

    pub fn writes(&self) -> &[HwWrite] {
        &self.writes
    }

    pub fn outstanding_locks(&self) -> usize {
        self.outstanding_locks
    }

    pub fn outstanding_images(&self) -> usize {
        self.outstanding_images
    }

    pub fn images_allocated(&self) -> usize {
        self.images_allocated
    }

    /// Current integer value of `id` on the sensor behind `port`.
    pub fn int_setting(&self, port: Port, id: PropertyId) -> Option<i32> {
        match self.properties.get(&(SensorSelect::from(port), id))?.value {
            SimValue::Int(_, value) => Some(value),
            _ => None,
        }
    }

    /// Current float value of `id` on the sensor behind `port`.
    pub fn float_setting(&self, port: Port, id: PropertyId) -> Option<f32> {
        match self.properties.get(&(SensorSelect::from(port), id))?.value {
            SimValue::Float(_, value) => Some(value),
            _ => None,
        }
    }

    /// Shared count of library cleanups. Stays readable after the backend
    /// has been moved into, and dropped with, a device.
    pub fn cleanup_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.cleanups)
    }

    fn check(&self, op: &'static str) -> Result<(), BackendError> {
        match self.failing.get(op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn require_open(&self) -> Result<(), BackendError> {
        match self.opened {
            Some(_) => Ok(()),
            None => Err(BackendError::Library("device not opened".to_string())),
        }
    }

    fn property(&self, id: PropertyId) -> Result<&SimProperty, BackendError> {
        self.require_open()?;
        self.properties
            .get(&(self.selected, id))
            .ok_or_else(|| BackendError::Library(format!("unknown property {id}")))
    }

    fn supported_value(&self, id: PropertyId) -> Result<SimValue, BackendError> {
        let property = self.property(id)?;
        if !property.supported {
            return Err(BackendError::Library(format!(
                "property {id} not supported on {:?}",
                self.selected
            )));
        }
        Ok(property.value)
    }

    fn type_error(id: PropertyId, wanted: PropertyType) -> BackendError {
        BackendError::Library(format!("property {id} is not of type {wanted}"))
    }

    fn store(&mut self, id: PropertyId, value: Scalar) -> Result<(), BackendError> {
        self.require_open()?;
        let selected = self.selected;
        let property = self
            .properties
            .get_mut(&(selected, id))
            .ok_or_else(|| BackendError::Library(format!("unknown property {id}")))?;
        if !property.supported {
            return Err(BackendError::Library(format!(
                "property {id} not supported on {selected:?}"
            )));
        }
        let write = match (&mut property.value, value) {
            (SimValue::Int(_, current), Scalar::Int(v)) => {
                *current = v;
                HwWrite::Int(selected, id, v)
            }
            (SimValue::Float(_, current), Scalar::Float(v)) => {
                *current = v;
                HwWrite::Float(selected, id, v)
            }
            (SimValue::Bool(_, current), Scalar::Bool(v)) => {
                *current = v;
                HwWrite::Bool(selected, id, v)
            }
            _ => return Err(BackendError::Library(format!("type mismatch writing {id}"))),
        };
        self.writes.push(write);
        Ok(())
    }

    fn default_targets(&self) -> Vec<ImageFormat> {
        [
            ColorFormat::Gray8,
            ColorFormat::Rgb3x8,
            ColorFormat::Bgr3x8,
            ColorFormat::Bgra4x8,
        ]
        .into_iter()
        .map(|color_format| ImageFormat {
            width: self.width,
            height: self.height,
            color_format,
        })
        .collect()
    }
}

impl CameraBackend for SimBackend {
    type Image = SimImage;
    type Converted = SimConverted;

    fn enable_logging(&mut self) -> Result<(), BackendError> {
        self.check("enable_logging")?;
        self.writes.push(HwWrite::EnableLogging);
        Ok(())
    }

    fn library_version(&self) -> Result<u32, BackendError> {
        self.check("library_version")?;
        Ok(self.version)
    }

    fn device_keys(&mut self) -> Result<Vec<DeviceKey>, BackendError> {
        self.check("device_keys")?;
        Ok(self.devices.clone())
    }

    fn open_device(&mut self, key: &DeviceKey) -> Result<(), BackendError> {
        self.check("open_device")?;
        if key.busy {
            return Err(BackendError::Library(format!("device {} is busy", key.serial)));
        }
        self.opened = Some(key.serial);
        self.writes.push(HwWrite::Open(key.serial));
        Ok(())
    }

    fn close_device(&mut self) -> Result<(), BackendError> {
        self.check("close_device")?;
        self.opened = None;
        self.writes.push(HwWrite::Close);
        Ok(())
    }

    fn cleanup(&mut self) {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        self.writes.push(HwWrite::Cleanup);
    }

    fn reset_frame_counter(&mut self) -> Result<(), BackendError> {
        self.check("reset_frame_counter")?;
        self.require_open()?;
        self.frame_counters.clear();
        self.writes.push(HwWrite::ResetFrameCounter);
        Ok(())
    }

    fn start(&mut self) -> Result<(), BackendError> {
        self.check("start")?;
        self.require_open()?;
        self.streaming = true;
        self.writes.push(HwWrite::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.check("stop")?;
        self.streaming = false;
        self.writes.push(HwWrite::Stop);
        Ok(())
    }

    fn set_sensor_select(&mut self, select: SensorSelect) -> Result<(), BackendError> {
        self.check("set_sensor_select")?;
        self.require_open()?;
        self.selected = select;
        self.writes.push(HwWrite::SensorSelect(select));
        Ok(())
    }

    fn sensor_select(&self) -> Result<SensorSelect, BackendError> {
        self.require_open()?;
        Ok(self.selected)
    }

    fn source_format(&self, _port: Port) -> Result<ImageFormat, BackendError> {
        self.check("source_format")?;
        self.require_open()?;
        Ok(ImageFormat {
            width: self.width,
            height: self.height,
            color_format: self.source_color,
        })
    }

    fn target_formats(&self, _port: Port) -> Result<Vec<ImageFormat>, BackendError> {
        self.check("target_formats")?;
        self.require_open()?;
        Ok(self
            .target_formats
            .clone()
            .unwrap_or_else(|| self.default_targets()))
    }

    fn property_supported(&self, id: PropertyId) -> Result<bool, BackendError> {
        self.require_open()?;
        Ok(self
            .properties
            .get(&(self.selected, id))
            .is_some_and(|p| p.supported))
    }

    fn property_info(&self, id: PropertyId) -> Result<PropertyInfo, BackendError> {
        let property = self.property(id)?;
        Ok(PropertyInfo {
            id,
            description: property.description.clone(),
            ty: property.ty(),
        })
    }

    fn int_attribs(&self, id: PropertyId) -> Result<PropertyAttribs<i32>, BackendError> {
        match self.supported_value(id)? {
            SimValue::Int(attribs, _) => Ok(attribs),
            _ => Err(Self::type_error(id, PropertyType::Int)),
        }
    }

    fn float_attribs(&self, id: PropertyId) -> Result<PropertyAttribs<f32>, BackendError> {
        match self.supported_value(id)? {
            SimValue::Float(attribs, _) => Ok(attribs),
            _ => Err(Self::type_error(id, PropertyType::Float)),
        }
    }

    fn bool_attribs(&self, id: PropertyId) -> Result<PropertyAttribs<bool>, BackendError> {
        match self.supported_value(id)? {
            SimValue::Bool(attribs, _) => Ok(attribs),
            _ => Err(Self::type_error(id, PropertyType::Bool)),
        }
    }

    fn int_value(&self, id: PropertyId) -> Result<i32, BackendError> {
        match self.supported_value(id)? {
            SimValue::Int(_, value) => Ok(value),
            _ => Err(Self::type_error(id, PropertyType::Int)),
        }
    }

    fn float_value(&self, id: PropertyId) -> Result<f32, BackendError> {
        match self.supported_value(id)? {
            SimValue::Float(_, value) => Ok(value),
            _ => Err(Self::type_error(id, PropertyType::Float)),
        }
    }

    fn bool_value(&self, id: PropertyId) -> Result<bool, BackendError> {
        match self.supported_value(id)? {
            SimValue::Bool(_, value) => Ok(value),
            _ => Err(Self::type_error(id, PropertyType::Bool)),
        }
    }

    fn set_int(&mut self, id: PropertyId, value: i32) -> Result<(), BackendError> {
        self.check("set_int")?;
        self.store(id, Scalar::Int(value))
    }

    fn set_float(&mut self, id: PropertyId, value: f32) -> Result<(), BackendError> {
        self.check("set_float")?;
        self.store(id, Scalar::Float(value))
    }

    fn set_bool(&mut self, id: PropertyId, value: bool) -> Result<(), BackendError> {
        self.check("set_bool")?;
        self.store(id, Scalar::Bool(value))
    }

    fn lock_next_image(
        &mut self,
        port: Port,
        timeout: Duration,
    ) -> Result<LockedImage<SimImage>, BackendError> {
        self.check("lock_next_image")?;
        if !self.streaming {
            return Err(BackendError::Library("device not streaming".to_string()));
        }
        if self.starved.contains(&port) {
            return Err(BackendError::Timeout(timeout));
        }

        let counter = self.frame_counters.entry(port).or_insert(0);
        let frame = *counter;
        *counter += 1;
        let frames_dropped = self.pending_drops.remove(&port).unwrap_or(0);

        self.outstanding_locks += 1;
        Ok(LockedImage {
            image: SimImage { port, frame },
            frames_dropped,
        })
    }

    fn unlock_image(&mut self, _image: SimImage) -> Result<(), BackendError> {
        self.outstanding_locks = self.outstanding_locks.saturating_sub(1);
        self.check("unlock_image")
    }

    fn new_image(&mut self, format: &ImageFormat) -> Result<SimConverted, BackendError> {
        self.check("new_image")?;
        let pitch = format.width as usize * format.color_format.bytes_per_pixel() + self.padding;
        self.images_allocated += 1;
        self.outstanding_images += 1;
        Ok(SimConverted {
            format: *format,
            pitch,
            data: vec![PADDING_BYTE; pitch * format.height as usize],
        })
    }

    fn convert_image(
        &mut self,
        source: &SimImage,
        target: &mut SimConverted,
    ) -> Result<(), BackendError> {
        self.check("convert_image")?;
        if target.format.color_format != ColorFormat::Bgr3x8 {
            return Err(BackendError::Library(format!(
                "conversion to {} not simulated",
                target.format.color_format
            )));
        }
        let pitch = target.pitch;
        let row_len = target.format.width as usize * 3;
        let height = target.format.height as usize;
        for (y, row) in target.data.chunks_mut(pitch).take(height).enumerate() {
            for (x, pixel) in row[..row_len].chunks_mut(3).enumerate() {
                for (channel, byte) in pixel.iter_mut().enumerate() {
                    *byte = pattern_value(
                        source.port,
                        source.frame,
                        x as u32,
                        y as u32,
                        channel as u32,
                    );
                }
            }
        }
        Ok(())
    }

    fn free_image(&mut self, _image: SimConverted) -> Result<(), BackendError> {
        self.outstanding_images = self.outstanding_images.saturating_sub(1);
        self.check("free_image")
    }
}
