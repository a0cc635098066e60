//! Sensor ports and the active-sensor token.
//!
//! The device has a single sensor-select register instead of per-port
//! property addresses. [`Device::activate`] writes that register and hands
//! back an [`ActiveSensor`] that mutably borrows the device, so nothing else
//! can retarget the register while per-sensor calls are in flight.

use crate::backend::CameraBackend;
use crate::device::Device;
use crate::error::{CameraError, HardwareContext, Result};
use std::fmt;

/// Logical sensor port on the capture device (1-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Port(u8);

impl Port {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 4;

    pub fn new(number: u32) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&number) {
            Ok(Self(number as u8))
        } else {
            Err(CameraError::InvalidPort(number))
        }
    }

    pub fn number(self) -> u32 {
        u32::from(self.0)
    }

    pub fn all() -> impl Iterator<Item = Port> {
        (1..=4).map(Port)
    }
}

impl TryFrom<u32> for Port {
    type Error = CameraError;

    fn try_from(number: u32) -> Result<Self> {
        Self::new(number)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Values of the hardware sensor-select property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorSelect {
    Sensor1,
    Sensor2,
    Sensor3,
    Sensor4,
}

impl From<Port> for SensorSelect {
    fn from(port: Port) -> Self {
        match port.0 {
            1 => Self::Sensor1,
            2 => Self::Sensor2,
            3 => Self::Sensor3,
            _ => Self::Sensor4,
        }
    }
}

impl From<SensorSelect> for Port {
    fn from(select: SensorSelect) -> Self {
        match select {
            SensorSelect::Sensor1 => Port(1),
            SensorSelect::Sensor2 => Port(2),
            SensorSelect::Sensor3 => Port(3),
            SensorSelect::Sensor4 => Port(4),
        }
    }
}

/// Proof that `port` is the sensor the select register currently names.
///
/// Property and acquisition calls hang off this type, so they cannot be
/// issued without selecting a sensor first.
pub struct ActiveSensor<'d, B: CameraBackend> {
    device: &'d mut Device<B>,
    port: Port,
}

impl<'d, B: CameraBackend> ActiveSensor<'d, B> {
    pub fn port(&self) -> Port {
        self.port
    }

    pub(crate) fn backend(&self) -> &B {
        self.device.backend()
    }

    pub(crate) fn backend_mut(&mut self) -> &mut B {
        self.device.backend_mut()
    }
}

impl<B: CameraBackend> Device<B> {
    /// Route subsequent per-sensor calls to `port`.
    pub fn activate(&mut self, port: Port) -> Result<ActiveSensor<'_, B>> {
        self.ensure_open()?;
        self.backend_mut()
            .set_sensor_select(SensorSelect::from(port))
            .during("select sensor")?;
        tracing::debug!(port = %port, "sensor activated");
        Ok(ActiveSensor { device: self, port })
    }

    /// Read the select register back.
    pub fn active_port(&self) -> Result<Port> {
        self.ensure_open()?;
        self.backend()
            .sensor_select()
            .map(Port::from)
            .during("read sensor select")
    }
}
