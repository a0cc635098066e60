//! Stereo camera: the configured device, ready to grab left and right frames.

use crate::backend::CameraBackend;
use crate::config::CameraConfig;
use crate::device::Device;
use crate::error::Result;
use crate::format::TargetFormat;
use crate::frame::Frame;
use crate::port::Port;
use crate::property::{PropertyId, PropertyValue};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Which half of the stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

/// An opened, configured and streaming stereo device.
pub struct StereoCamera<B: CameraBackend> {
    device: Device<B>,
    left: Port,
    right: Port,
    target: TargetFormat,
    timeout: Duration,
    frame_id: String,
}

impl<B: CameraBackend> StereoCamera<B> {
    /// Open the first free device, negotiate the target format, apply the
    /// gain and exposure settings to both sensors and start streaming.
    ///
    /// Ports are validated before the library is touched. On any error the
    /// partially opened device is closed again.
    pub fn open(backend: B, config: &CameraConfig) -> Result<Self> {
        let left = Port::new(config.port_left)?;
        let right = Port::new(config.port_right)?;

        let mut device = Device::open(backend, config.enable_logging)?;
        device.activate(left)?;
        device.activate(right)?;

        let target = {
            let sensor = device.activate(left)?;
            sensor.source_format()?;
            sensor.select_target_format()?
        };

        configure(
            &mut device,
            left,
            PropertyId::GainMonochrome,
            config.gain_left,
            "gain_left",
            config.set_gain,
        )?;
        configure(
            &mut device,
            right,
            PropertyId::GainMonochrome,
            config.gain_right,
            "gain_right",
            config.set_gain,
        )?;
        configure(
            &mut device,
            left,
            PropertyId::ExposureTime,
            config.exposure_left,
            "exposure_left",
            config.set_exposure,
        )?;
        configure(
            &mut device,
            right,
            PropertyId::ExposureTime,
            config.exposure_right,
            "exposure_right",
            config.set_exposure,
        )?;

        device.start()?;

        Ok(Self {
            device,
            left,
            right,
            target,
            timeout: config.timeout(),
            frame_id: config.frame_id.clone(),
        })
    }

    pub fn port(&self, side: Side) -> Port {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn target_format(&self) -> &TargetFormat {
        &self.target
    }

    pub fn device(&self) -> &Device<B> {
        &self.device
    }

    /// Acquire one frame from `side`, stamped with `trigger`.
    pub fn grab(&mut self, side: Side, trigger: DateTime<Utc>) -> Result<Frame> {
        let port = self.port(side);
        self.device
            .activate(port)?
            .acquire(&self.target, self.timeout, &self.frame_id, trigger)
    }

    pub fn grab_left(&mut self, trigger: DateTime<Utc>) -> Result<Frame> {
        self.grab(Side::Left, trigger)
    }

    pub fn grab_right(&mut self, trigger: DateTime<Utc>) -> Result<Frame> {
        self.grab(Side::Right, trigger)
    }

    /// Left then right, both stamped with the same trigger time.
    pub fn grab_pair(&mut self, trigger: DateTime<Utc>) -> Result<(Frame, Frame)> {
        let left = self.grab_left(trigger)?;
        let right = self.grab_right(trigger)?;
        Ok((left, right))
    }

    /// Stop streaming and release the device.
    pub fn close(mut self) -> Result<()> {
        self.device.close()
    }
}

/// Sanitize one setting on `port` and, if `write` is set, apply the result.
fn configure<B: CameraBackend, V: PropertyValue>(
    device: &mut Device<B>,
    port: Port,
    id: PropertyId,
    value: V,
    name: &str,
    write: bool,
) -> Result<()> {
    let mut sensor = device.activate(port)?;
    let Some(value) = sensor.sanitize(id, value, name)?.value() else {
        return Ok(());
    };
    if write {
        sensor.apply(id, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CameraError;
    use crate::sim::{HwWrite, SimBackend};

    fn config() -> CameraConfig {
        CameraConfig {
            port_left: 1,
            port_right: 2,
            gain_left: 300,
            gain_right: 400,
            set_gain: true,
            exposure_left: 5.0,
            exposure_right: 6.0,
            set_exposure: false,
            timeout_ms: 200,
            frame_id: "stereo_cam".to_string(),
            enable_logging: false,
        }
    }

    #[test]
    fn test_open_configures_and_streams() {
        let camera = StereoCamera::open(SimBackend::stereo_rig(), &config()).unwrap();
        assert!(camera.device().is_streaming());
        assert_eq!(camera.port(Side::Left).number(), 1);
        assert_eq!(camera.port(Side::Right).number(), 2);

        let backend = camera.device().backend();
        assert_eq!(backend.int_setting(Port::new(1).unwrap(), PropertyId::GainMonochrome), Some(300));
        assert_eq!(backend.int_setting(Port::new(2).unwrap(), PropertyId::GainMonochrome), Some(400));
        // set_exposure is off: range-checked only.
        assert!(!backend.writes().iter().any(|w| matches!(w, HwWrite::Float(..))));
    }

    #[test]
    fn test_invalid_port_rejected_before_open() {
        let mut cfg = config();
        cfg.port_right = 5;
        let err = StereoCamera::open(SimBackend::stereo_rig(), &cfg).err().unwrap();
        assert!(matches!(err, CameraError::InvalidPort(5)));
    }

    #[test]
    fn test_grab_pair_shares_trigger() {
        let mut camera = StereoCamera::open(SimBackend::stereo_rig(), &config()).unwrap();
        let trigger = Utc::now();
        let (left, right) = camera.grab_pair(trigger).unwrap();
        assert_eq!(left.timestamp, trigger);
        assert_eq!(right.timestamp, trigger);
        assert_eq!(left.port.number(), 1);
        assert_eq!(right.port.number(), 2);
        assert_eq!(left.frame_id, "stereo_cam");
        assert_eq!(left.width, camera.target_format().width());
    }

    #[test]
    fn test_close_stops_device() {
        let camera = StereoCamera::open(SimBackend::stereo_rig(), &config()).unwrap();
        camera.close().unwrap();
    }
}
