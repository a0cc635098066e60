//! Device discovery and lifetime: open, start, stop, close.

use crate::backend::{CameraBackend, DeviceKey};
use crate::error::{CameraError, HardwareContext, Result};

/// Exclusive handle to one opened capture device.
///
/// Teardown (stop, close, library cleanup) runs once, either through
/// [`Device::close`] or on drop.
pub struct Device<B: CameraBackend> {
    backend: B,
    key: DeviceKey,
    streaming: bool,
    closed: bool,
}

impl<B: CameraBackend> Device<B> {
    /// Scan for devices and open the first one that is not busy.
    ///
    /// On failure the library is cleaned up before the error is returned.
    pub fn open(mut backend: B, enable_logging: bool) -> Result<Self> {
        match open_first_free(&mut backend, enable_logging) {
            Ok(key) => Ok(Self {
                backend,
                key,
                streaming: false,
                closed: false,
            }),
            Err(e) => {
                backend.cleanup();
                Err(e)
            }
        }
    }

    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Reset the frame counter and begin streaming.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.streaming {
            return Ok(());
        }
        tracing::info!("starting the camera");
        self.backend
            .reset_frame_counter()
            .during("reset frame counter")?;
        self.backend.start().during("start streaming")?;
        self.streaming = true;
        tracing::info!("streaming");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.closed || !self.streaming {
            return Ok(());
        }
        self.streaming = false;
        self.backend.stop().during("stop streaming")
    }

    /// Stop streaming and release the device. Later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let stopped = self.stop();
        let closed = self.backend.close_device().during("close device");
        self.backend.cleanup();
        self.closed = true;
        tracing::info!(serial = self.key.serial, "device closed");
        stopped.and(closed)
    }

    /// The library binding, for diagnostics and tests.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(CameraError::Closed)
        } else {
            Ok(())
        }
    }
}

fn open_first_free<B: CameraBackend>(backend: &mut B, enable_logging: bool) -> Result<DeviceKey> {
    if enable_logging {
        backend.enable_logging().during("enable library logging")?;
    }

    let version = backend.library_version().during("query library version")?;
    tracing::info!(version, "capture library loaded");

    tracing::info!("scanning for devices");
    let keys = backend.device_keys().during("enumerate devices")?;
    tracing::info!(count = keys.len(), "device scan complete");

    let Some(key) = keys.iter().find(|key| !key.busy).cloned() else {
        for key in &keys {
            tracing::debug!(serial = key.serial, product = %key.product, "device busy");
        }
        return Err(CameraError::NoFreeDevice {
            scanned: keys.len(),
        });
    };

    backend.open_device(&key).during("open device")?;
    tracing::info!(
        serial = key.serial,
        product = %key.product,
        manufacturer = %key.manufacturer,
        "device opened"
    );
    Ok(key)
}

impl<B: CameraBackend> Drop for Device<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "device teardown failed");
        }
    }
}
