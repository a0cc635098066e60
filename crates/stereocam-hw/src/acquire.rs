//! Frame acquisition: lock, convert, unlock, repack, free.
//!
//! Every hardware buffer taken in here is handed back before returning,
//! whichever step fails.

use crate::backend::{CameraBackend, ConvertedImage};
use crate::error::{CameraError, HardwareContext, Result};
use crate::format::TargetFormat;
use crate::frame::{pack_rows, Encoding, Frame};
use crate::port::ActiveSensor;
use chrono::{DateTime, Utc};
use std::time::Duration;

impl<B: CameraBackend> ActiveSensor<'_, B> {
    /// Wait up to `timeout` for the next image on this port and deliver it
    /// packed in `target`, stamped with `trigger` and `frame_id`.
    ///
    /// A timeout or lock failure is returned as [`CameraError::Acquisition`];
    /// no frame is produced and nothing is retried.
    pub fn acquire(
        &mut self,
        target: &TargetFormat,
        timeout: Duration,
        frame_id: &str,
        trigger: DateTime<Utc>,
    ) -> Result<Frame> {
        let port = self.port();
        let locked = self
            .backend_mut()
            .lock_next_image(port, timeout)
            .map_err(|source| CameraError::Acquisition { port, source })?;

        if locked.frames_dropped > 0 {
            tracing::warn!(port = %port, dropped = locked.frames_dropped, "frames dropped");
        }

        let backend = self.backend_mut();
        let converted = convert_locked(backend, locked.image, target)?;

        let format = *converted.format();
        let packed = pack_rows(
            converted.data(),
            converted.pitch(),
            format.width as usize,
            format.height as usize,
            target.bytes_per_pixel(),
        );
        let freed = backend.free_image(converted).during("free target image");
        let data = packed?;
        freed?;

        let step = format.width * Encoding::Bgr8.bytes_per_pixel() as u32;
        tracing::trace!(port = %port, width = format.width, height = format.height, "frame acquired");

        Ok(Frame {
            data,
            width: format.width,
            height: format.height,
            step,
            encoding: Encoding::Bgr8,
            timestamp: trigger,
            frame_id: frame_id.to_string(),
            port,
            frames_dropped: locked.frames_dropped,
        })
    }
}

/// Convert a locked source image into a fresh target image and unlock the source.
fn convert_locked<B: CameraBackend>(
    backend: &mut B,
    source: B::Image,
    target: &TargetFormat,
) -> Result<B::Converted> {
    let converted = match backend.new_image(target.format()).during("allocate target image") {
        Ok(mut image) => match backend.convert_image(&source, &mut image).during("convert image") {
            Ok(()) => Ok(image),
            Err(e) => {
                release(backend, image);
                Err(e)
            }
        },
        Err(e) => Err(e),
    };

    let unlocked = backend.unlock_image(source).during("unlock image");
    match (converted, unlocked) {
        (Ok(image), Ok(())) => Ok(image),
        (Ok(image), Err(e)) => {
            release(backend, image);
            Err(e)
        }
        (Err(e), _) => Err(e),
    }
}

/// Free a target image on an error path, where the first error wins.
fn release<B: CameraBackend>(backend: &mut B, image: B::Converted) {
    if let Err(e) = backend.free_image(image) {
        tracing::warn!(error = %e, "failed to free target image");
    }
}
