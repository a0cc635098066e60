//! Frame type and the strided-to-packed row copy.

use crate::port::Port;
use chrono::{DateTime, Utc};

/// Pixel encoding of delivered frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Packed 8-bit blue-green-red.
    Bgr8,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bgr8 => "bgr8",
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgr8 => 3,
        }
    }
}

/// One acquired, tightly packed image.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Pixel rows back to back, `height * step` bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row. Always `width * 3`; no padding.
    pub step: u32,
    pub encoding: Encoding,
    /// Trigger time supplied by the caller, not the hardware clock.
    pub timestamp: DateTime<Utc>,
    pub frame_id: String,
    pub port: Port,
    /// Frames the hardware discarded on this port since the last acquisition.
    pub frames_dropped: u32,
}

impl Frame {
    /// The `(b, g, r)` triple at `(x, y)`, if inside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.step as usize + x as usize * 3;
        let px = self.data.get(offset..offset + 3)?;
        Some((px[0], px[1], px[2]))
    }
}

/// Copy `height` rows of `width * bytes_per_pixel` bytes out of a buffer whose
/// rows are `pitch` bytes apart, dropping the padding between them.
pub fn pack_rows(
    src: &[u8],
    pitch: usize,
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> Result<Vec<u8>, FrameError> {
    let row = width * bytes_per_pixel;
    if pitch < row {
        return Err(FrameError::PitchTooSmall { pitch, row });
    }
    if height == 0 || row == 0 {
        return Ok(Vec::new());
    }
    // The last row need not carry its padding.
    let needed = pitch * (height - 1) + row;
    if src.len() < needed {
        return Err(FrameError::InvalidLength {
            expected: needed,
            actual: src.len(),
        });
    }

    let mut packed = Vec::with_capacity(row * height);
    for line in src.chunks(pitch).take(height) {
        packed.extend_from_slice(&line[..row]);
    }
    Ok(packed)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected at least {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("pitch {pitch} shorter than a row of {row} bytes")]
    PitchTooSmall { pitch: usize, row: usize },
}
