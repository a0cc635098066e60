//! Pixel formats and target-format negotiation.

use crate::backend::CameraBackend;
use crate::error::{CameraError, HardwareContext, Result};
use crate::port::ActiveSensor;
use std::fmt;

/// Color formats the capture library can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    /// 8-bit, blue-green-red.
    Bgr3x8,
    Rgb3x8,
    /// 8-bit, blue-green-red-alpha.
    Bgra4x8,
    Gray8,
    Gray16,
    Yuyv,
    BayerGbrg8,
    BayerGrbg8,
}

impl ColorFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray8 | Self::BayerGbrg8 | Self::BayerGrbg8 => 1,
            Self::Gray16 | Self::Yuyv => 2,
            Self::Bgr3x8 | Self::Rgb3x8 => 3,
            Self::Bgra4x8 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bgr3x8 => "BGR_3X8",
            Self::Rgb3x8 => "RGB_3X8",
            Self::Bgra4x8 => "BGRA_4X8",
            Self::Gray8 => "GRAY_8",
            Self::Gray16 => "GRAY_16",
            Self::Yuyv => "YUYV_4X8",
            Self::BayerGbrg8 => "BAYER_GBRG_8",
            Self::BayerGrbg8 => "BAYER_GRBG_8",
        }
    }
}

impl fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image geometry and color format, as the library lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFormat {
    pub width: u32,
    pub height: u32,
    pub color_format: ColorFormat,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} ({})", self.width, self.height, self.color_format)
    }
}

/// Output format every frame is converted to and packed in.
///
/// Only [`pick_target`] builds one, so the color format is always
/// [`TargetFormat::DESIRED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormat {
    format: ImageFormat,
    pitch: usize,
}

impl TargetFormat {
    /// Blue-green-red, 8 bits per channel. Downstream consumers accept nothing else.
    pub const DESIRED: ColorFormat = ColorFormat::Bgr3x8;

    fn new(format: ImageFormat) -> Self {
        let pitch = format.width as usize * format.color_format.bytes_per_pixel();
        Self { format, pitch }
    }

    pub fn format(&self) -> &ImageFormat {
        &self.format
    }

    /// Packed row pitch of delivered frames, in bytes.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn width(&self) -> u32 {
        self.format.width
    }

    pub fn height(&self) -> u32 {
        self.format.height
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.color_format.bytes_per_pixel()
    }

    /// Size of one packed frame in bytes.
    pub fn frame_len(&self) -> usize {
        self.pitch * self.format.height as usize
    }
}

/// First entry of `candidates` in the desired color format.
pub fn pick_target(candidates: &[ImageFormat]) -> Option<TargetFormat> {
    candidates
        .iter()
        .find(|f| f.color_format == TargetFormat::DESIRED)
        .copied()
        .map(TargetFormat::new)
}

impl<B: CameraBackend> ActiveSensor<'_, B> {
    /// Native capture format of this port. Reported for diagnostics only.
    pub fn source_format(&self) -> Result<ImageFormat> {
        let format = self
            .backend()
            .source_format(self.port())
            .during("query source format")?;
        tracing::info!(port = %self.port(), "selected source format: {format}");
        Ok(format)
    }

    /// Choose the BGR target format from the list the library can convert into.
    pub fn select_target_format(&self) -> Result<TargetFormat> {
        let candidates = self
            .backend()
            .target_formats(self.port())
            .during("query target formats")?;

        let Some(target) = pick_target(&candidates) else {
            tracing::error!(
                port = %self.port(),
                listed = candidates.len(),
                "{} not found in target format list",
                TargetFormat::DESIRED
            );
            return Err(CameraError::TargetFormatUnavailable(TargetFormat::DESIRED));
        };

        tracing::info!(port = %self.port(), pitch = target.pitch, "selected target format: {}", target.format);
        Ok(target)
    }
}
