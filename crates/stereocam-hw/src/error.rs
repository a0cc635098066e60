use crate::backend::BackendError;
use crate::format::ColorFormat;
use crate::frame::FrameError;
use crate::port::Port;
use crate::property::{PropertyId, PropertyType};
use thiserror::Error;

/// Conditions the camera cannot continue from.
///
/// Property problems met while configuring (out of range, unsupported,
/// wrong type) are not errors; sanitize and apply return them as
/// [`crate::Sanitized`] and [`crate::Applied`] outcomes.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("{op} failed: {source}")]
    Hardware {
        op: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("no free device found ({scanned} scanned)")]
    NoFreeDevice { scanned: usize },
    #[error("invalid sensor port {0} (expected 1-4)")]
    InvalidPort(u32),
    #[error("{0} not found in target format list")]
    TargetFormatUnavailable(ColorFormat),
    #[error("property {id} is declared {declared}, not {expected}")]
    PropertyType {
        id: PropertyId,
        declared: PropertyType,
        expected: PropertyType,
    },
    #[error("property {id} not supported on port {port}")]
    PropertyUnsupported { id: PropertyId, port: Port },
    #[error("could not lock image on port {port}: {source}")]
    Acquisition {
        port: Port,
        #[source]
        source: BackendError,
    },
    #[error("frame repack failed: {0}")]
    Frame(#[from] FrameError),
    #[error("device already closed")]
    Closed,
}

/// Coarse classification for the top-level termination decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The library or device misbehaved.
    HardwareFault,
    /// The configuration asks for something this device cannot do.
    Configuration,
}

impl CameraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPort(_)
            | Self::TargetFormatUnavailable(_)
            | Self::PropertyType { .. }
            | Self::PropertyUnsupported { .. } => ErrorKind::Configuration,
            Self::Hardware { .. }
            | Self::NoFreeDevice { .. }
            | Self::Acquisition { .. }
            | Self::Frame(_)
            | Self::Closed => ErrorKind::HardwareFault,
        }
    }

    /// True when the lock gave up waiting rather than failing outright.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Acquisition {
                source: BackendError::Timeout(_),
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// Tag a backend failure with the operation that produced it.
pub(crate) trait HardwareContext<T> {
    fn during(self, op: &'static str) -> Result<T>;
}

impl<T> HardwareContext<T> for std::result::Result<T, BackendError> {
    fn during(self, op: &'static str) -> Result<T> {
        self.map_err(|source| CameraError::Hardware { op, source })
    }
}
