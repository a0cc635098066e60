//! Typed property access on the active sensor: describe, read, sanitize, apply.
//!
//! Integer, float and boolean properties share one code path through
//! [`PropertyValue`]; the trait carries the type tag, the backend calls for
//! that type and how values are printed.

use crate::backend::{BackendError, CameraBackend};
use crate::error::{CameraError, HardwareContext, Result};
use crate::port::ActiveSensor;
use std::fmt;

/// Hardware property identifiers used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
    /// Monochrome sensor gain (integer).
    GainMonochrome,
    /// Exposure time in milliseconds (float).
    ExposureTime,
    /// Any other vendor property, by its numeric id.
    Raw(u32),
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GainMonochrome => f.write_str("CAM_GAIN_MONOCHROME_I"),
            Self::ExposureTime => f.write_str("CAM_EXPOSURE_TIME_F"),
            Self::Raw(id) => write!(f, "PROPID_{id:#06x}"),
        }
    }
}

/// Declared value type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Int,
    Float,
    Bool,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        })
    }
}

/// Static description the library reports for a property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub id: PropertyId,
    /// Human-readable name, e.g. "Gain".
    pub description: String,
    pub ty: PropertyType,
}

/// [`PropertyInfo`] plus whether the active sensor has the property at all.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    pub info: PropertyInfo,
    pub supported: bool,
}

/// Valid range and default as reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyAttribs<T> {
    pub default: T,
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> PropertyAttribs<T> {
    /// Inclusive range check. NaN is never in range.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A Rust type that maps onto one of the hardware property types.
pub trait PropertyValue: Copy + PartialOrd + fmt::Debug {
    const KIND: PropertyType;

    fn read_attribs<B: CameraBackend>(
        backend: &B,
        id: PropertyId,
    ) -> std::result::Result<PropertyAttribs<Self>, BackendError>;

    fn read<B: CameraBackend>(backend: &B, id: PropertyId)
        -> std::result::Result<Self, BackendError>;

    fn write<B: CameraBackend>(
        self,
        backend: &mut B,
        id: PropertyId,
    ) -> std::result::Result<(), BackendError>;

    /// Log representation.
    fn display(self) -> String;
}

impl PropertyValue for i32 {
    const KIND: PropertyType = PropertyType::Int;

    fn read_attribs<B: CameraBackend>(
        backend: &B,
        id: PropertyId,
    ) -> std::result::Result<PropertyAttribs<Self>, BackendError> {
        backend.int_attribs(id)
    }

    fn read<B: CameraBackend>(backend: &B, id: PropertyId) -> std::result::Result<Self, BackendError> {
        backend.int_value(id)
    }

    fn write<B: CameraBackend>(
        self,
        backend: &mut B,
        id: PropertyId,
    ) -> std::result::Result<(), BackendError> {
        backend.set_int(id, self)
    }

    fn display(self) -> String {
        self.to_string()
    }
}

impl PropertyValue for f32 {
    const KIND: PropertyType = PropertyType::Float;

    fn read_attribs<B: CameraBackend>(
        backend: &B,
        id: PropertyId,
    ) -> std::result::Result<PropertyAttribs<Self>, BackendError> {
        backend.float_attribs(id)
    }

    fn read<B: CameraBackend>(backend: &B, id: PropertyId) -> std::result::Result<Self, BackendError> {
        backend.float_value(id)
    }

    fn write<B: CameraBackend>(
        self,
        backend: &mut B,
        id: PropertyId,
    ) -> std::result::Result<(), BackendError> {
        backend.set_float(id, self)
    }

    fn display(self) -> String {
        format!("{self:.3}")
    }
}

impl PropertyValue for bool {
    const KIND: PropertyType = PropertyType::Bool;

    fn read_attribs<B: CameraBackend>(
        backend: &B,
        id: PropertyId,
    ) -> std::result::Result<PropertyAttribs<Self>, BackendError> {
        backend.bool_attribs(id)
    }

    fn read<B: CameraBackend>(backend: &B, id: PropertyId) -> std::result::Result<Self, BackendError> {
        backend.bool_value(id)
    }

    fn write<B: CameraBackend>(
        self,
        backend: &mut B,
        id: PropertyId,
    ) -> std::result::Result<(), BackendError> {
        backend.set_bool(id, self)
    }

    fn display(self) -> String {
        u8::from(self).to_string()
    }
}

/// Result of checking a configured value against the hardware range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sanitized<V> {
    /// Inside the reported range; use as is.
    Valid(V),
    /// Outside the range; the hardware default replaces it.
    Replaced {
        original: V,
        range: PropertyAttribs<V>,
    },
    /// The active sensor lacks the property, so there is no range to check against.
    Unchecked(V),
    /// The hardware declares a different type. Nothing may be written.
    TypeMismatch { declared: PropertyType },
}

impl<V: Copy> Sanitized<V> {
    /// The value to write, if any.
    pub fn value(&self) -> Option<V> {
        match self {
            Self::Valid(value) | Self::Unchecked(value) => Some(*value),
            Self::Replaced { range, .. } => Some(range.default),
            Self::TypeMismatch { .. } => None,
        }
    }
}

/// Outcome of writing a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Written,
    /// Not present on this sensor; skipped without a write.
    Unsupported,
}

impl<B: CameraBackend> ActiveSensor<'_, B> {
    pub fn describe(&self, id: PropertyId) -> Result<PropertyDescriptor> {
        let supported = self
            .backend()
            .property_supported(id)
            .during("query property support")?;
        let info = self
            .backend()
            .property_info(id)
            .during("query property info")?;
        Ok(PropertyDescriptor { info, supported })
    }

    /// Read the current value of a property on this sensor.
    pub fn get<V: PropertyValue>(&self, id: PropertyId) -> Result<V> {
        let descriptor = self.describe(id)?;
        if descriptor.info.ty != V::KIND {
            return Err(CameraError::PropertyType {
                id,
                declared: descriptor.info.ty,
                expected: V::KIND,
            });
        }
        if !descriptor.supported {
            return Err(CameraError::PropertyUnsupported {
                id,
                port: self.port(),
            });
        }
        V::read(self.backend(), id).during("read property")
    }

    /// Check `value` against the range this sensor reports for `id`.
    ///
    /// Out-of-range values come back replaced by the hardware default.
    /// `name` is the configuration key used in warnings.
    pub fn sanitize<V: PropertyValue>(
        &self,
        id: PropertyId,
        value: V,
        name: &str,
    ) -> Result<Sanitized<V>> {
        let port = self.port();
        let descriptor = self.describe(id)?;

        if descriptor.info.ty != V::KIND {
            tracing::error!(
                parameter = name,
                port = %port,
                property = %id,
                declared = %descriptor.info.ty,
                expected = %V::KIND,
                "invalid type of property, leaving it untouched"
            );
            return Ok(Sanitized::TypeMismatch {
                declared: descriptor.info.ty,
            });
        }

        if !descriptor.supported {
            tracing::debug!(parameter = name, port = %port, property = %id, "no range on this sensor");
            return Ok(Sanitized::Unchecked(value));
        }

        let range = V::read_attribs(self.backend(), id).during("query property range")?;
        if range.contains(value) {
            return Ok(Sanitized::Valid(value));
        }

        tracing::warn!(
            parameter = name,
            port = %port,
            "invalid value for {name}, has to be in [{},{}], but was: {}",
            range.min.display(),
            range.max.display(),
            value.display()
        );
        tracing::warn!(
            parameter = name,
            port = %port,
            "default will be used for {name}: {}",
            range.default.display()
        );
        Ok(Sanitized::Replaced {
            original: value,
            range,
        })
    }

    /// Write `value` if this sensor supports `id`; warn and skip otherwise.
    pub fn apply<V: PropertyValue>(&mut self, id: PropertyId, value: V) -> Result<Applied> {
        let port = self.port();
        let descriptor = self.describe(id)?;

        if !descriptor.supported {
            tracing::warn!(
                port = %port,
                property = %descriptor.info.description,
                "property not supported"
            );
            return Ok(Applied::Unsupported);
        }

        value
            .write(self.backend_mut(), id)
            .during("write property")?;
        tracing::info!(
            port = %port,
            "{} changed to: {}",
            descriptor.info.description,
            value.display()
        );
        Ok(Applied::Written)
    }
}
