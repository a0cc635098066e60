use serde::Deserialize;
use std::time::Duration;

/// Camera settings handed in by the loader.
///
/// No field has a default here: the only defaults the camera ever falls back
/// to are the ones the hardware reports while sanitizing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CameraConfig {
    /// Sensor port of the left image (1-4).
    pub port_left: u32,
    /// Sensor port of the right image (1-4).
    pub port_right: u32,
    pub gain_left: i32,
    pub gain_right: i32,
    /// Write the gains; when false they are only range-checked.
    pub set_gain: bool,
    /// Exposure times in milliseconds.
    pub exposure_left: f32,
    pub exposure_right: f32,
    /// Write the exposures; when false they are only range-checked.
    pub set_exposure: bool,
    /// How long one acquisition may wait for a frame, in milliseconds.
    pub timeout_ms: u64,
    /// Label stamped on every delivered frame.
    pub frame_id: String,
    /// Switch on the capture library's own log output.
    pub enable_logging: bool,
}

impl CameraConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
