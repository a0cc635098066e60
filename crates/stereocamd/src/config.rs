use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use stereocam_hw::CameraConfig;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },
    #[error("trigger rate {0} Hz does not give a usable period")]
    Rate(f64),
}

/// Driver configuration: a `[camera]` table handed to the hardware core and
/// a `[driver]` table for the trigger loop.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Trigger frequency in Hz; one stereo pair per trigger.
    pub rate_hz: f64,
    /// Stop after this many pairs. Runs until interrupted when unset.
    pub max_pairs: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            rate_hz: 20.0,
            max_pairs: None,
        }
    }
}

impl DriverConfig {
    /// Time between triggers. Rejects rates whose period is zero or does not
    /// fit in a `Duration`.
    pub fn period(&self) -> Result<Duration, ConfigError> {
        match Duration::try_from_secs_f64(1.0 / self.rate_hz) {
            Ok(period) if self.rate_hz > 0.0 && !period.is_zero() => Ok(period),
            _ => Err(ConfigError::Rate(self.rate_hz)),
        }
    }
}

impl Config {
    /// Load from a TOML file, then apply `STEREOCAM_*` overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Override selected fields from the environment. `lookup` is
    /// `std::env::var` outside of tests.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(frame_id) = lookup("STEREOCAM_FRAME_ID") {
            self.camera.frame_id = frame_id;
        }
        if let Some(timeout) = env_parse(&lookup, "STEREOCAM_TIMEOUT_MS")? {
            self.camera.timeout_ms = timeout;
        }
        if let Some(rate) = env_parse(&lookup, "STEREOCAM_RATE_HZ")? {
            self.driver.rate_hz = rate;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.driver.period().map(|_| ())
    }
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { key, value }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[camera]
port_left = 1
port_right = 2
gain_left = 500
gain_right = 520
set_gain = true
exposure_left = 12.5
exposure_right = 12.5
set_exposure = false
timeout_ms = 1000
frame_id = "stereo_optical"
enable_logging = false

[driver]
rate_hz = 10.0
max_pairs = 50
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.camera.port_left, 1);
        assert_eq!(config.camera.gain_right, 520);
        assert!(!config.camera.set_exposure);
        assert_eq!(config.camera.timeout(), Duration::from_secs(1));
        assert_eq!(config.driver.max_pairs, Some(50));
        assert_eq!(config.driver.period().unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn test_driver_table_optional() {
        let camera_only = SAMPLE.split("[driver]").next().unwrap();
        let config = Config::from_toml(camera_only).unwrap();
        assert_eq!(config.driver.rate_hz, 20.0);
        assert_eq!(config.driver.max_pairs, None);
    }

    #[test]
    fn test_camera_fields_required() {
        let missing = SAMPLE.replace("timeout_ms = 1000\n", "");
        assert!(matches!(Config::from_toml(&missing), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config
            .apply_env(env(&[
                ("STEREOCAM_FRAME_ID", "rig_b"),
                ("STEREOCAM_TIMEOUT_MS", "250"),
                ("STEREOCAM_RATE_HZ", "30"),
            ]))
            .unwrap();
        assert_eq!(config.camera.frame_id, "rig_b");
        assert_eq!(config.camera.timeout_ms, 250);
        assert_eq!(config.driver.rate_hz, 30.0);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        let err = config
            .apply_env(env(&[("STEREOCAM_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "STEREOCAM_TIMEOUT_MS", .. }));
    }

    #[test]
    fn test_rate_must_be_positive() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        for rate in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            config.driver.rate_hz = rate;
            assert!(matches!(config.validate(), Err(ConfigError::Rate(_))), "{rate}");
        }
    }

    #[test]
    fn test_rate_too_high_rejected() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.driver.rate_hz = 1e10;
        assert!(matches!(config.validate(), Err(ConfigError::Rate(r)) if r == 1e10));
        assert!(config.driver.period().is_err());
    }

    #[test]
    fn test_rate_too_low_rejected() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.driver.rate_hz = 1e-300;
        assert!(matches!(config.validate(), Err(ConfigError::Rate(_))));
    }
}
