// FallGuard - Hardware & Detection Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V) watch, host replay for everything else

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_HAPTIC: i32 = 4; // D2/A2 - Haptic motor control
pub const PIN_I2C_SDA: i32 = 6; // D4    - I2C data line
pub const PIN_I2C_SCL: i32 = 7; // D5    - I2C clock line

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_MPU6050: u8 = 0x68;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_SENSOR: usize = 4096;
pub const STACK_DETECT: usize = 8192;
pub const STACK_ALERT: usize = 4096;

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const SENSOR_SAMPLE_INTERVAL_MS: u64 = 20; // 50 Hz, matches the simulation scripts
pub const STATUS_LOG_INTERVAL: u64 = 100; // accelerometer samples between status lines

/// SOS vibration: (on_ms, off_ms) pairs, three short, three long, three short.
pub const ALERT_VIBRATION_PATTERN: [(u64, u64); 9] = [
    (200, 100),
    (200, 100),
    (200, 200),
    (500, 100),
    (500, 100),
    (500, 200),
    (200, 100),
    (200, 100),
    (200, 0),
];

// ---------------------------------------------------------------------------
// MPU6050 Sensor Scale Factors
// ---------------------------------------------------------------------------
pub const ACCEL_SCALE_8G: f32 = 4096.0; // LSB/g  at ±8 g
pub const GYRO_SCALE_500: f32 = 65.5; // LSB/°/s at ±500 °/s

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------
pub const STANDARD_GRAVITY: f64 = 9.81; // m/s²

// ---------------------------------------------------------------------------
// Detection tuning (runtime, loaded from TOML)
// ---------------------------------------------------------------------------

/// Every tunable of the fall detection engine.
///
/// Accelerations are in m/s², rotation rates in rad/s, durations in
/// milliseconds. Missing keys in a TOML file fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallConfig {
    /// Filtered magnitude below this counts as free-fall.
    pub free_fall_threshold: f64,
    /// Filtered magnitude above this counts as an impact.
    pub impact_threshold: f64,
    pub free_fall_min_duration_ms: u64,
    /// How long after free-fall ends an impact is still accepted.
    pub impact_window_ms: u64,
    pub cooldown_ms: u64,

    /// Gravity z above this means the wrist is upright.
    pub vertical_threshold: f64,
    /// |gravity z| below this means the wrist is lying flat.
    pub horizontal_threshold: f64,
    pub orientation_window_ms: u64,

    /// Length of the post-suspicion stillness window.
    pub immobility_check_ms: u64,
    /// Leading part of the window during which no verdict is given.
    pub immobility_settle_ms: u64,
    pub immobility_sample_min: usize,
    pub immobility_capacity: usize,
    pub immobility_variance_threshold: f64,

    pub tumbling_variance_threshold: f64,
    pub gyro_threshold: f64,

    /// EMA weight of the newest sample, in (0, 1].
    pub filter_alpha: f64,
    /// Length of the classification window (accelerometer and gyro).
    pub history_capacity: usize,
}

impl Default for FallConfig {
    fn default() -> Self {
        Self {
            free_fall_threshold: 4.0,
            impact_threshold: 15.0,
            free_fall_min_duration_ms: 50,
            impact_window_ms: 500,
            cooldown_ms: 30_000,
            vertical_threshold: 7.0,
            horizontal_threshold: 3.0,
            orientation_window_ms: 2_000,
            immobility_check_ms: 3_000,
            immobility_settle_ms: 1_000,
            immobility_sample_min: 10,
            immobility_capacity: 60,
            immobility_variance_threshold: 2.0,
            tumbling_variance_threshold: 4.0,
            gyro_threshold: 3.0,
            filter_alpha: 0.2,
            history_capacity: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl FallConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: FallConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject combinations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.filter_alpha > 0.0 && self.filter_alpha <= 1.0) {
            return Err(invalid("filter_alpha", format!("{} is outside (0, 1]", self.filter_alpha)));
        }

        let positive = [
            ("free_fall_threshold", self.free_fall_threshold),
            ("impact_threshold", self.impact_threshold),
            ("vertical_threshold", self.vertical_threshold),
            ("horizontal_threshold", self.horizontal_threshold),
            ("immobility_variance_threshold", self.immobility_variance_threshold),
            ("tumbling_variance_threshold", self.tumbling_variance_threshold),
            ("gyro_threshold", self.gyro_threshold),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(field, format!("{value} must be a positive number")));
            }
        }

        if self.free_fall_threshold >= self.impact_threshold {
            return Err(invalid(
                "free_fall_threshold",
                format!(
                    "{} must be below impact_threshold ({})",
                    self.free_fall_threshold, self.impact_threshold
                ),
            ));
        }
        if self.horizontal_threshold >= self.vertical_threshold {
            return Err(invalid(
                "horizontal_threshold",
                format!(
                    "{} must be below vertical_threshold ({})",
                    self.horizontal_threshold, self.vertical_threshold
                ),
            ));
        }
        if self.history_capacity == 0 {
            return Err(invalid("history_capacity", "must hold at least one sample".into()));
        }
        if self.immobility_capacity == 0 {
            return Err(invalid("immobility_capacity", "must hold at least one sample".into()));
        }
        if self.immobility_sample_min > self.immobility_capacity {
            return Err(invalid(
                "immobility_sample_min",
                format!(
                    "{} exceeds immobility_capacity ({})",
                    self.immobility_sample_min, self.immobility_capacity
                ),
            ));
        }
        if self.immobility_settle_ms > self.immobility_check_ms {
            return Err(invalid(
                "immobility_settle_ms",
                format!(
                    "{} exceeds immobility_check_ms ({})",
                    self.immobility_settle_ms, self.immobility_check_ms
                ),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        FallConfig::default().validate().expect("defaults must validate");
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() {
        let config = FallConfig::from_toml_str("impact_threshold = 20.0\ncooldown_ms = 5000\n")
            .expect("partial config should load");
        assert_eq!(config.impact_threshold, 20.0);
        assert_eq!(config.cooldown_ms, 5_000);
        assert_eq!(config.free_fall_threshold, FallConfig::default().free_fall_threshold);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FallConfig::from_toml_str("impact_treshold = 20.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn alpha_out_of_range_is_rejected() {
        let err = FallConfig::from_toml_str("filter_alpha = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "filter_alpha", .. }));

        let err = FallConfig::from_toml_str("filter_alpha = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "filter_alpha", .. }));
    }

    #[test]
    fn inverted_posture_thresholds_are_rejected() {
        let config = FallConfig {
            horizontal_threshold: 8.0,
            ..FallConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "horizontal_threshold", .. })
        ));
    }

    #[test]
    fn sample_minimum_must_fit_the_window() {
        let config = FallConfig {
            immobility_sample_min: 61,
            ..FallConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "immobility_sample_min", .. })
        ));
    }

    #[test]
    fn shipped_config_file_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/fallguard.toml");
        let config = FallConfig::load(path).expect("shipped config should load");
        assert_eq!(config, FallConfig::default());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = FallConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
