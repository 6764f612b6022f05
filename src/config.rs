//! Driver configuration.
//!
//! Settings are plain serde structs so an application can embed them in its
//! own configuration file. Defaults match the stock Squid controller
//! firmware and stage hardware.
//!
//! ```toml
//! [squid]
//! port = "/dev/ttyACM0"
//! baud_rate = 115200
//! ack_timeout_ms = 1000
//! auto_home = false
//!
//! [squid.stage_z]
//! screw_pitch_mm = 0.3
//! full_steps_per_rev = 200.0
//! microstepping = 256
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SquidError};

/// Connection and stage settings for one controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Serial port path (e.g. "/dev/ttyACM0" on Linux, "COM3" on Windows).
    pub port: String,
    /// Baud rate; the Squid firmware runs at 115200.
    pub baud_rate: u32,
    /// Port read timeout. Also paces the monitoring thread's stop-flag
    /// checks, so keep it short.
    pub read_timeout_ms: u64,
    /// Sleep between monitoring-thread reads that returned no data.
    pub poll_interval_us: u64,
    /// Default wait for a command acknowledgment.
    pub ack_timeout_ms: u64,
    /// How long a homing or move wait may poll the busy flag.
    pub settle_timeout_ms: u64,
    /// Home the XY stage during stage initialization.
    pub auto_home: bool,
    /// X axis lead screw calibration.
    pub stage_x: AxisCalibration,
    /// Y axis lead screw calibration.
    pub stage_y: AxisCalibration,
    /// Z axis lead screw calibration.
    pub stage_z: AxisCalibration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115_200,
            read_timeout_ms: 20,
            poll_interval_us: 500,
            ack_timeout_ms: 1000,
            settle_timeout_ms: 30_000,
            auto_home: false,
            stage_x: AxisCalibration::squid_xy(),
            stage_y: AxisCalibration::squid_xy(),
            stage_z: AxisCalibration::squid_z(),
        }
    }
}

impl Settings {
    /// Parse settings from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| SquidError::Config(e.to_string()))
    }
}

/// Per-axis conversion between micrometers and microsteps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisCalibration {
    /// Lead screw pitch in millimeters per revolution.
    pub screw_pitch_mm: f64,
    /// Full motor steps per revolution.
    pub full_steps_per_rev: f64,
    /// Microstepping factor configured in the stepper driver.
    pub microstepping: u32,
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self::squid_xy()
    }
}

impl AxisCalibration {
    /// Stock Squid XY stage: 2.54 mm pitch, 200 steps/rev, 256 microsteps.
    pub fn squid_xy() -> Self {
        Self {
            screw_pitch_mm: 2.54,
            full_steps_per_rev: 200.0,
            microstepping: 256,
        }
    }

    /// Stock Squid focus drive: 0.3 mm pitch, 200 steps/rev, 256 microsteps.
    pub fn squid_z() -> Self {
        Self {
            screw_pitch_mm: 0.3,
            full_steps_per_rev: 200.0,
            microstepping: 256,
        }
    }

    /// Size of one microstep in micrometers.
    pub fn step_size_um(&self) -> f64 {
        self.screw_pitch_mm * 1000.0 / (self.full_steps_per_rev * f64::from(self.microstepping))
    }

    /// Convert micrometers to the nearest whole microstep count.
    pub fn um_to_steps(&self, um: f64) -> i32 {
        (um / self.step_size_um()).round() as i32
    }

    /// Convert a microstep count to micrometers.
    pub fn steps_to_um(&self, steps: i32) -> f64 {
        f64::from(steps) * self.step_size_um()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_step_sizes() {
        // XY: 2540 um / (200 * 256) microsteps
        let xy = AxisCalibration::squid_xy();
        assert!((xy.step_size_um() - 0.049_609_375).abs() < 1e-9);

        // Z: 300 um / 51200 microsteps
        let z = AxisCalibration::squid_z();
        assert!((z.step_size_um() - 0.005_859_375).abs() < 1e-9);
    }

    #[test]
    fn test_um_steps_roundtrip() {
        let cal = AxisCalibration::squid_z();
        let steps = cal.um_to_steps(100.0);
        assert!((cal.steps_to_um(steps) - 100.0).abs() < cal.step_size_um());
    }

    #[test]
    fn test_from_toml_overrides() {
        let settings = Settings::from_toml_str(
            r#"
            port = "/dev/ttyUSB1"
            ack_timeout_ms = 250

            [stage_z]
            screw_pitch_mm = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(settings.port, "/dev/ttyUSB1");
        assert_eq!(settings.ack_timeout_ms, 250);
        assert_eq!(settings.baud_rate, 115_200);
        assert!((settings.stage_z.screw_pitch_mm - 0.5).abs() < 1e-12);
        // unspecified nested fields keep their defaults
        assert_eq!(settings.stage_z.microstepping, 256);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(
            Settings::from_toml_str("port = 12"),
            Err(SquidError::Config(_))
        ));
    }
}
