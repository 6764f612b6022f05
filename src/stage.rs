//! Stage façades: micrometers in, protocol calls out.
//!
//! [`XyStage`] and [`ZStage`] convert between micrometers and microsteps
//! using the per-axis lead screw calibration and drive the hub. They carry
//! no protocol state of their own; positions and busy flags always come from
//! the hub's published state.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::config::{AxisCalibration, Settings};
use crate::error::{Result, SquidError};
use crate::hub::SquidHub;
use crate::protocol::Axis;

/// Window between sending a move and the firmware raising the busy flag.
const BUSY_GRACE: Duration = Duration::from_millis(100);

/// XY stage façade.
pub struct XyStage {
    hub: Arc<SquidHub>,
    cal_x: AxisCalibration,
    cal_y: AxisCalibration,
    auto_home: bool,
}

impl XyStage {
    /// Build the façade from the hub and the stage calibration in
    /// `settings`.
    pub fn new(hub: Arc<SquidHub>, settings: &Settings) -> Self {
        Self {
            hub,
            cal_x: settings.stage_x.clone(),
            cal_y: settings.stage_y.clone(),
            auto_home: settings.auto_home,
        }
    }

    /// One-time stage setup; homes the stage when `auto_home` is configured.
    pub fn initialize(&self) -> Result<()> {
        if self.auto_home {
            debug!("auto-homing XY stage");
            self.home()?;
        }
        Ok(())
    }

    /// Move both axes by a relative distance in micrometers, waiting for
    /// each command's acknowledgment. Zero-length moves are skipped.
    pub fn move_relative_um(&self, dx_um: f64, dy_um: f64) -> Result<()> {
        for (axis, distance, cal) in [
            (Axis::X, dx_um, &self.cal_x),
            (Axis::Y, dy_um, &self.cal_y),
        ] {
            let steps = cal.um_to_steps(distance);
            if steps == 0 {
                continue;
            }
            let sequence = self.hub.send_move(axis, steps)?;
            self.hub.wait_for_ack(sequence, self.hub.ack_timeout())?;
        }
        Ok(())
    }

    /// Move to an absolute position in micrometers.
    pub fn move_absolute_um(&self, x_um: f64, y_um: f64) -> Result<()> {
        for (axis, target, cal) in [(Axis::X, x_um, &self.cal_x), (Axis::Y, y_um, &self.cal_y)] {
            let sequence = self.hub.send_move_to(axis, cal.um_to_steps(target))?;
            self.hub.wait_for_ack(sequence, self.hub.ack_timeout())?;
        }
        Ok(())
    }

    /// Last known position in micrometers.
    pub fn position_um(&self) -> (f64, f64) {
        let x = self.hub.position_steps(Axis::X).unwrap_or(0);
        let y = self.hub.position_steps(Axis::Y).unwrap_or(0);
        (self.cal_x.steps_to_um(x), self.cal_y.steps_to_um(y))
    }

    /// Home both axes and block until the stage reports not-busy.
    pub fn home(&self) -> Result<()> {
        let sequence = self.hub.send_home(Axis::Xy)?;
        self.hub.wait_for_ack(sequence, self.hub.ack_timeout())?;
        self.hub.wait_not_busy(Axis::Xy, BUSY_GRACE)
    }

    /// Whether either axis is currently moving.
    pub fn is_busy(&self) -> bool {
        self.hub.is_busy(Axis::Xy)
    }

    /// The firmware has no stop-in-place command.
    pub fn stop(&self) -> Result<()> {
        Err(SquidError::Unsupported("stop-in-place"))
    }

    /// Configure maximum velocity (mm/s) and acceleration (mm/s²) for both
    /// axes.
    pub fn set_max_velocity_acceleration(&self, velocity: f64, acceleration: f64) -> Result<()> {
        for axis in [Axis::X, Axis::Y] {
            let sequence = self
                .hub
                .set_max_velocity_acceleration(axis, velocity, acceleration)?;
            self.hub.wait_for_ack(sequence, self.hub.ack_timeout())?;
        }
        Ok(())
    }

    /// Microstep sizes in micrometers for X and Y.
    pub fn step_size_um(&self) -> (f64, f64) {
        (self.cal_x.step_size_um(), self.cal_y.step_size_um())
    }
}

/// Focus drive façade.
pub struct ZStage {
    hub: Arc<SquidHub>,
    cal: AxisCalibration,
}

impl ZStage {
    /// Build the façade from the hub and the Z calibration in `settings`.
    pub fn new(hub: Arc<SquidHub>, settings: &Settings) -> Self {
        Self {
            hub,
            cal: settings.stage_z.clone(),
        }
    }

    /// Relative focus move in micrometers, waiting for the acknowledgment.
    pub fn move_relative_um(&self, d_um: f64) -> Result<()> {
        let steps = self.cal.um_to_steps(d_um);
        if steps == 0 {
            return Ok(());
        }
        let sequence = self.hub.send_move(Axis::Z, steps)?;
        self.hub.wait_for_ack(sequence, self.hub.ack_timeout())
    }

    /// Absolute focus move in micrometers.
    pub fn move_absolute_um(&self, z_um: f64) -> Result<()> {
        let sequence = self.hub.send_move_to(Axis::Z, self.cal.um_to_steps(z_um))?;
        self.hub.wait_for_ack(sequence, self.hub.ack_timeout())
    }

    /// Last known focus position in micrometers.
    pub fn position_um(&self) -> f64 {
        self.cal
            .steps_to_um(self.hub.position_steps(Axis::Z).unwrap_or(0))
    }

    /// Home the focus drive and block until it reports not-busy.
    pub fn home(&self) -> Result<()> {
        let sequence = self.hub.send_home(Axis::Z)?;
        self.hub.wait_for_ack(sequence, self.hub.ack_timeout())?;
        self.hub.wait_not_busy(Axis::Z, BUSY_GRACE)
    }

    /// Whether the focus drive is currently moving.
    pub fn is_busy(&self) -> bool {
        self.hub.is_busy(Axis::Z)
    }

    /// The firmware has no stop-in-place command.
    pub fn stop(&self) -> Result<()> {
        Err(SquidError::Unsupported("stop-in-place"))
    }

    /// The focus drive cannot be re-zeroed at an arbitrary position.
    pub fn set_origin(&self) -> Result<()> {
        Err(SquidError::Unsupported("origin reset"))
    }

    /// Microstep size in micrometers.
    pub fn step_size_um(&self) -> f64 {
        self.cal.step_size_um()
    }
}
