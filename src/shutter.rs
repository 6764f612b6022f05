//! LED illumination façade.
//!
//! The controller's LED matrix acts as the microscope shutter: "open" sends
//! the current pattern/intensity state followed by illumination-on, "closed"
//! sends illumination-off. Pattern and intensity changes while open are
//! pushed to the device immediately.

use std::sync::Arc;

use crate::error::{Result, SquidError};
use crate::hub::SquidHub;
use crate::protocol::frame::CommandFrame;
use crate::protocol::IlluminationSource;

/// Shutter façade over the LED-matrix illumination commands.
pub struct LedShutter {
    hub: Arc<SquidHub>,
    pattern: IlluminationSource,
    intensity_pct: f64,
    red: u8,
    green: u8,
    blue: u8,
    open: bool,
}

impl LedShutter {
    /// Shutter starting closed, full array, 50% intensity, white.
    pub fn new(hub: Arc<SquidHub>) -> Self {
        Self {
            hub,
            pattern: IlluminationSource::LedArrayFull,
            intensity_pct: 50.0,
            red: 255,
            green: 255,
            blue: 255,
            open: false,
        }
    }

    /// Open or close the shutter.
    pub fn set_open(&mut self, open: bool) -> Result<()> {
        if open {
            self.send_illumination()?;
            self.hub
                .send_and_wait(CommandFrame::turn_on_illumination())?;
        } else {
            self.hub
                .send_and_wait(CommandFrame::turn_off_illumination())?;
        }
        self.open = open;
        Ok(())
    }

    /// Whether the shutter is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Timed exposure is not provided by the firmware.
    pub fn fire(&mut self, _delta_ms: f64) -> Result<()> {
        Err(SquidError::Unsupported("timed fire"))
    }

    /// Select the LED-array pattern.
    pub fn set_pattern(&mut self, pattern: IlluminationSource) -> Result<()> {
        self.pattern = pattern;
        self.resend_if_open()
    }

    /// Set intensity in percent (0–100).
    pub fn set_intensity(&mut self, intensity_pct: f64) -> Result<()> {
        self.intensity_pct = intensity_pct.clamp(0.0, 100.0);
        self.resend_if_open()
    }

    /// Set the RGB color of the array.
    pub fn set_color(&mut self, red: u8, green: u8, blue: u8) -> Result<()> {
        self.red = red;
        self.green = green;
        self.blue = blue;
        self.resend_if_open()
    }

    /// Current pattern.
    pub fn pattern(&self) -> IlluminationSource {
        self.pattern
    }

    /// Current intensity in percent.
    pub fn intensity(&self) -> f64 {
        self.intensity_pct
    }

    fn resend_if_open(&self) -> Result<()> {
        if self.open {
            self.send_illumination()?;
        }
        Ok(())
    }

    fn send_illumination(&self) -> Result<()> {
        let frame = CommandFrame::set_illumination_led_matrix(
            self.pattern,
            scale_channel(self.red, self.intensity_pct),
            scale_channel(self.green, self.intensity_pct),
            scale_channel(self.blue, self.intensity_pct),
        );
        self.hub.send_and_wait(frame)?;
        Ok(())
    }
}

/// Scale an 8-bit color channel by the intensity percentage.
fn scale_channel(channel: u8, intensity_pct: f64) -> u8 {
    (f64::from(channel) * intensity_pct / 100.0)
        .round()
        .clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_scaling() {
        assert_eq!(scale_channel(255, 100.0), 255);
        assert_eq!(scale_channel(255, 50.0), 128);
        assert_eq!(scale_channel(255, 0.0), 0);
        assert_eq!(scale_channel(0, 100.0), 0);
        assert_eq!(scale_channel(200, 25.0), 50);
    }
}
