//! Outgoing command frame encoding.
//!
//! Every command sent to the controller is a fixed 8-byte frame:
//! `[sequence][command][payload, zero padded]`. The payload shape is fixed
//! per command; multi-byte fields are big-endian. Frames are immutable once
//! built and owned solely by the sender until written to the transport — the
//! hub stamps the sequence number into byte 0 at send time.

use super::{Axis, Command, IlluminationSource, COMMAND_FRAME_LEN};

/// A fixed-size outgoing command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    bytes: [u8; COMMAND_FRAME_LEN],
}

impl CommandFrame {
    /// Frame with the given command code and an all-zero payload.
    pub fn new(command: Command) -> Self {
        let mut bytes = [0u8; COMMAND_FRAME_LEN];
        bytes[1] = command.code();
        Self { bytes }
    }

    /// Relative move. `steps` is the raw signed step count as the firmware
    /// expects it; axis sign conventions are applied by the hub, not here.
    ///
    /// Returns `None` for the aggregate XY axis, which has no single move
    /// command.
    pub fn move_steps(axis: Axis, steps: i32) -> Option<Self> {
        let mut frame = Self::new(axis.move_command()?);
        frame.bytes[2..6].copy_from_slice(&steps.to_be_bytes());
        Some(frame)
    }

    /// Absolute move to a target position in steps.
    pub fn move_to_steps(axis: Axis, steps: i32) -> Option<Self> {
        let mut frame = Self::new(axis.move_to_command()?);
        frame.bytes[2..6].copy_from_slice(&steps.to_be_bytes());
        Some(frame)
    }

    /// Home an axis toward its negative limit.
    pub fn home(axis: Axis) -> Self {
        let mut frame = Self::new(Command::HomeOrZero);
        frame.bytes[2] = axis.code();
        frame.bytes[3] = 1; // home direction: toward the negative limit
        frame
    }

    /// Set maximum velocity (mm/s) and acceleration (mm/s²) for an axis.
    /// Encoded as velocity × 100 and acceleration × 10, both u16.
    pub fn set_max_velocity_acceleration(axis: Axis, velocity: f64, acceleration: f64) -> Self {
        let mut frame = Self::new(Command::SetMaxVelocityAcceleration);
        frame.bytes[2] = axis.code();
        let v = (velocity * 100.0).round().clamp(0.0, f64::from(u16::MAX)) as u16;
        let a = (acceleration * 10.0).round().clamp(0.0, f64::from(u16::MAX)) as u16;
        frame.bytes[3..5].copy_from_slice(&v.to_be_bytes());
        frame.bytes[5..7].copy_from_slice(&a.to_be_bytes());
        frame
    }

    /// Switch the active illumination source on.
    pub fn turn_on_illumination() -> Self {
        Self::new(Command::TurnOnIllumination)
    }

    /// Switch the active illumination source off.
    pub fn turn_off_illumination() -> Self {
        Self::new(Command::TurnOffIllumination)
    }

    /// Select an illumination source with intensity in percent (0–100),
    /// scaled to the firmware's u16 range.
    pub fn set_illumination(source: IlluminationSource, intensity_pct: f64) -> Self {
        let mut frame = Self::new(Command::SetIllumination);
        frame.bytes[2] = source.code();
        let raw = (intensity_pct / 100.0 * f64::from(u16::MAX))
            .round()
            .clamp(0.0, f64::from(u16::MAX)) as u16;
        frame.bytes[3..5].copy_from_slice(&raw.to_be_bytes());
        frame
    }

    /// Select an LED-matrix pattern with per-channel 8-bit intensities.
    pub fn set_illumination_led_matrix(
        pattern: IlluminationSource,
        red: u8,
        green: u8,
        blue: u8,
    ) -> Self {
        let mut frame = Self::new(Command::SetIlluminationLedMatrix);
        frame.bytes[2] = pattern.code();
        frame.bytes[3] = red;
        frame.bytes[4] = green;
        frame.bytes[5] = blue;
        frame
    }

    /// Write a raw value to one channel of the onboard DAC.
    pub fn analog_write_dac(channel: u8, value: u16) -> Self {
        let mut frame = Self::new(Command::AnalogWriteOnboardDac);
        frame.bytes[2] = channel;
        frame.bytes[3..5].copy_from_slice(&value.to_be_bytes());
        frame
    }

    /// Configure a software limit. `limit_code` selects axis and end per the
    /// firmware table; `usteps` is the limit position in microsteps.
    pub fn set_lim(limit_code: u8, usteps: i32) -> Self {
        let mut frame = Self::new(Command::SetLim);
        frame.bytes[2] = limit_code;
        frame.bytes[3..7].copy_from_slice(&usteps.to_be_bytes());
        frame
    }

    /// Configure the limit switch polarity for an axis.
    pub fn set_lim_switch_polarity(axis: Axis, polarity: u8) -> Self {
        let mut frame = Self::new(Command::SetLimSwitchPolarity);
        frame.bytes[2] = axis.code();
        frame.bytes[3] = polarity;
        frame
    }

    /// Set the lead screw pitch (mm) the firmware uses for an axis.
    pub fn set_lead_screw_pitch(axis: Axis, pitch_mm: f64) -> Self {
        let mut frame = Self::new(Command::SetLeadScrewPitch);
        frame.bytes[2] = axis.code();
        let raw = (pitch_mm * 1000.0).round().clamp(0.0, f64::from(u16::MAX)) as u16;
        frame.bytes[3..5].copy_from_slice(&raw.to_be_bytes());
        frame
    }

    /// Set PID coefficients for a stage axis. `p` is u16-scaled, `i` and `d`
    /// are single bytes, per the firmware contract.
    pub fn set_pid_arguments(axis: Axis, p: u16, i: u8, d: u8) -> Self {
        let mut frame = Self::new(Command::SetPidArguments);
        frame.bytes[2] = axis.code();
        frame.bytes[3..5].copy_from_slice(&p.to_be_bytes());
        frame.bytes[5] = i;
        frame.bytes[6] = d;
        frame
    }

    /// Enable closed-loop PID for a stage axis.
    pub fn enable_stage_pid(axis: Axis) -> Self {
        let mut frame = Self::new(Command::EnableStagePid);
        frame.bytes[2] = axis.code();
        frame
    }

    /// Disable closed-loop PID for a stage axis.
    pub fn disable_stage_pid(axis: Axis) -> Self {
        let mut frame = Self::new(Command::DisableStagePid);
        frame.bytes[2] = axis.code();
        frame
    }

    /// Acknowledge a joystick button press reported in the status stream.
    pub fn ack_joystick_button() -> Self {
        Self::new(Command::AckJoystickButtonPressed)
    }

    /// Firmware initialization handshake, sent once after connecting.
    pub fn initialize() -> Self {
        Self::new(Command::Initialize)
    }

    /// Reset the controller.
    pub fn reset() -> Self {
        Self::new(Command::Reset)
    }

    /// Command code carried in this frame.
    pub fn command_code(&self) -> u8 {
        self.bytes[1]
    }

    /// Raw frame bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn stamp_sequence(&mut self, sequence: u8) {
        self.bytes[0] = sequence;
    }
}
