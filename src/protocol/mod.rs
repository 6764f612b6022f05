//! Squid firmware wire protocol.
//!
//! ## Protocol Overview
//!
//! - Format: fixed-size binary frames, multi-byte fields big-endian
//! - Host → controller: 8 bytes, `[sequence][command][payload, zero padded]`
//! - Controller → host: 24 bytes, streamed continuously (see
//!   [`parser::StatusMessage`] for the layout)
//! - Correlation: the controller echoes the sequence number of the last
//!   executed command in every status frame; there is no checksum and no
//!   framing marker, so alignment is positional and established once at
//!   connection start
//!
//! The command enumeration and field encodings are a versioned contract with
//! the firmware; they must be validated against the firmware revision in use,
//! not re-derived.

pub mod frame;
pub mod parser;

/// Length of an outgoing command frame in bytes.
pub const COMMAND_FRAME_LEN: usize = 8;

/// Length of an incoming status frame in bytes.
pub const MESSAGE_LEN: usize = 24;

/// Receive buffer size for the monitoring thread. Holds two full status
/// frames so a read returning a partial frame plus the start of the next one
/// never starves the parser.
pub const RCV_BUF_LEN: usize = 2 * MESSAGE_LEN;

/// Command codes understood by the Squid firmware. Closed enumeration; each
/// code has a fixed payload shape (see [`frame::CommandFrame`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Relative move on X, payload = signed step count.
    MoveX = 0,
    /// Relative move on Y.
    MoveY = 1,
    /// Relative move on Z.
    MoveZ = 2,
    /// Relative move on the theta axis.
    MoveTheta = 3,
    /// Home an axis (or zero it, depending on payload).
    HomeOrZero = 5,
    /// Absolute move on X, payload = signed target in steps.
    MoveToX = 6,
    /// Absolute move on Y.
    MoveToY = 7,
    /// Absolute move on Z.
    MoveToZ = 8,
    /// Configure a software limit, payload = limit code + position in steps.
    SetLim = 9,
    /// Switch the active illumination source on.
    TurnOnIllumination = 10,
    /// Switch the active illumination source off.
    TurnOffIllumination = 11,
    /// Select an illumination source and intensity.
    SetIllumination = 12,
    /// Select an LED-matrix pattern with per-channel intensity.
    SetIlluminationLedMatrix = 13,
    /// Acknowledge a joystick button press event.
    AckJoystickButtonPressed = 14,
    /// Write a value to the onboard DAC.
    AnalogWriteOnboardDac = 15,
    /// Configure the DAC80508 reference divider and gain.
    SetDac80508RefdivGain = 16,
    /// Scale factor applied by the firmware to illumination intensities.
    SetIlluminationIntensityFactor = 17,
    /// Configure limit switch polarity for an axis.
    SetLimSwitchPolarity = 20,
    /// Configure the stepper driver (microstepping, current) for an axis.
    ConfigureStepperDriver = 21,
    /// Set maximum velocity and acceleration for an axis.
    SetMaxVelocityAcceleration = 22,
    /// Set the lead screw pitch used by the firmware for an axis.
    SetLeadScrewPitch = 23,
    /// Set the joystick offset velocity for an axis.
    SetOffsetVelocity = 24,
    /// Configure closed-loop PID for a stage axis.
    ConfigureStagePid = 25,
    /// Enable closed-loop PID for a stage axis.
    EnableStagePid = 26,
    /// Disable closed-loop PID for a stage axis.
    DisableStagePid = 27,
    /// Safety margin applied when homing.
    SetHomeSafetyMargin = 28,
    /// Set PID coefficients for a stage axis.
    SetPidArguments = 29,
    /// Fire the hardware trigger output.
    SendHardwareTrigger = 30,
    /// Set the strobe delay for triggered illumination.
    SetStrobeDelay = 31,
    /// Drive a GPIO pin level.
    SetPinLevel = 41,
    /// Firmware initialization handshake.
    Initialize = 254,
    /// Reset the controller.
    Reset = 255,
}

impl Command {
    /// Wire code for this command.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Stage axes known to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Axis {
    /// Stage X.
    X = 0,
    /// Stage Y.
    Y = 1,
    /// Focus drive.
    Z = 2,
    /// Rotation axis.
    Theta = 3,
    /// Aggregate XY, used by homing.
    Xy = 4,
}

impl Axis {
    /// Wire code for this axis.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Movement-direction sign baked into the protocol layer. Decouples the
    /// controller firmware polarity from the logical direction used by
    /// callers: positive logical steps always move toward larger logical
    /// positions.
    pub fn movement_sign(self) -> i32 {
        match self {
            Axis::X | Axis::Y | Axis::Z => -1,
            Axis::Theta | Axis::Xy => 1,
        }
    }

    /// Relative-move command for this axis, if it has one.
    pub(crate) fn move_command(self) -> Option<Command> {
        match self {
            Axis::X => Some(Command::MoveX),
            Axis::Y => Some(Command::MoveY),
            Axis::Z => Some(Command::MoveZ),
            Axis::Theta => Some(Command::MoveTheta),
            Axis::Xy => None,
        }
    }

    /// Absolute-move command for this axis, if it has one.
    pub(crate) fn move_to_command(self) -> Option<Command> {
        match self {
            Axis::X => Some(Command::MoveToX),
            Axis::Y => Some(Command::MoveToY),
            Axis::Z => Some(Command::MoveToZ),
            Axis::Theta | Axis::Xy => None,
        }
    }
}

/// LED-array illumination patterns supported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IlluminationSource {
    /// Full LED array.
    LedArrayFull = 0,
    /// Left half of the array.
    LedArrayLeftHalf = 1,
    /// Right half of the array.
    LedArrayRightHalf = 2,
    /// Left half blue, right half red.
    LedArrayLeftBlueRightRed = 3,
    /// Low-NA subset of the array.
    LedArrayLowNa = 4,
    /// Single dot, left.
    LedArrayLeftDot = 5,
    /// Single dot, right.
    LedArrayRightDot = 6,
}

impl IlluminationSource {
    /// Wire code for this pattern.
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes_match_firmware() {
        assert_eq!(Command::MoveX.code(), 0);
        assert_eq!(Command::HomeOrZero.code(), 5);
        assert_eq!(Command::SetMaxVelocityAcceleration.code(), 22);
        assert_eq!(Command::SetPinLevel.code(), 41);
        assert_eq!(Command::Reset.code(), 255);
    }

    #[test]
    fn test_axis_signs() {
        assert_eq!(Axis::X.movement_sign(), -1);
        assert_eq!(Axis::Y.movement_sign(), -1);
        assert_eq!(Axis::Z.movement_sign(), -1);
        assert_eq!(Axis::Theta.movement_sign(), 1);
    }
}
