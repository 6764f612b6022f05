//! Fixed-length framing of the incoming status stream.
//!
//! The controller streams 24-byte status frames with no start marker and no
//! checksum: message boundaries are purely positional. [`MessageParser`]
//! accumulates raw reads and yields complete frames, carrying any partial
//! tail over to the next read. Alignment is established once at connection
//! start; a dropped byte is not self-correcting and silently shifts every
//! later field. That fragility is inherent to the firmware protocol and is
//! deliberately not papered over here.

use super::{Axis, MESSAGE_LEN};

/// Accumulating parser over the raw byte stream.
///
/// Holds the unconsumed tail of the last read; the cursor never exceeds the
/// buffer length and a frame is only yielded when a full `MESSAGE_LEN` span
/// is available.
#[derive(Debug, Default)]
pub struct MessageParser {
    buf: Vec<u8>,
    index: usize,
}

impl MessageParser {
    /// Empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly read bytes to the unconsumed tail.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        // Compact the consumed prefix before growing the buffer.
        if self.index > 0 {
            self.buf.drain(..self.index);
            self.index = 0;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete frame, or `None` if fewer than `MESSAGE_LEN` bytes
    /// remain buffered. Returning `None` leaves the cursor unchanged.
    pub fn next_message(&mut self) -> Option<[u8; MESSAGE_LEN]> {
        let remaining = self.buf.len() - self.index;
        if remaining < MESSAGE_LEN {
            return None;
        }
        let mut message = [0u8; MESSAGE_LEN];
        message.copy_from_slice(&self.buf[self.index..self.index + MESSAGE_LEN]);
        self.index += MESSAGE_LEN;
        Some(message)
    }

    /// Number of buffered bytes not yet consumed.
    pub fn pending_len(&self) -> usize {
        self.buf.len() - self.index
    }
}

/// A decoded 24-byte status frame.
///
/// Layout (firmware contract, all multi-byte fields big-endian):
///
/// | bytes | field                                   |
/// |-------|-----------------------------------------|
/// | 0     | echoed command sequence number          |
/// | 1     | execution status                        |
/// | 2–5   | X position, signed 32-bit steps         |
/// | 6–9   | Y position                              |
/// | 10–13 | Z position                              |
/// | 14    | busy flags (bit0=X, bit1=Y, bit2=Z)     |
/// | 15    | joystick/button state (bit0 = pressed)  |
/// | 16–23 | reserved                                |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage {
    /// Sequence number of the last command the firmware executed.
    pub sequence: u8,
    /// Raw execution status byte.
    pub status: u8,
    /// X position in device steps.
    pub x_steps: i32,
    /// Y position in device steps.
    pub y_steps: i32,
    /// Z position in device steps.
    pub z_steps: i32,
    /// Per-axis busy flags.
    pub busy_flags: u8,
    /// Raw joystick/button state byte.
    pub joystick: u8,
}

impl StatusMessage {
    /// Decode a raw frame. `from_be_bytes` performs the byte swap on
    /// little-endian hosts; the wire format is big-endian regardless of host.
    pub fn decode(raw: &[u8; MESSAGE_LEN]) -> Self {
        let be_i32 = |offset: usize| {
            let mut field = [0u8; 4];
            field.copy_from_slice(&raw[offset..offset + 4]);
            i32::from_be_bytes(field)
        };
        Self {
            sequence: raw[0],
            status: raw[1],
            x_steps: be_i32(2),
            y_steps: be_i32(6),
            z_steps: be_i32(10),
            busy_flags: raw[14],
            joystick: raw[15],
        }
    }

    /// Busy flag for a single axis. The aggregate XY axis is busy when
    /// either X or Y is.
    pub fn axis_busy(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.busy_flags & 0x01 != 0,
            Axis::Y => self.busy_flags & 0x02 != 0,
            Axis::Z => self.busy_flags & 0x04 != 0,
            Axis::Xy => self.busy_flags & 0x03 != 0,
            Axis::Theta => false,
        }
    }

    /// Whether the joystick button is reported pressed.
    pub fn joystick_button_pressed(&self) -> bool {
        self.joystick & 0x01 != 0
    }
}
