//! Driver for the Squid (Octopi Research) microscope controller.
//!
//! The Squid controller drives the XY stage, Z stage and LED illumination of
//! an Octopi microscope over a serial link. The firmware speaks a fixed-size
//! binary protocol: the host sends 8-byte command frames tagged with a 1-byte
//! sequence number, and the controller streams back 24-byte status frames
//! that echo the sequence number of the last executed command and carry the
//! current step positions and busy flags of every axis.
//!
//! The crate is layered leaves-first:
//!
//! - [`protocol`] — command codes, frame encoding and the fixed-length
//!   message parser. Pure data, no I/O.
//! - [`transport`] — the serial seam. A small [`Transport`] trait implemented
//!   by the real port (behind the `instrument_serial` feature) and by an
//!   in-memory mock for tests.
//! - [`hub`] — the command dispatcher. Serializes outgoing frames, tracks the
//!   outstanding sequence number and publishes position/busy state.
//! - [`monitor`] — the background thread that owns the read half of the port
//!   and feeds decoded status frames back into the hub state.
//! - [`stage`] / [`shutter`] — thin façades converting micrometers and
//!   illumination settings into protocol calls.
//!
//! # Example
//!
//! ```no_run
//! use squid_ctrl::{Settings, SquidHub, ZStage};
//!
//! fn main() -> squid_ctrl::Result<()> {
//!     let mut settings = Settings::default();
//!     settings.port = "/dev/ttyACM0".to_string();
//!
//!     let hub = SquidHub::connect(&settings)?;
//!     let z = ZStage::new(hub.clone(), &settings);
//!     z.move_relative_um(5.0)?;
//!     println!("Z at {:.3} um", z.position_um());
//!     hub.shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod hub;
pub mod monitor;
pub mod protocol;
pub mod shutter;
pub mod stage;
pub mod transport;

pub use config::{AxisCalibration, Settings};
pub use error::{Result, SquidError};
pub use hub::{JoystickEvent, SquidHub};
pub use protocol::frame::CommandFrame;
pub use protocol::parser::{MessageParser, StatusMessage};
pub use protocol::{Axis, Command, IlluminationSource};
pub use shutter::LedShutter;
pub use stage::{XyStage, ZStage};
pub use transport::mock::MockTransport;
pub use transport::Transport;
