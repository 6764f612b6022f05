//! Transport seam between the protocol core and the serial link.
//!
//! The hub and monitoring thread talk to the port through the [`Transport`]
//! trait so the whole protocol stack can run against an in-memory double in
//! tests. The real implementation wraps the `serialport` crate behind the
//! `instrument_serial` feature.

pub mod mock;
#[cfg(feature = "instrument_serial")]
pub mod serial;

use crate::error::Result;

#[cfg(feature = "instrument_serial")]
pub use serial::SerialTransport;

/// Byte-level access to the serial link.
///
/// Roles are disjoint by construction: the hub holds the write half behind
/// its send lock, and the monitoring thread owns a cloned read half. A read
/// returning `Ok(0)` means "nothing available right now", never end of
/// stream.
pub trait Transport: Send {
    /// Write the whole buffer to the link.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Flush buffered output to the device.
    fn flush(&mut self) -> Result<()>;

    /// Read available bytes into `buf`, returning how many were read.
    /// Returns `Ok(0)` when no data arrived within the port timeout.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Clone a second handle to the same link, used to hand the read half to
    /// the monitoring thread.
    fn try_clone(&self) -> Result<Box<dyn Transport>>;
}
