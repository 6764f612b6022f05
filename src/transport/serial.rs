//! Real serial port transport via the `serialport` crate.

use std::io::{Read, Write};
use std::time::Duration;

use log::debug;
use serialport::SerialPort;

use crate::config::Settings;
use crate::error::Result;
use crate::transport::Transport;

/// Serial link to the controller (8N1, no flow control).
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open the port named in `settings` at the configured baud rate.
    ///
    /// The port read timeout doubles as the monitoring thread's poll gate: a
    /// read that times out reports `Ok(0)` so the read loop can check its
    /// stop flag.
    pub fn open(settings: &Settings) -> Result<Self> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(settings.read_timeout_ms))
            .open()?;
        debug!(
            "Serial port '{}' opened at {} baud",
            settings.port, settings.baud_rate
        );
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        let port = self.port.try_clone()?;
        Ok(Box::new(Self { port }))
    }
}
