//! Background thread reading the controller status stream.
//!
//! One monitoring thread per connection owns the read half of the transport
//! and runs a two-state loop: RUNNING until the stop flag is observed, then
//! STOPPED. Read errors never terminate the loop — the firmware streams
//! status frames continuously and a failed read is treated as "no message
//! yet", retried after the poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info};

use crate::error::Result;
use crate::hub::SharedState;
use crate::protocol::parser::{MessageParser, StatusMessage};
use crate::protocol::RCV_BUF_LEN;
use crate::transport::Transport;

/// Handle to the monitoring thread. Stopping sets the atomic flag checked
/// once per loop iteration and then joins; dropping the handle does the
/// same, so the join is guaranteed on every exit path.
pub(crate) struct MonitorHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Spawn the read loop over `transport`.
    pub(crate) fn spawn(
        mut transport: Box<dyn Transport>,
        shared: Arc<SharedState>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let thread = std::thread::Builder::new()
            .name("squid-monitor".to_string())
            .spawn(move || {
                let mut parser = MessageParser::new();
                let mut buf = [0u8; RCV_BUF_LEN];
                info!("monitoring thread started");

                while !stop_flag.load(Ordering::Relaxed) {
                    match transport.read(&mut buf) {
                        Ok(0) => std::thread::sleep(poll_interval),
                        Ok(n) => {
                            parser.push_bytes(&buf[..n]);
                            while let Some(raw) = parser.next_message() {
                                shared.apply(&StatusMessage::decode(&raw));
                            }
                        }
                        Err(e) => {
                            // Not a loop exit: keep polling until told to
                            // stop.
                            debug!("monitor read error: {}", e);
                            std::thread::sleep(poll_interval);
                        }
                    }
                }

                info!("monitoring thread stopped");
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Request a stop and join the thread.
    pub(crate) fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                debug!("monitoring thread panicked before join");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
