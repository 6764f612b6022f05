//! Command dispatcher and shared controller state.
//!
//! [`SquidHub`] is the single owner of the connection: it holds the write
//! half of the transport behind an exclusive lock, assigns wrapping 1-byte
//! sequence numbers, tracks the one outstanding command, and exposes the
//! position/busy state that the monitoring thread publishes. Façades hold an
//! `Arc<SquidHub>`; nothing in the crate reaches the hub through globals.
//!
//! Concurrency discipline: any number of caller threads serialize on the
//! send lock (frames are never interleaved on the wire), exactly one
//! monitoring thread reads, and state crosses the two only through atomics
//! and the pending-command mutex.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Result, SquidError};
use crate::monitor::MonitorHandle;
use crate::protocol::frame::CommandFrame;
use crate::protocol::parser::StatusMessage;
use crate::protocol::Axis;
use crate::transport::Transport;

/// Out-of-band event reported by the controller status stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoystickEvent {
    /// The joystick button transitioned to pressed. Acknowledge with
    /// [`SquidHub::ack_joystick_button`] once handled.
    ButtonPressed,
}

/// State shared between callers and the monitoring thread.
///
/// Positions and busy flags are independently updated atomic scalars;
/// readers always observe whole values but no cross-axis snapshot is
/// provided (none is needed — the firmware updates them per status frame).
pub(crate) struct SharedState {
    pending: Mutex<Option<u8>>,
    x_steps: AtomicI32,
    y_steps: AtomicI32,
    z_steps: AtomicI32,
    x_busy: AtomicBool,
    y_busy: AtomicBool,
    z_busy: AtomicBool,
    joystick_pressed: AtomicBool,
    joystick_tx: Mutex<Option<Sender<JoystickEvent>>>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            x_steps: AtomicI32::new(0),
            y_steps: AtomicI32::new(0),
            z_steps: AtomicI32::new(0),
            x_busy: AtomicBool::new(false),
            y_busy: AtomicBool::new(false),
            z_busy: AtomicBool::new(false),
            joystick_pressed: AtomicBool::new(false),
            joystick_tx: Mutex::new(None),
        }
    }

    /// Fold one decoded status frame into the shared state. Called only from
    /// the monitoring thread.
    pub(crate) fn apply(&self, msg: &StatusMessage) {
        {
            let mut pending = lock(&self.pending);
            match *pending {
                Some(n) if n == msg.sequence => {
                    debug!("command {} acknowledged", n);
                    *pending = None;
                }
                // A non-matching echo is normally just the previous command
                // still being reported; with no checksum in the protocol it
                // is also the only visible desync signal, so keep a trace.
                Some(n) => {
                    debug!("status echoes {} while {} is pending", msg.sequence, n);
                }
                None => {}
            }
        }

        // Independent scalars; no ordering between fields is required.
        self.x_steps.store(msg.x_steps, Ordering::Relaxed);
        self.y_steps.store(msg.y_steps, Ordering::Relaxed);
        self.z_steps.store(msg.z_steps, Ordering::Relaxed);
        self.x_busy.store(msg.axis_busy(Axis::X), Ordering::Relaxed);
        self.y_busy.store(msg.axis_busy(Axis::Y), Ordering::Relaxed);
        self.z_busy.store(msg.axis_busy(Axis::Z), Ordering::Relaxed);

        let pressed = msg.joystick_button_pressed();
        let was_pressed = self.joystick_pressed.swap(pressed, Ordering::Relaxed);
        if pressed && !was_pressed {
            if let Some(tx) = lock(&self.joystick_tx).as_ref() {
                // A dropped receiver just means nobody is listening anymore.
                let _ = tx.send(JoystickEvent::ButtonPressed);
            }
        }
    }

    fn is_pending(&self, sequence: u8) -> bool {
        *lock(&self.pending) == Some(sequence)
    }

    fn clear(&self, sequence: u8) {
        let mut pending = lock(&self.pending);
        if *pending == Some(sequence) {
            *pending = None;
        }
    }
}

struct TxState {
    transport: Box<dyn Transport>,
    next_sequence: u8,
}

/// Connection hub for one Squid controller.
pub struct SquidHub {
    tx: Mutex<TxState>,
    shared: Arc<SharedState>,
    monitor: Mutex<Option<MonitorHandle>>,
    ack_timeout: Duration,
    settle_timeout: Duration,
}

impl SquidHub {
    /// Open the serial port named in `settings` and start the monitoring
    /// thread.
    #[cfg(feature = "instrument_serial")]
    pub fn connect(settings: &Settings) -> Result<Arc<Self>> {
        let transport = crate::transport::SerialTransport::open(settings)?;
        let hub = Self::with_transport(Box::new(transport), settings)?;
        info!("Squid controller connected on '{}'", settings.port);
        Ok(hub)
    }

    /// Build a hub over an already-open transport and start the monitoring
    /// thread. This is the seam tests use with [`crate::MockTransport`].
    pub fn with_transport(transport: Box<dyn Transport>, settings: &Settings) -> Result<Arc<Self>> {
        let reader = transport.try_clone()?;
        let shared = Arc::new(SharedState::new());
        let monitor = MonitorHandle::spawn(
            reader,
            shared.clone(),
            Duration::from_micros(settings.poll_interval_us),
        )?;

        Ok(Arc::new(Self {
            tx: Mutex::new(TxState {
                transport,
                next_sequence: 1,
            }),
            shared,
            monitor: Mutex::new(Some(monitor)),
            ack_timeout: Duration::from_millis(settings.ack_timeout_ms),
            settle_timeout: Duration::from_millis(settings.settle_timeout_ms),
        }))
    }

    /// Stamp the next sequence number into `frame`, mark it pending and
    /// write it to the transport. Returns the assigned sequence number.
    ///
    /// Holds the send lock for the whole construction-and-write, so frames
    /// from concurrent callers never interleave on the wire. Writes are not
    /// retried; a transport error clears the pending slot and surfaces to
    /// the caller.
    pub fn send_command(&self, mut frame: CommandFrame) -> Result<u8> {
        let mut tx = lock(&self.tx);
        let sequence = tx.next_sequence;
        tx.next_sequence = tx.next_sequence.wrapping_add(1);

        {
            let mut pending = lock(&self.shared.pending);
            if let Some(prev) = *pending {
                // Single in-flight slot: overwriting makes the earlier
                // command's acknowledgment unobservable.
                warn!(
                    "command {} still unacknowledged while sending {}",
                    prev, sequence
                );
            }
            *pending = Some(sequence);
        }

        frame.stamp_sequence(sequence);
        let write = tx
            .transport
            .write_all(frame.as_bytes())
            .and_then(|()| tx.transport.flush());
        if let Err(e) = write {
            self.shared.clear(sequence);
            return Err(e);
        }

        debug!(
            "sent command code {} as sequence {}",
            frame.command_code(),
            sequence
        );
        Ok(sequence)
    }

    /// Encode and send a relative move. `steps` is in logical direction; the
    /// per-axis movement sign is applied here.
    pub fn send_move(&self, axis: Axis, steps: i32) -> Result<u8> {
        let device_steps = steps.saturating_mul(axis.movement_sign());
        let frame = CommandFrame::move_steps(axis, device_steps)
            .ok_or(SquidError::Unsupported("relative move on aggregate axis"))?;
        self.send_command(frame)
    }

    /// Encode and send an absolute move to a logical step position.
    pub fn send_move_to(&self, axis: Axis, steps: i32) -> Result<u8> {
        let device_steps = steps.saturating_mul(axis.movement_sign());
        let frame = CommandFrame::move_to_steps(axis, device_steps)
            .ok_or(SquidError::Unsupported("absolute move on aggregate axis"))?;
        self.send_command(frame)
    }

    /// Home an axis toward its negative limit.
    pub fn send_home(&self, axis: Axis) -> Result<u8> {
        self.send_command(CommandFrame::home(axis))
    }

    /// Configure maximum velocity (mm/s) and acceleration (mm/s²).
    pub fn set_max_velocity_acceleration(
        &self,
        axis: Axis,
        velocity: f64,
        acceleration: f64,
    ) -> Result<u8> {
        self.send_command(CommandFrame::set_max_velocity_acceleration(
            axis,
            velocity,
            acceleration,
        ))
    }

    /// Whether the command with this sequence number is still awaiting its
    /// acknowledgment.
    pub fn is_command_pending(&self, sequence: u8) -> bool {
        self.shared.is_pending(sequence)
    }

    /// Manually clear a pending command, as if acknowledged.
    pub fn received_command(&self, sequence: u8) {
        self.shared.clear(sequence);
    }

    /// Block until the command is acknowledged or `timeout` expires.
    /// Expiry is reported as [`SquidError::AckTimeout`], never as success.
    pub fn wait_for_ack(&self, sequence: u8, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        while self.is_command_pending(sequence) {
            if start.elapsed() > timeout {
                return Err(SquidError::AckTimeout {
                    sequence,
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    /// Send a frame and block for its acknowledgment using the configured
    /// default timeout.
    pub fn send_and_wait(&self, frame: CommandFrame) -> Result<u8> {
        let sequence = self.send_command(frame)?;
        self.wait_for_ack(sequence, self.ack_timeout)?;
        Ok(sequence)
    }

    /// Firmware initialization handshake, typically sent once after
    /// connecting.
    pub fn initialize_controller(&self) -> Result<()> {
        self.send_and_wait(CommandFrame::initialize())?;
        info!("controller initialization acknowledged");
        Ok(())
    }

    /// Acknowledge a joystick button press event.
    pub fn ack_joystick_button(&self) -> Result<u8> {
        self.send_command(CommandFrame::ack_joystick_button())
    }

    /// Last published position in logical steps. Never touches the
    /// transport.
    pub fn position_steps(&self, axis: Axis) -> Result<i32> {
        let raw = match axis {
            Axis::X => self.shared.x_steps.load(Ordering::Relaxed),
            Axis::Y => self.shared.y_steps.load(Ordering::Relaxed),
            Axis::Z => self.shared.z_steps.load(Ordering::Relaxed),
            Axis::Theta | Axis::Xy => {
                return Err(SquidError::Unsupported("position readback for axis"))
            }
        };
        Ok(raw.saturating_mul(axis.movement_sign()))
    }

    /// Last published busy flag. The aggregate XY axis is busy when either
    /// X or Y is.
    pub fn is_busy(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.shared.x_busy.load(Ordering::Relaxed),
            Axis::Y => self.shared.y_busy.load(Ordering::Relaxed),
            Axis::Z => self.shared.z_busy.load(Ordering::Relaxed),
            Axis::Xy => {
                self.shared.x_busy.load(Ordering::Relaxed)
                    || self.shared.y_busy.load(Ordering::Relaxed)
            }
            Axis::Theta => false,
        }
    }

    /// Register a channel for out-of-band joystick events. Events are
    /// edge-triggered: one per button press.
    pub fn set_joystick_listener(&self, tx: Sender<JoystickEvent>) {
        *lock(&self.shared.joystick_tx) = Some(tx);
    }

    /// Block until `axis` reports not-busy, polling the published flag.
    /// `grace` covers the window between sending a move and the firmware
    /// raising the busy flag.
    pub fn wait_not_busy(&self, axis: Axis, grace: Duration) -> Result<()> {
        std::thread::sleep(grace);
        let start = Instant::now();
        while self.is_busy(axis) {
            if start.elapsed() > self.settle_timeout {
                return Err(SquidError::SettleTimeout(
                    self.settle_timeout.as_millis() as u64
                ));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }

    /// Default acknowledgment timeout from the settings this hub was built
    /// with.
    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// Stop and join the monitoring thread. Safe to call more than once;
    /// also invoked on drop.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(mut monitor) = lock(&self.monitor).take() {
            monitor.stop();
            info!("Squid hub shut down");
        }
        Ok(())
    }
}

impl Drop for SquidHub {
    fn drop(&mut self) {
        // The join must happen on every exit path, not only on explicit
        // shutdown.
        let _ = self.shutdown();
    }
}

// Mutex poisoning means a panic elsewhere; the protected state is plain data
// that stays usable, so continue with the inner value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
