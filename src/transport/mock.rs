//! In-memory transport double for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::transport::Transport;

#[derive(Debug, Default)]
struct MockState {
    written: Vec<u8>,
    incoming: VecDeque<u8>,
}

/// Loopback transport backed by shared byte queues.
///
/// Clones share the same queues, matching the real port where the write and
/// read halves are two handles to one device. Tests inject device output
/// with [`MockTransport::push_incoming`] and inspect host output with
/// [`MockTransport::take_written`].
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Fresh transport with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by subsequent reads, as if the device had
    /// sent them.
    pub fn push_incoming(&self, bytes: &[u8]) {
        let mut state = lock(&self.state);
        state.incoming.extend(bytes.iter().copied());
    }

    /// All bytes written by the host so far, draining the capture buffer.
    pub fn take_written(&self) -> Vec<u8> {
        let mut state = lock(&self.state);
        std::mem::take(&mut state.written)
    }

    /// Number of captured written bytes without draining.
    pub fn written_len(&self) -> usize {
        lock(&self.state).written.len()
    }
}

// A poisoned lock only happens when another test thread panicked; propagate
// the inner state anyway so the failure surfaces in the assertion, not here.
fn lock(state: &Arc<Mutex<MockState>>) -> std::sync::MutexGuard<'_, MockState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        state.written.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = lock(&self.state);
        let n = buf.len().min(state.incoming.len());
        for slot in buf.iter_mut().take(n) {
            // n is bounded by incoming.len() above
            if let Some(byte) = state.incoming.pop_front() {
                *slot = byte;
            }
        }
        Ok(n)
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(self.clone()))
    }
}
