use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use domain::status::STATUS_NORMAL;
use domain::transport::Transport;
use domain::{PrinterError, Result};

/// Fixed bits of an idle ESC/POS real-time status reply
const IDLE_STATUS_REPLY: u8 = 0x12;

#[derive(Default)]
struct MockState {
    written: Vec<u8>,
    replies: VecDeque<Vec<u8>>,
    open_error_code: Option<i32>,
    close_error: Option<String>,
    write_error: Option<String>,
    read_error: Option<String>,
    open_delay: Duration,
    drop_after_open: bool,
    auto_status: bool,
    last_path: Option<String>,
}

/// In-memory transport with fault injection.
///
/// Clones share state, so a test can keep one handle while the bridge owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    open: Arc<AtomicBool>,
    open_calls: Arc<AtomicUsize>,
    concurrent_opens: Arc<AtomicUsize>,
    max_concurrent_opens: Arc<AtomicUsize>,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every status query with an idle printer reply
    pub fn simulated_printer() -> Self {
        let transport = Self::new();
        transport.state().auto_status = true;
        transport
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next opens fail with the given device error code
    pub fn fail_open_with(&self, code: i32) {
        self.state().open_error_code = Some(code);
    }

    /// Open succeeds but the device drops right after, so verification fails
    pub fn drop_after_open(&self, enabled: bool) {
        self.state().drop_after_open = enabled;
    }

    pub fn set_open_delay(&self, delay: Duration) {
        self.state().open_delay = delay;
    }

    pub fn fail_close(&self, message: impl Into<String>) {
        self.state().close_error = Some(message.into());
    }

    pub fn fail_writes(&self, message: impl Into<String>) {
        self.state().write_error = Some(message.into());
    }

    pub fn fail_reads(&self, message: impl Into<String>) {
        self.state().read_error = Some(message.into());
    }

    pub fn clear_faults(&self) {
        let mut state = self.state();
        state.open_error_code = None;
        state.close_error = None;
        state.write_error = None;
        state.read_error = None;
        state.drop_after_open = false;
    }

    /// Queue bytes to be returned by the next read
    pub fn push_reply(&self, bytes: &[u8]) {
        self.state().replies.push_back(bytes.to_vec());
    }

    /// Simulate the device vanishing without a close
    pub fn kill(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn written(&self) -> Vec<u8> {
        self.state().written.clone()
    }

    pub fn clear_written(&self) {
        self.state().written.clear();
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open handles ever observed
    pub fn max_concurrent_opens(&self) -> usize {
        self.max_concurrent_opens.load(Ordering::SeqCst)
    }

    pub fn last_path(&self) -> Option<String> {
        self.state().last_path.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, path: &str, baud_rate: u32) -> Result<()> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, error_code, drop_after_open) = {
            let mut state = self.state();
            state.last_path = Some(path.to_string());
            (state.open_delay, state.open_error_code, state.drop_after_open)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(code) = error_code {
            return Err(PrinterError::transport(format!(
                "Device returned error code {} opening {} at {} baud",
                code, path, baud_rate
            )));
        }
        if self.open.swap(true, Ordering::SeqCst) {
            return Err(PrinterError::transport("Mock transport already open"));
        }

        let now_open = self.concurrent_opens.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_opens.fetch_max(now_open, Ordering::SeqCst);

        if drop_after_open {
            self.open.store(false, Ordering::SeqCst);
        }
        tracing::debug!(port = %path, baud_rate, "Mock transport opened");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        // Saturating: closing an already-closed handle does not underflow
        let _ = self
            .concurrent_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        if let Some(message) = self.state().close_error.clone() {
            return Err(PrinterError::Transport(message));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(PrinterError::NotConnected);
        }
        let mut state = self.state();
        if let Some(message) = state.write_error.clone() {
            return Err(PrinterError::Transport(message));
        }
        state.written.extend_from_slice(data);
        // DLE EOT n gets an immediate idle reply from the simulated printer
        if state.auto_status && data.len() == 3 && data[0] == 0x10 && data[1] == 0x04 {
            state.replies.push_back(vec![IDLE_STATUS_REPLY | STATUS_NORMAL]);
        }
        Ok(())
    }

    async fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.is_open() {
            return Err(PrinterError::NotConnected);
        }
        let reply = {
            let mut state = self.state();
            if let Some(message) = state.read_error.clone() {
                return Err(PrinterError::Transport(message));
            }
            state.replies.pop_front()
        };

        match reply {
            Some(mut bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    // Keep the remainder for the next read
                    self.state().replies.push_front(bytes.split_off(n));
                }
                Ok(n)
            }
            None => {
                tokio::time::sleep(timeout).await;
                Ok(0)
            }
        }
    }
}
