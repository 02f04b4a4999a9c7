use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use domain::transport::Transport;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const DRAIN_BUFFER: usize = 256;

/// Background task servicing the read path of an open transport.
///
/// Drains unsolicited bytes whenever no command holds the execution slot.
/// A read failure ends the task and clears `healthy`.
pub(crate) struct RequestHandler {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RequestHandler {
    pub(crate) fn spawn(
        transport: Arc<dyn Transport>,
        slot: Arc<Mutex<()>>,
        healthy: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(
            transport,
            slot,
            healthy,
            poll_interval,
            token.clone(),
        ));
        Self { token, handle }
    }

    /// Cancel and wait up to `timeout` for the loop to finish, aborting it otherwise
    pub(crate) async fn stop(self, timeout: Duration) {
        self.token.cancel();
        let mut handle = self.handle;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => debug!("Request handler stopped"),
            Ok(Err(e)) if e.is_cancelled() => {}
            Ok(Err(e)) => warn!(error = %e, "Request handler ended abnormally"),
            Err(_) => {
                warn!(?timeout, "Request handler did not stop in time, aborting");
                handle.abort();
            }
        }
    }
}

async fn run(
    transport: Arc<dyn Transport>,
    slot: Arc<Mutex<()>>,
    healthy: Arc<AtomicBool>,
    poll_interval: Duration,
    token: CancellationToken,
) {
    let mut buf = [0u8; DRAIN_BUFFER];
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }

        // A command owns the link right now; it reads its own replies
        let Ok(_guard) = slot.try_lock() else {
            continue;
        };
        if token.is_cancelled() {
            break;
        }

        match transport.read(&mut buf, poll_interval).await {
            Ok(0) => {}
            Ok(n) => trace!(bytes = n, "Drained unsolicited printer output"),
            Err(e) => {
                warn!(error = %e, "Request handler lost the transport");
                healthy.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infrastructure::MockTransport;

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_marks_unhealthy() {
        let mock = MockTransport::new();
        mock.open("COM-A", 9600).await.unwrap();
        mock.fail_reads("cable pulled");

        let healthy = Arc::new(AtomicBool::new(true));
        let handler = RequestHandler::spawn(
            Arc::new(mock.clone()),
            Arc::new(Mutex::new(())),
            healthy.clone(),
            Duration::from_millis(50),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!healthy.load(Ordering::SeqCst));
        handler.stop(Duration::from_millis(1000)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_bounded() {
        let mock = MockTransport::new();
        mock.open("COM-A", 9600).await.unwrap();

        let healthy = Arc::new(AtomicBool::new(true));
        let handler = RequestHandler::spawn(
            Arc::new(mock),
            Arc::new(Mutex::new(())),
            healthy.clone(),
            Duration::from_millis(50),
        );

        tokio::time::sleep(Duration::from_millis(120)).await;
        let started = tokio::time::Instant::now();
        handler.stop(Duration::from_millis(1000)).await;
        assert!(started.elapsed() <= Duration::from_millis(1000));
        assert!(healthy.load(Ordering::SeqCst));
    }
}
