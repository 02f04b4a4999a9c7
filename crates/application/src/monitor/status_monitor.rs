use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use domain::StatusEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::CommandDispatcher;

type Subscriber = mpsc::UnboundedSender<StatusEvent>;

/// Periodic status polling (automatic status back).
///
/// Stopped until [`start`](Self::start). While running, every tick probes the
/// printer if it is connected and someone is subscribed, and pushes either a
/// snapshot or an error payload. A failed probe never stops the schedule.
#[derive(Clone)]
pub struct StatusMonitor {
    probe: Arc<Probe>,
    interval: Duration,
    schedule: Arc<Mutex<Option<Schedule>>>,
}

struct Schedule {
    token: CancellationToken,
    // Detached on stop; an in-flight probe finishes and is discarded
    _handle: JoinHandle<()>,
}

struct Probe {
    dispatcher: CommandDispatcher,
    subscriber: Mutex<Option<Subscriber>>,
}

impl StatusMonitor {
    pub fn new(dispatcher: CommandDispatcher, interval: Duration) -> Self {
        Self {
            probe: Arc::new(Probe {
                dispatcher,
                subscriber: Mutex::new(None),
            }),
            interval,
            schedule: Arc::new(Mutex::new(None)),
        }
    }

    /// Start polling, first probe immediately. Restarts if already running.
    pub fn start(&self) {
        let mut schedule = lock(&self.schedule);
        if let Some(previous) = schedule.take() {
            debug!("Restarting status monitor");
            previous.token.cancel();
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(self.probe.clone(), self.interval, token.clone()));
        *schedule = Some(Schedule {
            token,
            _handle: handle,
        });
        info!(interval_ms = self.interval.as_millis() as u64, "Status monitor started");
    }

    /// Cancel future ticks. Idempotent.
    pub fn stop(&self) {
        if let Some(schedule) = lock(&self.schedule).take() {
            schedule.token.cancel();
            info!("Status monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.schedule)
            .as_ref()
            .is_some_and(|schedule| !schedule.token.is_cancelled())
    }

    /// Attach the single subscriber, replacing any previous one
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StatusEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if lock(&self.probe.subscriber).replace(tx).is_some() {
            debug!("Replaced previous status subscriber");
        }
        rx
    }

    /// Detach the subscriber; the schedule keeps running
    pub fn unsubscribe(&self) {
        lock(&self.probe.subscriber).take();
    }

    pub fn has_subscriber(&self) -> bool {
        self.probe.has_subscriber()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

async fn run(probe: Arc<Probe>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        probe.tick(&token).await;
    }
    debug!("Status monitor loop exited");
}

impl Probe {
    fn has_subscriber(&self) -> bool {
        lock(&self.subscriber)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    async fn tick(&self, token: &CancellationToken) {
        if !self.dispatcher.connection().is_connected() || !self.has_subscriber() {
            return;
        }

        let event = match self.dispatcher.check_status().await {
            Ok(snapshot) => StatusEvent::Status(snapshot),
            Err(e) => {
                warn!(error = %e, "Status probe failed");
                StatusEvent::error(e.reason())
            }
        };

        if token.is_cancelled() {
            debug!("Discarding status probe finished after stop");
            return;
        }
        self.publish(event);
    }

    fn publish(&self, event: StatusEvent) {
        let mut subscriber = lock(&self.subscriber);
        let delivered = subscriber.as_ref().is_some_and(|tx| tx.send(event).is_ok());
        if !delivered && subscriber.take().is_some() {
            debug!("Status subscriber went away");
        }
    }
}
