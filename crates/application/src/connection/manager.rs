use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use domain::transport::{PortEnumerator, Transport};
use domain::{ConnectionInfo, ConnectionState, PrinterError, Result};
use infrastructure::BridgeConfig;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::request_handler::RequestHandler;
use crate::worker::{Pending, spawn_worker};

/// Timing knobs of the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Pause after open before trusting `is_open`
    pub settle_delay: Duration,
    /// Bound on the request handler's shutdown during disconnect
    pub shutdown_timeout: Duration,
    pub handler_poll: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            shutdown_timeout: Duration::from_millis(1000),
            handler_poll: Duration::from_millis(50),
        }
    }
}

impl From<&BridgeConfig> for ConnectionOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            shutdown_timeout: config.shutdown_timeout(),
            handler_poll: config.handler_poll_interval(),
        }
    }
}

/// A verified, open connection.
///
/// Commands borrow it through [`ConnectionManager::active_link`]; the
/// execution slot serialises everything written to this connection.
pub struct ActiveLink {
    id: u64,
    info: ConnectionInfo,
    transport: Arc<dyn Transport>,
    slot: Arc<Mutex<()>>,
    healthy: Arc<AtomicBool>,
}

impl ActiveLink {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn slot(&self) -> &Mutex<()> {
        &self.slot
    }

    fn is_live(&self) -> bool {
        self.healthy.load(Ordering::SeqCst) && self.transport.is_open()
    }
}

#[derive(Default)]
struct Published {
    state: ConnectionState,
    link: Option<Arc<ActiveLink>>,
}

#[derive(Default)]
struct Lifecycle {
    handler: Option<RequestHandler>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    ports: Arc<dyn PortEnumerator>,
    options: ConnectionOptions,
    /// Held for the whole of every connect and disconnect
    lifecycle: Mutex<Lifecycle>,
    published: RwLock<Published>,
    next_link_id: AtomicU64,
}

/// Owns the single printer connection.
///
/// Cheap to clone; every clone drives the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        ports: Arc<dyn PortEnumerator>,
        options: ConnectionOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                ports,
                options,
                lifecycle: Mutex::new(Lifecycle::default()),
                published: RwLock::new(Published::default()),
                next_link_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn list_ports(&self) -> Vec<String> {
        self.inner.ports.list_device_paths()
    }

    /// Open `port`, replacing any current connection
    pub fn connect(&self, port: impl Into<String>, baud_rate: u32) -> Pending<ConnectionInfo> {
        let port = port.into();
        if port.trim().is_empty() {
            return Pending::ready(Err(PrinterError::invalid_argument("Port name is required")));
        }
        if baud_rate == 0 {
            return Pending::ready(Err(PrinterError::invalid_argument(
                "Baud rate must be positive",
            )));
        }

        let this = self.clone();
        spawn_worker("connect", async move { this.connect_serialized(port, baud_rate).await })
    }

    /// Close the current connection; a no-op when already disconnected
    pub fn disconnect(&self) -> Pending<()> {
        let this = self.clone();
        spawn_worker("disconnect", async move {
            let mut lifecycle = this.inner.lifecycle.lock().await;
            this.teardown(&mut lifecycle).await
        })
    }

    /// Recorded state is Connected and the transport itself still reports open
    pub fn is_connected(&self) -> bool {
        let published = self.read();
        published.state.is_connected()
            && published.link.as_ref().is_some_and(|link| link.is_live())
    }

    pub fn state(&self) -> ConnectionState {
        self.read().state
    }

    pub fn current_info(&self) -> Option<ConnectionInfo> {
        let published = self.read();
        if !published.state.is_connected() {
            return None;
        }
        published.link.as_ref().map(|link| link.info.clone())
    }

    /// The live link, or `None` when `is_connected()` would be false
    pub fn active_link(&self) -> Option<Arc<ActiveLink>> {
        let published = self.read();
        if !published.state.is_connected() {
            return None;
        }
        published.link.clone().filter(|link| link.is_live())
    }

    fn read(&self) -> RwLockReadGuard<'_, Published> {
        self.inner
            .published
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Published> {
        self.inner
            .published
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: std::result::Result<ConnectionState, &'static str>) -> Result<()> {
        let mut published = self.write();
        published.state = next.map_err(PrinterError::transport)?;
        Ok(())
    }

    async fn connect_serialized(&self, port: String, baud_rate: u32) -> Result<ConnectionInfo> {
        let mut lifecycle = self.inner.lifecycle.lock().await;

        if self.state() != ConnectionState::Disconnected || lifecycle.handler.is_some() {
            info!(port = %port, "Replacing existing connection");
            if let Err(e) = self.teardown(&mut lifecycle).await {
                warn!(error = %e, "Error closing previous connection");
            }
        }

        let current = self.state();
        self.set_state(current.to_connecting())?;
        info!(port = %port, baud_rate, "Connecting to printer");

        match self.open_and_verify(&mut lifecycle, &port, baud_rate).await {
            Ok(link) => {
                let info = link.info.clone();
                let mut published = self.write();
                published.state = published
                    .state
                    .to_connected()
                    .map_err(PrinterError::transport)?;
                published.link = Some(link);
                info!(port = %info.port, baud_rate = info.baud_rate, "Printer connected");
                Ok(info)
            }
            Err(e) => {
                warn!(port = %port, error = %e, "Connection attempt failed");
                self.abandon(&mut lifecycle).await;
                Err(e)
            }
        }
    }

    async fn open_and_verify(
        &self,
        lifecycle: &mut Lifecycle,
        port: &str,
        baud_rate: u32,
    ) -> Result<Arc<ActiveLink>> {
        let transport = self.inner.transport.clone();
        transport.open(port, baud_rate).await?;

        let slot = Arc::new(Mutex::new(()));
        let healthy = Arc::new(AtomicBool::new(true));
        lifecycle.handler = Some(RequestHandler::spawn(
            transport.clone(),
            slot.clone(),
            healthy.clone(),
            self.inner.options.handler_poll,
        ));

        tokio::time::sleep(self.inner.options.settle_delay).await;

        if !transport.is_open() || !healthy.load(Ordering::SeqCst) {
            return Err(PrinterError::transport(format!(
                "Connection verification failed: {} is not open after {:?}",
                port, self.inner.options.settle_delay
            )));
        }

        Ok(Arc::new(ActiveLink {
            id: self.inner.next_link_id.fetch_add(1, Ordering::SeqCst),
            info: ConnectionInfo::new(port, baud_rate),
            transport,
            slot,
            healthy,
        }))
    }

    /// Cleanup after a failed connect; secondary errors are only logged
    async fn abandon(&self, lifecycle: &mut Lifecycle) {
        if let Err(e) = self.inner.transport.close().await {
            warn!(error = %e, "Ignoring close error during connect cleanup");
        }
        if let Some(handler) = lifecycle.handler.take() {
            handler.stop(self.inner.options.shutdown_timeout).await;
        }
        let mut published = self.write();
        published.link = None;
        published.state = published.state.to_disconnected();
    }

    async fn teardown(&self, lifecycle: &mut Lifecycle) -> Result<()> {
        let link = {
            let mut published = self.write();
            if published.state == ConnectionState::Disconnected && lifecycle.handler.is_none() {
                debug!("Disconnect requested while already disconnected");
                return Ok(());
            }
            published.state = published
                .state
                .to_disconnecting()
                .unwrap_or(ConnectionState::Disconnecting);
            published.link.take()
        };
        if let Some(link) = &link {
            info!(port = %link.info.port, "Disconnecting printer");
        }

        let closed = self.inner.transport.close().await;

        if let Some(handler) = lifecycle.handler.take() {
            handler.stop(self.inner.options.shutdown_timeout).await;
        }

        {
            let mut published = self.write();
            published.state = published.state.to_disconnected();
        }

        match closed {
            Ok(()) => {
                info!("Printer disconnected");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Transport reported an error while closing");
                Err(e)
            }
        }
    }
}
