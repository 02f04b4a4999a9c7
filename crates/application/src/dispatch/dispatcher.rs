use std::sync::Arc;

use domain::request::{
    BarcodeRequest, Bitmap, ControlCommand, PrintRequest, QrCodeRequest, TextRequest,
};
use domain::transport::PrinterEncoder;
use domain::{PrinterError, Result, StatusSnapshot};
use tracing::debug;

use crate::connection::{ActiveLink, ConnectionManager};
use crate::worker::{Pending, spawn_worker};

/// Runs print, control and status operations against the active connection.
///
/// Each call gets its own worker. Workers queue on the connection's
/// execution slot, so byte streams from concurrent requests never interleave.
#[derive(Clone)]
pub struct CommandDispatcher {
    connection: ConnectionManager,
    encoder: Arc<dyn PrinterEncoder>,
}

impl CommandDispatcher {
    pub fn new(connection: ConnectionManager, encoder: Arc<dyn PrinterEncoder>) -> Self {
        Self {
            connection,
            encoder,
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Validate and send one request.
    ///
    /// Fails fast with `NotConnected` when there is no live connection;
    /// nothing is spawned and the encoder is not called.
    pub fn submit(&self, request: PrintRequest) -> Pending<()> {
        let Some(link) = self.connection.active_link() else {
            return Pending::ready(Err(PrinterError::NotConnected));
        };
        if let Err(e) = request.validate() {
            return Pending::ready(Err(e));
        }

        let encoder = self.encoder.clone();
        let connection = self.connection.clone();
        spawn_worker(request.name(), async move {
            let _slot = link.slot().lock().await;
            ensure_current(&connection, &link)?;
            debug!(link = link.id(), request = request.name(), "Executing print request");
            encoder.print(link.transport(), &request).await
        })
    }

    pub fn print_text(&self, request: TextRequest) -> Pending<()> {
        self.submit(PrintRequest::Text(request))
    }

    pub fn print_string(&self, text: impl Into<String>) -> Pending<()> {
        self.submit(PrintRequest::RawString(text.into()))
    }

    pub fn print_barcode(&self, request: BarcodeRequest) -> Pending<()> {
        self.submit(PrintRequest::Barcode(request))
    }

    pub fn print_qr_code(&self, request: QrCodeRequest) -> Pending<()> {
        self.submit(PrintRequest::QrCode(request))
    }

    pub fn print_bitmap(&self, bitmap: Bitmap) -> Pending<()> {
        self.submit(PrintRequest::Bitmap(bitmap))
    }

    pub fn send_raw(&self, data: Vec<u8>) -> Pending<()> {
        self.submit(PrintRequest::RawBytes(data))
    }

    pub fn line_feed(&self, lines: u8) -> Pending<()> {
        self.submit(PrintRequest::Control(ControlCommand::LineFeed(lines)))
    }

    pub fn cut_paper(&self) -> Pending<()> {
        self.submit(PrintRequest::Control(ControlCommand::Cut))
    }

    pub fn open_cash_drawer(&self) -> Pending<()> {
        self.submit(PrintRequest::Control(ControlCommand::OpenDrawer))
    }

    pub fn reset(&self) -> Pending<()> {
        self.submit(PrintRequest::Control(ControlCommand::Reset))
    }

    /// One fresh status query, never cached
    pub fn check_status(&self) -> Pending<StatusSnapshot> {
        let Some(link) = self.connection.active_link() else {
            return Pending::ready(Err(PrinterError::NotConnected));
        };

        let encoder = self.encoder.clone();
        let connection = self.connection.clone();
        spawn_worker("check_status", async move {
            let _slot = link.slot().lock().await;
            ensure_current(&connection, &link)?;
            let code = encoder.query_status(link.transport()).await?;
            Ok(StatusSnapshot::from_code(code))
        })
    }

    /// Switch the encoder's text encoding; returns the one now in effect
    pub fn set_encoding(&self, name: &str) -> String {
        self.encoder.set_encoding(name)
    }
}

/// A worker that queued on a slot must still own the published connection
fn ensure_current(connection: &ConnectionManager, link: &ActiveLink) -> Result<()> {
    match connection.active_link() {
        Some(current) if current.id() == link.id() => Ok(()),
        _ => {
            debug!(link = link.id(), "Connection replaced while request was queued");
            Err(PrinterError::NotConnected)
        }
    }
}
