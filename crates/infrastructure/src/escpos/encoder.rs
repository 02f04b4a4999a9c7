use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::request::{ControlCommand, PrintRequest};
use domain::status::{
    STATUS_COVER_OPEN, STATUS_NORMAL, STATUS_PAPER_EMPTY, STATUS_PAPER_NEAR_END,
    STATUS_PRINTER_ERROR,
};
use domain::transport::{PrinterEncoder, Transport};
use domain::{PrinterError, Result};
use encoding_rs::{BIG5, EUC_KR, Encoding, GBK, SHIFT_JIS, UTF_8};

use super::builder::{CommandBuilder, StatusRequest};

// DLE EOT 2: offline cause
const OFFLINE_COVER_OPEN: u8 = 0x04;
const OFFLINE_PAPER_END_STOP: u8 = 0x20;
const OFFLINE_ERROR: u8 = 0x40;
// DLE EOT 3: error cause (autocutter, unrecoverable, auto-recoverable)
const ERROR_ANY: u8 = 0x08 | 0x20 | 0x40;
// DLE EOT 4: roll paper sensor
const PAPER_NEAR_END: u8 = 0x0C;
const PAPER_END: u8 = 0x60;

/// Fixed bits every real-time status byte carries (bit 1 and bit 4 set, bits 0 and 7 clear)
const STATUS_FIXED_MASK: u8 = 0x93;
const STATUS_FIXED_BITS: u8 = 0x12;

/// Fold the three real-time status replies into the bridge's status bitmask
pub fn fold_status(offline: u8, error: u8, paper: u8) -> u8 {
    let mut code = STATUS_NORMAL;
    if offline & OFFLINE_COVER_OPEN != 0 {
        code |= STATUS_COVER_OPEN;
    }
    if paper & PAPER_END != 0 || offline & OFFLINE_PAPER_END_STOP != 0 {
        code |= STATUS_PAPER_EMPTY;
    }
    if paper & PAPER_NEAR_END != 0 {
        code |= STATUS_PAPER_NEAR_END;
    }
    if error & ERROR_ANY != 0 || offline & OFFLINE_ERROR != 0 {
        code |= STATUS_PRINTER_ERROR;
    }
    code
}

/// Text encodings the printer firmware understands, by the names callers use
pub fn lookup_encoding(name: &str) -> Option<&'static Encoding> {
    match name.to_ascii_uppercase().as_str() {
        "UTF-8" => Some(UTF_8),
        "EUC-KR" => Some(EUC_KR),
        "BIG5" => Some(BIG5),
        "GB2312" => Some(GBK),
        "SHIFT_JIS" => Some(SHIFT_JIS),
        _ => None,
    }
}

/// ESC/POS encoder writing through the active transport.
///
/// Clones share the selected text encoding.
#[derive(Debug, Clone)]
pub struct EscPosEncoder {
    response_timeout: Duration,
    encoding: Arc<RwLock<&'static Encoding>>,
}

impl Default for EscPosEncoder {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl EscPosEncoder {
    pub fn new(response_timeout: Duration) -> Self {
        Self {
            response_timeout,
            encoding: Arc::new(RwLock::new(UTF_8)),
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        *self.encoding.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Encode a request without transmitting it
    pub fn encode(&self, request: &PrintRequest) -> Vec<u8> {
        let builder = CommandBuilder::with_encoding(self.encoding());
        let builder = match request {
            PrintRequest::Text(req) => builder
                .align(req.alignment)
                .text_style(req.font_type, req.text_size)
                .text(&req.text)
                .text_style(0, 0)
                .align(0),
            PrintRequest::RawString(text) => builder.text(text),
            PrintRequest::Barcode(req) => builder.barcode(req),
            PrintRequest::QrCode(req) => builder.qr_code(req),
            PrintRequest::Bitmap(bitmap) => builder.raster(bitmap),
            PrintRequest::RawBytes(bytes) => builder.raw(bytes),
            PrintRequest::Control(ControlCommand::LineFeed(n)) => builder.feed(*n),
            PrintRequest::Control(ControlCommand::Cut) => builder.cut(),
            PrintRequest::Control(ControlCommand::OpenDrawer) => builder.open_drawer(),
            PrintRequest::Control(ControlCommand::Reset) => builder.initialize(),
        };
        builder.build()
    }

    async fn real_time_status(&self, transport: &dyn Transport, request: StatusRequest) -> Result<u8> {
        let command = CommandBuilder::new().status_request(request).build();
        transport.write(&command).await?;

        let mut reply = [0u8; 1];
        let n = transport.read(&mut reply, self.response_timeout).await?;
        if n == 0 {
            return Err(PrinterError::transport(format!(
                "No reply to status request {:?} within {:?}",
                request, self.response_timeout
            )));
        }
        if reply[0] & STATUS_FIXED_MASK != STATUS_FIXED_BITS {
            return Err(PrinterError::transport(format!(
                "Unexpected status reply 0x{:02X} to {:?}",
                reply[0], request
            )));
        }
        Ok(reply[0])
    }
}

#[async_trait]
impl PrinterEncoder for EscPosEncoder {
    async fn print(&self, transport: &dyn Transport, request: &PrintRequest) -> Result<()> {
        let bytes = self.encode(request);
        tracing::debug!(request = request.name(), bytes = bytes.len(), "Sending print job");
        transport.write(&bytes).await
    }

    async fn query_status(&self, transport: &dyn Transport) -> Result<u8> {
        let offline = self.real_time_status(transport, StatusRequest::Offline).await?;
        let error = self.real_time_status(transport, StatusRequest::Error).await?;
        let paper = self.real_time_status(transport, StatusRequest::Paper).await?;
        let code = fold_status(offline, error, paper);
        tracing::trace!(offline, error, paper, code, "Printer status");
        Ok(code)
    }

    fn set_encoding(&self, name: &str) -> String {
        let selected = lookup_encoding(name).unwrap_or_else(|| {
            tracing::warn!(requested = name, "Unknown text encoding, using UTF-8");
            UTF_8
        });
        *self.encoding.write().unwrap_or_else(|e| e.into_inner()) = selected;
        tracing::info!(encoding = selected.name(), "Text encoding selected");
        selected.name().to_string()
    }
}
