//! High-level print requests accepted by the command dispatcher.
//!
//! Requests are plain values: built once, validated, and handed to the
//! encoder exactly once. Parameter defaults follow the printer SDK
//! conventions (barcode height 100, QR module size 4, ...).

use serde::{Deserialize, Serialize};

use crate::error::{PrinterError, Result};

pub const ALIGN_LEFT: u8 = 0;
pub const ALIGN_CENTER: u8 = 1;
pub const ALIGN_RIGHT: u8 = 2;

/// UPC-A, UPC-E, EAN13, EAN8, CODE39, ITF, CODABAR, CODE93, CODE128
pub const MAX_BARCODE_TYPE: u8 = 8;
pub const BARCODE_CODE128: u8 = 8;
/// GS k function B carries the symbol length in a single byte
pub const MAX_BARCODE_DATA: usize = 255;
pub const DEFAULT_BARCODE_TYPE: u8 = 1;
pub const DEFAULT_BARCODE_HEIGHT: u8 = 100;
pub const DEFAULT_BARCODE_WIDTH: u8 = 2;
pub const DEFAULT_BARCODE_ALIGNMENT: u8 = ALIGN_CENTER;
/// HRI text printed below the bars
pub const DEFAULT_HRI_POSITION: u8 = 2;

pub const DEFAULT_QR_MODULE_SIZE: u8 = 4;
pub const DEFAULT_QR_ERROR_LEVEL: u8 = 1;

pub const DEFAULT_LINE_FEED: u8 = 1;

/// Font A or B
pub const MAX_FONT_TYPE: u8 = 1;
/// Character magnification 1x..8x
pub const MAX_TEXT_SIZE: u8 = 7;

/// Formatted text line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    pub text: String,
    #[serde(default)]
    pub alignment: u8,
    #[serde(default)]
    pub font_type: u8,
    #[serde(default)]
    pub text_size: u8,
}

impl TextRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            alignment: ALIGN_LEFT,
            font_type: 0,
            text_size: 0,
        }
    }
}

/// One-dimensional barcode symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeRequest {
    pub data: String,
    pub barcode_type: u8,
    pub height: u8,
    pub width: u8,
    pub alignment: u8,
    pub hri_position: u8,
}

impl BarcodeRequest {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            barcode_type: DEFAULT_BARCODE_TYPE,
            height: DEFAULT_BARCODE_HEIGHT,
            width: DEFAULT_BARCODE_WIDTH,
            alignment: DEFAULT_BARCODE_ALIGNMENT,
            hri_position: DEFAULT_HRI_POSITION,
        }
    }

    /// Symbol content as transmitted. CODE128 gets code set B unless the
    /// data already selects one.
    pub fn symbol_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.data.len() + 2);
        if self.barcode_type == BARCODE_CODE128 && !self.data.starts_with('{') {
            data.extend_from_slice(b"{B");
        }
        data.extend_from_slice(self.data.as_bytes());
        data
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeRequest {
    pub data: String,
    pub module_size: u8,
    pub error_level: u8,
}

impl QrCodeRequest {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            module_size: DEFAULT_QR_MODULE_SIZE,
            error_level: DEFAULT_QR_ERROR_LEVEL,
        }
    }
}

/// 1-bit raster image.
///
/// `pixels` holds `height` rows of `width.div_ceil(8)` bytes each, most
/// significant bit first, a set bit meaning a black dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    #[serde(default = "default_bitmap_alignment")]
    pub alignment: u8,
}

fn default_bitmap_alignment() -> u8 {
    ALIGN_CENTER
}

impl Bitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
            alignment: ALIGN_CENTER,
        }
    }

    pub fn bytes_per_row(&self) -> usize {
        self.width.div_ceil(8) as usize
    }
}

/// Paper-handling and device-control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlCommand {
    LineFeed(u8),
    Cut,
    OpenDrawer,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintRequest {
    Text(TextRequest),
    RawString(String),
    Barcode(BarcodeRequest),
    QrCode(QrCodeRequest),
    Bitmap(Bitmap),
    RawBytes(Vec<u8>),
    Control(ControlCommand),
}

impl PrintRequest {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::RawString(_) => "raw_string",
            Self::Barcode(_) => "barcode",
            Self::QrCode(_) => "qr_code",
            Self::Bitmap(_) => "bitmap",
            Self::RawBytes(_) => "raw_bytes",
            Self::Control(ControlCommand::LineFeed(_)) => "line_feed",
            Self::Control(ControlCommand::Cut) => "cut",
            Self::Control(ControlCommand::OpenDrawer) => "open_drawer",
            Self::Control(ControlCommand::Reset) => "reset",
        }
    }

    /// Rejects malformed parameters before any I/O happens
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Text(req) => {
                if req.font_type > MAX_FONT_TYPE {
                    return Err(PrinterError::invalid_argument(format!(
                        "Font type must be 0 or 1, got {}",
                        req.font_type
                    )));
                }
                if req.text_size > MAX_TEXT_SIZE {
                    return Err(PrinterError::invalid_argument(format!(
                        "Text size must be between 0 and {}, got {}",
                        MAX_TEXT_SIZE, req.text_size
                    )));
                }
                check_alignment(req.alignment)
            }
            Self::RawString(_) => Ok(()),
            Self::Barcode(req) => {
                if req.data.is_empty() {
                    return Err(PrinterError::invalid_argument("Barcode data is required"));
                }
                if req.barcode_type > MAX_BARCODE_TYPE {
                    return Err(PrinterError::invalid_argument(format!(
                        "Barcode type must be between 0 and {}, got {}",
                        MAX_BARCODE_TYPE, req.barcode_type
                    )));
                }
                let length = req.symbol_data().len();
                if length > MAX_BARCODE_DATA {
                    return Err(PrinterError::invalid_argument(format!(
                        "Barcode data is {} bytes, at most {} fit in one symbol",
                        length, MAX_BARCODE_DATA
                    )));
                }
                if req.height == 0 {
                    return Err(PrinterError::invalid_argument(
                        "Barcode height must be at least 1",
                    ));
                }
                if !(1..=6).contains(&req.width) {
                    return Err(PrinterError::invalid_argument(format!(
                        "Barcode width must be between 1 and 6, got {}",
                        req.width
                    )));
                }
                if req.hri_position > 3 {
                    return Err(PrinterError::invalid_argument(format!(
                        "HRI position must be between 0 and 3, got {}",
                        req.hri_position
                    )));
                }
                check_alignment(req.alignment)
            }
            Self::QrCode(req) => {
                if req.data.is_empty() {
                    return Err(PrinterError::invalid_argument("QR code data is required"));
                }
                if !(1..=16).contains(&req.module_size) {
                    return Err(PrinterError::invalid_argument(format!(
                        "QR module size must be between 1 and 16, got {}",
                        req.module_size
                    )));
                }
                if req.error_level > 3 {
                    return Err(PrinterError::invalid_argument(format!(
                        "QR error level must be between 0 and 3, got {}",
                        req.error_level
                    )));
                }
                Ok(())
            }
            Self::Bitmap(bitmap) => {
                if bitmap.width == 0 || bitmap.height == 0 {
                    return Err(PrinterError::invalid_argument("Bitmap has no pixels"));
                }
                let expected = bitmap.bytes_per_row() * bitmap.height as usize;
                if bitmap.pixels.len() != expected {
                    return Err(PrinterError::invalid_argument(format!(
                        "Bitmap buffer holds {} bytes, expected {} for {}x{}",
                        bitmap.pixels.len(),
                        expected,
                        bitmap.width,
                        bitmap.height
                    )));
                }
                check_alignment(bitmap.alignment)
            }
            Self::RawBytes(data) => {
                if data.is_empty() {
                    return Err(PrinterError::invalid_argument("Data is required"));
                }
                Ok(())
            }
            Self::Control(ControlCommand::LineFeed(0)) => Err(PrinterError::invalid_argument(
                "Line feed count must be at least 1",
            )),
            Self::Control(_) => Ok(()),
        }
    }
}

fn check_alignment(alignment: u8) -> Result<()> {
    if alignment > ALIGN_RIGHT {
        return Err(PrinterError::invalid_argument(format!(
            "Alignment must be 0 (left), 1 (center) or 2 (right), got {}",
            alignment
        )));
    }
    Ok(())
}
