use domain::request::{BarcodeRequest, Bitmap, MAX_BARCODE_TYPE, QrCodeRequest};
use encoding_rs::{Encoding, UTF_8};

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const DLE: u8 = 0x10;
const EOT: u8 = 0x04;

/// Rows per GS v 0 band; keeps each raster command inside small printer buffers
const RASTER_BAND_ROWS: u32 = 255;

/// Which real-time status to transmit with DLE EOT n
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRequest {
    Printer = 1,
    Offline = 2,
    Error = 3,
    Paper = 4,
}

/// Accumulates ESC/POS commands into one byte buffer
#[derive(Debug)]
pub struct CommandBuilder {
    buffer: Vec<u8>,
    encoding: &'static Encoding,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuilder {
    pub fn new() -> Self {
        Self::with_encoding(UTF_8)
    }

    /// Text is converted to `encoding` before it is buffered
    pub fn with_encoding(encoding: &'static Encoding) -> Self {
        Self {
            buffer: Vec::new(),
            encoding,
        }
    }

    pub fn initialize(mut self) -> Self {
        // ESC @: Initialize printer
        self.buffer.extend_from_slice(&[ESC, 0x40]);
        self
    }

    pub fn align(mut self, alignment: u8) -> Self {
        // ESC a n: Align (0: Left, 1: Center, 2: Right)
        self.buffer.extend_from_slice(&[ESC, 0x61, alignment.min(2)]);
        self
    }

    /// Font (0: A, 1: B) and character size (0..=7, applied to width and height).
    /// Ranges are checked by request validation.
    pub fn text_style(mut self, font_type: u8, text_size: u8) -> Self {
        self.buffer.extend_from_slice(&[ESC, 0x4D, font_type]);
        self.buffer
            .extend_from_slice(&[GS, 0x21, (text_size << 4) | text_size]);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        let (bytes, _, unmappable) = self.encoding.encode(text);
        if unmappable {
            tracing::warn!(
                encoding = self.encoding.name(),
                "Text has characters outside the printer encoding"
            );
        }
        self.buffer.extend_from_slice(&bytes);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    pub fn feed(mut self, n: u8) -> Self {
        // ESC d n: Print and feed n lines
        self.buffer.extend_from_slice(&[ESC, 0x64, n]);
        self
    }

    pub fn cut(mut self) -> Self {
        // GS V 66 0: Feed to cut position and cut
        self.buffer.extend_from_slice(&[GS, 0x56, 66, 0]);
        self
    }

    pub fn open_drawer(mut self) -> Self {
        // ESC p m t1 t2: pulse pin 2, 50ms on, 500ms off
        self.buffer.extend_from_slice(&[ESC, 0x70, 0, 25, 250]);
        self
    }

    pub fn barcode(mut self, req: &BarcodeRequest) -> Self {
        let symbology = req.barcode_type.min(MAX_BARCODE_TYPE);
        // Validation keeps the symbol within one length byte
        let data = req.symbol_data();
        let len = data.len() as u8;

        self.buffer.extend_from_slice(&[GS, 0x68, req.height]); // GS h: height
        self.buffer.extend_from_slice(&[GS, 0x77, req.width]); // GS w: module width
        self.buffer.extend_from_slice(&[GS, 0x48, req.hri_position]); // GS H: HRI position
        self = self.align(req.alignment);
        self.buffer.extend_from_slice(&[GS, 0x6B, 65 + symbology, len]);
        self.buffer.extend_from_slice(&data);
        self.align(0)
    }

    pub fn qr_code(mut self, req: &QrCodeRequest) -> Self {
        // GS ( k: model 2, module size, error correction, store, print
        self.buffer
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]);
        self.buffer
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, req.module_size]);
        self.buffer.extend_from_slice(&[
            GS,
            0x28,
            0x6B,
            0x03,
            0x00,
            0x31,
            0x45,
            0x30 + req.error_level.min(3),
        ]);

        let data = req.data.as_bytes();
        let store_len = data.len() + 3;
        self.buffer.extend_from_slice(&[
            GS,
            0x28,
            0x6B,
            (store_len & 0xFF) as u8,
            ((store_len >> 8) & 0xFF) as u8,
            0x31,
            0x50,
            0x30,
        ]);
        self.buffer.extend_from_slice(data);
        self.buffer
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);
        self
    }

    pub fn raster(mut self, bitmap: &Bitmap) -> Self {
        let row_bytes = bitmap.bytes_per_row();
        self = self.align(bitmap.alignment);

        let mut row = 0u32;
        while row < bitmap.height {
            let rows = RASTER_BAND_ROWS.min(bitmap.height - row);
            let start = row as usize * row_bytes;
            let end = start + rows as usize * row_bytes;

            // GS v 0 m xL xH yL yH d1...dk
            self.buffer.extend_from_slice(&[
                GS,
                0x76,
                0x30,
                0x00,
                (row_bytes & 0xFF) as u8,
                ((row_bytes >> 8) & 0xFF) as u8,
                (rows & 0xFF) as u8,
                ((rows >> 8) & 0xFF) as u8,
            ]);
            self.buffer.extend_from_slice(&bitmap.pixels[start..end]);
            row += rows;
        }
        self.align(0)
    }

    pub fn status_request(mut self, request: StatusRequest) -> Self {
        self.buffer.extend_from_slice(&[DLE, EOT, request as u8]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}
