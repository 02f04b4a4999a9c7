use std::path::Path;

use domain::request::Bitmap;
use domain::transport::ImageDecoder;
use domain::{PrinterError, Result};
use image::{DynamicImage, imageops::FilterType};

/// Print head width of an 80mm printer at 203 dpi
pub const DEFAULT_MAX_WIDTH: u32 = 576;
const DEFAULT_THRESHOLD: u8 = 128;

/// Decodes PNG/JPEG/BMP/GIF data into a 1-bit raster for printing
#[derive(Debug, Clone)]
pub struct RasterDecoder {
    max_width: u32,
    threshold: u8,
}

impl Default for RasterDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WIDTH)
    }
}

impl RasterDecoder {
    pub fn new(max_width: u32) -> Self {
        Self {
            max_width: max_width.max(8),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    fn to_bitmap(&self, img: DynamicImage) -> Bitmap {
        let img = if img.width() > self.max_width {
            let scale = self.max_width as f32 / img.width() as f32;
            let height = ((img.height() as f32 * scale).round() as u32).max(1);
            img.resize_exact(self.max_width, height, FilterType::Triangle)
        } else {
            img
        };

        let gray = img.to_luma_alpha8();
        let (width, height) = gray.dimensions();
        let row_bytes = width.div_ceil(8) as usize;
        let mut pixels = vec![0u8; row_bytes * height as usize];

        for (x, y, pixel) in gray.enumerate_pixels() {
            let [luma, alpha] = pixel.0;
            // Transparent areas print as paper
            let black = alpha >= 128 && luma < self.threshold;
            if black {
                pixels[y as usize * row_bytes + (x / 8) as usize] |= 0x80 >> (x % 8);
            }
        }

        Bitmap::new(width, height, pixels)
    }
}

impl ImageDecoder for RasterDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Bitmap> {
        if bytes.is_empty() {
            return Err(PrinterError::decode("Image data is empty"));
        }
        let img = image::load_from_memory(bytes)
            .map_err(|e| PrinterError::decode(format!("Failed to decode image data: {}", e)))?;
        Ok(self.to_bitmap(img))
    }

    fn decode_file(&self, path: &Path) -> Result<Bitmap> {
        if !path.exists() {
            return Err(PrinterError::decode(format!(
                "Image file not found: {}",
                path.display()
            )));
        }
        let img = image::open(path)
            .map_err(|e| PrinterError::decode(format!("Failed to decode image file: {}", e)))?;
        Ok(self.to_bitmap(img))
    }
}
