use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::request::{Bitmap, PrintRequest};

/// Physical link to the printer.
///
/// A transport is opened and closed repeatedly over its lifetime; all methods
/// take `&self` so one instance can be shared between the connection owner and
/// the workers writing through it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the device at `path`
    async fn open(&self, path: &str, baud_rate: u32) -> Result<()>;

    /// Close the device. Closing a closed transport is not an error.
    async fn close(&self) -> Result<()>;

    /// Whether the underlying handle is currently open
    fn is_open(&self) -> bool;

    /// Write all bytes and flush
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Read whatever arrives within `timeout`.
    /// Returns `Ok(0)` if nothing arrived (the link is still considered healthy).
    async fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize>;
}

/// Lists candidate device paths
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
pub trait PortEnumerator: Send + Sync {
    /// Never fails; an empty list means nothing was found
    fn list_device_paths(&self) -> Vec<String>;
}

/// Turns print requests into protocol bytes and transmits them
#[async_trait]
pub trait PrinterEncoder: Send + Sync {
    async fn print(&self, transport: &dyn Transport, request: &PrintRequest) -> Result<()>;

    /// Query the device and fold the reply into the raw status bitmask
    async fn query_status(&self, transport: &dyn Transport) -> Result<u8>;

    /// Select the character encoding used for text. Unknown names fall back
    /// to the default. Returns the encoding now in effect.
    fn set_encoding(&self, name: &str) -> String;
}

/// Produces printable bitmaps from encoded images
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Bitmap>;

    fn decode_file(&self, path: &Path) -> Result<Bitmap>;
}
