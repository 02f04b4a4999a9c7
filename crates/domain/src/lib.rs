//! Domain layer - printer bridge types with no I/O
//!
//! This crate contains:
//! - Connection lifecycle state
//! - Print requests and their defaults
//! - Status snapshots and monitor events
//! - Collaborator interfaces (transport, port enumeration, encoder, image decoder)
//!
//! Implementations of the collaborator traits live in the infrastructure layer.

pub mod connection;
pub mod error;
pub mod request;
pub mod status;
pub mod transport;

// Re-export commonly used types
pub use connection::{ConnectionInfo, ConnectionState};
pub use error::{ErrorKind, PrinterError, Result};
pub use request::{
    BarcodeRequest, Bitmap, ControlCommand, PrintRequest, QrCodeRequest, TextRequest,
};
pub use status::{StatusEvent, StatusSnapshot};
pub use transport::{ImageDecoder, PortEnumerator, PrinterEncoder, Transport};
