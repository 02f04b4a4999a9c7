//! Infrastructure layer - serial transport, ESC/POS encoding, image decoding, configuration

pub mod config;
pub mod escpos;
pub mod imaging;
pub mod mock;
pub mod serial;

pub use config::BridgeConfig;
pub use escpos::EscPosEncoder;
pub use imaging::RasterDecoder;
pub use mock::MockTransport;
pub use serial::{SerialConfig, SerialPortFinder, SerialTransport};
