mod port_finder;
mod transport;

pub use port_finder::SerialPortFinder;
pub use transport::{SerialConfig, SerialTransport};
