//! Application layer - connection lifecycle, command dispatch and status polling

pub mod bridge;
pub mod connection;
pub mod dispatch;
pub mod monitor;
pub mod worker;

pub use bridge::{BridgeOptions, PrinterBridge};
pub use connection::{ConnectionManager, ConnectionOptions};
pub use dispatch::CommandDispatcher;
pub use monitor::StatusMonitor;
pub use worker::{Pending, spawn_worker};
