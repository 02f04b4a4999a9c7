//! Connection lifecycle

mod manager;
mod request_handler;

pub use manager::{ActiveLink, ConnectionManager, ConnectionOptions};
