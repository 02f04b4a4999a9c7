//! ESC/POS command encoding for receipt printers

mod builder;
mod encoder;

pub use builder::{CommandBuilder, StatusRequest};
pub use encoder::{EscPosEncoder, fold_status, lookup_encoding};
