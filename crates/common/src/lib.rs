//! Types shared by the TKU portal crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
