//! Service-specific error types

use thiserror::Error;

/// Tool server errors.
///
/// Portal and login failures never appear here: they are reported to the
/// caller inside the tool-call envelope, not propagated as Rust errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("stdio transport failed: {0}")]
    Transport(#[from] std::io::Error),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
