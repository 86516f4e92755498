//! Failure classification for portal calls

use std::fmt;

/// What went wrong with a portal call.
///
/// Mirrors the order checks happen in: transport first, then status, then
/// body decoding. `Io` covers local file access in transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Http(u16),
    Decode,
    Io,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Http(_) => "http",
            ErrorKind::Decode => "decode",
            ErrorKind::Io => "io",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ErrorKind::Http(status) => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Http(status) => write!(f, "http {status}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Characters of an error body repeated in `ApiError::message`.
const BODY_SNIPPET_CHARS: usize = 200;

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

/// A classified failure. `body` holds the untouched response payload for
/// `Http` errors, or `None` when it could not be read.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub body: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            body: None,
        }
    }

    pub fn network(err: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Network, err.to_string())
    }

    pub fn http(status: reqwest::StatusCode, body: Option<String>) -> Self {
        let snippet = body.as_deref().map(str::trim).unwrap_or_default();
        let message = if snippet.is_empty() {
            format!("portal returned {status}")
        } else {
            format!("portal returned {status}: {}", truncate(snippet, BODY_SNIPPET_CHARS))
        };
        Self {
            kind: ErrorKind::Http(status.as_u16()),
            message,
            body,
        }
    }

    pub fn decode(err: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Decode, format!("invalid JSON body: {err}"))
    }

    pub fn io(context: &str, err: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Io, format!("{context}: {err}"))
    }
}

/// Result alias for transfer and client helpers.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Outcome of a JSON call.
pub type ApiResult = Result<serde_json::Value>;
