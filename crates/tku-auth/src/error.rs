//! Error types for the login sequence

/// Errors from establishing an authenticated session.
///
/// `Config` and `SessionTokenMissing` are fatal for the attempt and never
/// worth retrying with the same input; `Network` covers any transport failure
/// at any step.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("SSO login page did not set the session-id cookie")]
    SessionTokenMissing,

    #[error("network error while reaching {step}: {detail}")]
    Network { step: &'static str, detail: String },

    #[error("login rejected: verification probe returned {status}")]
    LoginRejected { status: u16 },

    #[error("verification probe returned unexpected status {status}")]
    Http { status: u16 },

    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("orchestrator already ran; create a new one per login attempt")]
    Spent,
}

impl AuthError {
    /// Stable machine-readable label for envelopes and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Config(_) => "config",
            AuthError::SessionTokenMissing => "session_token_missing",
            AuthError::Network { .. } => "network",
            AuthError::LoginRejected { .. } => "login_rejected",
            AuthError::Http { .. } => "http",
            AuthError::Client(_) => "client",
            AuthError::Spent => "spent",
        }
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::LoginRejected { status } | AuthError::Http { status } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
