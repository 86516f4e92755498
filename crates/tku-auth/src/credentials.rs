//! Student credentials for the SSO login form

use common::Secret;

use crate::error::{AuthError, Result};

/// Identity (student id) and password.
///
/// Construction never fails; emptiness is checked by `validate()` so that a
/// missing credential surfaces as a structured `AuthError::Config` at the
/// start of a login attempt instead of a panic at load time.
#[derive(Debug, Clone)]
pub struct Credentials {
    identity: String,
    secret: Secret<String>,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into().trim().to_owned(),
            secret: Secret::new(secret.into()),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn secret(&self) -> &Secret<String> {
        &self.secret
    }

    /// Reject blank identity or password.
    pub fn validate(&self) -> Result<()> {
        match (self.identity.is_empty(), self.secret.is_blank()) {
            (false, false) => Ok(()),
            (true, true) => Err(AuthError::Config(
                "identity and secret are both missing".into(),
            )),
            (true, false) => Err(AuthError::Config("identity is missing".into())),
            (false, true) => Err(AuthError::Config("secret is missing".into())),
        }
    }
}
