//! Authenticated HTTP session
//!
//! A `Session` is the cookie jar plus the client that writes to it. It is
//! produced by one orchestrator run and then moved into whichever API client
//! consumes it; it is deliberately not `Clone`.

use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};

use crate::endpoints::Endpoints;
use crate::error::{AuthError, Result};

/// Whether anything confirmed the login actually succeeded.
///
/// The SSO sequence itself never reports success or failure; reaching the end
/// without a transport error yields `Unverified`. `Verified` requires the
/// opt-in probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginVerification {
    Unverified,
    Verified,
    /// Session built without any login
    #[cfg(any(test, feature = "test-util"))]
    Anonymous,
}

pub struct Session {
    client: reqwest::Client,
    jar: Arc<Jar>,
    endpoints: Endpoints,
    identity: String,
    token: Secret<String>,
    verification: LoginVerification,
    timeout: Duration,
}

impl Session {
    pub(crate) fn new(
        client: reqwest::Client,
        jar: Arc<Jar>,
        endpoints: Endpoints,
        identity: String,
        token: String,
        verification: LoginVerification,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            jar,
            endpoints,
            identity,
            token: Secret::new(token),
            verification,
            timeout,
        }
    }

    /// A session that never went through the SSO sequence.
    #[cfg(any(test, feature = "test-util"))]
    pub fn anonymous(endpoints: Endpoints, timeout: Duration) -> Result<Self> {
        let (client, jar) = build_client(&endpoints, timeout)?;
        Ok(Self::new(
            client,
            jar,
            endpoints,
            String::new(),
            String::new(),
            LoginVerification::Anonymous,
            timeout,
        ))
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Value of the session-id cookie captured from the login page.
    pub fn session_token(&self) -> &str {
        self.token.expose()
    }

    pub fn verification(&self) -> LoginVerification {
        self.verification
    }

    /// Total bound for one request/response exchange. The client itself only
    /// bounds connecting and idle reads; file transfers skip this bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn mark_verified(&mut self) {
        self.verification = LoginVerification::Verified;
    }

    /// Names of the cookies the jar would send to `url`, in jar order.
    pub fn cookie_names(&self, url: &str) -> Vec<String> {
        let Ok(url) = reqwest::Url::parse(url) else {
            return Vec::new();
        };
        let Some(header) = self.jar.cookies(&url) else {
            return Vec::new();
        };
        let Ok(header) = header.to_str() else {
            return Vec::new();
        };
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('=').map(|(name, _)| name.to_owned()))
            .collect()
    }

    pub fn has_cookie(&self, url: &str, name: &str) -> bool {
        self.cookie_names(url).iter().any(|n| n == name)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoints", &self.endpoints)
            .field("identity", &self.identity)
            .field("verification", &self.verification)
            .finish_non_exhaustive()
    }
}

/// Build a cookie-aware client with the session-wide `Referer`.
///
/// `timeout` bounds connecting and each idle gap while reading; callers add
/// a total per-request bound with `RequestBuilder::timeout` where they want
/// one. Request-level headers override the defaults.
pub(crate) fn build_client(
    endpoints: &Endpoints,
    timeout: Duration,
) -> Result<(reqwest::Client, Arc<Jar>)> {
    let jar = Arc::new(Jar::default());
    let mut headers = HeaderMap::new();
    headers.insert(
        REFERER,
        HeaderValue::from_str(&endpoints.portal_referer())
            .map_err(|e| AuthError::Client(format!("invalid portal URL for referer: {e}")))?,
    );
    let client = reqwest::Client::builder()
        .cookie_provider(jar.clone())
        .default_headers(headers)
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .user_agent(concat!("tku-auth/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AuthError::Client(e.to_string()))?;
    Ok((client, jar))
}
