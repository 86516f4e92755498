//! Captcha acquisition
//!
//! The SSO gateway generates a challenge on GET and hands back its plaintext
//! solution on a follow-up POST with `outType=2`, both bound to the current
//! cookies. The endpoint is treated as an opaque solution provider; no image
//! is ever decoded.

use std::time::Duration;

use reqwest::header::{ACCEPT, ORIGIN, REFERER};
use tracing::{debug, warn};

use crate::constants::CAPTCHA_ACCEPT;
use crate::endpoints::Endpoints;
use crate::error::{AuthError, Result};

/// Server-issued captcha solution, consumed by exactly one login form.
pub struct CaptchaChallenge {
    solution: String,
}

impl CaptchaChallenge {
    pub(crate) fn new(solution: impl Into<String>) -> Self {
        Self {
            solution: solution.into(),
        }
    }

    pub fn solution(&self) -> &str {
        &self.solution
    }

    pub fn into_solution(self) -> String {
        self.solution
    }
}

impl std::fmt::Debug for CaptchaChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptchaChallenge")
            .field("len", &self.solution.len())
            .finish()
    }
}

const STEP: &str = "captcha_fetched";

fn network(detail: impl std::fmt::Display) -> AuthError {
    AuthError::Network {
        step: STEP,
        detail: detail.to_string(),
    }
}

/// Trigger challenge generation, then fetch its solution.
pub async fn acquire(
    client: &reqwest::Client,
    endpoints: &Endpoints,
    timeout: Duration,
) -> Result<CaptchaChallenge> {
    let url = endpoints.captcha();
    let login_page = endpoints.login_page_base();

    let trigger = client
        .get(&url)
        .header(REFERER, &login_page)
        .header(ACCEPT, CAPTCHA_ACCEPT)
        .timeout(timeout)
        .send()
        .await
        .map_err(network)?;
    debug!(status = trigger.status().as_u16(), "captcha challenge generated");

    let response = client
        .post(&url)
        .header(ORIGIN, endpoints.sso())
        .header(REFERER, &login_page)
        .form(&[("outType", "2")])
        .timeout(timeout)
        .send()
        .await
        .map_err(network)?;
    let status = response.status();
    let body = response.text().await.map_err(network)?;

    let solution = body.trim().to_owned();
    if solution.is_empty() {
        warn!(status = status.as_u16(), "captcha endpoint returned an empty solution");
    } else {
        debug!(status = status.as_u16(), len = solution.len(), "captcha solution received");
    }

    Ok(CaptchaChallenge::new(solution))
}
