//! Authentication session orchestrator
//!
//! Drives one login attempt through the portal and SSO gateway. Every step
//! depends on cookies or values produced by the previous response, so the
//! sequence is strictly serial:
//!
//! 1. portal login redirect page
//! 2. SSO authorize URL
//! 3. SSO login page (issues the session-id cookie)
//! 4. captcha trigger + solution
//! 5. credential form submission
//! 6. redirect confirmation
//!
//! Statuses and bodies of these requests are not inspected; completing the
//! sequence without a transport error is what the gateway's own login page
//! treats as success. An optional probe can confirm the portal accepts the
//! resulting cookies.

use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue, REFERER};
use tracing::{debug, info, instrument, warn};

use crate::captcha;
use crate::constants::{DEFAULT_TIMEOUT, SESSION_COOKIE};
use crate::credentials::Credentials;
use crate::endpoints::Endpoints;
use crate::error::{AuthError, Result};
use crate::form::LoginForm;
use crate::session::{LoginVerification, Session, build_client};
use crate::state::{AuthEvent, AuthState, FailureReason, transition};

/// Knobs for a login attempt.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Total timeout for every step, also the connect and idle-read limit
    /// of the resulting session's client
    pub timeout: Duration,
    /// Probe a portal API endpoint after the sequence to confirm the login.
    /// Off by default.
    pub verify_login: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            verify_login: false,
        }
    }
}

/// One login attempt. Create a new orchestrator per attempt.
pub struct Orchestrator {
    credentials: Credentials,
    endpoints: Endpoints,
    options: OrchestratorOptions,
    state: AuthState,
}

impl Orchestrator {
    pub fn new(credentials: Credentials, endpoints: Endpoints, options: OrchestratorOptions) -> Self {
        Self {
            credentials,
            endpoints,
            options,
            state: AuthState::Init,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    fn advance(&mut self) {
        let state = std::mem::replace(&mut self.state, AuthState::Init);
        self.state = transition(state, AuthEvent::StepCompleted);
        debug!(state = self.state.label(), "login step completed");
    }

    fn fail(&mut self, err: AuthError) -> AuthError {
        let state = std::mem::replace(&mut self.state, AuthState::Init);
        let failed_at = state.label();
        self.state = transition(state, AuthEvent::StepFailed(FailureReason::from(&err)));
        warn!(failed_at, kind = err.kind(), error = %err, "login attempt failed");
        err
    }

    /// Label of the state the in-flight step is trying to reach.
    fn next_step(&self) -> &'static str {
        self.state
            .successor()
            .map(|s| s.label())
            .unwrap_or_else(|| self.state.label())
    }

    fn network(&self, err: reqwest::Error) -> AuthError {
        AuthError::Network {
            step: self.next_step(),
            detail: err.to_string(),
        }
    }

    /// Run the full login sequence and hand back the authenticated session.
    ///
    /// Fails with `Config` before any request when credentials are blank, and
    /// with `SessionTokenMissing` (making no further requests) when the login
    /// page does not set the session-id cookie.
    #[instrument(skip_all, fields(identity = %self.credentials.identity()))]
    pub async fn establish(&mut self) -> Result<Session> {
        if self.state != AuthState::Init {
            return Err(AuthError::Spent);
        }

        if let Err(e) = self.credentials.validate() {
            return Err(self.fail(e));
        }

        let (client, jar) = match build_client(&self.endpoints, self.options.timeout) {
            Ok(built) => built,
            Err(e) => return Err(self.fail(e)),
        };
        info!(sso = self.endpoints.sso(), "starting SSO login");

        let token = match self.run_sequence(&client).await {
            Ok(token) => token,
            Err(e) => return Err(self.fail(e)),
        };

        let mut session = Session::new(
            client,
            jar,
            self.endpoints.clone(),
            self.credentials.identity().to_owned(),
            token,
            LoginVerification::Unverified,
            self.options.timeout,
        );

        if self.options.verify_login {
            if let Err(e) = verify(&session).await {
                return Err(self.fail(e));
            }
            session.mark_verified();
        }
        self.advance();

        info!(verification = ?session.verification(), "session established");
        Ok(session)
    }

    /// Steps from the portal visit through the redirect confirmation.
    /// Returns the session-id token; the caller makes the final transition.
    async fn run_sequence(&mut self, client: &reqwest::Client) -> Result<String> {
        let timeout = self.options.timeout;

        // Init -> PortalVisited
        let response = client
            .get(self.endpoints.portal_login())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.network(e))?;
        debug!(status = response.status().as_u16(), "portal login page");
        self.advance();

        // PortalVisited -> AuthUrlVisited
        let authorize_url = self.endpoints.authorize();
        let response = client
            .get(&authorize_url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.network(e))?;
        debug!(status = response.status().as_u16(), "authorize URL");
        self.advance();

        // AuthUrlVisited -> LoginPageLoaded
        let response = client
            .get(self.endpoints.login_page())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.network(e))?;
        let token = response
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_owned())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::SessionTokenMissing)?;
        debug!(status = response.status().as_u16(), "login page loaded, session-id cookie present");
        self.advance();

        // LoginPageLoaded -> CaptchaFetched
        let challenge = captcha::acquire(client, &self.endpoints, timeout).await?;
        self.advance();

        // CaptchaFetched -> CredentialsSubmitted
        let login_url = self.endpoints.login_submit(&token);
        let form = LoginForm::new(&authorize_url, &self.credentials, challenge);
        let response = client
            .post(&login_url)
            .form(&form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.network(e))?;
        debug!(status = response.status().as_u16(), "credentials submitted");
        self.advance();

        // CredentialsSubmitted -> Established
        let response = client
            .get(self.endpoints.redirect_confirm(self.credentials.identity()))
            .header(REFERER, &login_url)
            .header(
                HeaderName::from_static("upgrade-insecure-requests"),
                HeaderValue::from_static("1"),
            )
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.network(e))?;
        debug!(status = response.status().as_u16(), "redirect confirmed");

        Ok(token)
    }
}

/// Ask the portal for a data endpoint with the fresh cookies.
async fn verify(session: &Session) -> Result<()> {
    let response = session
        .client()
        .get(session.endpoints().verify_probe())
        .timeout(session.timeout())
        .send()
        .await
        .map_err(|e| AuthError::Network {
            step: "verify",
            detail: e.to_string(),
        })?;
    let status = response.status();
    match status.as_u16() {
        _ if status.is_success() => Ok(()),
        401 | 403 => Err(AuthError::LoginRejected {
            status: status.as_u16(),
        }),
        other => Err(AuthError::Http { status: other }),
    }
}
