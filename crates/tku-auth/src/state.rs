//! Login progress state machine
//!
//! Pure state machine: receives events, returns the next state. The
//! orchestrator performs the I/O for each step and reports the outcome here.
//! Progress is strictly forward and `Established` / `Failed` are terminal.

use crate::error::AuthError;

/// Why a login attempt stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    MissingCredentials,
    SessionTokenMissing,
    Network(String),
    LoginRejected(u16),
    UnexpectedStatus(u16),
    ClientSetup(String),
}

impl From<&AuthError> for FailureReason {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::Config(_) => FailureReason::MissingCredentials,
            AuthError::SessionTokenMissing => FailureReason::SessionTokenMissing,
            AuthError::Network { detail, .. } => FailureReason::Network(detail.clone()),
            AuthError::LoginRejected { status } => FailureReason::LoginRejected(*status),
            AuthError::Http { status } => FailureReason::UnexpectedStatus(*status),
            AuthError::Client(msg) => FailureReason::ClientSetup(msg.clone()),
            AuthError::Spent => FailureReason::ClientSetup(err.to_string()),
        }
    }
}

/// Progress of one login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Init,
    PortalVisited,
    AuthUrlVisited,
    LoginPageLoaded,
    CaptchaFetched,
    CredentialsSubmitted,
    Established,
    Failed(FailureReason),
}

/// Outcome of the step the orchestrator just ran.
#[derive(Debug)]
pub enum AuthEvent {
    StepCompleted,
    StepFailed(FailureReason),
}

impl AuthState {
    /// Snake-case label used in logs and `AuthError::Network::step`.
    pub fn label(&self) -> &'static str {
        match self {
            AuthState::Init => "init",
            AuthState::PortalVisited => "portal_visited",
            AuthState::AuthUrlVisited => "auth_url_visited",
            AuthState::LoginPageLoaded => "login_page_loaded",
            AuthState::CaptchaFetched => "captcha_fetched",
            AuthState::CredentialsSubmitted => "credentials_submitted",
            AuthState::Established => "established",
            AuthState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Established | AuthState::Failed(_))
    }

    /// The state reached once the current step succeeds.
    pub fn successor(&self) -> Option<AuthState> {
        match self {
            AuthState::Init => Some(AuthState::PortalVisited),
            AuthState::PortalVisited => Some(AuthState::AuthUrlVisited),
            AuthState::AuthUrlVisited => Some(AuthState::LoginPageLoaded),
            AuthState::LoginPageLoaded => Some(AuthState::CaptchaFetched),
            AuthState::CaptchaFetched => Some(AuthState::CredentialsSubmitted),
            AuthState::CredentialsSubmitted => Some(AuthState::Established),
            AuthState::Established | AuthState::Failed(_) => None,
        }
    }

    /// Position in the sequence. `Failed` sorts after everything.
    pub fn rank(&self) -> u8 {
        match self {
            AuthState::Init => 0,
            AuthState::PortalVisited => 1,
            AuthState::AuthUrlVisited => 2,
            AuthState::LoginPageLoaded => 3,
            AuthState::CaptchaFetched => 4,
            AuthState::CredentialsSubmitted => 5,
            AuthState::Established => 6,
            AuthState::Failed(_) => 7,
        }
    }
}

/// Handle a state transition. Pure function: no I/O.
///
/// Events delivered to a terminal state leave it unchanged.
pub fn transition(state: AuthState, event: AuthEvent) -> AuthState {
    match (state, event) {
        (state, _) if state.is_terminal() => {
            tracing::warn!(state = state.label(), "ignoring event for finished login attempt");
            state
        }
        (state, AuthEvent::StepCompleted) => match state.successor() {
            Some(next) => next,
            None => state,
        },
        (_, AuthEvent::StepFailed(reason)) => AuthState::Failed(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_in_order() {
        let mut state = AuthState::Init;
        let mut seen = vec![state.label()];
        while !state.is_terminal() {
            state = transition(state, AuthEvent::StepCompleted);
            seen.push(state.label());
        }
        assert_eq!(
            seen,
            vec![
                "init",
                "portal_visited",
                "auth_url_visited",
                "login_page_loaded",
                "captcha_fetched",
                "credentials_submitted",
                "established",
            ]
        );
    }

    #[test]
    fn every_transition_moves_forward() {
        let mut state = AuthState::Init;
        while let Some(next) = state.successor() {
            assert_eq!(next.rank(), state.rank() + 1);
            state = next;
        }
    }

    #[test]
    fn failure_is_reachable_from_any_live_state() {
        let mut state = AuthState::Init;
        while !state.is_terminal() {
            let failed = transition(
                state.clone(),
                AuthEvent::StepFailed(FailureReason::Network("reset".into())),
            );
            assert_eq!(failed, AuthState::Failed(FailureReason::Network("reset".into())));
            state = transition(state, AuthEvent::StepCompleted);
        }
    }

    #[test]
    fn established_is_terminal() {
        let state = transition(AuthState::Established, AuthEvent::StepCompleted);
        assert_eq!(state, AuthState::Established);
        let state = transition(
            AuthState::Established,
            AuthEvent::StepFailed(FailureReason::SessionTokenMissing),
        );
        assert_eq!(state, AuthState::Established);
    }

    #[test]
    fn failed_is_terminal() {
        let failed = AuthState::Failed(FailureReason::MissingCredentials);
        let state = transition(failed.clone(), AuthEvent::StepCompleted);
        assert_eq!(state, failed);
    }

    #[test]
    fn reason_maps_from_auth_error() {
        assert_eq!(
            FailureReason::from(&AuthError::SessionTokenMissing),
            FailureReason::SessionTokenMissing
        );
        assert_eq!(
            FailureReason::from(&AuthError::LoginRejected { status: 401 }),
            FailureReason::LoginRejected(401)
        );
        assert_eq!(
            FailureReason::from(&AuthError::Config("missing".into())),
            FailureReason::MissingCredentials
        );
    }
}
