//! TKU single-sign-on session orchestration
//!
//! Turns a student's credentials into an authenticated TronClass HTTP session
//! by walking the portal and SSO gateway through a fixed request sequence.
//! The library has no dependency on the tool server binary and can be driven
//! against any pair of portal/SSO base URLs.
//!
//! Login flow:
//! 1. Caller builds `Credentials` and an `Orchestrator`
//! 2. `Orchestrator::establish()` visits the portal and the authorize URL
//! 3. The SSO login page issues the session-id cookie
//! 4. `captcha::acquire()` fetches the plaintext captcha solution
//! 5. The credential form is posted to `login2.do;jsessionid=<token>`
//! 6. The redirect-confirmation page is visited and a `Session` is returned

pub mod captcha;
pub mod constants;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod form;
pub mod orchestrator;
pub mod session;
pub mod state;

pub use captcha::CaptchaChallenge;
pub use constants::*;
pub use credentials::Credentials;
pub use endpoints::Endpoints;
pub use error::{AuthError, Result};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use session::{LoginVerification, Session};
pub use state::{AuthEvent, AuthState, FailureReason, transition};
