//! Login form payload
//!
//! Field names and fixed values mirror the SSO login page's own form. Kept as
//! a struct so a field cannot silently drop out of the request.

use serde::Serialize;

use crate::captcha::CaptchaChallenge;
use crate::constants::{LOGIN_BUTTON, LOGIN_LOCALE, LOGIN_TYPE};
use crate::credentials::Credentials;

#[derive(Serialize)]
pub struct LoginForm<'a> {
    /// Authorize URL the gateway returns to after login
    pub myurl: &'a str,
    pub ln: &'static str,
    pub embed: &'static str,
    /// Virtual keyboard flag
    pub vkb: &'static str,
    pub logintype: &'static str,
    pub username: &'a str,
    pub password: &'a str,
    pub vidcode: String,
    pub loginbtn: &'static str,
}

impl<'a> LoginForm<'a> {
    /// Consumes the captcha: a solution is good for one submission only.
    pub fn new(authorize_url: &'a str, credentials: &'a Credentials, captcha: CaptchaChallenge) -> Self {
        Self {
            myurl: authorize_url,
            ln: LOGIN_LOCALE,
            embed: "No",
            vkb: "No",
            logintype: LOGIN_TYPE,
            username: credentials.identity(),
            password: credentials.secret().expose(),
            vidcode: captcha.into_solution(),
            loginbtn: LOGIN_BUTTON,
        }
    }
}

impl std::fmt::Debug for LoginForm<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("myurl", &self.myurl)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
