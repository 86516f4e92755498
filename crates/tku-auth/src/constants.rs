//! Fixed values of the TKU SSO protocol
//!
//! Host names, paths and form field values are compatibility-significant: the
//! SSO gateway rejects logins whose form shape drifts from what its own login
//! page submits.

use std::time::Duration;

/// TronClass portal base URL
pub const PORTAL_URL: &str = "https://iclass.tku.edu.tw";

/// SSO gateway base URL
pub const SSO_URL: &str = "https://sso.tku.edu.tw";

/// Portal page that starts the login redirect chain
pub const PORTAL_LOGIN_PATH: &str = "/login?next=/iportal&locale=zh_TW";

/// OpenID Connect authorize endpoint on the SSO gateway
pub const AUTHORIZE_PATH: &str = "/auth/realms/TKU/protocol/openid-connect/auth";

/// Public client id registered for the portal
pub const CLIENT_ID: &str = "pdsiclass";

/// Opaque state value the portal expects back (base64 of `/iportal`)
pub const AUTHORIZE_STATE: &str = "L2lwb3J0YWw=";

pub const AUTHORIZE_SCOPES: &str = "openid,public_profile,email";

pub const LOGIN_PAGE_PATH: &str = "/NEAI/logineb.jsp";

/// Captcha trigger (GET) and solution (POST) endpoint
pub const CAPTCHA_PATH: &str = "/NEAI/ImageValidate";

pub const LOGIN_SUBMIT_PATH: &str = "/NEAI/login2.do";

pub const REDIRECT_CONFIRM_PATH: &str = "/NEAI/eaido.jsp";

/// Cookie set by the login page that binds the rest of the attempt together.
pub const SESSION_COOKIE: &str = "AMWEBJCT!%2FNEAI!JSESSIONID";

/// Portal endpoint used by the optional post-login probe.
pub const VERIFY_PROBE_PATH: &str = "/api/todos";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Accept header the browser sends when loading the captcha image.
pub const CAPTCHA_ACCEPT: &str = "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8";

pub const LOGIN_LOCALE: &str = "zh_TW";
pub const LOGIN_TYPE: &str = "logineb";
/// Submit button label ("log in")
pub const LOGIN_BUTTON: &str = "登入";
