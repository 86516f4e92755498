//! URL construction for every step of the login sequence
//!
//! Both base URLs are configurable so the whole sequence can run against a
//! local mock. Query strings are assembled exactly the way the SSO login page
//! does it: the authorize URL is appended raw (not percent-encoded) wherever
//! it appears as a parameter value.

use crate::constants::{
    AUTHORIZE_PATH, AUTHORIZE_SCOPES, AUTHORIZE_STATE, CAPTCHA_PATH, CLIENT_ID, LOGIN_PAGE_PATH,
    LOGIN_SUBMIT_PATH, PORTAL_LOGIN_PATH, PORTAL_URL, REDIRECT_CONFIRM_PATH, SSO_URL,
    VERIFY_PROBE_PATH,
};

/// Portal and SSO base URLs, stored without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    portal: String,
    sso: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(PORTAL_URL, SSO_URL)
    }
}

impl Endpoints {
    pub fn new(portal: impl Into<String>, sso: impl Into<String>) -> Self {
        Self {
            portal: portal.into().trim_end_matches('/').to_owned(),
            sso: sso.into().trim_end_matches('/').to_owned(),
        }
    }

    pub fn portal(&self) -> &str {
        &self.portal
    }

    pub fn sso(&self) -> &str {
        &self.sso
    }

    /// Value of the session-wide `Referer` header.
    pub fn portal_referer(&self) -> String {
        format!("{}/", self.portal)
    }

    pub fn portal_login(&self) -> String {
        format!("{}{PORTAL_LOGIN_PATH}", self.portal)
    }

    /// Absolute URL for a portal API path such as `/api/todos`.
    pub fn portal_api(&self, path: &str) -> String {
        format!("{}/{}", self.portal, path.trim_start_matches('/'))
    }

    /// OpenID Connect authorize URL.
    ///
    /// The redirect URI keeps the `https%3A//host/login` form the portal
    /// registered: only the scheme separator colon is encoded.
    pub fn authorize(&self) -> String {
        let redirect_uri = format!("{}/login", self.portal).replacen("://", "%3A//", 1);
        format!(
            "{}{AUTHORIZE_PATH}?client_id={CLIENT_ID}&response_type=code&redirect_uri={redirect_uri}&state={AUTHORIZE_STATE}&scope={AUTHORIZE_SCOPES}",
            self.sso
        )
    }

    pub fn login_page_base(&self) -> String {
        format!("{}{LOGIN_PAGE_PATH}", self.sso)
    }

    pub fn login_page(&self) -> String {
        format!("{}?myurl={}", self.login_page_base(), self.authorize())
    }

    pub fn captcha(&self) -> String {
        format!("{}{CAPTCHA_PATH}", self.sso)
    }

    /// Form target bound to the session-id token via a path parameter.
    pub fn login_submit(&self, token: &str) -> String {
        format!("{}{LOGIN_SUBMIT_PATH};jsessionid={token}?action=EAI", self.sso)
    }

    pub fn redirect_confirm(&self, identity: &str) -> String {
        format!(
            "{}{REDIRECT_CONFIRM_PATH}?am-eai-user-id={}&am-eai-redir-url={}",
            self.sso,
            urlencoding::encode(identity),
            self.authorize()
        )
    }

    pub fn verify_probe(&self) -> String {
        self.portal_api(VERIFY_PROBE_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_authorize_url_is_byte_exact() {
        assert_eq!(
            Endpoints::default().authorize(),
            "https://sso.tku.edu.tw/auth/realms/TKU/protocol/openid-connect/auth\
             ?client_id=pdsiclass&response_type=code&redirect_uri=https%3A//iclass.tku.edu.tw/login\
             &state=L2lwb3J0YWw=&scope=openid,public_profile,email"
        );
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let endpoints = Endpoints::new("http://127.0.0.1:9000/", "http://127.0.0.1:9001//");
        assert_eq!(endpoints.portal(), "http://127.0.0.1:9000");
        assert_eq!(endpoints.sso(), "http://127.0.0.1:9001");
        assert_eq!(endpoints.portal_referer(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn login_page_appends_authorize_url_raw() {
        let endpoints = Endpoints::default();
        let url = endpoints.login_page();
        assert!(url.starts_with("https://sso.tku.edu.tw/NEAI/logineb.jsp?myurl=https://sso.tku.edu.tw/auth/"));
        assert!(url.ends_with("scope=openid,public_profile,email"));
    }

    #[test]
    fn login_submit_carries_token_as_path_parameter() {
        let url = Endpoints::default().login_submit("ABC123");
        assert_eq!(
            url,
            "https://sso.tku.edu.tw/NEAI/login2.do;jsessionid=ABC123?action=EAI"
        );
    }

    #[test]
    fn redirect_confirm_encodes_identity() {
        let url = Endpoints::default().redirect_confirm("4101 234");
        assert!(url.contains("am-eai-user-id=4101%20234&am-eai-redir-url=https://sso.tku.edu.tw/auth/"));
    }

    #[test]
    fn portal_api_joins_paths() {
        let endpoints = Endpoints::new("http://portal", "http://sso");
        assert_eq!(endpoints.portal_api("/api/todos"), "http://portal/api/todos");
        assert_eq!(endpoints.portal_api("api/todos"), "http://portal/api/todos");
        assert_eq!(endpoints.verify_probe(), "http://portal/api/todos");
        assert_eq!(endpoints.portal_login(), "http://portal/login?next=/iportal&locale=zh_TW");
    }
}
