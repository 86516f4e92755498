//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The password is loaded from TKU_PASSWORD (or PASSWORD) or `secret_file`,
//! never stored in the TOML directly to avoid leaking secrets.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tku_auth::{Credentials, Endpoints, OrchestratorOptions};

pub const DEFAULT_CONFIG_PATH: &str = "tku-mcp.toml";

/// Environment pairs checked for credentials, first complete pair wins.
const CREDENTIAL_ENV_PAIRS: [(&str, &str); 2] =
    [("TKU_USERNAME", "TKU_PASSWORD"), ("USERNAME", "PASSWORD")];

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Portal and SSO gateway settings
#[derive(Debug, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_portal_url")]
    pub portal_url: String,
    #[serde(default = "default_sso_url")]
    pub sso_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Probe the portal after login to confirm the session is accepted
    #[serde(default)]
    pub verify_login: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            portal_url: default_portal_url(),
            sso_url: default_sso_url(),
            timeout_secs: default_timeout(),
            verify_login: false,
        }
    }
}

/// Student credentials
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub identity: Option<String>,
    /// Path to a file containing the password (alternative to TKU_PASSWORD)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub resolved: Option<Credentials>,
}

#[derive(Debug, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
        }
    }
}

/// Optional health/metrics listener
#[derive(Debug, Default, Deserialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub listen_addr: Option<SocketAddr>,
}

fn default_portal_url() -> String {
    tku_auth::PORTAL_URL.to_string()
}

fn default_sso_url() -> String {
    tku_auth::SSO_URL.to_string()
}

fn default_timeout() -> u64 {
    tku_auth::DEFAULT_TIMEOUT.as_secs()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Credential resolution order:
    /// 1. TKU_USERNAME + TKU_PASSWORD env vars
    /// 2. USERNAME + PASSWORD env vars
    /// 3. `identity` + `secret_file` from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Like `load`, but a file that does not exist yields the defaults.
    pub fn load_optional(path: &Path) -> common::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Self::from_toml("")
        }
    }

    pub fn from_toml(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        for (field, url) in [
            ("portal_url", &config.portal.portal_url),
            ("sso_url", &config.portal.sso_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{field} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if config.portal.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        config.credentials.resolved = config.credentials.resolve()?;
        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// `None` means neither was given and the default path applies.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        std::env::var("CONFIG_PATH").ok().map(PathBuf::from)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.portal.portal_url, &self.portal.sso_url)
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            timeout: Duration::from_secs(self.portal.timeout_secs),
            verify_login: self.portal.verify_login,
        }
    }
}

impl CredentialsConfig {
    fn resolve(&self) -> common::Result<Option<Credentials>> {
        for (user_var, pass_var) in CREDENTIAL_ENV_PAIRS {
            if let (Some(identity), Some(secret)) = (non_empty_env(user_var), non_empty_env(pass_var))
            {
                return Ok(Some(Credentials::new(identity, secret)));
            }
        }

        let secret = match &self.secret_file {
            Some(file) => {
                let secret = std::fs::read_to_string(file).map_err(|e| {
                    common::Error::Config(format!(
                        "failed to read secret_file {}: {e}",
                        file.display()
                    ))
                })?;
                Some(secret.trim().to_owned()).filter(|s| !s.is_empty())
            }
            None => None,
        };
        let identity = self
            .identity
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        Ok(match (identity, secret) {
            (None, None) => None,
            (identity, secret) => Some(Credentials::new(
                identity.unwrap_or_default(),
                secret.unwrap_or_default(),
            )),
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
