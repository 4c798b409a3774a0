use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, RschedError};

pub const DEFAULT_WEBHOOK_BIND: &str = "0.0.0.0";
pub const WEBHOOK_PATH: &str = "/webhook";
pub const ENV_PREFIX: &str = "RSCHED_";

/// Client configuration (rsched.toml + RSCHED_* env overrides).
///
/// Immutable once handed to a client. The same token authenticates outbound
/// requests and inbound webhook deliveries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the scheduler instance, e.g. `https://sched.example.com`.
    pub instance_url: String,
    /// Sent verbatim as the `Authorization` header and expected verbatim on
    /// inbound webhooks.
    pub authorization: String,
    /// When set, a webhook listener is bound on this port. `0` picks an
    /// ephemeral port.
    #[serde(default)]
    pub webhook_port: Option<u16>,
    #[serde(default = "default_webhook_bind")]
    pub webhook_bind: String,
}

impl ClientConfig {
    pub fn new(instance_url: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into(),
            authorization: authorization.into(),
            webhook_port: None,
            webhook_bind: default_webhook_bind(),
        }
    }

    pub fn with_webhook_port(mut self, port: u16) -> Self {
        self.webhook_port = Some(port);
        self
    }

    pub fn with_webhook_bind(mut self, bind: impl Into<String>) -> Self {
        self.webhook_bind = bind.into();
        self
    }

    /// Load config from a TOML file with RSCHED_* env var overrides.
    ///
    /// File lookup order:
    ///   1. Explicit path argument
    ///   2. `RSCHED_CONFIG`
    ///   3. ~/.rsched/rsched.toml
    ///
    /// A missing file is not an error; env vars alone can supply everything.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::figment(config_path)
            .extract()
            .map_err(|e| RschedError::Config(e.to_string()))
    }

    /// The layered provider stack behind [`ClientConfig::load`], exposed so
    /// callers can merge their own overrides on top.
    pub fn figment(config_path: Option<&str>) -> Figment {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("RSCHED_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]))
    }

    /// Check the instance URL and token. Does not touch the network.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.authorization.is_empty() {
            return Err(RschedError::Config("authorization token is required".into()));
        }
        // Must survive as an HTTP header value: visible ASCII, space or tab.
        if self
            .authorization
            .bytes()
            .any(|b| (b < 0x20 && b != b'\t') || b == 0x7f)
        {
            return Err(RschedError::Config(
                "authorization token contains control characters".into(),
            ));
        }
        Ok(())
    }

    /// Parsed instance URL with any trailing slash removed from the path.
    pub fn base_url(&self) -> Result<Url> {
        if self.instance_url.trim().is_empty() {
            return Err(RschedError::Config("instance URL is required".into()));
        }

        let mut url = Url::parse(self.instance_url.trim())
            .map_err(|e| RschedError::Config(format!("invalid instance URL: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RschedError::Config(format!(
                "invalid instance URL: unsupported scheme '{}'",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(RschedError::Config("invalid instance URL: missing host".into()));
        }

        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
        Ok(url)
    }

    pub fn webhook_enabled(&self) -> bool {
        self.webhook_port.is_some()
    }
}

fn default_webhook_bind() -> String {
    DEFAULT_WEBHOOK_BIND.to_string()
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.rsched/rsched.toml", home)
}
