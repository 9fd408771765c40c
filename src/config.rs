use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::endpoints::Product;

/// Connect and read timeouts applied to every request, including login,
/// logout, version probes and page fetches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeout {
    pub connect: Duration,
    pub read: Duration,
}

impl Timeout {
    /// Uses the same duration for connecting and reading.
    pub const fn uniform(duration: Duration) -> Self {
        Self {
            connect: duration,
            read: duration,
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(15),
        }
    }
}

/// HTTP transport settings.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub timeout: Timeout,
    /// Extra attempts for idempotent requests after a transport failure or a
    /// 429/5xx response.
    pub retries: u32,
    pub verify_ssl: bool,
    /// PEM bundle with additional trusted root certificates.
    pub ssl_cert: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Timeout::default(),
            retries: 5,
            verify_ssl: true,
            ssl_cert: None,
            user_agent: format!("pure-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Disables certificate verification. Only meant for lab targets with
    /// self-signed certificates.
    #[must_use]
    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    #[must_use]
    pub fn with_ssl_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_cert = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Long-lived credential exchanged for a session token at login.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// API token sent in the `api-token` header.
    ApiToken(String),
    /// Signed identity assertion sent as `Authorization: Bearer <jwt>`.
    IdentityAssertion(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiToken(_) => f.write_str("ApiToken(..)"),
            Self::IdentityAssertion(_) => f.write_str("IdentityAssertion(..)"),
        }
    }
}

/// Everything needed to connect a [`crate::Client`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the target, e.g. `https://array.example.com`.
    pub target: String,
    pub product: Product,
    pub credential: Credential,
    /// Explicit API version (or `"dev"`); negotiated when absent.
    pub version: Option<String>,
    pub transport: TransportConfig,
}

impl ClientConfig {
    pub fn new(target: impl Into<String>, product: Product, credential: Credential) -> Self {
        Self {
            target: target.into(),
            product,
            credential,
            version: None,
            transport: TransportConfig::default(),
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}
