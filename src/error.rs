use thiserror::Error;

/// Errors returned by client, session and iteration operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Target is not a valid absolute URL.
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Endpoint path could not be joined to the base URL.
    #[error("invalid endpoint path '{0}'")]
    InvalidPath(String),

    /// The requested operation id is not registered for the negotiated API version.
    #[error("unknown operation '{operation_id}' for API version {version}")]
    UnknownOperation {
        operation_id: String,
        version: String,
    },

    /// `Client::list` was used with an operation that does not return pages.
    #[error("operation '{0}' does not return paged items")]
    OperationNotPaged(String),

    /// A registered operation carries a method reqwest cannot represent.
    #[error("unsupported HTTP method '{0}'")]
    UnsupportedMethod(String),

    /// HTTP transport-layer request failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response body could not be parsed as JSON.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A CA bundle could not be read.
    #[error("failed to read certificate: {0}")]
    Io(#[from] std::io::Error),

    /// Non-success HTTP status with response payload.
    #[error("server returned status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Login or logout was rejected by the target.
    #[error("session request failed with status {status}: {body}")]
    Session {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Login succeeded but the response carried no `x-auth-token` header.
    #[error("login response did not include an x-auth-token header")]
    MissingSessionToken,

    /// A version string could not be parsed as `<major>.<minor>`.
    #[error("invalid API version '{0}'")]
    InvalidVersion(String),

    /// An explicitly requested version is not usable.
    #[error("API version {version} is not supported by the {side}")]
    UnsupportedVersion { version: String, side: VersionSide },

    /// The client and the target share no API version.
    #[error("no API version supported by both client and target (target offers: {advertised})")]
    NoCompatibleVersion { advertised: String },
}

/// Which side of the negotiation rejected a requested version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionSide {
    Client,
    Target,
}

impl std::fmt::Display for VersionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Target => f.write_str("target"),
        }
    }
}

impl ClientError {
    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::HttpStatus { status, .. } | Self::Session { status, .. } => Some(*status),
            Self::Request(err) => err.status(),
            _ => None,
        }
    }
}
