//! Session token lifecycle.
//!
//! A long-lived credential is exchanged at `/api/<version>/login` for a
//! short-lived session token, returned in the `x-auth-token` header and sent
//! back in the same header on every call. The manager owns exactly one such
//! token and logs it out when it is refreshed, closed or dropped.

use std::fmt;

use reqwest::Method;
use tracing::{debug, info, warn};

use crate::ClientError;
use crate::blocking_client::{ApiRequest, BlockingApiClient, new_request_id};
use crate::config::Credential;
use crate::version::ApiVersion;

/// Header carrying the session token on requests and on the login response.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";
const API_TOKEN_HEADER: &str = "api-token";

/// Owns the session token of one client.
pub struct ApiTokenManager {
    transport: BlockingApiClient,
    credential: Credential,
    version: ApiVersion,
    session_token: Option<String>,
}

impl ApiTokenManager {
    /// Logs in immediately; a rejected credential fails construction.
    pub fn new(
        transport: BlockingApiClient,
        credential: Credential,
        version: ApiVersion,
    ) -> Result<Self, ClientError> {
        let mut manager = Self {
            transport,
            credential,
            version,
            session_token: None,
        };
        manager.get_session_token(false)?;
        Ok(manager)
    }

    /// Returns the cached session token.
    ///
    /// With `refresh`, or when no session is open, the current session (if
    /// any) is logged out first and a new one is opened.
    pub fn get_session_token(&mut self, refresh: bool) -> Result<String, ClientError> {
        if !refresh {
            if let Some(token) = &self.session_token {
                return Ok(token.clone());
            }
        }

        self.close_session();
        let token = self.login()?;
        self.session_token = Some(token.clone());
        Ok(token)
    }

    /// Logs out the current session, if any.
    ///
    /// Logout failures are logged and otherwise ignored; the token is
    /// forgotten either way.
    pub fn close_session(&mut self) {
        let Some(token) = self.session_token.take() else {
            return;
        };

        let path = format!("api/{}/logout", self.version);
        let request_id = new_request_id();
        let request =
            ApiRequest::new(Method::POST, &path, &request_id).header(AUTH_TOKEN_HEADER, token);

        match self.transport.send(&request) {
            Ok(response) if response.status.is_success() => {
                info!(%request_id, "closed session");
            }
            Ok(response) => {
                warn!(
                    %request_id,
                    status = response.status.as_u16(),
                    "logout rejected, dropping session token anyway"
                );
            }
            Err(error) => {
                warn!(%request_id, %error, "logout failed, dropping session token anyway");
            }
        }
    }

    /// Whether a session token is currently cached.
    pub fn has_session(&self) -> bool {
        self.session_token.is_some()
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    fn login(&self) -> Result<String, ClientError> {
        let path = format!("api/{}/login", self.version);
        let request_id = new_request_id();
        let request = match &self.credential {
            Credential::ApiToken(token) => {
                ApiRequest::new(Method::POST, &path, &request_id).header(API_TOKEN_HEADER, token)
            }
            Credential::IdentityAssertion(assertion) => {
                ApiRequest::new(Method::POST, &path, &request_id)
                    .header("Authorization", format!("Bearer {assertion}"))
            }
        };

        debug!(%request_id, version = %self.version, "logging in");
        let response = self.transport.send(&request)?;
        if !response.status.is_success() {
            return Err(ClientError::Session {
                status: response.status,
                body: response.body,
            });
        }

        let token = response
            .header(AUTH_TOKEN_HEADER)
            .map(str::to_owned)
            .ok_or(ClientError::MissingSessionToken)?;
        info!(%request_id, "opened session");
        Ok(token)
    }
}

impl Drop for ApiTokenManager {
    fn drop(&mut self) {
        self.close_session();
    }
}

impl fmt::Debug for ApiTokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTokenManager")
            .field("credential", &self.credential)
            .field("version", &self.version)
            .field("has_session", &self.session_token.is_some())
            .finish_non_exhaustive()
    }
}
