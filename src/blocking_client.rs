use std::thread;
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::ClientError;
use crate::config::TransportConfig;

const REQUEST_ID_HEADER: &str = "X-Request-ID";
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Returns a fresh correlation id for one outbound call.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One outbound request.
#[derive(Clone, Debug)]
pub struct ApiRequest<'a> {
    pub method: Method,
    /// Path relative to the target, e.g. `api/2.4/volumes`.
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<&'a Value>,
    pub request_id: &'a str,
    /// Idempotent requests are retried on transport failures and 429/5xx.
    pub idempotent: bool,
}

impl<'a> ApiRequest<'a> {
    pub fn new(method: Method, path: &'a str, request_id: &'a str) -> Self {
        let idempotent = method == Method::GET;
        Self {
            method,
            path,
            query: &[],
            headers: Vec::new(),
            body: None,
            request_id,
            idempotent,
        }
    }

    #[must_use]
    pub fn query(mut self, query: &'a [(String, String)]) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: Option<&'a Value>) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }
}

/// Status, headers and text body of a completed request.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    /// Parses the body as JSON; `None` for an empty body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>, ClientError> {
        if self.body.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(serde_json::from_str(&self.body)?))
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Blocking JSON transport shared by the session manager and the endpoint
/// call layer.
#[derive(Clone, Debug)]
pub struct BlockingApiClient {
    base_url: Url,
    http: reqwest::blocking::Client,
    retries: u32,
}

impl BlockingApiClient {
    /// Creates a transport for the given target.
    ///
    /// The URL is normalized to include a trailing slash, so relative endpoint
    /// paths join correctly.
    pub fn new(base_url: impl AsRef<str>, config: &TransportConfig) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url.as_ref())
            .map_err(|_| ClientError::InvalidBaseUrl(base_url.as_ref().to_owned()))?;

        let mut builder = reqwest::blocking::Client::builder()
            .connect_timeout(config.timeout.connect)
            .timeout(config.timeout.read)
            .user_agent(config.user_agent.clone());
        if !config.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &config.ssl_cert {
            let pem = std::fs::read(path)?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        Ok(Self {
            base_url: ensure_trailing_slash(parsed),
            http: builder.build()?,
            retries: config.retries,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends a request and returns the response whatever its status.
    ///
    /// Transport errors are returned once the retry budget of an idempotent
    /// request is spent; non-idempotent requests are attempted exactly once.
    pub fn send(&self, request: &ApiRequest<'_>) -> Result<RawResponse, ClientError> {
        let url = self.build_url(request.path)?;
        let attempts = if request.idempotent {
            self.retries + 1
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut builder = self
                .http
                .request(request.method.clone(), url.clone())
                .header(ACCEPT, "application/json")
                .header(REQUEST_ID_HEADER, request.request_id);

            if !request.query.is_empty() {
                builder = builder.query(request.query);
            }
            for (name, value) in &request.headers {
                builder = builder.header(*name, value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.json(body);
            }

            debug!(
                method = %request.method,
                %url,
                request_id = request.request_id,
                attempt,
                "sending request"
            );

            match builder.send() {
                Ok(response) => {
                    let status = response.status();
                    if attempt < attempts && is_retryable_status(status) {
                        let delay = backoff(attempt);
                        warn!(
                            status = status.as_u16(),
                            attempt,
                            ?delay,
                            "retryable status, retrying"
                        );
                        thread::sleep(delay);
                        continue;
                    }
                    let headers = response.headers().clone();
                    let body = response.text()?;
                    return Ok(RawResponse {
                        status,
                        headers,
                        body,
                    });
                }
                Err(error) if attempt < attempts && (error.is_timeout() || error.is_connect()) => {
                    let delay = backoff(attempt);
                    warn!(%error, attempt, ?delay, "request failed, retrying");
                    thread::sleep(delay);
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Sends an unauthenticated `GET` and parses the response as JSON.
    ///
    /// Non-success statuses become [`ClientError::HttpStatus`].
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ClientError> {
        let request_id = new_request_id();
        let response = self.send(&ApiRequest::new(Method::GET, path, &request_id))?;
        if !response.status.is_success() {
            return Err(ClientError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }
        response.json()
    }

    fn build_url(&self, path: &str) -> Result<Url, ClientError> {
        let relative = path.trim_start_matches('/');
        self.base_url
            .join(relative)
            .map_err(|_| ClientError::InvalidPath(path.to_owned()))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    (Duration::from_millis(100) * factor).min(MAX_BACKOFF)
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_owned();
        path.push('/');
        url.set_path(&path);
    }
    url
}
