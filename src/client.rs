use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ClientError;
use crate::blocking_client::{ApiRequest, BlockingApiClient, RawResponse, new_request_id};
use crate::config::ClientConfig;
use crate::endpoints::{EndpointDefinition, Product};
use crate::iterator::{ItemIterator, PageFetcher};
use crate::params::ListParams;
use crate::registry::{self, VersionModule};
use crate::response::{ErrorResponse, Page, Response, ResponseHeaders, ValidResponse};
use crate::session::{AUTH_TOKEN_HEADER, ApiTokenManager};
use crate::version::{ApiVersion, choose_version, fetch_api_versions};

/// Authenticated client bound to one target and one negotiated API version.
///
/// Cloning is cheap and every clone shares the same session. The session is
/// logged out when the last clone, including the ones held by live item
/// iterators, is dropped.
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    transport: BlockingApiClient,
    module: Arc<VersionModule>,
    session: Mutex<ApiTokenManager>,
}

impl Client {
    /// Probes the target's versions, picks one, and logs in.
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let ClientConfig {
            target,
            product,
            credential,
            version,
            transport,
        } = config;

        let transport = BlockingApiClient::new(&target, &transport)?;
        let advertised = fetch_api_versions(&transport)?;
        let known = registry::supported_versions(product);
        let version = choose_version(&known, &advertised, version.as_deref())?;
        let module = registry::module(product, version)?;
        let session = ApiTokenManager::new(transport.clone(), credential, version)?;

        info!(%product, %version, target = %transport.base_url(), "connected");
        Ok(Self {
            inner: Arc::new(ClientInner {
                transport,
                module,
                session: Mutex::new(session),
            }),
        })
    }

    pub fn product(&self) -> Product {
        self.inner.module.product()
    }

    /// API version negotiated at connect time.
    pub fn api_version(&self) -> ApiVersion {
        self.inner.module.version()
    }

    /// Endpoints callable at the negotiated version.
    pub fn operations(&self) -> &[&'static EndpointDefinition] {
        self.inner.module.endpoints()
    }

    /// Queries a paged collection.
    ///
    /// The returned iterator fetches further pages on demand through this
    /// client, reusing one `X-Request-ID` for the whole query.
    pub fn list<T>(&self, operation_id: &str, params: ListParams) -> Result<Response<T>, ClientError>
    where
        T: DeserializeOwned + 'static,
    {
        let endpoint = self.inner.module.find(operation_id)?;
        if !endpoint.paged {
            return Err(ClientError::OperationNotPaged(operation_id.to_owned()));
        }
        self.call(operation_id, params, None)
    }

    /// Calls any registered endpoint.
    ///
    /// Non-success statuses are returned as [`Response::Error`]; only
    /// transport, session and decoding failures are `Err`. For endpoints that
    /// are not paged the item iterator ends after the response's own items.
    pub fn call<T>(
        &self,
        operation_id: &str,
        params: ListParams,
        body: Option<Value>,
    ) -> Result<Response<T>, ClientError>
    where
        T: DeserializeOwned + 'static,
    {
        let endpoint = self.inner.module.find(operation_id)?;
        let path = endpoint.versioned_path(self.api_version());
        let request_id = params.x_request_id.clone().unwrap_or_else(new_request_id);
        let params = params.x_request_id(request_id.clone());
        let query = params.to_query();

        let request = ApiRequest::new(endpoint.http_method()?, &path, &request_id)
            .query(&query)
            .body(body.as_ref())
            .idempotent(endpoint.is_idempotent());
        let raw = self.send_authenticated(request)?;
        let headers = ResponseHeaders::from_headers(&raw.headers);

        if !raw.status.is_success() {
            debug!(
                operation_id,
                status = raw.status.as_u16(),
                %request_id,
                "call returned an error response"
            );
            return Ok(Response::Error(ErrorResponse::from_body(
                raw.status, headers, &raw.body,
            )));
        }

        let first_page: Page<T> = raw.json()?.unwrap_or_default();
        let continuation_token = first_page.continuation_token.clone();
        let total_item_count = first_page.total_item_count;
        let fetch = if endpoint.paged {
            self.page_fetcher(endpoint)?
        } else {
            no_more_pages()
        };

        Ok(Response::Valid(ValidResponse {
            status_code: raw.status,
            continuation_token,
            total_item_count,
            headers,
            items: ItemIterator::new(fetch, params, first_page, request_id),
        }))
    }

    /// Returns the session token, logging in again when `refresh` is set.
    pub fn get_session_token(&self, refresh: bool) -> Result<String, ClientError> {
        self.session().get_session_token(refresh)
    }

    /// Logs out now. The next call opens a new session.
    pub fn close_session(&self) {
        self.session().close_session();
    }

    fn session(&self) -> MutexGuard<'_, ApiTokenManager> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends a request with the session token, logging in again once if the
    /// target answers 401.
    fn send_authenticated(&self, request: ApiRequest<'_>) -> Result<RawResponse, ClientError> {
        let token = self.get_session_token(false)?;
        let response = self
            .inner
            .transport
            .send(&request.clone().header(AUTH_TOKEN_HEADER, token))?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(
            request_id = request.request_id,
            "session token rejected, logging in again"
        );
        let token = self.get_session_token(true)?;
        self.inner
            .transport
            .send(&request.header(AUTH_TOKEN_HEADER, token))
    }

    fn page_fetcher<T>(
        &self,
        endpoint: &'static EndpointDefinition,
    ) -> Result<PageFetcher<T>, ClientError>
    where
        T: DeserializeOwned + 'static,
    {
        let client = self.clone();
        let method = endpoint.http_method()?;
        let path = endpoint.versioned_path(self.api_version());

        Ok(Box::new(move |params: &ListParams| {
            let request_id = params.x_request_id.clone().unwrap_or_else(new_request_id);
            let query = params.to_query();
            let request = ApiRequest::new(method.clone(), &path, &request_id)
                .query(&query)
                .idempotent(endpoint.is_idempotent());

            let raw = client.send_authenticated(request)?;
            if !raw.status.is_success() {
                return Err(ClientError::HttpStatus {
                    status: raw.status,
                    body: raw.body,
                });
            }
            raw.json()
        }))
    }
}

fn no_more_pages<T>() -> PageFetcher<T>
where
    T: 'static,
{
    Box::new(|_: &ListParams| Ok(None))
}
