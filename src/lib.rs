//! Blocking client library for the FlashArray, FlashBlade and Pure1 REST APIs.
//!
//! Public API layers:
//! - [`Client`]: negotiates an API version, owns the session, and calls
//!   endpoints by operation id.
//! - [`ItemIterator`]: lazy, single-pass iteration over paged collections.
//! - [`registry`]: the endpoint set each product exposes at each version.
//! - [`BlockingApiClient`]: the JSON transport underneath, with retries and
//!   request correlation ids.
//! - [`ClientError`]: unified error type used by all layers.
//!
//! ```no_run
//! use pure_client::{Client, ClientConfig, Credential, ListParams, Product};
//!
//! # fn main() -> Result<(), pure_client::ClientError> {
//! let config = ClientConfig::new(
//!     "https://array.example.com",
//!     Product::FlashArray,
//!     Credential::ApiToken("api-token".to_owned()),
//! );
//! let client = Client::connect(config)?;
//! let response = client.list::<serde_json::Value>("getVolumes", ListParams::new().limit(100))?;
//! if let Ok(valid) = response.into_result() {
//!     for volume in valid.items {
//!         println!("{}", volume?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod blocking_client;
mod client;
mod config;
mod endpoints;
mod error;
mod iterator;
mod params;
pub mod registry;
mod response;
mod session;
mod version;

/// Blocking JSON transport and its request/response types.
pub use blocking_client::{ApiRequest, BlockingApiClient, RawResponse, new_request_id};
/// High-level authenticated client.
pub use client::Client;
pub use config::{ClientConfig, Credential, Timeout, TransportConfig};
pub use endpoints::{EndpointDefinition, Product};
/// Error type returned by all client operations.
pub use error::{ClientError, VersionSide};
pub use iterator::{ItemIterator, LenientItems, PageFetcher, Step};
pub use params::ListParams;
pub use registry::{VersionModule, supported_versions};
pub use response::{ApiError, ErrorResponse, Page, Response, ResponseHeaders, ValidResponse};
pub use session::{AUTH_TOKEN_HEADER, ApiTokenManager};
pub use version::{ApiVersion, DEV_VERSION, choose_version, fetch_api_versions};
