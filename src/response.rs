use std::fmt;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer};

use crate::iterator::ItemIterator;

/// One decoded page of a collection response.
#[derive(Clone, Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub continuation_token: Option<String>,
    #[serde(default)]
    pub total_item_count: Option<u64>,
    #[serde(default)]
    pub more_items_remaining: Option<bool>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            continuation_token: None,
            total_item_count: None,
            more_items_remaining: None,
        }
    }
}

/// One structured error returned by the target.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    /// Name of the resource the error refers to.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
    #[serde(default)]
    pub location_context: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{context}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ApiError>,
}

/// Response headers the client understands.
///
/// Rate-limit counters are informational; the client never throttles itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    pub x_request_id: Option<String>,
    pub x_ratelimit_sec: Option<u32>,
    pub x_ratelimit_min: Option<u32>,
    pub x_ratelimit_remaining_sec: Option<u32>,
    pub x_ratelimit_remaining_min: Option<u32>,
}

impl ResponseHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        let number = |name: &str| text(name).and_then(|value| value.trim().parse().ok());

        Self {
            x_request_id: text("x-request-id"),
            x_ratelimit_sec: number("x-ratelimit-limit-second"),
            x_ratelimit_min: number("x-ratelimit-limit-minute"),
            x_ratelimit_remaining_sec: number("x-ratelimit-remaining-second"),
            x_ratelimit_remaining_min: number("x-ratelimit-remaining-minute"),
        }
    }
}

/// Successful response: the first page and an iterator over all items.
#[derive(Debug)]
pub struct ValidResponse<T> {
    pub status_code: StatusCode,
    pub continuation_token: Option<String>,
    pub total_item_count: Option<u64>,
    pub headers: ResponseHeaders,
    pub items: ItemIterator<T>,
}

/// Unsuccessful response with the target's structured errors.
#[derive(Clone, Debug)]
pub struct ErrorResponse {
    pub status_code: StatusCode,
    pub errors: Vec<ApiError>,
    pub headers: ResponseHeaders,
}

impl ErrorResponse {
    /// Decodes an error body; bodies without an `errors` list become a single
    /// error carrying the raw text.
    pub(crate) fn from_body(status_code: StatusCode, headers: ResponseHeaders, body: &str) -> Self {
        let errors = match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) if !parsed.errors.is_empty() => parsed.errors,
            _ => vec![ApiError {
                message: if body.trim().is_empty() {
                    status_code
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_owned()
                } else {
                    body.trim().to_owned()
                },
                ..ApiError::default()
            }],
        };
        Self {
            status_code,
            errors,
            headers,
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.status_code.as_u16())?;
        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorResponse {}

/// Result of an endpoint call: either items or API errors.
#[derive(Debug)]
pub enum Response<T> {
    Valid(ValidResponse<T>),
    Error(ErrorResponse),
}

impl<T> Response<T> {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Valid(valid) => valid.status_code,
            Self::Error(error) => error.status_code,
        }
    }

    pub fn headers(&self) -> &ResponseHeaders {
        match self {
            Self::Valid(valid) => &valid.headers,
            Self::Error(error) => &error.headers,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn into_result(self) -> Result<ValidResponse<T>, ErrorResponse> {
        match self {
            Self::Valid(valid) => Ok(valid),
            Self::Error(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::{ErrorResponse, Page, ResponseHeaders};

    #[test]
    fn parses_rate_limit_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit-second", HeaderValue::from_static("10"));
        headers.insert("x-ratelimit-remaining-minute", HeaderValue::from_static("587"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        headers.insert("x-ratelimit-limit-minute", HeaderValue::from_static("n/a"));

        let parsed = ResponseHeaders::from_headers(&headers);
        assert_eq!(parsed.x_request_id.as_deref(), Some("abc"));
        assert_eq!(parsed.x_ratelimit_sec, Some(10));
        assert_eq!(parsed.x_ratelimit_remaining_min, Some(587));
        assert_eq!(parsed.x_ratelimit_min, None);
        assert_eq!(parsed.x_ratelimit_remaining_sec, None);
    }

    #[test]
    fn decodes_structured_errors() {
        let body = r#"{"errors": [{"context": "vol1", "message": "Volume does not exist."}]}"#;
        let response =
            ErrorResponse::from_body(StatusCode::BAD_REQUEST, ResponseHeaders::default(), body);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].context.as_deref(), Some("vol1"));
        assert_eq!(
            response.to_string(),
            "status 400; vol1: Volume does not exist."
        );
    }

    #[test]
    fn keeps_structured_errors_with_null_messages() {
        let body = r#"{"errors": [
            {"context": "vol1", "message": null},
            {"context": "vol2", "message": "gone"}
        ]}"#;
        let response =
            ErrorResponse::from_body(StatusCode::BAD_REQUEST, ResponseHeaders::default(), body);

        assert_eq!(response.errors.len(), 2);
        assert_eq!(response.errors[0].context.as_deref(), Some("vol1"));
        assert_eq!(response.errors[0].message, "");
        assert_eq!(response.errors[1].context.as_deref(), Some("vol2"));
        assert_eq!(response.errors[1].message, "gone");
    }

    #[test]
    fn wraps_unstructured_error_bodies() {
        let response = ErrorResponse::from_body(
            StatusCode::BAD_GATEWAY,
            ResponseHeaders::default(),
            "upstream down",
        );
        assert_eq!(response.errors[0].message, "upstream down");

        let empty =
            ErrorResponse::from_body(StatusCode::NOT_FOUND, ResponseHeaders::default(), "");
        assert_eq!(empty.errors[0].message, "Not Found");
    }

    #[test]
    fn page_fields_are_optional() {
        let page: Page<serde_json::Value> =
            serde_json::from_str(r#"{"items": [{"name": "a"}]}"#).expect("valid page");
        assert_eq!(page.items.len(), 1);
        assert!(page.continuation_token.is_none());
        assert!(page.total_item_count.is_none());
    }
}
