//! Response metadata returned with every call

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use url::Url;

/// Status, headers and final URL of an API response
///
/// Captured before the body is consumed, so it is available for successful
/// calls and for every failure that happened after the transport answered.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
}

impl Response {
    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl From<&reqwest::Response> for Response {
    fn from(response: &reqwest::Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            url: response.url().clone(),
        }
    }
}

/// Decoded data paired with the response it came from
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub data: T,
    pub response: Response,
}

impl<T> ApiResponse<T> {
    pub fn into_inner(self) -> T {
        self.data
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            data: f(self.data),
            response: self.response,
        }
    }
}
