//! Error types for vehicle data client operations
//!
//! Failures fall into three groups:
//! - local faults raised by the client itself (bad base URL, undecodable body, ...)
//! - API faults, classified from the HTTP status by [`classify`]
//! - transport faults from reqwest, passed through unchanged

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::response::Response;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, MercheError>;

/// Errors that can occur during client operations
#[derive(Error, Debug)]
pub enum MercheError {
    /// Base URL does not end with `/`
    #[error("BaseURL must have a trailing slash, but {0:?} does not")]
    InvalidBaseUrl(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid header value in configuration
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    /// Request body could not be encoded
    #[error("Failed to serialize request body: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Cancellation token was already cancelled when the request was built
    #[error("Request cancelled before it was sent")]
    Cancelled,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Reading the body of a successful response failed
    #[error("Failed to read response body: {source}")]
    Body {
        source: reqwest::Error,
        response: Response,
    },

    /// Cancellation token fired while the call was in flight
    #[error("Request aborted by cancellation")]
    Aborted { response: Option<Response> },

    /// Server answered with a non-2xx status
    #[error("{source}")]
    Api {
        source: ApiError,
        response: Response,
    },

    /// Error body of a non-2xx response could not be handled
    #[error("{source}")]
    ErrorHandler {
        source: ErrorHandlerError,
        response: Response,
    },

    /// Success body is not valid JSON for the requested type
    #[error("Failed to decode response body: {source}")]
    Decode {
        source: serde_json::Error,
        response: Response,
    },

    /// Writing the body into the caller's sink failed
    #[error("Failed to write response body: {source}")]
    Io {
        source: std::io::Error,
        response: Response,
    },
}

impl MercheError {
    /// Response metadata, when the transport produced a response
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Body { response, .. }
            | Self::Api { response, .. }
            | Self::ErrorHandler { response, .. }
            | Self::Decode { response, .. }
            | Self::Io { response, .. } => Some(response),
            Self::Aborted { response } => response.as_ref(),
            _ => None,
        }
    }

    /// HTTP status of the response, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpError(e) => e.status(),
            _ => self.response().map(|r| r.status),
        }
    }

    /// Classified API error, if the server rejected the call
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api { source, .. } => Some(source),
            _ => None,
        }
    }

    /// True when the credentials were rejected (HTTP 401)
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.api_error(), Some(ApiError::Unauthorized(_)))
    }

    /// True for network-level failures, including in-flight cancellation
    ///
    /// A success body that cannot be read ([`MercheError::Body`]) is a local
    /// fault and is not included.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::HttpError(_) | Self::Aborted { .. })
    }
}

// =============================================================================
// API Error Taxonomy
// =============================================================================

/// A failed call as reported by the API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 400, 403, 500 or 503
    #[error(transparent)]
    ExVe(#[from] ExVeError),

    /// 401
    #[error(transparent)]
    Unauthorized(#[from] UnauthorizedError),

    /// Any other non-2xx status
    #[error(transparent)]
    Status(#[from] MercedesApiError),
}

impl ApiError {
    /// Status code this error was classified from, when known
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(e) => Some(e.status_code),
            Self::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED.as_u16()),
            Self::ExVe(_) => None,
        }
    }
}

/// Error body of the vehicle data gateway
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[error("API response with {}: {}", text(.exve_error_id), text(.exve_error_msg))]
pub struct ExVeError {
    #[serde(rename = "exveErrorId", default, skip_serializing_if = "Option::is_none")]
    pub exve_error_id: Option<String>,
    #[serde(rename = "exveErrorMsg", default, skip_serializing_if = "Option::is_none")]
    pub exve_error_msg: Option<String>,
    #[serde(rename = "exveErrorRef", default, skip_serializing_if = "Option::is_none")]
    pub exve_error_ref: Option<String>,
}

/// Error body of the OAuth gateway
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[error("API response with {}: {}", text(.status_code), text(.message))]
pub struct UnauthorizedError {
    #[serde(rename = "errorMessage", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(rename = "statusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Non-2xx status without a known body schema
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{}", reason_phrase(.status_code))]
pub struct MercedesApiError {
    pub status_code: u16,
}

fn text(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or_default()
}

fn reason_phrase(code: &u16) -> &'static str {
    StatusCode::from_u16(*code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown Status Code")
}

/// Local fault while turning a non-2xx response into an [`ApiError`]
#[derive(Error, Debug)]
pub enum ErrorHandlerError {
    #[error("error handler: error reading response body: {0}")]
    ReadBody(#[source] reqwest::Error),

    #[error("error handler: error unmarshalling response body: {0}")]
    Unmarshal(#[source] serde_json::Error),
}

/// Statuses answered with an [`ExVeError`] body
pub fn is_exve_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::FORBIDDEN
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Map a response status and its body to exactly one [`ApiError`]
///
/// The caller decides which statuses count as failures; any status passed
/// here is classified. Structured bodies that are not valid JSON yield
/// [`ErrorHandlerError::Unmarshal`] instead of a default-filled error.
pub fn classify(status: StatusCode, body: &[u8]) -> std::result::Result<ApiError, ErrorHandlerError> {
    if is_exve_status(status) {
        let error: ExVeError =
            serde_json::from_slice(body).map_err(ErrorHandlerError::Unmarshal)?;
        return Ok(ApiError::ExVe(error));
    }

    if status == StatusCode::UNAUTHORIZED {
        let error: UnauthorizedError =
            serde_json::from_slice(body).map_err(ErrorHandlerError::Unmarshal)?;
        return Ok(ApiError::Unauthorized(error));
    }

    Ok(ApiError::Status(MercedesApiError {
        status_code: status.as_u16(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const EXVE_BODY: &str = r#"{"exveErrorId":"Id","exveErrorMsg":"Msg","exveErrorRef":"Ref"}"#;
    const AUTH_BODY: &str =
        r#"{"errorMessage":"Unauthorized","statusCode":"401","message":"Token invalid: Not active"}"#;

    #[rstest]
    #[case(400)]
    #[case(403)]
    #[case(500)]
    #[case(503)]
    fn test_exve_statuses(#[case] code: u16) {
        let status = StatusCode::from_u16(code).unwrap();
        let error = classify(status, EXVE_BODY.as_bytes()).unwrap();

        assert_eq!(
            error,
            ApiError::ExVe(ExVeError {
                exve_error_id: Some("Id".to_string()),
                exve_error_msg: Some("Msg".to_string()),
                exve_error_ref: Some("Ref".to_string()),
            })
        );
        assert_eq!(error.to_string(), "API response with Id: Msg");
    }

    #[test]
    fn test_unauthorized() {
        let error = classify(StatusCode::UNAUTHORIZED, AUTH_BODY.as_bytes()).unwrap();

        assert_eq!(
            error,
            ApiError::Unauthorized(UnauthorizedError {
                error_message: Some("Unauthorized".to_string()),
                status_code: Some("401".to_string()),
                message: Some("Token invalid: Not active".to_string()),
            })
        );
        assert_eq!(
            error.to_string(),
            "API response with 401: Token invalid: Not active"
        );
        assert_eq!(error.status_code(), Some(401));
    }

    #[rstest]
    #[case(204, "No Content")]
    #[case(302, "Found")]
    #[case(404, "Not Found")]
    #[case(429, "Too Many Requests")]
    #[case(502, "Bad Gateway")]
    fn test_other_statuses(#[case] code: u16, #[case] reason: &str) {
        let status = StatusCode::from_u16(code).unwrap();
        let error = classify(status, b"").unwrap();

        assert_eq!(
            error,
            ApiError::Status(MercedesApiError { status_code: code })
        );
        assert_eq!(error.to_string(), reason);
        assert_eq!(error.status_code(), Some(code));
    }

    #[test]
    fn test_other_status_ignores_body() {
        let error = classify(StatusCode::NOT_FOUND, b"<html>gone</html>").unwrap();
        assert_eq!(
            error,
            ApiError::Status(MercedesApiError { status_code: 404 })
        );
    }

    #[test]
    fn test_unknown_status_message() {
        let status = StatusCode::from_u16(599).unwrap();
        let error = classify(status, b"").unwrap();
        assert_eq!(error.to_string(), "Unknown Status Code");
    }

    #[rstest]
    #[case(400, "")]
    #[case(503, "Service Unavailable")]
    #[case(401, "<html></html>")]
    fn test_unparseable_structured_body(#[case] code: u16, #[case] body: &str) {
        let status = StatusCode::from_u16(code).unwrap();
        let err = classify(status, body.as_bytes()).unwrap_err();

        assert!(matches!(err, ErrorHandlerError::Unmarshal(_)));
        assert!(err
            .to_string()
            .starts_with("error handler: error unmarshalling response body"));
    }

    #[test]
    fn test_partial_exve_body() {
        let error = classify(StatusCode::FORBIDDEN, br#"{"exveErrorId":"403"}"#).unwrap();
        assert_eq!(error.to_string(), "API response with 403: ");
    }

    #[test]
    fn test_exve_status_set() {
        let exve: Vec<u16> = (100..600)
            .filter_map(|code| StatusCode::from_u16(code).ok())
            .filter(|status| is_exve_status(*status))
            .map(|status| status.as_u16())
            .collect();
        assert_eq!(exve, vec![400, 403, 500, 503]);
    }

    #[test]
    fn test_error_without_response() {
        let err = MercheError::InvalidBaseUrl("https://api.example".to_string());
        assert!(err.response().is_none());
        assert!(err.status().is_none());
        assert!(!err.is_transport());
        assert!(!err.is_unauthorized());
        assert_eq!(
            err.to_string(),
            r#"BaseURL must have a trailing slash, but "https://api.example" does not"#
        );
    }

    #[test]
    fn test_aborted_is_transport() {
        let err = MercheError::Aborted { response: None };
        assert!(err.is_transport());
        assert!(err.api_error().is_none());
    }
}
