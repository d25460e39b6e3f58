use std::collections::BTreeMap;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use courier_types::api::ErrorBody;

use crate::error::Rejection;

/// The uniform response envelope every handler returns.
///
/// Serializes in the proxy-integration shape (`statusCode`, `body`,
/// `headers`) and converts into a plain HTTP response for axum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        ("Access-Control-Allow-Credentials".to_string(), "true".to_string()),
    ])
}

fn envelope(status: StatusCode, body: String) -> ApiResponse {
    ApiResponse {
        status_code: status.as_u16(),
        body,
        headers: default_headers(),
    }
}

pub fn success<T: Serialize + ?Sized>(data: &T, status: StatusCode) -> ApiResponse {
    match serde_json::to_string(data) {
        Ok(body) => envelope(status, body),
        Err(e) => {
            error!("Failed to serialize response body: {}", e);
            reject(Rejection::INTERNAL)
        }
    }
}

/// `success` with 200.
pub fn ok<T: Serialize + ?Sized>(data: &T) -> ApiResponse {
    success(data, StatusCode::OK)
}

pub fn error(message: &str, code: &str, status: StatusCode) -> ApiResponse {
    let body = ErrorBody {
        message: message.to_string(),
        code: code.to_string(),
    };
    // Two plain strings always serialize.
    let body = serde_json::to_string(&body).unwrap_or_default();
    envelope(status, body)
}

pub fn reject(rejection: Rejection) -> ApiResponse {
    error(rejection.message, rejection.code.as_str(), rejection.code.status())
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => error!("Dropping invalid response header {}: {}", name, value),
            }
        }
        response
    }
}
