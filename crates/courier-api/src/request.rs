use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, RawPathParams, Request};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use courier_types::api::Identity;

use crate::error::HandlerError;

/// An inbound request as the handlers see it: optional raw body, path
/// parameters, and the caller identity verified upstream.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub body: Option<String>,
    pub path_parameters: HashMap<String, String>,
    pub identity: Option<Identity>,
}

impl ApiRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_path_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_identity(mut self, sub: impl Into<String>) -> Self {
        self.identity = Some(Identity { sub: sub.into() });
        self
    }

    /// The raw body, unless it is missing or empty.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref().filter(|body| !body.is_empty())
    }

    /// A path parameter, unless it is missing or empty.
    pub fn path_parameter(&self, name: &str) -> Option<&str> {
        self.path_parameters
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Subject of the verified caller identity, if any.
    pub fn caller(&self) -> Option<&str> {
        self.identity
            .as_ref()
            .map(|identity| identity.sub.as_str())
            .filter(|sub| !sub.is_empty())
    }
}

/// Parse a JSON body into the operation's request type.
pub fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, HandlerError> {
    Ok(serde_json::from_str(body)?)
}

impl<S> FromRequest<S> for ApiRequest
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();

        // Routes without parameters have nothing to extract.
        let path_parameters = match RawPathParams::from_request_parts(&mut parts, state).await {
            Ok(params) => params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            Err(_) => HashMap::new(),
        };
        let identity = parts.extensions.get::<Identity>().cloned();

        let bytes = Bytes::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(IntoResponse::into_response)?;
        let body = (!bytes.is_empty()).then(|| String::from_utf8_lossy(&bytes).into_owned());

        Ok(Self {
            body,
            path_parameters,
            identity,
        })
    }
}
