use std::fmt;

use axum::http::StatusCode;
use courier_db::StoreError;
use courier_gateway::GatewayError;
use thiserror::Error;
use tracing::error;

use crate::response::{self, ApiResponse};

/// Machine-readable error codes returned in the `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingBody,
    InvalidInput,
    InvalidEmail,
    MissingUserId,
    MissingConnectionId,
    UserExists,
    UserNotFound,
    InvalidUpdate,
    InvalidRoute,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingBody => "MISSING_BODY",
            Self::InvalidInput => "INVALID_INPUT",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::MissingUserId => "MISSING_USER_ID",
            Self::MissingConnectionId => "MISSING_CONNECTION_ID",
            Self::UserExists => "USER_EXISTS",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidUpdate => "INVALID_UPDATE",
            Self::InvalidRoute => "INVALID_ROUTE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-facing error: code plus the fixed message shown to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub code: ErrorCode,
    pub message: &'static str,
}

impl Rejection {
    pub const MISSING_BODY: Self = Self::new(ErrorCode::MissingBody, "Request body is required");
    pub const MISSING_FIELDS: Self = Self::new(ErrorCode::InvalidInput, "Missing required fields");
    pub const INVALID_EMAIL: Self = Self::new(ErrorCode::InvalidEmail, "Invalid email format");
    pub const MISSING_USER_ID: Self = Self::new(ErrorCode::MissingUserId, "User ID is required");
    pub const MISSING_CONNECTION_USER: Self =
        Self::new(ErrorCode::MissingUserId, "User ID is required for connection");
    pub const MISSING_CONNECTION_ID: Self =
        Self::new(ErrorCode::MissingConnectionId, "Connection ID is required");
    pub const USER_EXISTS: Self = Self::new(ErrorCode::UserExists, "User already exists");
    pub const USER_NOT_FOUND: Self = Self::new(ErrorCode::UserNotFound, "User not found");
    pub const NO_UPDATE_FIELDS: Self = Self::new(ErrorCode::InvalidUpdate, "No valid fields to update");
    pub const INVALID_ROUTE: Self = Self::new(ErrorCode::InvalidRoute, "Invalid route key");
    pub const INTERNAL: Self = Self::new(ErrorCode::InternalError, "Internal server error");

    pub const fn new(code: ErrorCode, message: &'static str) -> Self {
        Self { code, message }
    }
}

/// Why a handler did not produce its success envelope.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{}: {}", .0.code, .0.message)]
    Rejected(Rejection),

    #[error("malformed request body: {0}")]
    Body(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<Rejection> for HandlerError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

impl HandlerError {
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_condition_failed())
    }

    /// Render as an error envelope.
    ///
    /// Rejections pass through unchanged. Anything else is logged under
    /// `context`; a failed store condition becomes `on_condition_failed` when
    /// given, and every other failure collapses to `INTERNAL_ERROR`.
    pub fn into_response(self, context: &str, on_condition_failed: Option<Rejection>) -> ApiResponse {
        let err = match self {
            Self::Rejected(rejection) => return response::reject(rejection),
            err => err,
        };

        error!("{}: {}", context, err);
        match on_condition_failed {
            Some(rejection) if err.is_condition_failed() => response::reject(rejection),
            _ => response::reject(Rejection::INTERNAL),
        }
    }
}
