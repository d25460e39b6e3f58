use serde::{Deserialize, Serialize};

use crate::models::{Theme, UserSettings};

// -- Identity --

/// JWT claims issued by the upstream identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Verified caller identity attached to a request. Handlers trust it as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub sub: String,
}

// -- Users --

/// Body of `POST /users`. Every field is optional at the wire level so the
/// handler can report `INVALID_INPUT` itself instead of a parse failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub settings: Option<UserSettings>,
}

/// Body of `PUT /users/{userId}`. A field is applied when it is present and
/// not null; an empty string is a real value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub settings: Option<SettingsPatch>,
}

/// Settings fields supplied on update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub notifications: Option<NotificationSettingsPatch>,
    pub theme: Option<Theme>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettingsPatch {
    pub email: Option<bool>,
    pub push: Option<bool>,
    pub in_app: Option<bool>,
}

// -- Messages --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Recipient.
    pub user_id: Option<String>,
    pub content: Option<String>,
}

// -- Connections --

/// Body of `POST /connections/events`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRequest {
    pub connection_id: Option<String>,
    #[serde(default)]
    pub route_key: String,
}

// -- Envelopes --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub message: String,
}

impl Confirmation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
