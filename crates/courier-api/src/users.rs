use axum::{extract::State, http::StatusCode};
use serde_json::Value;
use tracing::info;

use courier_db::{Condition, Document, models::to_document};
use courier_types::api::{Confirmation, CreateUserRequest, UpdateUserRequest};
use courier_types::models::{User, UserSettings};

use crate::error::{HandlerError, Rejection};
use crate::request::{ApiRequest, parse_body};
use crate::response::{self, ApiResponse};
use crate::state::{AppState, AppStateInner};
use crate::validation::{generate_id, redact, timestamp, validate_email};

const USER_ID: &str = "userId";

/// `POST /users`
pub async fn create_user(State(state): State<AppState>, req: ApiRequest) -> ApiResponse {
    create(&state, &req)
        .await
        .unwrap_or_else(|err| err.into_response("Error creating user", Some(Rejection::USER_EXISTS)))
}

/// `GET /users/{userId}`
pub async fn get_user(State(state): State<AppState>, req: ApiRequest) -> ApiResponse {
    get(&state, &req)
        .await
        .unwrap_or_else(|err| err.into_response("Error getting user", None))
}

/// `PUT /users/{userId}`
pub async fn update_user(State(state): State<AppState>, req: ApiRequest) -> ApiResponse {
    update(&state, &req)
        .await
        .unwrap_or_else(|err| err.into_response("Error updating user", Some(Rejection::USER_NOT_FOUND)))
}

/// `DELETE /users/{userId}`
pub async fn delete_user(State(state): State<AppState>, req: ApiRequest) -> ApiResponse {
    delete(&state, &req)
        .await
        .unwrap_or_else(|err| err.into_response("Error deleting user", Some(Rejection::USER_NOT_FOUND)))
}

async fn create(state: &AppStateInner, req: &ApiRequest) -> Result<ApiResponse, HandlerError> {
    let body = req.body().ok_or(Rejection::MISSING_BODY)?;
    let CreateUserRequest {
        email,
        first_name,
        last_name,
        settings,
    } = parse_body(body)?;

    let (Some(email), Some(first_name), Some(last_name)) = (non_empty(email), non_empty(first_name), non_empty(last_name))
    else {
        return Err(Rejection::MISSING_FIELDS.into());
    };

    if !validate_email(&email) {
        return Err(Rejection::INVALID_EMAIL.into());
    }

    let now = timestamp();
    let user = User {
        user_id: generate_id(),
        email,
        first_name,
        last_name,
        settings: settings.unwrap_or_default(),
        created_at: now.clone(),
        updated_at: now,
    };

    state
        .store
        .put(&state.tables.users, to_document(&user)?, Some(Condition::NotExists))
        .await?;

    info!("Created user {}", user.user_id);
    Ok(response::success(&user, StatusCode::CREATED))
}

async fn get(state: &AppStateInner, req: &ApiRequest) -> Result<ApiResponse, HandlerError> {
    let user_id = req.path_parameter(USER_ID).ok_or(Rejection::MISSING_USER_ID)?;

    let user = state
        .store
        .get(&state.tables.users, user_id)
        .await?
        .ok_or(Rejection::USER_NOT_FOUND)?;

    Ok(response::ok(&redact(&user)))
}

async fn update(state: &AppStateInner, req: &ApiRequest) -> Result<ApiResponse, HandlerError> {
    let user_id = req.path_parameter(USER_ID).ok_or(Rejection::MISSING_USER_ID)?;
    let body = req.body().ok_or(Rejection::MISSING_BODY)?;
    let patch: UpdateUserRequest = parse_body(body)?;

    if let Some(email) = &patch.email {
        if !validate_email(email) {
            return Err(Rejection::INVALID_EMAIL.into());
        }
    }

    let mut changes = changes_from(state, user_id, patch).await?;
    changes.insert("updatedAt".into(), Value::String(timestamp()));

    // Unreachable while updatedAt is always set.
    if changes.is_empty() {
        return Err(Rejection::NO_UPDATE_FIELDS.into());
    }

    let updated = state
        .store
        .update(&state.tables.users, user_id, changes, Some(Condition::Exists))
        .await?;

    info!("Updated user {}", user_id);
    Ok(response::ok(&updated))
}

async fn delete(state: &AppStateInner, req: &ApiRequest) -> Result<ApiResponse, HandlerError> {
    let user_id = req.path_parameter(USER_ID).ok_or(Rejection::MISSING_USER_ID)?;

    state
        .store
        .delete(&state.tables.users, user_id, Some(Condition::Exists))
        .await?;

    info!("Deleted user {}", user_id);
    Ok(response::ok(&Confirmation::new("User deleted successfully")))
}

/// Attributes to set, one per field present in the patch. Supplied settings
/// are applied over the stored ones.
async fn changes_from(
    state: &AppStateInner,
    user_id: &str,
    patch: UpdateUserRequest,
) -> Result<Document, HandlerError> {
    let mut changes = Document::new();
    if let Some(email) = patch.email {
        changes.insert("email".into(), Value::String(email));
    }
    if let Some(first_name) = patch.first_name {
        changes.insert("firstName".into(), Value::String(first_name));
    }
    if let Some(last_name) = patch.last_name {
        changes.insert("lastName".into(), Value::String(last_name));
    }
    if let Some(settings_patch) = patch.settings {
        let stored = state
            .store
            .get(&state.tables.users, user_id)
            .await?
            .ok_or(Rejection::USER_NOT_FOUND)?;
        let mut settings = match stored.get("settings") {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
            _ => UserSettings::default(),
        };
        settings.apply(settings_patch);
        changes.insert("settings".into(), serde_json::to_value(settings)?);
    }
    Ok(changes)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
