use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use courier_types::api::{Claims, Identity};

use crate::state::AppState;

/// Verify an optional bearer JWT and attach the caller [`Identity`].
///
/// The token comes from `Authorization: Bearer …` or, for WebSocket clients
/// that cannot set headers, the `token` query parameter. Requests without a
/// token pass through anonymously; a token that fails verification is 401.
pub async fn identify(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let token = bearer_token(&req).or_else(|| query_token(&req));

    if let Some(token) = token {
        let token_data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

        req.extensions_mut().insert(Identity {
            sub: token_data.claims.sub,
        });
    }

    Ok(next.run(req).await)
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn query_token(req: &Request) -> Option<String> {
    req.uri()
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Issue an HS256 token for `sub` valid for `ttl`.
pub fn create_token(secret: &str, sub: &str, ttl: chrono::Duration) -> jsonwebtoken::errors::Result<String> {
    let claims = Claims {
        sub: sub.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
