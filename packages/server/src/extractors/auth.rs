use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Authenticated user.
///
/// The token comes from the `Authorization: Bearer <token>` header, or from a `token`
/// query parameter for clients that cannot set headers (browser WebSockets).
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = match parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
        {
            Some(header) => header
                .strip_prefix("Bearer ")
                .ok_or(AppError::TokenInvalid)?
                .to_owned(),
            None => Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.token)
                .ok_or(AppError::TokenMissing)?,
        };

        let claims = jwt::verify(&state.config.auth.jwt_secret, &token)
            .map_err(|_| AppError::TokenInvalid)?;

        Ok(AuthUser {
            user_id: claims.uid,
            username: claims.sub,
        })
    }
}
