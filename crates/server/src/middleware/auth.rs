//! Authentication extractors.
//!
//! Requests authenticate with a bearer API token resolved against the
//! user directory. `RequireAuth` yields the current user; `RequireAdmin`
//! additionally demands the staff flag.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};

use crate::db::UserRepository;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Extractor that requires an authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires an authenticated staff user.
pub struct RequireAdmin(pub CurrentUser);

/// Rejection for the authentication extractors.
pub enum AuthRejection {
    /// No usable bearer token on the request.
    Unauthorized,
    /// Authenticated, but not staff.
    Forbidden,
    /// Token lookup failed.
    Internal,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "authentication required"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "staff access required"),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        }
        .into_response()
    }
}

async fn current_user(parts: &Parts, state: &AppState) -> Result<CurrentUser, AuthRejection> {
    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthRejection::Unauthorized)?;

    UserRepository::new(state.pool())
        .get_by_token(token)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "token lookup failed");
            AuthRejection::Internal
        })?
        .ok_or(AuthRejection::Unauthorized)
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        current_user(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = current_user(parts, state).await?;
        if !user.is_admin {
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}
