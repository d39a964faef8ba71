//! Axum extractors for bearer-token authentication and authorization.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use pw_core::{Claims, Role};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Extractor for authenticated requests.
///
/// Reads the `Authorization: Bearer <token>` header, verifies the token
/// signature and expiry, and checks the subject still exists in the user
/// store. Rejects with 401 otherwise.
pub struct AuthenticatedUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))?;

        let claims = app_state.tokens.verify(token).map_err(|err| {
            warn!(error = %err, "bearer token rejected");
            ApiError::Unauthorized("invalid or expired token".to_string())
        })?;

        if app_state.users.get(&claims.sub).await.is_none() {
            return Err(ApiError::Unauthorized("unknown user".to_string()));
        }

        Ok(AuthenticatedUser(claims))
    }
}

/// Extractor that additionally requires the `admin` role.
pub struct RequireAdmin(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(claims) =
            AuthenticatedUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Admin {
            warn!(user = %claims.sub, "admin endpoint refused for non-admin");
            return Err(ApiError::Forbidden("admin role required".to_string()));
        }
        Ok(RequireAdmin(claims))
    }
}
