//! Registration and login endpoints.

use axum::{
    extract::{ConnectInfo, State},
    http::StatusCode,
    routing::post,
    Form, Json, Router,
};
use pw_core::Role;
use std::net::SocketAddr;
use tracing::warn;
use validator::Validate;

use crate::dto::{LoginForm, RegisterRequest, RegisterResponse, TokenResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Creates the auth routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Creates a user account.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = RegisterResponse),
        (status = 400, description = "Validation failure"),
        (status = 409, description = "Username taken"),
        (status = 429, description = "Rate limited")
    ),
    tag = "Auth"
)]
pub(crate) async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if state.login_limiter.check(addr.ip()).is_err() {
        warn!(ip = %addr.ip(), "registration rate limited");
        return Err(ApiError::RateLimitExceeded);
    }
    request
        .validate()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let record = state
        .users
        .register(&request.username, &request.password, Role::Analyst)
        .await?;
    state
        .audit
        .append(
            "user_registered",
            &record.username,
            None,
            "success",
            None,
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            username: record.username,
            role: record.role.as_str().to_string(),
        }),
    ))
}

/// Exchanges credentials for a bearer token (form-urlencoded).
#[utoipa::path(
    post,
    path = "/api/auth/login",
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Rate limited")
    ),
    tag = "Auth"
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    if state.login_limiter.check(addr.ip()).is_err() {
        warn!(ip = %addr.ip(), username = %form.username, "login rate limited");
        return Err(ApiError::RateLimitExceeded);
    }

    let record = match state.users.verify_login(&form.username, &form.password).await {
        Ok(record) => record,
        Err(err) => {
            warn!(ip = %addr.ip(), username = %form.username, "login failed");
            state
                .audit
                .append(
                    "user_login",
                    &form.username,
                    None,
                    "failure",
                    Some("invalid credentials"),
                )
                .await;
            return Err(err.into());
        }
    };

    let token = state.tokens.issue(&record.username, record.role)?;
    state
        .audit
        .append("user_login", &record.username, None, "success", None)
        .await;

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        role: record.role.as_str().to_string(),
    }))
}
