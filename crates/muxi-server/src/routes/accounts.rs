use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

use muxi_core::credentials::{hash_password, validate_password, validate_username, verify_password};
use muxi_core::error::AppError;
use muxi_core::models::{Group, User};

use crate::dto::{AuthData, CredentialsRequest, Envelope};
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::AppState;

const BAD_CREDENTIALS: &str = "incorrect username or password";

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Account created and logged in", body = Envelope<AuthData>),
        (status = 400, description = "Invalid username or password", body = crate::dto::ErrorResponse),
        (status = 409, description = "Username taken", body = crate::dto::ErrorResponse),
    ),
    tag = "accounts"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = body.username.trim();
    validate_username(username)?;
    validate_password(&body.password)?;

    let hash = hash_password(&body.password).await?;
    let user = state.db.user_repo().create(username, &hash, Group::User).await?;

    tracing::info!(user_id = user.id, "User registered");
    Ok(Envelope::ok_with_message("registered", auth_data(&state, user)?))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Logged in", body = Envelope<AuthData>),
        (status = 400, description = "Missing username or password", body = crate::dto::ErrorResponse),
        (status = 403, description = "Wrong username or password", body = crate::dto::ErrorResponse),
    ),
    tag = "accounts"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return Err(AppError::ValidationError("username and password are required".into()).into());
    }

    let Some(user) = state.db.user_repo().find_by_username(username).await? else {
        return Err(AppError::Forbidden(BAD_CREDENTIALS.into()).into());
    };
    if !verify_password(&body.password, &user.password_hash).await? {
        tracing::debug!(user_id = user.id, "Login rejected");
        return Err(AppError::Forbidden(BAD_CREDENTIALS.into()).into());
    }

    Ok(Envelope::ok_with_message("logged in", auth_data(&state, user)?))
}

fn auth_data(state: &AppState, user: User) -> Result<AuthData, AppError> {
    let issued = state.jwt.issue(&user)?;
    Ok(AuthData {
        user: user.into(),
        token: issued.token,
        expires_at: issued.expires_at,
    })
}
