use std::sync::Arc;

use axum::Extension;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use chrono::Utc;

use muxi_core::cooldown::HEAD_IMAGE_COOLDOWN;
use muxi_core::credentials::{validate_password, validate_username};
use muxi_core::error::AppError;
use muxi_core::storage::HEAD_IMAGE_PREFIX;

use crate::auth::AuthUser;
use crate::dto::{
    CommonUserData, Envelope, HeadImageForm, HeadImageResponse, UpdatePasswordRequest,
    UpdateUsernameRequest,
};
use crate::error::ApiError;
use crate::extract::{JsonBody, MultipartForm};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/profile/operation/logout",
    responses(
        (status = 200, description = "Every token of the caller is revoked", body = crate::dto::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.user_repo().bump_token_version(user.id).await? {
        return Err(AppError::Unauthorized("account no longer exists".into()).into());
    }

    tracing::info!(user_id = user.id, "User logged out");
    Ok(Envelope::<()>::message("logged out"))
}

#[utoipa::path(
    get,
    path = "/api/profile/get/self",
    responses(
        (status = 200, description = "The caller's profile", body = Envelope<CommonUserData>),
        (status = 401, description = "Unauthorized", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn get_self(Extension(AuthUser(user)): Extension<AuthUser>) -> impl IntoResponse {
    Envelope::ok(CommonUserData::from(user))
}

#[utoipa::path(
    put,
    path = "/api/profile/update/password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed; log in again", body = crate::dto::ErrorResponse),
        (status = 400, description = "Invalid new password", body = crate::dto::ErrorResponse),
        (status = 403, description = "Wrong old password or cooldown active", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    JsonBody(body): JsonBody<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_password(&body.new_password)?;
    if body.new_password == body.old_password {
        return Err(AppError::ValidationError(
            "new password must differ from the old one".into(),
        )
        .into());
    }

    state
        .db
        .user_repo()
        .change_password(user.id, &body.old_password, &body.new_password)
        .await?;

    tracing::info!(user_id = user.id, "Password changed");
    Ok(Envelope::<()>::message("password updated, please log in again"))
}

#[utoipa::path(
    put,
    path = "/api/profile/update/username",
    request_body = UpdateUsernameRequest,
    responses(
        (status = 200, description = "Username changed", body = Envelope<CommonUserData>),
        (status = 400, description = "Invalid username", body = crate::dto::ErrorResponse),
        (status = 403, description = "Cooldown active", body = crate::dto::ErrorResponse),
        (status = 409, description = "Username taken", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn update_username(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    JsonBody(body): JsonBody<UpdateUsernameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_username = body.new_username.trim();
    validate_username(new_username)?;

    let updated = state
        .db
        .user_repo()
        .change_username(user.id, new_username)
        .await?;

    tracing::info!(user_id = user.id, "Username changed");
    Ok(Envelope::ok_with_message(
        "username updated",
        CommonUserData::from(updated),
    ))
}

#[utoipa::path(
    put,
    path = "/api/profile/update/headimage",
    request_body(content = HeadImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Head image replaced", body = Envelope<HeadImageResponse>),
        (status = 400, description = "Missing or unsupported image", body = crate::dto::ErrorResponse),
        (status = 403, description = "Cooldown active", body = crate::dto::ErrorResponse),
        (status = 413, description = "Upload too large", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn update_head_image(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    // Re-checked under the row lock by the repository.
    HEAD_IMAGE_COOLDOWN.check(user.head_image_updated_at, Utc::now())?;

    let mut form = MultipartForm::read(multipart).await?;
    let file = form.take_file("new_head_image").ok_or_else(|| {
        AppError::ValidationError("field 'new_head_image' must carry an image file".into())
    })?;

    let new_path = state
        .images
        .save(HEAD_IMAGE_PREFIX, &file.file_name, &file.bytes)
        .await?;

    let old_path = match state.db.user_repo().change_head_image(user.id, &new_path).await {
        Ok(old) => old,
        Err(e) => {
            state.images.remove_quietly(&new_path).await;
            return Err(e.into());
        }
    };
    state.images.remove_quietly(&old_path).await;

    tracing::info!(user_id = user.id, path = %new_path, "Head image replaced");
    Ok(Envelope::ok_with_message(
        "head image updated",
        HeadImageResponse {
            head_image_path: new_path,
        },
    ))
}
