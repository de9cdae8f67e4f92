use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use muxi_core::error::AppError;
use muxi_core::game::CatalogKind;
use muxi_core::models::{Group, UserFilter};
use muxi_core::pagination::{Page, Pagination};

use crate::dto::{
    AdjustCoinsRequest, CommonUserData, Envelope, GrantRequest, OwnedEntryResponse,
    PaginatedData, UserListQuery,
};
use crate::error::ApiError;
use crate::extract::{JsonBody, keyword, parse_id, parse_optional_id};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/admin/get/getusers",
    params(UserListQuery),
    responses(
        (status = 200, description = "Matching users", body = Envelope<PaginatedData<CommonUserData>>),
        (status = 400, description = "Invalid filter", body = crate::dto::ErrorResponse),
        (status = 403, description = "Admin only", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = state.db.user_repo();

    if let Some(id) = parse_optional_id(query.id.as_deref(), "user id")? {
        let users: Vec<_> = repo.get(id).await?.into_iter().collect();
        let total = users.len() as i64;
        let page = Page::new(users, total, Pagination::default());
        return Ok(Envelope::ok(PaginatedData::<CommonUserData>::from_page(page)));
    }

    let group = match query.group.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        Some(raw) => Some(raw.parse::<Group>().map_err(AppError::ValidationError)?),
        None => None,
    };
    let filter = UserFilter {
        username: keyword(query.username.as_deref()),
        group,
    };
    let pagination = Pagination::from_raw(query.page.as_deref(), query.page_size.as_deref());

    let page = repo.list(&filter, pagination).await?;
    Ok(Envelope::ok(PaginatedData::<CommonUserData>::from_page(page)))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/coins",
    params(("id" = i64, Path, description = "User id")),
    request_body = AdjustCoinsRequest,
    responses(
        (status = 200, description = "Balances adjusted", body = Envelope<CommonUserData>),
        (status = 400, description = "No delta given", body = crate::dto::ErrorResponse),
        (status = 404, description = "User not found", body = crate::dto::ErrorResponse),
        (status = 409, description = "A balance would go negative", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn adjust_coins(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<AdjustCoinsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = parse_id(&id, "user id")?;
    if body.strength_coin.is_none() && body.select_coin.is_none() {
        return Err(AppError::ValidationError(
            "give strength_coin and/or select_coin".into(),
        )
        .into());
    }

    let strength = body.strength_coin.unwrap_or(0);
    let select = body.select_coin.unwrap_or(0);
    let user = state
        .db
        .user_repo()
        .adjust_coins(user_id, strength, select)
        .await?;

    tracing::info!(user_id, strength, select, "Coins adjusted");
    Ok(Envelope::ok_with_message(
        "coins adjusted",
        CommonUserData::from(user),
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/grant",
    params(("id" = i64, Path, description = "User id")),
    request_body = GrantRequest,
    responses(
        (status = 200, description = "Content granted", body = Envelope<OwnedEntryResponse>),
        (status = 400, description = "Unknown kind or bad amount", body = crate::dto::ErrorResponse),
        (status = 404, description = "User or entry not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn grant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<GrantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = parse_id(&id, "user id")?;
    let kind: CatalogKind = body.kind.parse().map_err(AppError::ValidationError)?;

    let owned = state
        .db
        .inventory_repo()
        .grant(user_id, kind, body.target_id, body.amount)
        .await?;

    Ok(Envelope::ok_with_message(
        format!("{kind} granted"),
        OwnedEntryResponse::from(owned),
    ))
}
