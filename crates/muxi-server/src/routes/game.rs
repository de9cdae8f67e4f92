use std::sync::Arc;

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use muxi_core::error::AppError;
use muxi_core::game::{CatalogKind, NewCatalogEntry, Rarity};
use muxi_core::pagination::Pagination;

use crate::auth::AuthUser;
use crate::dto::{
    CardDrawResponse, CatalogEntryResponse, CreateCatalogEntryRequest, Envelope,
    OwnedEntryResponse, PageQuery, PaginatedData, SkillUpgradeResponse,
};
use crate::error::ApiError;
use crate::extract::{JsonBody, parse_id};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/catalog/{kind}",
    params(
        ("kind" = String, Path, description = "achievements, skills, cards or items"),
        PageQuery,
    ),
    responses(
        (status = 200, description = "Catalog entries", body = Envelope<PaginatedData<CatalogEntryResponse>>),
        (status = 404, description = "Unknown kind", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "game"
)]
pub async fn list_catalog(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = kind_from_path(&kind)?;
    let pagination = Pagination::from_raw(query.page.as_deref(), query.page_size.as_deref());

    let page = state.db.catalog_repo().list(kind, pagination).await?;
    Ok(Envelope::ok(PaginatedData::<CatalogEntryResponse>::from_page(page)))
}

#[utoipa::path(
    post,
    path = "/api/admin/catalog/{kind}",
    params(("kind" = String, Path, description = "achievements, skills, cards or items")),
    request_body = CreateCatalogEntryRequest,
    responses(
        (status = 200, description = "Entry created", body = Envelope<CatalogEntryResponse>),
        (status = 400, description = "Invalid entry", body = crate::dto::ErrorResponse),
        (status = 409, description = "Name taken", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn create_catalog_entry(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    JsonBody(body): JsonBody<CreateCatalogEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = kind_from_path(&kind)?;
    let rarity = body
        .rarity
        .as_deref()
        .map(str::parse::<Rarity>)
        .transpose()
        .map_err(AppError::ValidationError)?;

    let entry = NewCatalogEntry {
        kind,
        name: body.name,
        description: body.description.unwrap_or_default().trim().to_string(),
        max_level: body.max_level,
        rarity,
    }
    .validated()?;

    let created = state.db.catalog_repo().create(&entry).await?;

    tracing::info!(kind = %kind, id = created.id, name = %created.name, "Catalog entry created");
    Ok(Envelope::ok_with_message(
        format!("{kind} created"),
        CatalogEntryResponse::from(created),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/catalog/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "achievements, skills, cards or items"),
        ("id" = i64, Path, description = "Entry id"),
    ),
    responses(
        (status = 200, description = "Entry deleted along with its ownership rows", body = crate::dto::ErrorResponse),
        (status = 404, description = "Not found", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn delete_catalog_entry(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = kind_from_path(&kind)?;
    let id = parse_id(&id, "entry id")?;

    if !state.db.catalog_repo().delete(kind, id).await? {
        return Err(AppError::NotFound(format!("{kind} {id}")).into());
    }

    tracing::info!(kind = %kind, id, "Catalog entry deleted");
    Ok(Envelope::<()>::message(format!("{kind} deleted")))
}

fn kind_from_path(raw: &str) -> Result<CatalogKind, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("Catalog '{raw}'")))
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/profile/get/achievements",
    responses((status = 200, description = "Unlocked achievements", body = Envelope<Vec<OwnedEntryResponse>>)),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn my_achievements(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    owned(&state, user.id, CatalogKind::Achievement).await
}

#[utoipa::path(
    get,
    path = "/api/profile/get/skills",
    responses((status = 200, description = "Learned skills with levels", body = Envelope<Vec<OwnedEntryResponse>>)),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn my_skills(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    owned(&state, user.id, CatalogKind::Skill).await
}

#[utoipa::path(
    get,
    path = "/api/profile/get/cards",
    responses((status = 200, description = "Owned cards with quantities", body = Envelope<Vec<OwnedEntryResponse>>)),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn my_cards(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    owned(&state, user.id, CatalogKind::Card).await
}

#[utoipa::path(
    get,
    path = "/api/profile/get/items",
    responses((status = 200, description = "Owned items with quantities", body = Envelope<Vec<OwnedEntryResponse>>)),
    security(("bearer" = [])),
    tag = "profile"
)]
pub async fn my_items(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    owned(&state, user.id, CatalogKind::Item).await
}

async fn owned(
    state: &AppState,
    user_id: i64,
    kind: CatalogKind,
) -> Result<Envelope<Vec<OwnedEntryResponse>>, ApiError> {
    let entries = state.db.inventory_repo().owned(user_id, kind).await?;
    Ok(Envelope::ok(
        entries.into_iter().map(OwnedEntryResponse::from).collect(),
    ))
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/game/skills/{id}/upgrade",
    params(("id" = i64, Path, description = "Skill id")),
    responses(
        (status = 200, description = "Skill levelled up", body = Envelope<SkillUpgradeResponse>),
        (status = 404, description = "Skill unknown or not learned", body = crate::dto::ErrorResponse),
        (status = 409, description = "Max level reached or not enough strength coins", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "game"
)]
pub async fn upgrade_skill(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let skill_id = parse_id(&id, "skill id")?;
    let upgrade = state
        .db
        .inventory_repo()
        .upgrade_skill(user.id, skill_id)
        .await?;

    tracing::info!(
        user_id = user.id,
        skill_id,
        level = upgrade.skill.level,
        "Skill upgraded"
    );
    Ok(Envelope::ok_with_message(
        "skill upgraded",
        SkillUpgradeResponse {
            skill: upgrade.skill.into(),
            strength_coin: upgrade.strength_coin,
        },
    ))
}

#[utoipa::path(
    post,
    path = "/api/game/cards/draw",
    responses(
        (status = 200, description = "A card was drawn", body = Envelope<CardDrawResponse>),
        (status = 404, description = "The card catalog is empty", body = crate::dto::ErrorResponse),
        (status = 409, description = "Not enough select coins", body = crate::dto::ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "game"
)]
pub async fn draw_card(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let draw = state.db.inventory_repo().draw_card(user.id).await?;

    tracing::info!(user_id = user.id, card_id = draw.card.id, "Card drawn");
    Ok(Envelope::ok_with_message(
        "card drawn",
        CardDrawResponse {
            card: draw.card.into(),
            quantity: draw.quantity,
            select_coin: draw.select_coin,
        },
    ))
}
