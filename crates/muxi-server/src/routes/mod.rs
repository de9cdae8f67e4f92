//! HTTP routes, grouped by area.

pub mod accounts;
pub mod admin;
pub mod books;
pub mod game;
pub mod health;
pub mod profile;
pub mod records;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{StatusCode, header};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use muxi_core::error::AppError;

use crate::auth::{require_admin, require_user};
use crate::dto::Envelope;
use crate::error::ApiError;
use crate::extract::upload_too_large_message;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Largest accepted multipart body.
pub const UPLOAD_BODY_LIMIT: usize = 8 * 1024 * 1024;

/// Build the full router. Cross-cutting layers (CORS, tracing, rate limiting)
/// are added by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    let user = Router::new()
        .route("/api/profile/operation/logout", get(profile::logout))
        .route("/api/profile/get/self", get(profile::get_self))
        .route("/api/profile/update/password", put(profile::update_password))
        .route("/api/profile/update/username", put(profile::update_username))
        .route("/api/profile/get/achievements", get(game::my_achievements))
        .route("/api/profile/get/skills", get(game::my_skills))
        .route("/api/profile/get/cards", get(game::my_cards))
        .route("/api/profile/get/items", get(game::my_items))
        .route("/api/books", get(books::list_books))
        .route("/api/books/{id}", get(books::get_book))
        .route("/api/books/{id}/borrow", post(records::borrow_book))
        .route("/api/records", get(records::list_my_records))
        .route("/api/records/{id}/return", post(records::return_book))
        .route("/api/catalog/{kind}", get(game::list_catalog))
        .route("/api/game/skills/{id}/upgrade", post(game::upgrade_skill))
        .route("/api/game/cards/draw", post(game::draw_card))
        .merge(with_upload_limit(Router::new().route(
            "/api/profile/update/headimage",
            put(profile::update_head_image),
        )))
        .layer(middleware::from_fn_with_state(state.clone(), require_user));

    let admin = Router::new()
        .route("/api/admin/get/getusers", get(admin::list_users))
        .route("/api/admin/users/{id}/coins", put(admin::adjust_coins))
        .route("/api/admin/users/{id}/grant", post(admin::grant))
        .route("/api/admin/records", get(records::list_all_records))
        .route("/api/admin/catalog/{kind}", post(game::create_catalog_entry))
        .route(
            "/api/admin/catalog/{kind}/{id}",
            delete(game::delete_catalog_entry),
        )
        .merge(with_upload_limit(
            Router::new()
                .route("/api/admin/books", post(books::create_book))
                .route(
                    "/api/admin/books/{id}",
                    put(books::update_book).delete(books::delete_book),
                ),
        ))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_user));

    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/register", post(accounts::register))
        .route("/api/auth/login", post(accounts::login))
        .nest_service("/uploads", ServeDir::new(state.images.root()))
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public
        .merge(user)
        .merge(admin)
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .with_state(state)
}

/// Replace axum's default body limit with the upload limit.
fn with_upload_limit(router: Router<Arc<AppState>>) -> Router<Arc<AppState>> {
    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(UPLOAD_BODY_LIMIT))
        .layer(middleware::map_response(envelope_payload_too_large))
}

/// Re-render the limit layer's plain-text 413 as an envelope.
async fn envelope_payload_too_large(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE || is_json {
        return response;
    }
    ApiError(AppError::PayloadTooLarge(upload_too_large_message())).into_response()
}

async fn not_found() -> ApiError {
    AppError::NotFound("Route".into()).into()
}

async fn method_not_allowed() -> Envelope<()> {
    Envelope::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}
