use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MuXi API",
        version = "0.1.0",
        description = "Library lending and profile game backend."
    ),
    paths(
        crate::routes::accounts::register,
        crate::routes::accounts::login,
        crate::routes::profile::logout,
        crate::routes::profile::get_self,
        crate::routes::profile::update_password,
        crate::routes::profile::update_username,
        crate::routes::profile::update_head_image,
        crate::routes::game::my_achievements,
        crate::routes::game::my_skills,
        crate::routes::game::my_cards,
        crate::routes::game::my_items,
        crate::routes::books::list_books,
        crate::routes::books::get_book,
        crate::routes::books::create_book,
        crate::routes::books::update_book,
        crate::routes::books::delete_book,
        crate::routes::records::borrow_book,
        crate::routes::records::return_book,
        crate::routes::records::list_my_records,
        crate::routes::records::list_all_records,
        crate::routes::admin::list_users,
        crate::routes::admin::adjust_coins,
        crate::routes::admin::grant,
        crate::routes::game::list_catalog,
        crate::routes::game::create_catalog_entry,
        crate::routes::game::delete_catalog_entry,
        crate::routes::game::upgrade_skill,
        crate::routes::game::draw_card,
        crate::routes::health::health,
    ),
    components(schemas(
        crate::dto::ErrorResponse,
        crate::dto::CredentialsRequest,
        crate::dto::AuthData,
        crate::dto::CommonUserData,
        crate::dto::UpdatePasswordRequest,
        crate::dto::UpdateUsernameRequest,
        crate::dto::HeadImageForm,
        crate::dto::HeadImageResponse,
        crate::dto::AdjustCoinsRequest,
        crate::dto::GrantRequest,
        crate::dto::BookResponse,
        crate::dto::CreateBookForm,
        crate::dto::UpdateBookForm,
        crate::dto::RecordResponse,
        crate::dto::CatalogEntryResponse,
        crate::dto::CreateCatalogEntryRequest,
        crate::dto::OwnedEntryResponse,
        crate::dto::SkillUpgradeResponse,
        crate::dto::CardDrawResponse,
        crate::dto::HealthData,
    )),
    tags(
        (name = "accounts", description = "Registration and login"),
        (name = "profile", description = "The caller's own account and inventory"),
        (name = "books", description = "Book catalogue"),
        (name = "records", description = "Borrowing and returning"),
        (name = "game", description = "Catalog content, skill upgrades and card draws"),
        (name = "admin", description = "Administration, admin group only"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the Bearer token security scheme to the OpenAPI document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token returned by /api/auth/register or /api/auth/login.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
