use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::dto::{Envelope, HealthData};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = Envelope<HealthData>),
        (status = 503, description = "Database unreachable", body = Envelope<HealthData>),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => Envelope::ok_with_message(
            "I'm OK.",
            HealthData {
                database: "ok".to_string(),
            },
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {e}");
            Envelope {
                code: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                message: "database unavailable".to_string(),
                data: Some(HealthData {
                    database: "unavailable".to_string(),
                }),
            }
        }
    }
}
