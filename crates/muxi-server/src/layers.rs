//! Cross-cutting layers the binary wraps around the router.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::{PeerIpKeyExtractor, SmartIpKeyExtractor};
use tower_governor::{GovernorError, GovernorLayer};

use muxi_core::error::AppError;

use crate::dto::Envelope;

/// CORS for the configured browser origins, with credentials allowed.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, AppError> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| AppError::ConfigError(format!("Invalid CORS origin '{origin}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_LENGTH,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600)))
}

/// Wrap `router` in a per-client-IP limiter allowing `per_second` requests a second.
///
/// The client IP is the peer address, so the app must be served with
/// `into_make_service_with_connect_info`. With `trust_proxy_headers` it is taken
/// from `X-Forwarded-For`/`X-Real-IP`/`Forwarded` first.
pub fn with_rate_limit(
    router: Router,
    per_second: u32,
    trust_proxy_headers: bool,
) -> Result<Router, AppError> {
    if per_second == 0 {
        return Err(AppError::ConfigError(
            "rate limit must allow at least one request per second".into(),
        ));
    }

    let period = Duration::from_secs(1) / per_second;
    let invalid = || AppError::ConfigError("invalid rate limit configuration".into());

    let router = if trust_proxy_headers {
        let config = GovernorConfigBuilder::default()
            .period(period)
            .burst_size(per_second)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(invalid)?;
        router.layer(GovernorLayer::new(Arc::new(config)).error_handler(rate_limit_response))
    } else {
        let config = GovernorConfigBuilder::default()
            .period(period)
            .burst_size(per_second)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .ok_or_else(invalid)?;
        router.layer(GovernorLayer::new(Arc::new(config)).error_handler(rate_limit_response))
    };
    Ok(router)
}

fn rate_limit_response(err: GovernorError) -> axum::response::Response {
    match err {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let wait = wait_time.max(1);
            let mut response = Envelope::<()>::error(
                StatusCode::TOO_MANY_REQUESTS,
                format!("Too many requests, retry in {wait}s"),
            )
            .into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, wait.into());
            response
        }
        GovernorError::UnableToExtractKey => {
            tracing::warn!("Rate limiter could not determine the client address");
            Envelope::<()>::error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
                .into_response()
        }
        GovernorError::Other { code, msg, .. } => Envelope::<()>::error(
            code,
            msg.unwrap_or_else(|| "request rejected".to_string()),
        )
        .into_response(),
    }
}
