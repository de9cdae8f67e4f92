use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use muxi_core::error::AppError;
use muxi_core::models::User;

use crate::config::MIN_JWT_SECRET_BYTES;
use crate::error::ApiError;
use crate::state::AppState;

/// Lifetime of an access token.
pub const TOKEN_TTL: TimeDelta = TimeDelta::hours(24);

/// Message for tokens revoked by a token-version bump.
pub const TOKEN_REVOKED: &str = "token expired, please log in again";

/// Claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub group: String,
    /// Must equal the user's current token version to be accepted.
    pub token_version: i64,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

/// HS256 signing and verification keys.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8]) -> Result<Self, AppError> {
        if secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(AppError::ConfigError(format!(
                "JWT secret must be at least {MIN_JWT_SECRET_BYTES} bytes"
            )));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        })
    }

    /// Keys from a fresh random secret. Tokens do not survive a restart.
    pub fn random() -> Self {
        let mut secret = [0u8; MIN_JWT_SECRET_BYTES];
        rand::rng().fill(&mut secret);
        Self {
            encoding: EncodingKey::from_secret(&secret),
            decoding: DecodingKey::from_secret(&secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Sign a token for `user` at its current token version.
    pub fn issue(&self, user: &User) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let expires_at = (now + TOKEN_TTL).timestamp();
        let claims = Claims {
            user_id: user.id,
            group: user.group.to_string(),
            token_version: user.token_version,
            exp: expires_at,
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(IssuedToken {
            token: self.sign(&claims)?,
            expires_at,
        })
    }

    /// Check signature and expiry. Revocation is checked against the database separately.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected token: {e}");
                AppError::Unauthorized("invalid or expired token".into())
            })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::CryptoError(format!("token signing failed: {e}")))
    }
}

/// The authenticated caller, inserted into request extensions by [`require_user`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware that authenticates the bearer token and loads the caller.
///
/// Tokens whose `token_version` no longer matches the user row are refused.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).ok_or_else(|| {
        AppError::Unauthorized("missing Authorization header, expected: Bearer <token>".into())
    })?;
    let claims = state.jwt.verify(token)?;

    let user = state
        .db
        .user_repo()
        .get(claims.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".into()))?;

    if user.token_version != claims.token_version {
        return Err(AppError::Unauthorized(TOKEN_REVOKED.into()).into());
    }

    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}

/// Middleware for admin routes; must run after [`require_user`].
///
/// Uses the group stored in the database, not the one in the token.
pub async fn require_admin(
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    match request.extensions().get::<AuthUser>() {
        Some(AuthUser(user)) if user.group.is_admin() => Ok(next.run(request).await),
        Some(AuthUser(user)) => {
            tracing::warn!(user_id = user.id, "Non-admin attempted an admin route");
            Err(AppError::Forbidden("admin privileges required".into()).into())
        }
        None => Err(AppError::Unauthorized("authentication required".into()).into()),
    }
}
