use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use muxi_core::AppError;

/// Shortest accepted JWT secret, in decoded bytes.
pub const MIN_JWT_SECRET_BYTES: usize = 32;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ADMIN_USERNAME: &str = "adminuser";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";
const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 20;

/// Server settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Decoded `JWT_SECRET`; `None` means a random secret is generated.
    pub jwt_secret: Option<Vec<u8>>,
    pub admin_username: String,
    /// `None` skips admin seeding.
    pub admin_password: Option<String>,
    pub upload_dir: PathBuf,
    pub cors_origins: Vec<String>,
    pub rate_limit_per_second: u32,
    /// Key the rate limiter on `X-Forwarded-For`/`X-Real-IP`/`Forwarded` instead
    /// of the peer address. Only safe behind a proxy that overwrites them.
    pub trust_proxy_headers: bool,
}

impl ServerConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, treating blank values as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("MUXI_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                AppError::ConfigError(format!("Invalid MUXI_PORT '{raw}': expected a port number"))
            })?,
            None => DEFAULT_PORT,
        };

        let jwt_secret = get("JWT_SECRET")
            .map(|raw| decode_jwt_secret(&raw))
            .transpose()?;

        let rate_limit_per_second = match get("MUXI_RATE_LIMIT_PER_SECOND") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(AppError::ConfigError(format!(
                        "Invalid MUXI_RATE_LIMIT_PER_SECOND '{raw}': must be a positive integer"
                    )));
                }
            },
            None => DEFAULT_RATE_LIMIT_PER_SECOND,
        };

        let trust_proxy_headers = match get("MUXI_TRUST_PROXY_HEADERS") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                AppError::ConfigError(format!(
                    "Invalid MUXI_TRUST_PROXY_HEADERS '{raw}': expected true or false"
                ))
            })?,
            None => false,
        };

        let cors_origins = get("MUXI_CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            port,
            jwt_secret,
            admin_username: get("ADMIN_USERNAME")
                .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()),
            admin_password: get("ADMIN_PASSWORD"),
            upload_dir: PathBuf::from(
                get("MUXI_UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            cors_origins,
            rate_limit_per_second,
            trust_proxy_headers,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Decode a base64 JWT secret and check its length.
pub fn decode_jwt_secret(raw: &str) -> Result<Vec<u8>, AppError> {
    let bytes = STANDARD
        .decode(raw.trim())
        .map_err(|e| AppError::ConfigError(format!("JWT_SECRET is not valid base64: {e}")))?;
    if bytes.len() < MIN_JWT_SECRET_BYTES {
        return Err(AppError::ConfigError(format!(
            "JWT_SECRET must decode to at least {MIN_JWT_SECRET_BYTES} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}
