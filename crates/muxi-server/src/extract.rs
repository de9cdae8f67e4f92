//! Request extraction helpers that report failures as envelope errors.

use std::collections::HashMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;

use muxi_core::error::AppError;
use muxi_core::models::BorrowStatus;
use muxi_core::search::sanitize_like_keyword;

use crate::error::ApiError;
use crate::routes::UPLOAD_BODY_LIMIT;

/// Like [`axum::Json`], but a rejected body becomes a 400 envelope.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::ValidationError(rejection.body_text()).into()),
        }
    }
}

/// Parse a positive numeric id from a path segment or query value.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::ValidationError(format!("invalid {what}: '{raw}'"))),
    }
}

/// Like [`parse_id`], treating a missing or blank value as no filter.
pub fn parse_optional_id(raw: Option<&str>, what: &str) -> Result<Option<i64>, AppError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => parse_id(raw, what).map(Some),
        None => Ok(None),
    }
}

pub fn parse_status(raw: Option<&str>) -> Result<Option<BorrowStatus>, AppError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => raw.parse().map(Some).map_err(AppError::ValidationError),
        None => Ok(None),
    }
}

/// Sanitised search keyword, `None` when there is nothing to search for.
pub fn keyword(raw: Option<&str>) -> Option<String> {
    raw.and_then(sanitize_like_keyword)
}

/// A file part of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// A fully buffered multipart form.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    /// Buffer every part. File inputs submitted without a file are dropped.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(name, UploadedFile { file_name, bytes });
                }
                None => {
                    let text = field.text().await.map_err(multipart_error)?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Trimmed text field; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required_text(&self, name: &str) -> Result<String, AppError> {
        self.text(name)
            .map(String::from)
            .ok_or_else(|| AppError::ValidationError(format!("field '{name}' is required")))
    }

    pub fn int(&self, name: &str) -> Result<Option<i32>, AppError> {
        self.text(name)
            .map(|raw| {
                raw.parse::<i32>().map_err(|_| {
                    AppError::ValidationError(format!("field '{name}' must be an integer"))
                })
            })
            .transpose()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge(upload_too_large_message());
    }
    AppError::ValidationError(format!("malformed multipart body: {}", err.body_text()))
}

pub(crate) fn upload_too_large_message() -> String {
    format!(
        "upload exceeds the {} MiB limit",
        UPLOAD_BODY_LIMIT / (1024 * 1024)
    )
}
