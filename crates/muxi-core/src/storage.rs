use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{DEFAULT_COVER_PATH, DEFAULT_HEAD_IMAGE_PATH};

/// URL prefix under which stored images are served.
pub const PUBLIC_PREFIX: &str = "uploads";

/// File-name prefix for uploaded head images.
pub const HEAD_IMAGE_PREFIX: &str = "HeadImg";

/// File-name prefix for uploaded book covers.
pub const COVER_PREFIX: &str = "Cover";

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Stores uploaded images on the local filesystem.
///
/// Saved files are addressed by their public path (`uploads/<file>`), which is
/// what gets persisted in the database and served by the static file route.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` as `<prefix>_<unix>_<8 hex><ext>` and return the public path.
    pub async fn save(
        &self,
        prefix: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        if bytes.is_empty() {
            return Err(AppError::ValidationError("uploaded image is empty".into()));
        }
        let ext = image_extension(original_name)?;

        tokio::fs::create_dir_all(&self.root).await?;

        let token = Uuid::new_v4().simple().to_string();
        let file_name = format!("{prefix}_{}_{}.{ext}", Utc::now().timestamp(), &token[..8]);
        tokio::fs::write(self.root.join(&file_name), bytes).await?;

        tracing::debug!(file = %file_name, size = bytes.len(), "Stored uploaded image");
        Ok(format!("{PUBLIC_PREFIX}/{file_name}"))
    }

    /// Delete a previously stored image.
    ///
    /// Default images, foreign paths and already-missing files are ignored.
    pub async fn remove(&self, public_path: &str) -> Result<(), AppError> {
        let Some(file_name) = stored_file_name(public_path) else {
            return Ok(());
        };

        match tokio::fs::remove_file(self.root.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`remove`](Self::remove), but only logs failures.
    pub async fn remove_quietly(&self, public_path: &str) {
        if let Err(e) = self.remove(public_path).await {
            tracing::warn!(path = public_path, "Failed to remove stored image: {e}");
        }
    }
}

/// Lower-cased extension of an uploaded file name, if it is an allowed image type.
pub fn image_extension(file_name: &str) -> Result<String, AppError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(AppError::ValidationError(format!(
            "unsupported image type '{file_name}', expected one of: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )))
    }
}

/// File name inside the store for a public path this store could have produced.
fn stored_file_name(public_path: &str) -> Option<&str> {
    if public_path == DEFAULT_COVER_PATH || public_path == DEFAULT_HEAD_IMAGE_PATH {
        return None;
    }
    let name = public_path.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    let safe = !name.is_empty() && !name.contains(['/', '\\']) && !name.starts_with('.');
    safe.then_some(name)
}
