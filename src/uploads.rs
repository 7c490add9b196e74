//! Multipart form collector: reads text fields and file parts from an upload
//! form, validates extensions, and streams accepted files to disk under a
//! per-record directory. Stored paths are kept relative to the upload root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use actix_multipart::Multipart;
use futures_util::TryStreamExt;
use tokio::{fs, io::AsyncWriteExt};

use crate::errors::AppError;

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];
const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Where uploaded documents live on disk.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub root: PathBuf,
}

impl UploadConfig {
    pub fn from_env() -> Self {
        let root = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "data/uploads".to_string());
        UploadConfig { root: PathBuf::from(root) }
    }

    /// Resolve a stored relative path to its absolute location.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

/// Metadata for one stored file.
#[derive(Debug, Clone)]
pub struct SavedUpload {
    pub field_name: String,
    pub original_name: String,
    pub stored_name: String,
    pub relative_path: String,
    pub size: u64,
}

/// Everything a multipart form submitted: saved files keyed by field name
/// plus the plain text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<SavedUpload>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn file_for(&self, field_name: &str) -> Option<&SavedUpload> {
        self.files.iter().find(|f| f.field_name == field_name)
    }

    pub fn text(&self, field_name: &str) -> Option<&str> {
        self.fields.get(field_name).map(|s| s.as_str())
    }
}

pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn extension_allowed(name: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&extension_of(name).as_str())
}

/// Deterministic stored name for a field: `{field}_{sanitized original}`.
/// Replacing a slot therefore overwrites predictably instead of accumulating.
pub fn stored_name(field_name: &str, original: &str) -> String {
    let sanitized = sanitize_filename::sanitize(original);
    if sanitized.is_empty() {
        let ext = extension_of(original);
        if ext.is_empty() {
            format!("{field_name}.bin")
        } else {
            format!("{field_name}.{ext}")
        }
    } else {
        format!("{field_name}_{sanitized}")
    }
}

/// Drain a multipart payload. File parts outside `allowed_fields`, or with a
/// disallowed extension, abort the whole upload; parts without a filename
/// are collected as text fields, and file inputs left empty by the browser
/// (empty filename) are skipped.
pub async fn collect(
    mut payload: Multipart,
    config: &UploadConfig,
    subdir: &str,
    allowed_fields: &[&str],
) -> Result<UploadForm, AppError> {
    let dest_dir = config.root.join(subdir);
    fs::create_dir_all(&dest_dir)
        .await
        .map_err(|e| AppError::Upload(format!("Cannot create upload directory: {e}")))?;

    let mut form = UploadForm::default();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Upload(format!("Failed to parse upload form: {e}")))?
    {
        let disposition = field.content_disposition().clone();
        let field_name = disposition.get_name().unwrap_or("").to_string();
        let file_name = disposition.get_filename().map(|s| s.to_string());

        match file_name {
            None => {
                // Plain text field
                let mut bytes = Vec::new();
                while let Some(chunk) = field
                    .try_next()
                    .await
                    .map_err(|e| AppError::Upload(format!("Failed to read field `{field_name}`: {e}")))?
                {
                    bytes.extend_from_slice(&chunk);
                }
                let value = String::from_utf8_lossy(&bytes).into_owned();
                form.fields.insert(field_name, value);
            }
            Some(original) if original.is_empty() => {
                // File input submitted without a selection
                continue;
            }
            Some(original) => {
                if !allowed_fields.contains(&field_name.as_str()) {
                    return Err(AppError::Upload(format!("Unexpected file field `{field_name}`")));
                }
                if !extension_allowed(&original) {
                    return Err(AppError::Upload(format!(
                        "File type `{}` is not allowed for `{field_name}` (allowed: {})",
                        extension_of(&original),
                        ALLOWED_EXTENSIONS.join(", ")
                    )));
                }

                let stored = stored_name(&field_name, &original);
                let stored_path = dest_dir.join(&stored);
                let mut file = fs::File::create(&stored_path)
                    .await
                    .map_err(|e| AppError::Upload(format!("Failed to save file: {e}")))?;

                let mut total_bytes: u64 = 0;
                while let Some(chunk) = field
                    .try_next()
                    .await
                    .map_err(|e| AppError::Upload(format!("Failed to read upload data: {e}")))?
                {
                    total_bytes += chunk.len() as u64;
                    if total_bytes > MAX_FILE_BYTES {
                        let _ = fs::remove_file(&stored_path).await;
                        return Err(AppError::Upload(format!(
                            "File for `{field_name}` exceeds the {} MB limit",
                            MAX_FILE_BYTES / (1024 * 1024)
                        )));
                    }
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| AppError::Upload(format!("Failed to write file: {e}")))?;
                }
                file.flush()
                    .await
                    .map_err(|e| AppError::Upload(format!("Failed to flush file: {e}")))?;

                if total_bytes == 0 {
                    // Empty part; treat as not uploaded
                    let _ = fs::remove_file(&stored_path).await;
                    continue;
                }

                form.files.push(SavedUpload {
                    field_name,
                    original_name: original,
                    relative_path: format!("{subdir}/{stored}"),
                    stored_name: stored,
                    size: total_bytes,
                });
            }
        }
    }

    Ok(form)
}

/// Best-effort removal of a stored file, e.g. after a slot was replaced or
/// its row deleted.
pub async fn remove_stored(config: &UploadConfig, relative: &str) {
    let path = config.resolve(relative);
    if let Err(e) = fs::remove_file(&path).await {
        log::warn!("Could not remove stored file {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allowlist() {
        assert!(extension_allowed("transcript.PDF"));
        assert!(extension_allowed("photo.jpeg"));
        assert!(!extension_allowed("macro.docm"));
        assert!(!extension_allowed("no_extension"));
    }

    #[test]
    fn stored_name_prefixes_field() {
        assert_eq!(stored_name("thesis", "Final Draft.pdf"), "thesis_Final Draft.pdf");
    }

    #[test]
    fn stored_name_survives_hostile_originals() {
        let name = stored_name("photo", "../../etc/passwd");
        assert!(!name.contains(".."));
        assert!(!name.contains('/'));
    }

    #[test]
    fn resolve_joins_under_root() {
        let config = UploadConfig { root: PathBuf::from("/srv/uploads") };
        assert_eq!(
            config.resolve("REC-1/personal/photo_a.png"),
            PathBuf::from("/srv/uploads/REC-1/personal/photo_a.png")
        );
    }

    #[tokio::test]
    async fn remove_stored_deletes_the_resolved_file() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let config = UploadConfig { root: dir.path().to_path_buf() };

        let rel = "REC-1/personal/photo_a.png";
        let abs = config.resolve(rel);
        fs::create_dir_all(abs.parent().unwrap()).await.unwrap();
        fs::write(&abs, b"fake image").await.unwrap();
        assert!(abs.exists());

        remove_stored(&config, rel).await;
        assert!(!abs.exists());
    }
}
