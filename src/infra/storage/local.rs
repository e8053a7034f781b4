//! Uploaded files kept on the local filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{AppError, BlobStorage, PUBLIC_IMAGE_PREFIX, StorageError, UserId};

const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

const MAX_NAME_LEN: usize = 100;

/// Writes uploads under one directory and returns `images/{owner}-{uuid}-{name}`.
///
/// The reference never contains the directory itself; the router serves
/// the directory under `/images`.
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `reference`, if it names a single file under the root.
    fn path_for(&self, reference: &str) -> Option<PathBuf> {
        let name = reference.strip_prefix(PUBLIC_IMAGE_PREFIX)?.strip_prefix('/')?;
        (sanitize_file_name(name) == name).then(|| self.root.join(name))
    }
}

/// Keeps the final path component and replaces anything outside
/// `[A-Za-z0-9._-]` with `_`.
fn sanitize_file_name(hint: &str) -> String {
    let base = hint.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn content_type_from_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn check_content_type(content_type: Option<&str>, file_name: &str) -> Result<(), StorageError> {
    let effective = content_type
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
        .or_else(|| content_type_from_extension(file_name).map(str::to_string));

    match effective {
        Some(ct) if ALLOWED_CONTENT_TYPES.contains(&ct.as_str()) => Ok(()),
        Some(ct) => Err(StorageError::InvalidUpload(format!(
            "unsupported content type '{ct}'"
        ))),
        None => Err(StorageError::InvalidUpload(
            "content type could not be determined".to_string(),
        )),
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn store(
        &self,
        owner_id: UserId,
        filename_hint: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        let file_name = sanitize_file_name(filename_hint);
        check_content_type(content_type, &file_name)?;

        let stored_name = format!("{owner_id}-{}-{file_name}", Uuid::new_v4());
        let path = self.root.join(&stored_name);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;

        let reference = format!("{PUBLIC_IMAGE_PREFIX}/{stored_name}");
        info!(owner_id, reference = %reference, "Upload stored");
        Ok(reference)
    }

    #[instrument(skip(self))]
    async fn remove(&self, reference: &str) -> Result<(), AppError> {
        let Some(path) = self.path_for(reference) else {
            warn!(reference, "Refusing to remove a reference outside the upload directory");
            return Ok(());
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(reference, "Upload removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFailed(e.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("crowdfund-uploads-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("cat.png"), "cat.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\my photo.jpg"), "my_photo.jpg");
        assert_eq!(sanitize_file_name(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name(&"a".repeat(300)).len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_content_type_allowlist() {
        assert!(check_content_type(Some("image/png"), "a.png").is_ok());
        assert!(check_content_type(Some("IMAGE/JPEG; charset=binary"), "a").is_ok());
        assert!(check_content_type(None, "a.webp").is_ok());
        assert!(matches!(
            check_content_type(Some("application/pdf"), "a.pdf"),
            Err(StorageError::InvalidUpload(_))
        ));
        assert!(matches!(
            check_content_type(None, "a.exe"),
            Err(StorageError::InvalidUpload(_))
        ));
    }

    #[tokio::test]
    async fn test_store_writes_file_and_returns_reference() {
        let root = temp_root();
        let storage = LocalBlobStorage::new(&root);

        let reference = storage
            .store(7, "cover.png", Some("image/png"), b"\x89PNG")
            .await
            .unwrap();

        let file_name = reference.strip_prefix("images/").unwrap();
        assert!(file_name.starts_with("7-"));
        assert!(file_name.ends_with("-cover.png"));
        assert!(!reference.contains(root.to_str().unwrap()));
        assert_eq!(
            tokio::fs::read(root.join(file_name)).await.unwrap(),
            b"\x89PNG"
        );

        let again = storage
            .store(7, "cover.png", Some("image/png"), b"x")
            .await
            .unwrap();
        assert_ne!(reference, again);

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_rejects_unsupported_type_without_writing() {
        let root = temp_root();
        let storage = LocalBlobStorage::new(&root);

        let result = storage
            .store(7, "notes.txt", Some("text/plain"), b"hello")
            .await;

        assert!(matches!(
            result,
            Err(AppError::Storage(StorageError::InvalidUpload(_)))
        ));
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_remove_deletes_stored_file() {
        let root = temp_root();
        let storage = LocalBlobStorage::new(&root);
        let reference = storage
            .store(7, "cover.png", Some("image/png"), b"x")
            .await
            .unwrap();
        let path = storage.path_for(&reference).unwrap();
        assert!(path.exists());

        storage.remove(&reference).await.unwrap();
        assert!(!path.exists());
        // Removing twice is fine.
        storage.remove(&reference).await.unwrap();

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_ignores_references_outside_root() {
        let root = temp_root();
        let storage = LocalBlobStorage::new(&root);

        assert!(storage.path_for("images/../secret.txt").is_none());
        assert!(storage.path_for("/etc/passwd").is_none());
        assert!(storage.path_for("images/a/b.png").is_none());
        assert!(storage.remove("images/../secret.txt").await.is_ok());
    }
}
