/// Disk-based media storage backend
use crate::{
    error::{PlazaError, PlazaResult},
    media::{detect_image_format, extension_for, MediaStore, UploadOptions, UploadedMedia, MEDIA_ROUTE},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Extensions a stored image may carry
const STORED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Disk storage backend
///
/// Stores images as `{base}/{folder}/{public_id}.{ext}` and serves them from
/// `{public_base_url}/media/...`.
#[derive(Clone)]
pub struct DiskMediaStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl DiskMediaStore {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Reject identifiers that could escape the base directory
    fn check_segment(segment: &str) -> PlazaResult<()> {
        let valid = !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(())
        } else {
            Err(PlazaError::MediaStorage(format!("Invalid media path segment: {}", segment)))
        }
    }
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    async fn upload(&self, data: Vec<u8>, options: UploadOptions) -> PlazaResult<UploadedMedia> {
        Self::check_segment(&options.folder)?;
        Self::check_segment(&options.public_id)?;

        let format = detect_image_format(&data, "image")?;
        let file_name = format!("{}.{}", options.public_id, extension_for(format));

        let folder = self.base_path.join(&options.folder);
        fs::create_dir_all(&folder).await.map_err(|e| {
            PlazaError::MediaStorage(format!("Failed to create media directory: {}", e))
        })?;

        fs::write(folder.join(&file_name), data).await.map_err(|e| {
            PlazaError::MediaStorage(format!("Failed to write media {}: {}", file_name, e))
        })?;

        Ok(UploadedMedia {
            secure_url: format!(
                "{}{}/{}/{}",
                self.public_base_url, MEDIA_ROUTE, options.folder, file_name
            ),
            public_id: format!("{}/{}", options.folder, options.public_id),
        })
    }

    async fn delete(&self, public_id: &str) -> PlazaResult<()> {
        let (folder, stem) = public_id
            .split_once('/')
            .ok_or_else(|| PlazaError::MediaStorage(format!("Invalid media id: {}", public_id)))?;
        Self::check_segment(folder)?;
        Self::check_segment(stem)?;

        let folder = self.base_path.join(folder);
        for ext in STORED_EXTENSIONS {
            let path = folder.join(format!("{}.{}", stem, ext));
            match fs::remove_file(&path).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(PlazaError::MediaStorage(format!(
                        "Failed to delete media {}: {}",
                        public_id, e
                    )))
                }
            }
        }

        // Already gone
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::public_id_from_url;
    use tempfile::tempdir;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn options(folder: &str, public_id: &str) -> UploadOptions {
        UploadOptions {
            folder: folder.to_string(),
            public_id: public_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upload_and_delete() {
        let dir = tempdir().unwrap();
        let store = DiskMediaStore::new(dir.path().to_path_buf(), "http://localhost:5000/");

        let uploaded = store
            .upload(PNG_BYTES.to_vec(), options("posts", "post-1"))
            .await
            .unwrap();

        assert_eq!(uploaded.secure_url, "http://localhost:5000/media/posts/post-1.png");
        assert_eq!(uploaded.public_id, "posts/post-1");
        assert!(dir.path().join("posts/post-1.png").exists());

        // Identifier derived from the URL matches the one the store handed out
        let id = public_id_from_url(&uploaded.secure_url).unwrap();
        assert_eq!(id, uploaded.public_id);

        store.delete(&id).await.unwrap();
        assert!(!dir.path().join("posts/post-1.png").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let dir = tempdir().unwrap();
        let store = DiskMediaStore::new(dir.path().to_path_buf(), "http://localhost:5000");

        store.delete("posts/never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_non_image() {
        let dir = tempdir().unwrap();
        let store = DiskMediaStore::new(dir.path().to_path_buf(), "http://localhost:5000");

        let result = store.upload(b"plain text".to_vec(), options("posts", "p")).await;
        assert!(matches!(result, Err(PlazaError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let store = DiskMediaStore::new(dir.path().to_path_buf(), "http://localhost:5000");

        let result = store.upload(PNG_BYTES.to_vec(), options("..", "escape")).await;
        assert!(result.is_err());
        assert!(store.delete("../etc").await.is_err());
    }
}
