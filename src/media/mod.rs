/// Media storage
///
/// Images attached to posts and profiles are handed to a `MediaStore`, which
/// returns a durable URL. Deletion goes through an identifier that can always
/// be recovered from that URL, so callers only need to keep the URL.

pub mod disk;

pub use disk::DiskMediaStore;

use crate::{
    error::{PlazaError, PlazaResult},
    metrics,
};
use async_trait::async_trait;
use image::ImageFormat;

/// Path segment under which stored media is served
pub const MEDIA_ROUTE: &str = "/media";

/// Folder for top-level post images
pub const POSTS_FOLDER: &str = "posts";
/// Folder for group post images
pub const GROUP_POSTS_FOLDER: &str = "group-posts";
/// Folder for profile pictures
pub const PROFILES_FOLDER: &str = "profiles";

/// Upload placement
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub folder: String,
    pub public_id: String,
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub secure_url: String,
    pub public_id: String,
}

/// Media storage backend trait
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store an image and return its public URL
    async fn upload(&self, data: Vec<u8>, options: UploadOptions) -> PlazaResult<UploadedMedia>;

    /// Delete by the identifier returned from `public_id_from_url`
    async fn delete(&self, public_id: &str) -> PlazaResult<()>;
}

/// Image formats accepted for upload
const ALLOWED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Sniff the image format from magic bytes
///
/// Only the accepted formats are recognised; anything else is a validation
/// failure on `field`.
pub fn detect_image_format(data: &[u8], field: &str) -> PlazaResult<ImageFormat> {
    if data.is_empty() {
        return Err(PlazaError::invalid(field, "Image file is empty"));
    }

    match image::guess_format(data) {
        Ok(format) if ALLOWED_FORMATS.contains(&format) => Ok(format),
        _ => Err(PlazaError::invalid(
            field,
            "Only PNG, JPEG, GIF and WebP images are allowed",
        )),
    }
}

/// Preferred file extension for an accepted format
pub fn extension_for(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("bin")
}

/// Generate a fresh public id for an upload
pub fn new_public_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Recover the `<folder>/<public_id>` identifier from a stored media URL
///
/// `https://host/media/posts/post-abc.png?v=1` -> `posts/post-abc`
pub fn public_id_from_url(url: &str) -> Option<String> {
    let marker = format!("{}/", MEDIA_ROUTE);
    let start = url.find(&marker)? + marker.len();
    let path = url[start..].split(['?', '#']).next()?;

    let (folder, file) = path.rsplit_once('/')?;
    let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);

    if folder.is_empty() || stem.is_empty() {
        return None;
    }

    Some(format!("{}/{}", folder, stem))
}

/// Best-effort removal of a stored image
///
/// Runs after the owning record is already gone, so failures are logged and
/// never surfaced.
pub async fn delete_quietly(store: &dyn MediaStore, url: Option<&str>) {
    let Some(url) = url else {
        return;
    };

    let Some(public_id) = public_id_from_url(url) else {
        tracing::warn!(url, "Could not derive media identifier from URL");
        metrics::MEDIA_CLEANUP_FAILURES_TOTAL.inc();
        return;
    };

    if let Err(e) = store.delete(&public_id).await {
        tracing::warn!(public_id = %public_id, "Failed to delete media: {}", e);
        metrics::MEDIA_CLEANUP_FAILURES_TOTAL.inc();
    }
}
