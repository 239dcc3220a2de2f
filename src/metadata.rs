use serde::Serialize;
use std::path::Path;

/// Image facts attached to task creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Source of pixel dimensions for an image file.
///
/// Dimensions are optional in the task payload; a provider that cannot read
/// the file simply returns `None`.
pub trait MetadataProvider: Send + Sync {
    fn dimensions(&self, path: &Path) -> Option<(u32, u32)>;
}

/// Reads dimensions from the image header using the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageHeaderProvider;

impl MetadataProvider for ImageHeaderProvider {
    fn dimensions(&self, path: &Path) -> Option<(u32, u32)> {
        match image::image_dimensions(path) {
            Ok(dims) => Some(dims),
            Err(e) => {
                log::debug!("Could not read dimensions of {}: {e}", path.display());
                None
            }
        }
    }
}

/// Guess the MIME type from the file extension, defaulting to `image/jpeg`.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        _ => "image/jpeg",
    }
}

/// Gather size (always) and dimensions (when a provider is given).
pub fn gather(
    path: &Path,
    provider: Option<&dyn MetadataProvider>,
) -> std::io::Result<ImageMetadata> {
    let size = std::fs::metadata(path)?.len();
    let (width, height) = match provider.and_then(|p| p.dimensions(path)) {
        Some((w, h)) => (Some(w), Some(h)),
        None => (None, None),
    };
    Ok(ImageMetadata { size, width, height })
}
