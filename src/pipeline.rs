//! Batch helpers: collect input images and run a workflow per file.

use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::client::Remini;
use crate::task::FeatureRequest;

/// Extensions accepted as input images.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff", "heic", "heif", "avif",
];

/// Outcome of one image in a batch.
#[derive(Debug, Serialize)]
pub struct ProcessResult {
    pub path: PathBuf,
    /// `"enhance"` or the style id.
    pub feature: String,
    /// Where the result was written, on success.
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks). Only files with supported image extensions
/// are included.
///
/// # Example
///
/// ```rust,no_run
/// use remini::pipeline::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[
///     PathBuf::from("photo.jpg"),       // single file
///     PathBuf::from("./photos/"),        // entire directory
/// ]);
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_supported_image(p))
                .collect();
            found.sort();
            images.extend(found);
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Run `feature` on one image, capturing the outcome instead of propagating it.
pub async fn process_image(
    client: &Remini,
    path: &Path,
    feature: &FeatureRequest,
    output: Option<&Path>,
) -> ProcessResult {
    let (label, outcome) = match feature {
        FeatureRequest::Enhance => ("enhance".to_string(), client.enhance(path, output).await),
        FeatureRequest::Stylize { style_id } => (
            style_id.clone(),
            client.stylize(path, style_id, output).await,
        ),
    };

    match outcome {
        Ok(out) => ProcessResult {
            path: path.to_path_buf(),
            feature: label,
            output_path: Some(out),
            error: None,
        },
        Err(e) => ProcessResult {
            path: path.to_path_buf(),
            feature: label,
            output_path: None,
            error: Some(e.to_string()),
        },
    }
}
