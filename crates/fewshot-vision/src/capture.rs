//! Loading example and test images from disk.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::types::FewShotResult;

/// Load and decode an image file.
pub fn load_image(path: &Path) -> FewShotResult<DynamicImage> {
    Ok(image::open(path)?)
}

/// Check if a file path points to a supported image format.
pub fn is_supported_format(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" | "tiff" | "tif" | "ico"
    )
}

/// List the files directly inside `dir`, sorted by name.
///
/// Unsupported files are included so that bulk uploads can report them.
pub fn list_files(dir: &Path) -> FewShotResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
