//! # Image uploads
//!
//! - Accepts jpg, jpeg and png, checked by extension, declared content type, and the decoded bytes
//! - Stores a copy at most 1024px wide plus a 300px thumbnail, both keeping aspect ratio
//! - Images narrower than the target are never enlarged
use std::{fs, io::ErrorKind, path::Path};

use image::{DynamicImage, ImageFormat, imageops::FilterType};
use thiserror::Error;
use tracing::warn;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;
pub const MAX_FILES: usize = 5;
pub const IMAGE_WIDTH: u32 = 1024;
pub const THUMBNAIL_WIDTH: u32 = 300;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Images only! (jpg, jpeg, png)")]
    Unsupported,

    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Could not write image: {0}")]
    Io(#[from] std::io::Error),
}

/// File names written under the upload directory.
#[derive(Debug, PartialEq, Eq)]
pub struct StoredImage {
    pub image: String,
    pub thumbnail: String,
}

/// Extension to store the file under, if the upload looks like an accepted image.
pub fn accepted_extension(file_name: &str, content_type: &str) -> Result<&'static str, ImageError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_lowercase);

    let extension = match extension.as_deref() {
        Some("jpg") => "jpg",
        Some("jpeg") => "jpeg",
        Some("png") => "png",
        _ => return Err(ImageError::Unsupported),
    };

    let content_type = content_type.to_lowercase();
    if !["jpg", "jpeg", "png"]
        .iter()
        .any(|accepted| content_type.contains(accepted))
    {
        return Err(ImageError::Unsupported);
    }

    Ok(extension)
}

/// Scales down to `max_width`, keeping aspect ratio.
pub fn shrink(image: &DynamicImage, max_width: u32) -> DynamicImage {
    if image.width() <= max_width {
        return image.clone();
    }

    let height = (u64::from(image.height()) * u64::from(max_width) / u64::from(image.width()))
        .max(1) as u32;

    image.resize_exact(max_width, height, FilterType::Lanczos3)
}

/// Decodes `bytes`, then writes the resized image and its thumbnail into `dir`.
pub fn store(bytes: &[u8], dir: &Path, stem: &str, extension: &str) -> Result<StoredImage, ImageError> {
    let format = match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => format,
        _ => return Err(ImageError::Unsupported),
    };
    let original = image::load_from_memory_with_format(bytes, format)?;

    let stored = StoredImage {
        image: format!("{stem}.{extension}"),
        thumbnail: format!("{stem}-thumb.{extension}"),
    };

    let written = shrink(&original, IMAGE_WIDTH)
        .save_with_format(dir.join(&stored.image), format)
        .and_then(|()| {
            shrink(&original, THUMBNAIL_WIDTH).save_with_format(dir.join(&stored.thumbnail), format)
        });
    if let Err(e) = written {
        discard(dir, &stored);
        return Err(e.into());
    }

    Ok(stored)
}

/// Removes both files of a stored image; missing files are fine.
pub fn discard(dir: &Path, stored: &StoredImage) {
    for name in [&stored.image, &stored.thumbnail] {
        if let Err(e) = fs::remove_file(dir.join(name)) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove {name}: {e}");
            }
        }
    }
}
