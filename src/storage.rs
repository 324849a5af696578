// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for captured images

use crate::constants::encoding::CAPTURE_EXTENSION;
use crate::errors::PhotoError;
use crate::pipelines::photo::CapturedImage;
use std::path::{Path, PathBuf};
use tracing::info;

/// Subdirectory of the pictures folder used by default
const PICTURES_SUBDIR: &str = "facecam";

/// Default output directory: `~/Pictures/facecam`, or the working directory
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(PICTURES_SUBDIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Timestamped file name for a capture, e.g. `IMG_20240131_142501.jpg`
pub fn capture_file_name(extension: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("IMG_{}.{}", timestamp, extension)
}

/// Where to write a capture: `output` as given, or inside it if it is a directory
pub fn resolve_output_path(output: Option<&Path>, default_dir: &Path, extension: &str) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(capture_file_name(extension)),
        Some(path) => path.to_path_buf(),
        None => default_dir.join(capture_file_name(extension)),
    }
}

/// Write the encoded bytes to `path`, creating parent directories
pub async fn save_image(image: &CapturedImage, path: &Path) -> Result<PathBuf, PhotoError> {
    write_creating_dirs(path, image.data.clone()).await?;
    info!(path = %path.display(), bytes = image.data.len(), "Photo saved successfully");
    Ok(path.to_path_buf())
}

/// Write the `data:` URL form to `path`
pub async fn save_data_url(image: &CapturedImage, path: &Path) -> Result<PathBuf, PhotoError> {
    write_creating_dirs(path, image.data_url().into_bytes()).await?;
    info!(path = %path.display(), "Data URL saved");
    Ok(path.to_path_buf())
}

async fn write_creating_dirs(path: &Path, contents: Vec<u8>) -> Result<(), PhotoError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

/// Extension matching the capture format
pub fn capture_extension() -> &'static str {
    CAPTURE_EXTENSION
}
