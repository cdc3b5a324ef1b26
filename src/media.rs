//! Recipe images on disk under the configured media root.

use std::{
    io::ErrorKind,
    path::{Component, Path},
};

use base64::{engine::general_purpose, Engine as _};

use crate::{
    constants::IMAGE_DIRECTORY,
    error::{Error, HtmlError},
    validators::validate_image_name,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

fn normalize_extension(extension: &str) -> Option<&'static str> {
    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        _ => None,
    }
}

/// Parses `data:image/<ext>;base64,<payload>`.
pub fn decode_data_uri(uri: &str) -> Result<DecodedImage, String> {
    let (header, payload) = uri
        .trim()
        .split_once(";base64,")
        .ok_or_else(|| String::from("Image must be a base64 encoded data URI."))?;

    let extension = header
        .strip_prefix("data:image/")
        .and_then(normalize_extension)
        .ok_or_else(|| String::from("Image must be a JPG or PNG file."))?;

    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| String::from("Image data is not valid base64."))?;
    if bytes.is_empty() {
        return Err(String::from("The submitted image is empty."));
    }

    Ok(DecodedImage { bytes, extension })
}

/// Extension to store an uploaded file under, taken from its client-side name.
pub fn upload_extension(filename: &str) -> Result<&'static str, String> {
    let normalized = filename.to_lowercase().replace(".jpeg", ".jpg");
    validate_image_name(&normalized)?;

    normalized
        .rsplit_once('.')
        .and_then(|(_, extension)| normalize_extension(extension))
        .ok_or_else(|| String::from("Image must be a JPG or PNG file."))
}

/// Writes the image under a fresh name and returns its path relative to `media_root`.
pub async fn store_image(
    media_root: &Path,
    bytes: &[u8],
    extension: &str,
) -> Result<String, Error> {
    let relative = format!("{IMAGE_DIRECTORY}/{}.{extension}", uuid::Uuid::new_v4());
    validate_image_name(&relative).map_err(|message| Error::field("image", &message))?;

    let path = media_root.join(&relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            log::error!("Failed to create {}: {e}", parent.display());
            HtmlError::InternalServerError.default()
        })?;
    }
    tokio::fs::write(&path, bytes).await.map_err(|e| {
        log::error!("Failed to write {}: {e}", path.display());
        HtmlError::InternalServerError.default()
    })?;

    log::debug!("Stored image {relative} ({} bytes)", bytes.len());
    Ok(relative)
}

fn is_stored_image_path(relative: &str) -> bool {
    let path = Path::new(relative);
    path.starts_with(IMAGE_DIRECTORY)
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Best effort: a missing file is fine, other failures are logged and ignored.
pub async fn remove_image(media_root: &Path, relative: &str) {
    if !is_stored_image_path(relative) {
        log::warn!("Refusing to remove {relative}: not a stored image path");
        return;
    }

    match tokio::fs::remove_file(media_root.join(relative)).await {
        Ok(()) => log::debug!("Removed image {relative}"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove image {relative}: {e}"),
    }
}
