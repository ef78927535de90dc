//! Reading user images from disk into `data:` URIs, and back.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::error::{Result, StudioError};
use crate::types::ReferenceImage;

/// Media type for an image path, by extension.
pub fn mime_for_path(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "webp" => Ok("image/webp"),
        "gif" => Ok("image/gif"),
        "heic" => Ok("image/heic"),
        "heif" => Ok("image/heif"),
        _ => Err(StudioError::UnsupportedMediaType(path.display().to_string())),
    }
}

/// Read a whole image file and encode it as a `data:` URI.
pub async fn read_image(path: &Path) -> Result<ReferenceImage> {
    let mime_type = mime_for_path(path)?;
    let bytes = tokio::fs::read(path).await?;
    debug!(path = %path.display(), bytes = bytes.len(), mime_type, "Image read");

    let data_uri = format!("data:{};base64,{}", mime_type, STANDARD.encode(&bytes));
    Ok(ReferenceImage::new(data_uri, mime_type))
}

/// Everything after the first comma. A string without one is returned whole.
pub fn data_uri_payload(uri: &str) -> &str {
    uri.split_once(',').map_or(uri, |(_, payload)| payload)
}

/// Media type and decoded bytes of a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let (header, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| StudioError::UnsupportedMediaType("not a data URI".into()))?;

    let mime_type = header.strip_suffix(";base64").unwrap_or(header).to_string();
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| StudioError::UnsupportedMediaType(format!("bad base64 payload: {e}")))?;
    Ok((mime_type, bytes))
}

/// File extension to use when writing an image of this media type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        "image/heif" => "heif",
        _ => "png",
    }
}
