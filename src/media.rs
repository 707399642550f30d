use base64::Engine;

use crate::constants::{MEDIA_ROOT, MEDIA_URL};
use crate::error::ApiError;

/// Splits a `data:image/<ext>;base64,<payload>` string into the file
/// extension and the decoded bytes.
pub fn parse_data_uri(data: &str) -> Result<(String, Vec<u8>), ApiError> {
    let invalid = || ApiError::validation("image", "Expected a base64 data URI");

    let rest = data.strip_prefix("data:image/").ok_or_else(invalid)?;
    let (ext, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| ApiError::validation("image", "Invalid base64 payload"))?;
    if bytes.is_empty() {
        return Err(ApiError::validation("image", "Empty image"));
    }

    Ok((ext.to_string(), bytes))
}

/// Decodes a data URI and writes it below the media root, returning the
/// stored path relative to it ("recipes/<uuid>.<ext>").
pub async fn store_image(subdir: &str, data: &str) -> Result<String, ApiError> {
    let (ext, bytes) = parse_data_uri(data)?;
    let name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
    let relative = format!("{subdir}/{name}");

    let dir = format!("{MEDIA_ROOT}/{subdir}");
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to create media dir: {e}")))?;
    tokio::fs::write(format!("{MEDIA_ROOT}/{relative}"), bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to store image: {e}")))?;

    Ok(relative)
}

/// Best-effort removal of a stored media file.
pub async fn remove_media(relative: &str) {
    if let Err(e) = tokio::fs::remove_file(format!("{MEDIA_ROOT}/{relative}")).await {
        log::warn!("Failed to remove media file {relative}: {e}");
    }
}

pub fn media_url(relative: Option<&str>) -> Option<String> {
    relative.map(|path| format!("{MEDIA_URL}{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_png_data_uri() {
        let (ext, bytes) = parse_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(ext, "png");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn rejects_non_image_uris() {
        assert!(parse_data_uri("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(parse_data_uri("plain string").is_err());
        assert!(parse_data_uri("data:image/png;base64,!!!").is_err());
        assert!(parse_data_uri("data:image/;base64,aGVsbG8=").is_err());
    }

    #[test]
    fn urls_are_prefixed() {
        assert_eq!(
            media_url(Some("users/a.png")).as_deref(),
            Some("/media/users/a.png")
        );
        assert_eq!(media_url(None), None);
    }
}
