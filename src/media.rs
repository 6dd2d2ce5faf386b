use crate::error::EnhanceError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Self-describing inline image payload: base64 data plus its media type.
///
/// Every image entering the app crosses this boundary first, so the rest of
/// the code never handles raw files or paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlinePayload {
    pub mime_type: String,
    pub data: String,
}

impl InlinePayload {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, EnhanceError> {
        BASE64
            .decode(&self.data)
            .map_err(|err| EnhanceError::storage("corrupt image payload", err))
    }

    /// File extension matching the declared media type, for exports.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Read an image file into an [`InlinePayload`].
///
/// The media type comes from the file extension; unsupported extensions are
/// rejected before any bytes are read.
pub fn load_image_file(path: &Path) -> Result<InlinePayload, EnhanceError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let Some(mime_type) = mime_for_extension(&ext) else {
        return Err(EnhanceError::Validation(format!(
            "unsupported image format: {}",
            path.display()
        )));
    };

    let bytes = std::fs::read(path)
        .map_err(|err| EnhanceError::storage("failed to read image file", err))?;
    Ok(InlinePayload::from_bytes(mime_type, &bytes))
}

/// Suggested export filename: timestamp plus the payload's extension.
pub fn export_file_name(payload: &InlinePayload, at: DateTime<Local>) -> String {
    format!(
        "garnish-{}.{}",
        at.format("%Y%m%d-%H%M%S"),
        payload.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn payload_round_trips_through_base64() {
        let payload = InlinePayload::from_bytes("image/png", b"not really a png");
        assert_eq!(payload.decode().expect("payload should decode"), b"not really a png");
    }

    #[test]
    fn extension_follows_media_type() {
        assert_eq!(InlinePayload::from_bytes("image/jpeg", b"x").extension(), "jpg");
        assert_eq!(InlinePayload::from_bytes("image/webp", b"x").extension(), "webp");
        assert_eq!(InlinePayload::from_bytes("application/octet-stream", b"x").extension(), "png");
    }

    #[test]
    fn load_rejects_unknown_extensions() {
        let err = load_image_file(Path::new("menu.pdf")).expect_err("pdf should be rejected");
        assert!(matches!(err, EnhanceError::Validation(_)));
    }

    #[test]
    fn load_reads_supported_file() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("dish.JPG");
        std::fs::write(&path, b"jpeg bytes").expect("fixture should write");

        let payload = load_image_file(&path).expect("jpg should load");
        assert_eq!(payload.mime_type, "image/jpeg");
        assert_eq!(payload.decode().expect("payload should decode"), b"jpeg bytes");
    }

    #[test]
    fn export_name_encodes_timestamp_and_extension() {
        let payload = InlinePayload::from_bytes("image/png", b"x");
        let at = Local
            .with_ymd_and_hms(2026, 3, 14, 15, 9, 26)
            .single()
            .expect("fixture timestamp should be unambiguous");
        assert_eq!(export_file_name(&payload, at), "garnish-20260314-150926.png");
    }
}
