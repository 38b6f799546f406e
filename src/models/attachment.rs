use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::error::{AppError, AppResult};

pub const IMAGE_MIME_PREFIX: &str = "image/";

/// An image selected in the composer but not yet sent.
///
/// `preview` is a `data:` URL the page can display directly; it is also what
/// the optimistic user message carries as its image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub preview: String,
    pub size: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl PendingAttachment {
    pub fn from_bytes(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mime_type = mime_type.into();
        let preview = format!("data:{};base64,{}", mime_type, STANDARD.encode(&bytes));
        Self {
            file_name: file_name.into(),
            mime_type,
            preview,
            size: bytes.len(),
            bytes,
        }
    }

    /// Builds an attachment from a `data:<mime>;base64,<payload>` URL as
    /// produced by `FileReader.readAsDataURL`.
    pub fn from_data_url(file_name: impl Into<String>, mime_type: impl Into<String>, data_url: &str) -> AppResult<Self> {
        let (header, payload) = data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(|| AppError::InvalidRequest("attachment is not a data URL".into()))?;

        if !header.ends_with(";base64") {
            return Err(AppError::InvalidRequest("attachment data URL is not base64 encoded".into()));
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| AppError::InvalidRequest(format!("invalid base64 payload: {e}")))?;

        Ok(Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            preview: data_url.to_string(),
            size: bytes.len(),
            bytes,
        })
    }

    /// Reads a file from disk, declaring its type from the extension.
    pub fn from_path(path: &Path) -> AppResult<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".into());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::from_bytes(file_name, mime_type, bytes))
    }

    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }
}

pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.starts_with(IMAGE_MIME_PREFIX)
}
