//! Attachment encoding.
//!
//! Turns a user-selected file into a raw base64 payload for multimodal
//! backends. A pending attachment lives only until its message is sent.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use converse_core::types::AttachmentMeta;

use crate::error::AttachmentError;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Where the attachment content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// A file on disk, read when the message is sent.
    Path(PathBuf),
    /// Content already in memory.
    Bytes(Vec<u8>),
    /// A `data:` URL as produced by browser file readers.
    DataUrl(String),
}

/// A file selected by the user and not yet sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub meta: AttachmentMeta,
    pub source: AttachmentSource,
}

impl PendingAttachment {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            meta: AttachmentMeta::new(name, mime_type, bytes.len() as u64),
            source: AttachmentSource::Bytes(bytes),
        }
    }

    /// Build an attachment from a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(name: impl Into<String>, data_url: impl Into<String>) -> Self {
        let data_url = data_url.into();
        let mime_type = data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split([';', ',']).next())
            .filter(|m| !m.is_empty())
            .unwrap_or(FALLBACK_MIME)
            .to_string();
        let size_bytes = decoded_len(strip_data_url_header(&data_url));
        Self {
            meta: AttachmentMeta::new(name, mime_type, size_bytes),
            source: AttachmentSource::DataUrl(data_url),
        }
    }

    /// Build an attachment for a file on disk.
    ///
    /// Only metadata is read here; the content is read by the encoder.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| AttachmentError::FileRead {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        if !metadata.is_file() {
            return Err(AttachmentError::FileRead {
                name,
                reason: "not a regular file".to_string(),
            });
        }

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(FALLBACK_MIME)
            .to_string();

        Ok(Self {
            meta: AttachmentMeta::new(name, mime_type, metadata.len()),
            source: AttachmentSource::Path(path.to_path_buf()),
        })
    }
}

/// Strip a leading `data:...,` header, if any, leaving the payload.
pub fn strip_data_url_header(value: &str) -> &str {
    if value.starts_with("data:") {
        match value.split_once(',') {
            Some((_, payload)) => payload,
            None => "",
        }
    } else {
        value
    }
}

/// The base64 payload of a data URL, or `None` when the header does not
/// declare base64 or the payload does not decode. A value without a
/// `data:` prefix is treated as a bare payload.
fn base64_payload(url: &str) -> Option<&str> {
    let payload = match url.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',')?;
            if !header.split(';').skip(1).any(|param| param == "base64") {
                return None;
            }
            payload
        }
        None => url,
    };
    STANDARD.decode(payload).ok()?;
    Some(payload)
}

fn decoded_len(payload: &str) -> u64 {
    let trimmed = payload.trim_end_matches('=');
    (trimmed.len() as u64 * 3) / 4
}

/// Reads attachment content and encodes it as base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentEncoder;

impl AttachmentEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode the full content of `attachment` as a raw base64 payload.
    pub async fn encode(&self, attachment: &PendingAttachment) -> Result<String, AttachmentError> {
        let name = &attachment.meta.name;
        match &attachment.source {
            AttachmentSource::Path(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| AttachmentError::FileRead {
                        name: name.clone(),
                        reason: e.to_string(),
                    })?;
                tracing::debug!(attachment = %name, bytes = bytes.len(), "Attachment read from disk");
                Ok(STANDARD.encode(bytes))
            }
            AttachmentSource::Bytes(bytes) => Ok(STANDARD.encode(bytes)),
            AttachmentSource::DataUrl(url) => base64_payload(url)
                .map(str::to_string)
                .ok_or_else(|| AttachmentError::InvalidDataUrl(name.clone())),
        }
    }
}
