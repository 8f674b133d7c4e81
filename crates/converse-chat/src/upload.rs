//! Upload filtering.
//!
//! Accepted types use the HTML `accept` attribute syntax: exact MIME types
//! (`application/pdf`), wildcards (`image/*`) and file extensions (`.pdf`).

use converse_core::config::UploadConfig;
use converse_core::types::AttachmentMeta;

use crate::error::ChatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub enabled: bool,
    pub accepted_types: Vec<String>,
    pub max_size_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            enabled: config.enabled,
            accepted_types: config
                .accepted_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            max_size_bytes: config.max_size_bytes,
        }
    }
}

impl UploadPolicy {
    /// A policy that rejects every file.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether the type filter admits this file. An empty filter admits all.
    pub fn accepts_type(&self, meta: &AttachmentMeta) -> bool {
        if self.accepted_types.is_empty() {
            return true;
        }
        let mime = meta.mime_type.to_ascii_lowercase();
        let name = meta.name.to_ascii_lowercase();
        self.accepted_types.iter().any(|accepted| {
            if accepted == "*" || accepted == "*/*" {
                true
            } else if accepted.starts_with('.') {
                name.ends_with(accepted.as_str())
            } else if let Some(prefix) = accepted.strip_suffix("/*") {
                mime.split('/').next() == Some(prefix)
            } else {
                mime == *accepted
            }
        })
    }

    pub fn check(&self, meta: &AttachmentMeta) -> Result<(), ChatError> {
        if !self.enabled {
            return Err(ChatError::UploadRejected("uploads are disabled".to_string()));
        }
        if meta.size_bytes > self.max_size_bytes {
            return Err(ChatError::UploadRejected(format!(
                "{} is {} bytes, limit is {}",
                meta.name, meta.size_bytes, self.max_size_bytes
            )));
        }
        if !self.accepts_type(meta) {
            return Err(ChatError::UploadRejected(format!(
                "{} has unsupported type {}",
                meta.name, meta.mime_type
            )));
        }
        Ok(())
    }
}
