//! Error types for backend calls and attachment encoding.

/// Errors from reading or encoding an attachment.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("failed to read attachment {name}: {reason}")]
    FileRead { name: String, reason: String },
    #[error("invalid data URL for attachment {0}")]
    InvalidDataUrl(String),
}

/// Errors from a backend call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("failed to parse backend response: {0}")]
    Parse(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
