//! Error types for the conversation layer.

use converse_llm::{AttachmentError, ProviderError};

/// Errors from the conversation controller and its services.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("a message is already being sent")]
    Busy,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("upload rejected: {0}")]
    UploadRejected(String),
    #[error("speech error: {0}")]
    Speech(String),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("attachment error: {0}")]
    Attachment(#[from] AttachmentError),
}
