//! Language-model backends for Converse.
//!
//! Selects exactly one backend from the configured credentials, shapes the
//! conversation history for it, encodes image attachments, and turns every
//! reply (or failure) into plain text.

pub mod anthropic;
pub mod attachment;
pub mod echo;
pub mod error;
pub mod gemini;
pub mod history;
pub mod openai;
pub mod provider;
pub mod router;

pub use attachment::{AttachmentEncoder, AttachmentSource, PendingAttachment};
pub use error::{AttachmentError, ProviderError};
pub use history::HistoryFormatter;
pub use provider::{AttachmentSupport, BackendKind, ChatBackend, ImagePart, ProviderRequest};
pub use router::{select_backend, ProviderRouter, NO_RESPONSE};
