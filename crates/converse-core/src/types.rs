use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque, time-based message identifier.
///
/// Backed by a UUIDv7 so ids created by one process sort by creation time,
/// but callers must only rely on uniqueness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh id from the current time.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID (for hosts that mint their own ids).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// Typed or dictated by the person using the widget.
    User,
    /// Produced by the active backend (or the local fallback).
    Bot,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Bot => write!(f, "bot"),
        }
    }
}

/// Provider-facing role of a history turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

impl From<Sender> for Role {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::User => Role::User,
            Sender::Bot => Role::Model,
        }
    }
}

/// Who owns the message list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// The host application owns the list; the core only proposes appends.
    Controlled,
    /// The core owns and mutates the list itself.
    Uncontrolled,
}

// =============================================================================
// Messages
// =============================================================================

/// Metadata describing a file attached to a user message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    /// File name as selected by the user.
    pub name: String,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Size of the file content in bytes.
    pub size_bytes: u64,
    /// Optional reference a presentation layer can use to render a preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_ref: Option<String>,
}

impl AttachmentMeta {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes,
            preview_ref: None,
        }
    }

    pub fn with_preview_ref(mut self, preview_ref: impl Into<String>) -> Self {
        self.preview_ref = Some(preview_ref.into());
        self
    }

    /// Whether the MIME type denotes an image (`image/*`).
    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// A single entry in the conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentMeta>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a user message with an optional attachment.
    pub fn user(text: impl Into<String>, attachment: Option<AttachmentMeta>) -> Self {
        Self {
            id: MessageId::generate(),
            text: text.into(),
            sender: Sender::User,
            attachment,
            created_at: Utc::now(),
        }
    }

    /// Create a bot reply.
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            text: text.into(),
            sender: Sender::Bot,
            attachment: None,
            created_at: Utc::now(),
        }
    }
}

/// A provider-facing unit of conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }
}

// =============================================================================
// Tests
// =============================================================================
