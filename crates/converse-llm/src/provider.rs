//! Backend abstraction.
//!
//! Every backend implements [`ChatBackend`]. The router depends only on this
//! trait, never on a concrete backend type.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use converse_core::config::ProviderSettings;
use converse_core::types::{AttachmentMeta, Turn};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};

use crate::error::ProviderError;

/// The backends Converse can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Gemini,
    OpenAi,
    Anthropic,
    Groq,
    /// Local fallback used when no credential is configured.
    Echo,
}

impl BackendKind {
    /// Credentialed backends in selection priority order.
    pub const PRIORITY: [BackendKind; 4] = [
        BackendKind::Gemini,
        BackendKind::OpenAi,
        BackendKind::Anthropic,
        BackendKind::Groq,
    ];
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Gemini => write!(f, "Gemini"),
            BackendKind::OpenAi => write!(f, "OpenAI"),
            BackendKind::Anthropic => write!(f, "Anthropic"),
            BackendKind::Groq => write!(f, "Groq"),
            BackendKind::Echo => write!(f, "Echo"),
        }
    }
}

/// How a backend handles a user attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentSupport {
    /// Image attachments are sent as inline base64 parts.
    InlineImages,
    /// Only the attachment metadata is used; content is never read.
    NameOnly,
    /// Attachments cannot be sent at all.
    Unsupported,
}

/// Base64 image payload for multimodal backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub mime_type: String,
    pub data: String,
}

impl ImagePart {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// One outgoing request, already shaped for a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderRequest {
    /// Prior turns, alternating roles, starting with a user turn.
    pub history: Vec<Turn>,
    /// The new user input (final request turn).
    pub text: String,
    /// Encoded image for the final turn.
    pub image: Option<ImagePart>,
    /// Attachment metadata, only set for backends with [`AttachmentSupport::NameOnly`].
    pub attachment: Option<AttachmentMeta>,
}

/// A language-model backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn attachment_support(&self) -> AttachmentSupport;

    /// Send one request and return the reply text (possibly empty).
    async fn send(&self, request: &ProviderRequest) -> Result<String, ProviderError>;
}

// =============================================================================
// Shared HTTP plumbing
// =============================================================================

/// Resolved settings for one HTTP backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    pub persona: Option<String>,
    pub timeout: Option<Duration>,
}

impl BackendConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: model.into(),
            base_url: base_url.into(),
            persona: None,
            timeout: None,
        }
    }

    /// Build from configured settings, filling gaps with backend defaults.
    ///
    /// A persona set on the backend wins over the shared one.
    pub fn from_settings(
        settings: &ProviderSettings,
        default_model: &str,
        default_base_url: &str,
        shared_persona: Option<&str>,
        timeout: Option<Duration>,
    ) -> Self {
        let persona = settings
            .persona_instruction
            .as_deref()
            .or(shared_persona)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Self {
            api_key: Secret::new(settings.api_key.trim().to_string()),
            model: settings
                .model
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_string()),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url.to_string())
                .trim_end_matches('/')
                .to_string(),
            persona,
            timeout,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

pub(crate) fn build_client(timeout: Option<Duration>) -> Result<Client, ProviderError> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| ProviderError::Client(e.to_string()))
}

pub(crate) fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_connect() {
        ProviderError::Network(format!("Connection failed: {}", err))
    } else if err.is_timeout() {
        ProviderError::Network(format!("Request timed out: {}", err))
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Pass successful responses through, map everything else to an error.
pub(crate) async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 | 403 => Err(ProviderError::AuthenticationFailed),
        code => Err(ProviderError::Status { status: code, body }),
    }
}
