//! OpenAI-compatible chat completions backend.
//!
//! Serves both OpenAI and Groq; Groq exposes the same wire format under a
//! different base URL but does not accept image parts.

use async_trait::async_trait;
use converse_core::types::Role;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::{
    build_client, check_status, map_transport_error, AttachmentSupport, BackendConfig, BackendKind,
    ChatBackend, ProviderRequest,
};

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct OpenAiBackend {
    kind: BackendKind,
    config: BackendConfig,
    client: Client,
}

impl OpenAiBackend {
    pub fn openai(config: BackendConfig) -> Result<Self, ProviderError> {
        Self::with_kind(BackendKind::OpenAi, config)
    }

    pub fn groq(config: BackendConfig) -> Result<Self, ProviderError> {
        Self::with_kind(BackendKind::Groq, config)
    }

    fn with_kind(kind: BackendKind, config: BackendConfig) -> Result<Self, ProviderError> {
        let client = build_client(config.timeout)?;
        Ok(Self {
            kind,
            config,
            client,
        })
    }

    fn to_chat_request(&self, request: &ProviderRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);

        if let Some(persona) = &self.config.persona {
            messages.push(ChatMessage {
                role: "system",
                content: MessageContent::Text(persona.clone()),
            });
        }

        for turn in &request.history {
            messages.push(ChatMessage {
                role: role_name(turn.role),
                content: MessageContent::Text(turn.text.clone()),
            });
        }

        let content = match (&request.image, self.attachment_support()) {
            (Some(image), AttachmentSupport::InlineImages) => {
                let mut parts = Vec::with_capacity(2);
                if !request.text.is_empty() {
                    parts.push(ContentPart::Text {
                        text: request.text.clone(),
                    });
                }
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url(),
                    },
                });
                MessageContent::Parts(parts)
            }
            _ => MessageContent::Text(request.text.clone()),
        };
        messages.push(ChatMessage {
            role: "user",
            content,
        });

        ChatRequest {
            model: self.config.model.clone(),
            messages,
        }
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "assistant",
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn attachment_support(&self) -> AttachmentSupport {
        match self.kind {
            BackendKind::Groq => AttachmentSupport::Unsupported,
            _ => AttachmentSupport::InlineImages,
        }
    }

    async fn send(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let body = self.to_chat_request(request);
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(url)
            .bearer_auth(self.config.api_key())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse response: {}", e)))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
