//! Anthropic Messages API backend.

use async_trait::async_trait;
use converse_core::types::Role;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::{
    build_client, check_status, map_transport_error, AttachmentSupport, BackendConfig, BackendKind,
    ChatBackend, ProviderRequest,
};

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";
pub const MAX_TOKENS: u32 = 1024;

pub struct AnthropicBackend {
    config: BackendConfig,
    client: Client,
}

impl AnthropicBackend {
    pub fn new(config: BackendConfig) -> Result<Self, ProviderError> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn to_messages_request(&self, request: &ProviderRequest) -> MessagesRequest {
        let mut messages: Vec<AnthropicMessage> = request
            .history
            .iter()
            .map(|turn| AnthropicMessage {
                role: role_name(turn.role),
                content: vec![ContentBlock::Text {
                    text: turn.text.clone(),
                }],
            })
            .collect();

        // Image first, then the prompt text.
        let mut content = Vec::with_capacity(2);
        if let Some(image) = &request.image {
            content.push(ContentBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }
        if !request.text.is_empty() || content.is_empty() {
            content.push(ContentBlock::Text {
                text: request.text.clone(),
            });
        }
        messages.push(AnthropicMessage {
            role: "user",
            content,
        });

        MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: MAX_TOKENS,
            system: self.config.persona.clone(),
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
impl ChatBackend for AnthropicBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Anthropic
    }

    fn attachment_support(&self) -> AttachmentSupport {
        AttachmentSupport::InlineImages
    }

    async fn send(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let body = self.to_messages_request(request);
        let url = format!("{}/v1/messages", self.config.base_url);

        let response = self
            .client
            .post(url)
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse response: {}", e)))?;

        Ok(parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    text: Option<String>,
}
