//! Google Gemini backend.
//!
//! Uses the `generateContent` REST endpoint. The persona is fixed when the
//! backend is constructed and sent as `systemInstruction` on every call.

use async_trait::async_trait;
use converse_core::types::Role;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::{
    build_client, check_status, map_transport_error, AttachmentSupport, BackendConfig, BackendKind,
    ChatBackend, ProviderRequest,
};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiBackend {
    config: BackendConfig,
    client: Client,
    system_instruction: Option<GeminiContent>,
}

impl GeminiBackend {
    pub fn new(config: BackendConfig) -> Result<Self, ProviderError> {
        let client = build_client(config.timeout)?;
        let system_instruction = config.persona.as_ref().map(|persona| GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text {
                text: persona.clone(),
            }],
        });
        Ok(Self {
            config,
            client,
            system_instruction,
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    fn to_gemini_request(&self, request: &ProviderRequest) -> GeminiRequest {
        let mut contents: Vec<GeminiContent> = request
            .history
            .iter()
            .map(|turn| GeminiContent {
                role: Some(role_name(turn.role).to_string()),
                parts: vec![GeminiPart::Text {
                    text: turn.text.clone(),
                }],
            })
            .collect();

        let mut parts = Vec::new();
        if !request.text.is_empty() {
            parts.push(GeminiPart::Text {
                text: request.text.clone(),
            });
        }
        if let Some(image) = &request.image {
            parts.push(GeminiPart::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }
        contents.push(GeminiContent {
            role: Some("user".to_string()),
            parts,
        });

        GeminiRequest {
            contents,
            system_instruction: self.system_instruction.clone(),
        }
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gemini
    }

    fn attachment_support(&self) -> AttachmentSupport {
        AttachmentSupport::InlineImages
    }

    async fn send(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let body = self.to_gemini_request(request);

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", self.config.api_key())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse response: {}", e)))?;

        Ok(parsed.text())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiResponse {
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ImagePart;
    use converse_core::types::Turn;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(base_url: &str, persona: Option<&str>) -> GeminiBackend {
        let mut config = BackendConfig::new("g-key", "gemini-test", base_url);
        if let Some(p) = persona {
            config = config.with_persona(p);
        }
        GeminiBackend::new(config).unwrap()
    }

    fn reply(text: &str) -> serde_json::Value {
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
    }

    #[test]
    fn test_request_shape_with_history_and_persona() {
        let b = backend("http://unused", Some("Be brief."));
        let request = ProviderRequest {
            history: vec![Turn::user("hi"), Turn::model("hello")],
            text: "how are you".into(),
            ..Default::default()
        };
        let body = serde_json::to_value(b.to_gemini_request(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "hi"}]},
                    {"role": "model", "parts": [{"text": "hello"}]},
                    {"role": "user", "parts": [{"text": "how are you"}]}
                ],
                "systemInstruction": {"parts": [{"text": "Be brief."}]}
            })
        );
    }

    #[test]
    fn test_request_without_persona_omits_system_instruction() {
        let b = backend("http://unused", None);
        let body = serde_json::to_value(b.to_gemini_request(&ProviderRequest {
            text: "x".into(),
            ..Default::default()
        }))
        .unwrap();
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_request_with_image_part() {
        let b = backend("http://unused", None);
        let request = ProviderRequest {
            text: "what is this".into(),
            image: Some(ImagePart {
                mime_type: "image/png".into(),
                data: "AAAA".into(),
            }),
            ..Default::default()
        };
        let body = serde_json::to_value(b.to_gemini_request(&request)).unwrap();
        assert_eq!(
            body["contents"][0]["parts"],
            json!([
                {"text": "what is this"},
                {"inlineData": {"mimeType": "image/png", "data": "AAAA"}}
            ])
        );
    }

    #[test]
    fn test_image_only_request_has_no_empty_text_part() {
        let b = backend("http://unused", None);
        let request = ProviderRequest {
            image: Some(ImagePart {
                mime_type: "image/jpeg".into(),
                data: "BBBB".into(),
            }),
            ..Default::default()
        };
        let body = serde_json::to_value(b.to_gemini_request(&request)).unwrap();
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("Hello there")))
            .expect(1)
            .mount(&server)
            .await;

        let b = backend(&server.uri(), None);
        let text = b
            .send(&ProviderRequest {
                text: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(text, "Hello there");
    }

    #[tokio::test]
    async fn test_send_empty_candidates_yields_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let b = backend(&server.uri(), None);
        let text = b.send(&ProviderRequest::default()).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_send_maps_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let b = backend(&server.uri(), None);
        let err = b.send(&ProviderRequest::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_send_maps_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let b = backend(&server.uri(), None);
        match b.send(&ProviderRequest::default()).await.unwrap_err() {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_maps_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let b = backend(&server.uri(), None);
        let err = b.send(&ProviderRequest::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }
}
