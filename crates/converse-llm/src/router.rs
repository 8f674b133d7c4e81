//! Backend selection and request dispatch.
//!
//! Exactly one backend is active for the lifetime of a router, chosen by
//! credential priority. The router shapes history, encodes attachments and
//! guarantees the caller always gets displayable text back.

use std::sync::Arc;
use std::time::Duration;

use converse_core::config::{ConverseConfig, ProviderSettings, ProvidersConfig};
use converse_core::types::{Message, Role};

use crate::anthropic::{self, AnthropicBackend};
use crate::attachment::{AttachmentEncoder, PendingAttachment};
use crate::echo::EchoBackend;
use crate::error::ProviderError;
use crate::gemini::{self, GeminiBackend};
use crate::history::HistoryFormatter;
use crate::openai::{self, OpenAiBackend};
use crate::provider::{
    AttachmentSupport, BackendConfig, BackendKind, ChatBackend, ImagePart, ProviderRequest,
};

/// Shown in place of a blank reply.
pub const NO_RESPONSE: &str = "(no response)";

/// Pick the highest-priority backend with a non-blank credential.
pub fn select_backend(providers: &ProvidersConfig) -> BackendKind {
    BackendKind::PRIORITY
        .into_iter()
        .find(|kind| {
            settings_for(providers, *kind)
                .map(ProviderSettings::has_credential)
                .unwrap_or(false)
        })
        .unwrap_or(BackendKind::Echo)
}

fn settings_for(providers: &ProvidersConfig, kind: BackendKind) -> Option<&ProviderSettings> {
    match kind {
        BackendKind::Gemini => providers.gemini.as_ref(),
        BackendKind::OpenAi => providers.openai.as_ref(),
        BackendKind::Anthropic => providers.anthropic.as_ref(),
        BackendKind::Groq => providers.groq.as_ref(),
        BackendKind::Echo => None,
    }
}

pub struct ProviderRouter {
    backend: Arc<dyn ChatBackend>,
    encoder: AttachmentEncoder,
}

impl ProviderRouter {
    /// Build the router around the backend selected from `config`.
    pub fn from_config(config: &ConverseConfig) -> Result<Self, ProviderError> {
        let kind = select_backend(&config.providers);
        let shared_persona = config.chat.persona_instruction.as_deref();
        let timeout = config.chat.request_timeout_secs.map(Duration::from_secs);

        let backend_config = |default_model: &str, default_base_url: &str| {
            settings_for(&config.providers, kind).map(|settings| {
                BackendConfig::from_settings(
                    settings,
                    default_model,
                    default_base_url,
                    shared_persona,
                    timeout,
                )
            })
        };

        let backend: Arc<dyn ChatBackend> = match kind {
            BackendKind::Gemini => match backend_config(gemini::DEFAULT_MODEL, gemini::DEFAULT_BASE_URL) {
                Some(cfg) => Arc::new(GeminiBackend::new(cfg)?),
                None => echo_backend(config),
            },
            BackendKind::OpenAi => {
                match backend_config(openai::OPENAI_DEFAULT_MODEL, openai::OPENAI_BASE_URL) {
                    Some(cfg) => Arc::new(OpenAiBackend::openai(cfg)?),
                    None => echo_backend(config),
                }
            }
            BackendKind::Anthropic => {
                match backend_config(anthropic::DEFAULT_MODEL, anthropic::DEFAULT_BASE_URL) {
                    Some(cfg) => Arc::new(AnthropicBackend::new(cfg)?),
                    None => echo_backend(config),
                }
            }
            BackendKind::Groq => match backend_config(openai::GROQ_DEFAULT_MODEL, openai::GROQ_BASE_URL) {
                Some(cfg) => Arc::new(OpenAiBackend::groq(cfg)?),
                None => echo_backend(config),
            },
            BackendKind::Echo => echo_backend(config),
        };

        tracing::info!(backend = %backend.kind(), "Backend selected");
        Ok(Self::with_backend(backend))
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            encoder: AttachmentEncoder::new(),
        }
    }

    pub fn active_backend(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Send one user turn and return displayable text. Never fails.
    pub async fn send(
        &self,
        text: &str,
        prior: &[Message],
        attachment: Option<&PendingAttachment>,
    ) -> String {
        match self.try_send(text, prior, attachment).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(backend = %self.active_backend(), error = %e, "Backend request failed");
                format!(
                    "Sorry, something went wrong while contacting {}. Please try again.",
                    self.active_backend()
                )
            }
        }
    }

    /// Like [`send`](Self::send), but exposes the backend error.
    pub async fn try_send(
        &self,
        text: &str,
        prior: &[Message],
        attachment: Option<&PendingAttachment>,
    ) -> Result<String, ProviderError> {
        let kind = self.active_backend();
        let mut history = HistoryFormatter::format(prior);
        let mut input = text.to_string();

        // The host did not record a reply to the last user turn.
        if history.last().map(|t| t.role == Role::User).unwrap_or(false) {
            if let Some(dangling) = history.pop() {
                input = if input.is_empty() {
                    dangling.text
                } else {
                    format!("{}\n{}", dangling.text, input)
                };
            }
        }

        let mut request = ProviderRequest {
            history,
            ..Default::default()
        };
        let mut notes = Vec::new();

        if let Some(att) = attachment {
            let name = &att.meta.name;
            match self.backend.attachment_support() {
                AttachmentSupport::NameOnly => request.attachment = Some(att.meta.clone()),
                AttachmentSupport::Unsupported => {
                    notes.push(format!("Note: {} does not accept attachments; {} was not sent.", kind, name));
                }
                AttachmentSupport::InlineImages if !att.meta.is_image() => {
                    notes.push(format!("Note: {} is not an image and was not sent.", name));
                }
                AttachmentSupport::InlineImages => match self.encoder.encode(att).await {
                    Ok(data) => {
                        request.image = Some(ImagePart {
                            mime_type: att.meta.mime_type.clone(),
                            data,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(backend = %kind, attachment = %name, error = %e, "Attachment read failed, sending text only");
                        notes.push(format!("Note: {} could not be read and was not sent.", name));
                    }
                },
            }

            if input.trim().is_empty() && request.image.is_none() && request.attachment.is_none() {
                input = format!("[Attached file: {}]", name);
            }
        }
        request.text = input;

        tracing::debug!(
            backend = %kind,
            history_turns = request.history.len(),
            has_image = request.image.is_some(),
            "Sending request"
        );

        let reply = self.backend.send(&request).await?;
        let reply = if reply.trim().is_empty() {
            NO_RESPONSE.to_string()
        } else {
            reply
        };

        if notes.is_empty() {
            Ok(reply)
        } else {
            Ok(format!("{}\n\n{}", notes.join("\n"), reply))
        }
    }
}

fn echo_backend(config: &ConverseConfig) -> Arc<dyn ChatBackend> {
    Arc::new(EchoBackend::new(Duration::from_millis(config.chat.echo_delay_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use converse_core::types::{AttachmentMeta, Turn};
    use std::sync::Mutex;

    /// Records every request and replies with a fixed result.
    struct RecordingBackend {
        support: AttachmentSupport,
        reply: Result<String, u16>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl RecordingBackend {
        fn new(support: AttachmentSupport, reply: &str) -> Arc<Self> {
            Arc::new(Self {
                support,
                reply: Ok(reply.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                support: AttachmentSupport::InlineImages,
                reply: Err(status),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> ProviderRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ChatBackend for RecordingBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::OpenAi
        }

        fn attachment_support(&self) -> AttachmentSupport {
            self.support
        }

        async fn send(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(ProviderError::Status {
                    status: *status,
                    body: "boom".into(),
                }),
            }
        }
    }

    fn providers_with(keys: &[(BackendKind, &str)]) -> ProvidersConfig {
        let mut providers = ProvidersConfig::default();
        for (kind, key) in keys {
            let settings = Some(ProviderSettings::new(*key));
            match kind {
                BackendKind::Gemini => providers.gemini = settings,
                BackendKind::OpenAi => providers.openai = settings,
                BackendKind::Anthropic => providers.anthropic = settings,
                BackendKind::Groq => providers.groq = settings,
                BackendKind::Echo => {}
            }
        }
        providers
    }

    #[test]
    fn test_select_backend_priority() {
        assert_eq!(select_backend(&ProvidersConfig::default()), BackendKind::Echo);
        assert_eq!(
            select_backend(&providers_with(&[(BackendKind::Groq, "g"), (BackendKind::OpenAi, "o")])),
            BackendKind::OpenAi
        );
        assert_eq!(
            select_backend(&providers_with(&[
                (BackendKind::Anthropic, "a"),
                (BackendKind::Gemini, "g")
            ])),
            BackendKind::Gemini
        );
        assert_eq!(
            select_backend(&providers_with(&[(BackendKind::Groq, "q")])),
            BackendKind::Groq
        );
    }

    #[test]
    fn test_blank_credential_is_skipped() {
        let providers = providers_with(&[(BackendKind::Gemini, "   "), (BackendKind::Anthropic, "a")]);
        assert_eq!(select_backend(&providers), BackendKind::Anthropic);
    }

    #[tokio::test]
    async fn test_from_config_without_credentials_uses_echo() {
        let mut config = ConverseConfig::default();
        config.chat.echo_delay_ms = 0;
        let router = ProviderRouter::from_config(&config).unwrap();
        assert_eq!(router.active_backend(), BackendKind::Echo);
        assert_eq!(router.send("hello", &[], None).await, "You said: \"hello\"");
    }

    #[test]
    fn test_from_config_builds_selected_backend() {
        let mut config = ConverseConfig::default();
        config.providers = providers_with(&[(BackendKind::Groq, "q"), (BackendKind::Anthropic, "a")]);
        let router = ProviderRouter::from_config(&config).unwrap();
        assert_eq!(router.active_backend(), BackendKind::Anthropic);
    }

    #[tokio::test]
    async fn test_history_excludes_welcome_and_keeps_new_turn_last() {
        let backend = RecordingBackend::new(AttachmentSupport::InlineImages, "ok");
        let router = ProviderRouter::with_backend(backend.clone());
        let prior = vec![
            Message::bot("Welcome!"),
            Message::user("first", None),
            Message::bot("answer"),
        ];

        router.send("second", &prior, None).await;

        let request = backend.last_request();
        assert_eq!(request.history, vec![Turn::user("first"), Turn::model("answer")]);
        assert_eq!(request.text, "second");
    }

    #[tokio::test]
    async fn test_trailing_user_turn_folded_into_input() {
        let backend = RecordingBackend::new(AttachmentSupport::InlineImages, "ok");
        let router = ProviderRouter::with_backend(backend.clone());
        let prior = vec![Message::user("unanswered", None)];

        router.send("follow-up", &prior, None).await;

        let request = backend.last_request();
        assert!(request.history.is_empty());
        assert_eq!(request.text, "unanswered\nfollow-up");
    }

    #[tokio::test]
    async fn test_blank_reply_becomes_placeholder() {
        let backend = RecordingBackend::new(AttachmentSupport::InlineImages, "  ");
        let router = ProviderRouter::with_backend(backend);
        assert_eq!(router.send("hi", &[], None).await, NO_RESPONSE);
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_generic_text() {
        let router = ProviderRouter::with_backend(RecordingBackend::failing(500));
        let reply = router.send("hi", &[], None).await;
        assert_eq!(
            reply,
            "Sorry, something went wrong while contacting OpenAI. Please try again."
        );

        let err = router.try_send("hi", &[], None).await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_image_attachment_is_encoded() {
        let backend = RecordingBackend::new(AttachmentSupport::InlineImages, "a cat");
        let router = ProviderRouter::with_backend(backend.clone());
        let att = PendingAttachment::from_bytes("cat.png", "image/png", b"hello".to_vec());

        let reply = router.send("", &[], Some(&att)).await;

        assert_eq!(reply, "a cat");
        let request = backend.last_request();
        assert_eq!(request.text, "");
        assert_eq!(
            request.image,
            Some(ImagePart {
                mime_type: "image/png".into(),
                data: "aGVsbG8=".into()
            })
        );
    }

    #[tokio::test]
    async fn test_non_image_attachment_noted_not_dropped_silently() {
        let backend = RecordingBackend::new(AttachmentSupport::InlineImages, "summary");
        let router = ProviderRouter::with_backend(backend.clone());
        let att = PendingAttachment::from_bytes("report.pdf", "application/pdf", b"%PDF".to_vec());

        let reply = router.send("read this", &[], Some(&att)).await;

        assert!(reply.starts_with("Note: report.pdf is not an image"));
        assert!(reply.ends_with("summary"));
        assert!(backend.last_request().image.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_backend_notes_and_substitutes_name() {
        let backend = RecordingBackend::new(AttachmentSupport::Unsupported, "ok");
        let router = ProviderRouter::with_backend(backend.clone());
        let att = PendingAttachment::from_bytes("pic.png", "image/png", vec![1, 2, 3]);

        let reply = router.send("", &[], Some(&att)).await;

        assert!(reply.contains("does not accept attachments"));
        let request = backend.last_request();
        assert_eq!(request.text, "[Attached file: pic.png]");
        assert!(request.image.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_attachment_degrades_to_text() {
        let backend = RecordingBackend::new(AttachmentSupport::InlineImages, "fine");
        let router = ProviderRouter::with_backend(backend.clone());
        let att = PendingAttachment {
            meta: AttachmentMeta::new("lost.png", "image/png", 10),
            source: crate::attachment::AttachmentSource::Path("/nonexistent/lost.png".into()),
        };

        let reply = router.send("see", &[], Some(&att)).await;

        assert!(reply.starts_with("Note: lost.png could not be read"));
        assert_eq!(backend.last_request().text, "see");
    }

    #[tokio::test]
    async fn test_echo_receives_attachment_name() {
        let router = ProviderRouter::with_backend(Arc::new(EchoBackend::new(Duration::ZERO)));
        let att = PendingAttachment::from_bytes("notes.txt", "text/plain", b"x".to_vec());
        let reply = router.send("hey", &[], Some(&att)).await;
        assert_eq!(reply, "You said: \"hey\" (attachment: notes.txt)");
    }
}
