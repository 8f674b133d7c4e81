//! Conversation controller: the single-flight send flow.
//!
//! One send at a time. While a send is pending, further sends are dropped
//! rather than queued. Every accepted send ends with exactly one bot
//! message, whether the backend succeeded or not.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use converse_core::config::ConverseConfig;
use converse_core::types::{AttachmentMeta, ConversationMode, Message};
use converse_llm::{PendingAttachment, ProviderRouter};

use crate::error::ChatError;
use crate::input::InputBuffer;
use crate::store::{ConversationHost, HistoryStore, HostHistory, LocalHistory};
use crate::upload::UploadPolicy;

/// Bot text used when the responder fails.
pub const ERROR_REPLY: &str = "Sorry, an error occurred. Please try again.";

/// Produces the bot reply for one user turn.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn respond(
        &self,
        text: &str,
        prior: &[Message],
        attachment: Option<&PendingAttachment>,
    ) -> Result<String, ChatError>;
}

#[async_trait]
impl ChatResponder for ProviderRouter {
    async fn respond(
        &self,
        text: &str,
        prior: &[Message],
        attachment: Option<&PendingAttachment>,
    ) -> Result<String, ChatError> {
        Ok(self.send(text, prior, attachment).await)
    }
}

/// Notifications for the embedding application. Both default to no-ops.
pub trait HostCallbacks: Send + Sync {
    fn on_send(&self, _text: &str, _attachment: Option<&AttachmentMeta>) {}

    fn on_file_upload(&self, _attachment: &AttachmentMeta) {}
}

/// Result of [`ConversationController::handle_send`].
#[derive(Debug)]
pub enum SendOutcome {
    Sent { user_message: Message, reply: Message },
    /// The send was dropped: disabled, busy, or nothing to send.
    Ignored(ChatError),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }
}

/// Holds the pending flag for the duration of a send.
struct PendingGuard<'a>(&'a AtomicBool);

impl<'a> PendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ConversationController {
    store: Arc<dyn HistoryStore>,
    responder: Arc<dyn ChatResponder>,
    callbacks: Option<Arc<dyn HostCallbacks>>,
    upload_policy: UploadPolicy,
    input: InputBuffer,
    attachment: Mutex<Option<PendingAttachment>>,
    disabled: AtomicBool,
    pending: AtomicBool,
}

impl ConversationController {
    pub fn new(store: Arc<dyn HistoryStore>, responder: Arc<dyn ChatResponder>) -> Self {
        Self {
            store,
            responder,
            callbacks: None,
            upload_policy: UploadPolicy::default(),
            input: InputBuffer::new(),
            attachment: Mutex::new(None),
            disabled: AtomicBool::new(false),
            pending: AtomicBool::new(false),
        }
    }

    /// Build a controller from configuration.
    ///
    /// With a host the conversation is controlled; without one the
    /// controller keeps its own list, seeded with the welcome message.
    pub fn from_config(
        config: &ConverseConfig,
        host: Option<Arc<dyn ConversationHost>>,
    ) -> Result<Self, ChatError> {
        let router = ProviderRouter::from_config(config)?;
        let store: Arc<dyn HistoryStore> = match host {
            Some(host) => Arc::new(HostHistory::new(host)),
            None => Arc::new(LocalHistory::with_welcome(
                config.chat.welcome_message.as_deref(),
            )),
        };

        let controller = Self::new(store, Arc::new(router))
            .with_upload_policy(UploadPolicy::from(&config.uploads));
        controller.set_disabled(config.chat.disabled);
        Ok(controller)
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn HostCallbacks>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn with_upload_policy(mut self, policy: UploadPolicy) -> Self {
        self.upload_policy = policy;
        self
    }

    /// Share an existing buffer, e.g. one a speech bridge writes to.
    pub fn with_input_buffer(mut self, input: InputBuffer) -> Self {
        self.input = input;
        self
    }

    pub fn input_buffer(&self) -> InputBuffer {
        self.input.clone()
    }

    pub fn mode(&self) -> ConversationMode {
        self.store.mode()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.messages()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.input.set(text);
    }

    pub fn append_input(&self, text: &str) {
        self.input.append_transcript(text);
    }

    pub fn input_text(&self) -> String {
        self.input.get()
    }

    pub fn attachment(&self) -> Option<AttachmentMeta> {
        self.attachment
            .lock()
            .expect("attachment mutex poisoned")
            .as_ref()
            .map(|a| a.meta.clone())
    }

    /// Select a file for the next send, replacing any previous selection.
    pub fn attach(&self, attachment: PendingAttachment) -> Result<(), ChatError> {
        self.upload_policy.check(&attachment.meta)?;

        let meta = attachment.meta.clone();
        *self.attachment.lock().expect("attachment mutex poisoned") = Some(attachment);
        tracing::debug!(attachment = %meta.name, mime = %meta.mime_type, "Attachment selected");

        if let Some(callbacks) = &self.callbacks {
            callbacks.on_file_upload(&meta);
        }
        Ok(())
    }

    /// Select a file on disk for the next send.
    pub async fn attach_path(&self, path: impl AsRef<Path>) -> Result<(), ChatError> {
        let attachment = PendingAttachment::from_path(path).await?;
        self.attach(attachment)
    }

    pub fn remove_attachment(&self) -> Option<PendingAttachment> {
        self.attachment
            .lock()
            .expect("attachment mutex poisoned")
            .take()
    }

    /// Send the composed input and wait for the reply.
    pub async fn handle_send(&self) -> SendOutcome {
        if self.is_disabled() {
            return SendOutcome::Ignored(ChatError::Disabled);
        }
        let Some(_pending) = PendingGuard::acquire(&self.pending) else {
            tracing::debug!("Send ignored, another send is pending");
            return SendOutcome::Ignored(ChatError::Busy);
        };

        // Text and attachment leave the composer together, so a transcript
        // appended concurrently lands either in this send or the next one.
        let (text, attachment) = {
            let mut slot = self.attachment.lock().expect("attachment mutex poisoned");
            let Some(text) = self.input.take_for_send(slot.is_some()) else {
                return SendOutcome::Ignored(ChatError::EmptyMessage);
            };
            (text, slot.take())
        };

        let prior = self.store.messages();
        let meta = attachment.as_ref().map(|a| a.meta.clone());
        let user_message = Message::user(text.clone(), meta.clone());
        tracing::info!(
            message_id = %user_message.id,
            mode = ?self.mode(),
            has_attachment = meta.is_some(),
            "Sending message"
        );
        self.store.propose_append(user_message.clone());

        if let Some(callbacks) = &self.callbacks {
            callbacks.on_send(&text, meta.as_ref());
        }

        let reply_text = match self
            .responder
            .respond(&text, &prior, attachment.as_ref())
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(message_id = %user_message.id, error = %e, "Failed to get reply");
                ERROR_REPLY.to_string()
            }
        };

        let reply = Message::bot(reply_text);
        self.store.propose_append(reply.clone());
        SendOutcome::Sent {
            user_message,
            reply,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use converse_core::types::Sender;
    use std::sync::atomic::AtomicUsize;

    struct CountingResponder {
        calls: AtomicUsize,
        seen: Mutex<Vec<(String, usize, Option<String>)>>,
    }

    impl CountingResponder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatResponder for CountingResponder {
        async fn respond(
            &self,
            text: &str,
            prior: &[Message],
            attachment: Option<&PendingAttachment>,
        ) -> Result<String, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((
                text.to_string(),
                prior.len(),
                attachment.map(|a| a.meta.name.clone()),
            ));
            Ok(format!("re: {}", text))
        }
    }

    #[derive(Default)]
    struct RecordingCallbacks {
        sends: Mutex<Vec<String>>,
        uploads: Mutex<Vec<String>>,
    }

    impl HostCallbacks for RecordingCallbacks {
        fn on_send(&self, text: &str, _attachment: Option<&AttachmentMeta>) {
            self.sends.lock().unwrap().push(text.to_string());
        }

        fn on_file_upload(&self, attachment: &AttachmentMeta) {
            self.uploads.lock().unwrap().push(attachment.name.clone());
        }
    }

    fn controller(responder: Arc<CountingResponder>) -> ConversationController {
        ConversationController::new(Arc::new(LocalHistory::new()), responder)
    }

    #[test]
    fn test_pending_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = PendingGuard::acquire(&flag).unwrap();
            assert!(flag.load(Ordering::SeqCst));
            assert!(PendingGuard::acquire(&flag).is_none());
        }
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_send_appends_user_then_bot() {
        let responder = CountingResponder::new();
        let c = controller(responder.clone());
        c.set_input("  hello  ");

        let outcome = c.handle_send().await;

        assert!(outcome.is_sent());
        let messages = c.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[1].sender, Sender::Bot);
        assert_eq!(messages[1].text, "re: hello");
        assert_eq!(c.input_text(), "");
        assert!(!c.is_pending());
    }

    #[tokio::test]
    async fn test_prior_excludes_new_user_message() {
        let responder = CountingResponder::new();
        let c = controller(responder.clone());
        c.set_input("one");
        c.handle_send().await;
        c.set_input("two");
        c.handle_send().await;

        let seen = responder.seen.lock().unwrap().clone();
        assert_eq!(seen[0].1, 0);
        assert_eq!(seen[1].1, 2);
    }

    #[tokio::test]
    async fn test_empty_input_ignored() {
        let responder = CountingResponder::new();
        let c = controller(responder.clone());
        c.set_input("   ");

        let outcome = c.handle_send().await;

        assert!(matches!(outcome, SendOutcome::Ignored(ChatError::EmptyMessage)));
        assert!(c.messages().is_empty());
        assert_eq!(responder.calls.load(Ordering::SeqCst), 0);
        assert!(!c.is_pending());
        assert_eq!(c.input_text(), "   ");
    }

    #[tokio::test]
    async fn test_disabled_ignored() {
        let responder = CountingResponder::new();
        let c = controller(responder.clone());
        c.set_disabled(true);
        c.set_input("hello");

        let outcome = c.handle_send().await;

        assert!(matches!(outcome, SendOutcome::Ignored(ChatError::Disabled)));
        assert_eq!(responder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(c.input_text(), "hello");
    }

    #[tokio::test]
    async fn test_attachment_only_send_accepted() {
        let responder = CountingResponder::new();
        let c = controller(responder.clone());
        c.attach(PendingAttachment::from_bytes("cat.png", "image/png", vec![1, 2]))
            .unwrap();

        let outcome = c.handle_send().await;

        match outcome {
            SendOutcome::Sent { user_message, .. } => {
                assert_eq!(user_message.text, "");
                assert_eq!(user_message.attachment.unwrap().name, "cat.png");
            }
            other => panic!("expected Sent, got {:?}", other),
        }
        assert!(c.attachment().is_none());
        let seen = responder.seen.lock().unwrap().clone();
        assert_eq!(seen[0].2.as_deref(), Some("cat.png"));
    }

    #[tokio::test]
    async fn test_callbacks_fire_once() {
        let callbacks = Arc::new(RecordingCallbacks::default());
        let c = controller(CountingResponder::new()).with_callbacks(callbacks.clone());

        c.attach(PendingAttachment::from_bytes("a.png", "image/png", vec![0]))
            .unwrap();
        c.set_input("look");
        c.handle_send().await;

        assert_eq!(*callbacks.uploads.lock().unwrap(), vec!["a.png".to_string()]);
        assert_eq!(*callbacks.sends.lock().unwrap(), vec!["look".to_string()]);
    }

    #[test]
    fn test_rejected_upload_keeps_slot() {
        let callbacks = Arc::new(RecordingCallbacks::default());
        let c = controller(CountingResponder::new()).with_callbacks(callbacks.clone());
        c.attach(PendingAttachment::from_bytes("a.png", "image/png", vec![0]))
            .unwrap();

        let err = c
            .attach(PendingAttachment::from_bytes("b.exe", "application/x-msdownload", vec![0]))
            .unwrap_err();

        assert!(matches!(err, ChatError::UploadRejected(_)));
        assert_eq!(c.attachment().unwrap().name, "a.png");
        assert_eq!(callbacks.uploads.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_attachment() {
        let c = controller(CountingResponder::new());
        c.attach(PendingAttachment::from_bytes("a.png", "image/png", vec![0]))
            .unwrap();
        assert!(c.remove_attachment().is_some());
        assert!(c.attachment().is_none());
        assert!(c.remove_attachment().is_none());
    }

    #[tokio::test]
    async fn test_attach_path_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [0x89, 0x50]).unwrap();
        let c = controller(CountingResponder::new());

        c.attach_path(&path).await.unwrap();

        let meta = c.attachment().unwrap();
        assert_eq!(meta.name, "photo.png");
        assert_eq!(meta.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_attach_path_missing_file_keeps_slot() {
        let c = controller(CountingResponder::new());
        c.attach(PendingAttachment::from_bytes("a.png", "image/png", vec![0]))
            .unwrap();

        let err = c.attach_path("/nonexistent/photo.png").await.unwrap_err();

        assert!(matches!(err, ChatError::Attachment(_)));
        assert_eq!(c.attachment().unwrap().name, "a.png");
    }

    #[test]
    fn test_from_config_uncontrolled_seeds_welcome() {
        let mut config = ConverseConfig::default();
        config.chat.echo_delay_ms = 0;
        let c = ConversationController::from_config(&config, None).unwrap();
        assert_eq!(c.mode(), ConversationMode::Uncontrolled);
        let messages = c.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Bot);
    }

    #[test]
    fn test_from_config_disabled() {
        let mut config = ConverseConfig::default();
        config.chat.disabled = true;
        let c = ConversationController::from_config(&config, None).unwrap();
        assert!(c.is_disabled());
    }
}
