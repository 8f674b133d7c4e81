//! Local echo backend, used when no credential is configured.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::{AttachmentSupport, BackendKind, ChatBackend, ProviderRequest};

pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Replies with the user's own text after a short simulated delay.
#[derive(Debug, Clone)]
pub struct EchoBackend {
    delay: Duration,
}

impl EchoBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn reply_for(request: &ProviderRequest) -> String {
        match &request.attachment {
            Some(meta) => format!("You said: \"{}\" (attachment: {})", request.text, meta.name),
            None => format!("You said: \"{}\"", request.text),
        }
    }
}

impl Default for EchoBackend {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

#[async_trait]
impl ChatBackend for EchoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Echo
    }

    fn attachment_support(&self) -> AttachmentSupport {
        AttachmentSupport::NameOnly
    }

    async fn send(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Self::reply_for(request))
    }
}
