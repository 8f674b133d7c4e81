//! Message history ownership.
//!
//! In uncontrolled mode the controller owns the list ([`LocalHistory`]).
//! In controlled mode the host owns it and every new message is proposed to
//! the host, which appends it itself ([`HostHistory`]).

use std::sync::{Arc, Mutex};

use converse_core::types::{ConversationMode, Message};

/// Where the message list lives.
pub trait HistoryStore: Send + Sync {
    fn mode(&self) -> ConversationMode;

    /// Snapshot of the current list.
    fn messages(&self) -> Vec<Message>;

    /// Append (uncontrolled) or forward to the host (controlled).
    fn propose_append(&self, message: Message);
}

/// A host application that owns the message list.
pub trait ConversationHost: Send + Sync {
    fn messages(&self) -> Vec<Message>;

    fn on_append(&self, message: Message);
}

#[derive(Debug, Default)]
pub struct LocalHistory {
    messages: Mutex<Vec<Message>>,
}

impl LocalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the list with one bot welcome message, if any.
    pub fn with_welcome(welcome: Option<&str>) -> Self {
        let messages = welcome
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(|w| vec![Message::bot(w)])
            .unwrap_or_default();
        Self {
            messages: Mutex::new(messages),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.lock().expect("history mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for LocalHistory {
    fn mode(&self) -> ConversationMode {
        ConversationMode::Uncontrolled
    }

    fn messages(&self) -> Vec<Message> {
        self.messages.lock().expect("history mutex poisoned").clone()
    }

    fn propose_append(&self, message: Message) {
        let mut messages = self.messages.lock().expect("history mutex poisoned");
        if messages.iter().any(|m| m.id == message.id) {
            tracing::warn!(message_id = %message.id, "Duplicate message id, not appended");
            return;
        }
        messages.push(message);
    }
}

pub struct HostHistory {
    host: Arc<dyn ConversationHost>,
}

impl HostHistory {
    pub fn new(host: Arc<dyn ConversationHost>) -> Self {
        Self { host }
    }
}

impl HistoryStore for HostHistory {
    fn mode(&self) -> ConversationMode {
        ConversationMode::Controlled
    }

    fn messages(&self) -> Vec<Message> {
        self.host.messages()
    }

    fn propose_append(&self, message: Message) {
        tracing::debug!(message_id = %message.id, "Proposing message to host");
        self.host.on_append(message);
    }
}
