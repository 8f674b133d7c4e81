//! History formatting.
//!
//! Normalizes the message list into alternating provider turns. Providers
//! reject consecutive same-role turns and conversations that open with a
//! model turn, so adjacent messages from one sender are merged and leading
//! bot content (e.g. the welcome message) is dropped.

use converse_core::types::{Message, Role, Sender, Turn};

/// Stateless formatter from messages to provider turns.
pub struct HistoryFormatter;

impl HistoryFormatter {
    /// Format every message, including a trailing user message.
    pub fn format(messages: &[Message]) -> Vec<Turn> {
        let mut turns: Vec<Turn> = Vec::new();

        for message in messages {
            let Some(text) = turn_text(message) else {
                continue;
            };
            let role = Role::from(message.sender);
            match turns.last_mut() {
                Some(last) if last.role == role => {
                    last.text.push('\n');
                    last.text.push_str(&text);
                }
                _ => turns.push(Turn::new(role, text)),
            }
        }

        match turns.iter().position(|t| t.role == Role::User) {
            Some(first_user) => turns.split_off(first_user),
            None => Vec::new(),
        }
    }

    /// Format history for a call site that holds the full updated list:
    /// a trailing user message is the turn being composed and is left out.
    pub fn format_prior(messages: &[Message]) -> Vec<Turn> {
        match messages.last() {
            Some(last) if last.sender == Sender::User => {
                Self::format(&messages[..messages.len() - 1])
            }
            _ => Self::format(messages),
        }
    }
}

/// Text a message contributes to history, or `None` if it contributes nothing.
///
/// A blank message that carries an attachment is represented by the file name.
fn turn_text(message: &Message) -> Option<String> {
    if !message.text.trim().is_empty() {
        return Some(message.text.clone());
    }
    message
        .attachment
        .as_ref()
        .map(|att| format!("[Attached file: {}]", att.name))
}

// =============================================================================
// Tests
// =============================================================================
