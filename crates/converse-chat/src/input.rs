//! Shared composer text.
//!
//! Typing and voice input both write here, so the buffer is shared behind a
//! mutex and cloned cheaply between owners.

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    text: Arc<Mutex<String>>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> String {
        self.text.lock().expect("input mutex poisoned").clone()
    }

    pub fn set(&self, text: impl Into<String>) {
        *self.text.lock().expect("input mutex poisoned") = text.into();
    }

    pub fn clear(&self) {
        self.text.lock().expect("input mutex poisoned").clear();
    }

    /// Take the trimmed text for sending and leave the buffer empty.
    ///
    /// Blank text is only taken when `allow_blank` is set; otherwise the
    /// buffer is left untouched and `None` is returned.
    pub fn take_for_send(&self, allow_blank: bool) -> Option<String> {
        let mut text = self.text.lock().expect("input mutex poisoned");
        if text.trim().is_empty() && !allow_blank {
            return None;
        }
        let taken = std::mem::take(&mut *text);
        Some(taken.trim().to_string())
    }

    /// Append a recognized transcript, separated by one space from any
    /// existing text.
    pub fn append_transcript(&self, transcript: &str) {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return;
        }
        let mut text = self.text.lock().expect("input mutex poisoned");
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(transcript);
    }

    pub fn is_blank(&self) -> bool {
        self.text
            .lock()
            .expect("input mutex poisoned")
            .trim()
            .is_empty()
    }
}
