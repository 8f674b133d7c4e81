//! Voice input bridge.
//!
//! Wraps a platform speech recognizer and feeds final transcripts into the
//! shared input buffer. Two states:
//! - Idle -> Recording (`start`)
//! - Recording -> Idle (`stop`)
//!
//! Platform end and error notifications are logged but leave the state
//! unchanged; only `stop` returns the bridge to Idle.

use std::fmt;
use std::sync::{Arc, Mutex};

use converse_core::config::SpeechConfig;

use crate::error::ChatError;
use crate::input::InputBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeechState {
    Idle,
    Recording,
}

impl fmt::Display for SpeechState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechState::Idle => write!(f, "Idle"),
            SpeechState::Recording => write!(f, "Recording"),
        }
    }
}

/// Capture settings passed to the recognizer on every start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerOptions {
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl RecognizerOptions {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            continuous: true,
            interim_results: false,
        }
    }
}

/// Notifications delivered by the platform recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Result { transcript: String, is_final: bool },
    Error(String),
    End,
}

/// Platform speech recognition capability.
pub trait SpeechRecognizer: Send + Sync {
    fn start(&self, options: &RecognizerOptions) -> Result<(), String>;
    fn stop(&self);
}

pub struct SpeechInputBridge {
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    options: RecognizerOptions,
    input: InputBuffer,
    state: Mutex<SpeechState>,
}

impl SpeechInputBridge {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        input: InputBuffer,
        language: impl Into<String>,
    ) -> Self {
        Self {
            recognizer: Some(recognizer),
            options: RecognizerOptions::new(language),
            input,
            state: Mutex::new(SpeechState::Idle),
        }
    }

    /// A bridge for platforms without speech recognition.
    pub fn unavailable(input: InputBuffer) -> Self {
        Self {
            recognizer: None,
            options: RecognizerOptions::new("en-US"),
            input,
            state: Mutex::new(SpeechState::Idle),
        }
    }

    /// Build a bridge from the `[speech]` section. Without a recognizer or
    /// with speech disabled the bridge is unavailable.
    pub fn from_config(
        config: &SpeechConfig,
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        input: InputBuffer,
    ) -> Self {
        match recognizer {
            Some(recognizer) if config.enabled => Self::new(recognizer, input, config.language.clone()),
            _ => {
                tracing::debug!(enabled = config.enabled, "Speech input unavailable");
                Self::unavailable(input)
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn state(&self) -> SpeechState {
        *self.state.lock().expect("speech state mutex poisoned")
    }

    /// Begin capture. No-op while already recording or when unavailable.
    ///
    /// The state lock is released before the recognizer is called, so a
    /// recognizer may deliver events synchronously from `start` or `stop`.
    pub fn start(&self) -> Result<(), ChatError> {
        let Some(recognizer) = &self.recognizer else {
            tracing::debug!("Speech recognition unavailable, ignoring start");
            return Ok(());
        };

        if !self.transition(SpeechState::Idle, SpeechState::Recording) {
            return Ok(());
        }

        if let Err(e) = recognizer.start(&self.options) {
            tracing::warn!(error = %e, "Speech recognizer failed to start");
            self.transition(SpeechState::Recording, SpeechState::Idle);
            return Err(ChatError::Speech(e));
        }
        Ok(())
    }

    /// End capture. No-op while idle.
    pub fn stop(&self) {
        let Some(recognizer) = &self.recognizer else {
            return;
        };

        if self.transition(SpeechState::Recording, SpeechState::Idle) {
            recognizer.stop();
        }
    }

    /// Move from `from` to `to`; returns false if the state was not `from`.
    fn transition(&self, from: SpeechState, to: SpeechState) -> bool {
        let mut state = self.state.lock().expect("speech state mutex poisoned");
        if *state != from {
            return false;
        }
        tracing::debug!("Speech state: {} -> {}", from, to);
        *state = to;
        true
    }

    /// Start when idle, stop when recording.
    pub fn toggle(&self) -> Result<SpeechState, ChatError> {
        match self.state() {
            SpeechState::Idle => self.start()?,
            SpeechState::Recording => self.stop(),
        }
        Ok(self.state())
    }

    pub fn handle_event(&self, event: SpeechEvent) {
        match event {
            SpeechEvent::Result {
                transcript,
                is_final: true,
            } => self.input.append_transcript(&transcript),
            SpeechEvent::Result { .. } => {}
            SpeechEvent::Error(e) => {
                tracing::warn!(error = %e, state = %self.state(), "Speech recognition error");
            }
            // The recognizer may end on its own after silence; the state is
            // left as is until the user stops.
            SpeechEvent::End => {
                tracing::debug!(state = %self.state(), "Speech recognition ended");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
