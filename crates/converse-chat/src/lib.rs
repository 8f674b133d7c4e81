//! Conversation state and send flow for Converse.
//!
//! Owns the composer (input buffer, pending attachment, voice input), the
//! message history in either controlled or uncontrolled mode, and the
//! single-flight send that turns user input into a bot reply.

pub mod controller;
pub mod error;
pub mod input;
pub mod speech;
pub mod store;
pub mod upload;

pub use controller::{ChatResponder, ConversationController, HostCallbacks, SendOutcome};
pub use error::ChatError;
pub use input::InputBuffer;
pub use speech::{RecognizerOptions, SpeechEvent, SpeechInputBridge, SpeechRecognizer, SpeechState};
pub use store::{ConversationHost, HistoryStore, HostHistory, LocalHistory};
pub use upload::UploadPolicy;
