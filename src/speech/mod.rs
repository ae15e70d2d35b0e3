//! Speech loop for simulated calls
//!
//! The loop itself is a plain state machine ([`SpeechLoop`]); the call
//! controller feeds it capability events and executes the
//! [`SpeechAction`]s it returns against a [`SpeechRecognizer`] /
//! [`SpeechSynthesizer`].

mod backoff;
mod capability;
mod language;
mod reply;
mod speech_loop;

pub use backoff::Backoff;
pub use capability::{
    SpeechBridge, SpeechCapabilities, SpeechCommand, SpeechRecognizer, SpeechSynthesizer,
};
pub use language::language_code;
pub use reply::ReplyGenerator;
pub use speech_loop::{SpeechAction, SpeechErrorKind, SpeechLoop, SpeechPhase, UtteranceFilter};
