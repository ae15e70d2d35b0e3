use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Speech-to-text capability
pub trait SpeechRecognizer: Send + Sync {
    fn start(&self, language: &str);

    /// Abort any in-flight recognition
    fn abort(&self);
}

/// Text-to-speech capability; completion is reported back separately
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str, language: &str);

    fn cancel(&self);
}

/// Whatever speech capabilities the client offers.
///
/// Without a recognizer the loop never starts and the call runs in
/// text-only mode.
#[derive(Clone, Default)]
pub struct SpeechCapabilities {
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
}

impl SpeechCapabilities {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn new(
        recognizer: Option<Arc<dyn SpeechRecognizer>>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        Self {
            recognizer,
            synthesizer,
        }
    }

    pub fn can_listen(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn can_speak(&self) -> bool {
        self.synthesizer.is_some()
    }
}

/// Instruction for a remote speech client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SpeechCommand {
    StartListening { language: String },
    AbortListening,
    Speak { text: String, language: String },
    CancelSpeech,
}

/// Relays capability calls to a client (e.g. a browser using the Web
/// Speech API) that drains the queue and reports events back.
#[derive(Debug, Default)]
pub struct SpeechBridge {
    queue: Mutex<VecDeque<SpeechCommand>>,
}

impl SpeechBridge {
    /// Oldest commands are dropped beyond this
    const MAX_PENDING: usize = 64;

    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge wired as both recognizer and synthesizer
    pub fn capabilities(self: &Arc<Self>) -> SpeechCapabilities {
        SpeechCapabilities::new(
            Some(Arc::clone(self) as Arc<dyn SpeechRecognizer>),
            Some(Arc::clone(self) as Arc<dyn SpeechSynthesizer>),
        )
    }

    pub fn drain(&self) -> Vec<SpeechCommand> {
        match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }

    fn push(&self, command: SpeechCommand) {
        let mut queue = match self.queue.lock() {
            Ok(queue) => queue,
            Err(poisoned) => poisoned.into_inner(),
        };
        if queue.len() >= Self::MAX_PENDING {
            queue.pop_front();
        }
        queue.push_back(command);
    }
}

impl SpeechRecognizer for SpeechBridge {
    fn start(&self, language: &str) {
        self.push(SpeechCommand::StartListening {
            language: language.to_string(),
        });
    }

    fn abort(&self) {
        self.push(SpeechCommand::AbortListening);
    }
}

impl SpeechSynthesizer for SpeechBridge {
    fn speak(&self, text: &str, language: &str) {
        self.push(SpeechCommand::Speak {
            text: text.to_string(),
            language: language.to_string(),
        });
    }

    fn cancel(&self) {
        self.push(SpeechCommand::CancelSpeech);
    }
}
