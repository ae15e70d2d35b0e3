use super::backoff::Backoff;
use super::language::language_code;
use super::reply::ReplyGenerator;
use crate::call::{Speaker, Utterance};
use crate::config::SpeechConfig;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechPhase {
    Idle,
    Listening,
    GeneratingReply,
    Speaking,
    /// Waiting on a scheduled restart after an error
    Recovering,
    /// Stopped until the user changes a browser setting
    Halted,
}

/// Recognition error reported by the speech capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechErrorKind {
    PermissionDenied,
    NoSpeech,
    Network,
    AudioCapture,
    Aborted,
    Other(String),
}

impl SpeechErrorKind {
    /// Classify a Web Speech style error code
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "not-allowed" | "permission-denied" | "service-not-allowed" => {
                SpeechErrorKind::PermissionDenied
            }
            "no-speech" => SpeechErrorKind::NoSpeech,
            "network" => SpeechErrorKind::Network,
            "audio-capture" => SpeechErrorKind::AudioCapture,
            "aborted" => SpeechErrorKind::Aborted,
            other => SpeechErrorKind::Other(other.to_string()),
        }
    }

    /// Whether the loop restarts listening after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SpeechErrorKind::PermissionDenied | SpeechErrorKind::Aborted
        )
    }
}

/// What the owner of the loop must do next
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechAction {
    /// Begin recognition after `delay` (zero means now)
    StartListening { delay: Duration },
    /// Abort in-flight recognition and synthesis, drop pending restarts
    Cancel,
    Speak { text: String, language: String },
    /// Append to the transcript
    Record(Utterance),
    /// Live caption for interim results
    Caption(String),
}

/// Acceptance thresholds for final utterances
#[derive(Debug, Clone, Copy)]
pub struct UtteranceFilter {
    pub min_chars: usize,
    pub min_confidence: f32,
    pub long_chars: usize,
}

impl UtteranceFilter {
    pub fn accepts(&self, text: &str, confidence: Option<f32>) -> bool {
        let len = text.chars().count();
        if len <= self.min_chars {
            return false;
        }
        let confidence = confidence.unwrap_or(1.0);
        confidence > self.min_confidence || len > self.long_chars
    }
}

impl Default for UtteranceFilter {
    fn default() -> Self {
        Self::from(&SpeechConfig::default())
    }
}

impl From<&SpeechConfig> for UtteranceFilter {
    fn from(cfg: &SpeechConfig) -> Self {
        Self {
            min_chars: cfg.min_utterance_chars,
            min_confidence: cfg.min_confidence,
            long_chars: cfg.long_utterance_chars,
        }
    }
}

/// Listen / reply / speak cycle for simulated calls.
///
/// `idle -> listening -> generating-reply -> speaking -> listening`.
/// Each external capability event has one ingestion method; every method
/// returns the actions to perform and never touches the capability itself.
#[derive(Debug)]
pub struct SpeechLoop {
    phase: SpeechPhase,
    active: bool,
    language: String,
    replies: ReplyGenerator,
    filter: UtteranceFilter,
    backoff: Backoff,
    restart_delay: Duration,
    synthesis_available: bool,
    last_accepted: Option<String>,
    pending_utterance: Option<String>,
    replies_given: usize,
    caption: Option<String>,
}

impl SpeechLoop {
    pub fn new(
        scenario_title: &str,
        language: &str,
        config: &SpeechConfig,
        synthesis_available: bool,
    ) -> Self {
        let code = language_code(language);
        Self {
            phase: SpeechPhase::Idle,
            active: false,
            language: code.to_string(),
            replies: ReplyGenerator::new(scenario_title, code),
            filter: UtteranceFilter::from(config),
            backoff: Backoff::new(
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_cap_ms),
            ),
            restart_delay: Duration::from_millis(config.restart_delay_ms),
            synthesis_available,
            last_accepted: None,
            pending_utterance: None,
            replies_given: 0,
            caption: None,
        }
    }

    pub fn phase(&self) -> SpeechPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.backoff.errors()
    }

    pub fn activate(&mut self) -> Vec<SpeechAction> {
        if self.active {
            return Vec::new();
        }
        info!("Speech loop activated ({})", self.language);
        self.active = true;
        self.phase = SpeechPhase::Listening;
        vec![SpeechAction::StartListening {
            delay: Duration::ZERO,
        }]
    }

    /// Synchronous stop: nothing further is scheduled after this
    pub fn deactivate(&mut self) -> Vec<SpeechAction> {
        if !self.active && self.phase == SpeechPhase::Idle {
            return Vec::new();
        }
        info!("Speech loop deactivated");
        self.active = false;
        self.phase = SpeechPhase::Idle;
        self.pending_utterance = None;
        self.caption = None;
        vec![SpeechAction::Cancel]
    }

    /// A scheduled restart fired; `true` if listening should begin
    pub fn on_restart_due(&mut self) -> bool {
        if !self.active || self.phase == SpeechPhase::Halted {
            return false;
        }
        self.phase = SpeechPhase::Listening;
        true
    }

    pub fn on_interim_result(&mut self, text: &str) -> Vec<SpeechAction> {
        if !self.listening() {
            return Vec::new();
        }
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        let caption = format!("{} ...", text);
        self.caption = Some(caption.clone());
        vec![SpeechAction::Caption(caption)]
    }

    pub fn on_final_result(&mut self, text: &str, confidence: Option<f32>) -> Vec<SpeechAction> {
        if !self.listening() {
            return Vec::new();
        }
        let text = text.trim();

        if self.last_accepted.as_deref() == Some(text) {
            debug!("Skipping duplicate utterance: {}", text);
            return Vec::new();
        }
        if !self.filter.accepts(text, confidence) {
            debug!(
                "Skipping low confidence/short utterance: {} ({:?})",
                text, confidence
            );
            return Vec::new();
        }

        self.backoff.reset();
        self.last_accepted = Some(text.to_string());
        self.pending_utterance = Some(text.to_string());
        self.caption = Some(text.to_string());
        vec![SpeechAction::Record(Utterance::new(Speaker::User, text))]
    }

    /// Recognition session ended
    pub fn on_end(&mut self) -> Vec<SpeechAction> {
        if !self.listening() {
            return Vec::new();
        }

        let Some(utterance) = self.pending_utterance.take() else {
            debug!("No utterance captured, restarting recognition");
            return vec![SpeechAction::StartListening {
                delay: self.restart_delay,
            }];
        };

        self.phase = SpeechPhase::GeneratingReply;
        let reply = self.replies.reply(&utterance, self.replies_given);
        self.replies_given += 1;

        let mut actions = vec![SpeechAction::Record(Utterance::new(
            Speaker::Assistant,
            reply.clone(),
        ))];
        if self.synthesis_available {
            self.phase = SpeechPhase::Speaking;
            actions.push(SpeechAction::Speak {
                text: reply,
                language: self.language.clone(),
            });
        } else {
            self.phase = SpeechPhase::Listening;
            actions.push(SpeechAction::StartListening {
                delay: self.restart_delay,
            });
        }
        actions
    }

    /// Synthesis finished playing the last reply
    pub fn on_speech_finished(&mut self) -> Vec<SpeechAction> {
        if !self.active || self.phase != SpeechPhase::Speaking {
            return Vec::new();
        }
        self.phase = SpeechPhase::Listening;
        vec![SpeechAction::StartListening {
            delay: self.restart_delay,
        }]
    }

    pub fn on_error(&mut self, kind: SpeechErrorKind) -> Vec<SpeechAction> {
        if !self.active || matches!(self.phase, SpeechPhase::Halted | SpeechPhase::Recovering) {
            return Vec::new();
        }
        warn!("Speech recognition error: {:?}", kind);

        let mut actions = Vec::new();
        match &kind {
            SpeechErrorKind::PermissionDenied => {
                self.phase = SpeechPhase::Halted;
                actions.push(system_note(
                    "Microphone access was denied. Please check your browser permissions and try again.",
                ));
                return actions;
            }
            SpeechErrorKind::Aborted => {
                // No backoff; the end event that follows restarts listening
                return actions;
            }
            SpeechErrorKind::NoSpeech => {
                // Only the first of a streak, to keep the transcript readable
                if self.backoff.errors() == 0 {
                    actions.push(system_note(
                        "No speech detected. Please speak clearly or check your microphone.",
                    ));
                }
            }
            SpeechErrorKind::Network => actions.push(system_note(
                "Network issue detected with speech recognition. Recognition may be unstable.",
            )),
            SpeechErrorKind::AudioCapture => actions.push(system_note(
                "Problem with audio capture. Please check your microphone connection.",
            )),
            SpeechErrorKind::Other(code) => {
                debug!("Unclassified speech error: {}", code);
            }
        }

        let delay = self.backoff.next_delay();
        if self.backoff.errors() > 3 {
            actions.push(system_note(
                "Having trouble with speech recognition. You might need to refresh the page.",
            ));
        }
        info!(
            "Restarting speech recognition in {:?} (error count: {})",
            delay,
            self.backoff.errors()
        );
        self.phase = SpeechPhase::Recovering;
        self.pending_utterance = None;
        actions.push(SpeechAction::StartListening { delay });
        actions
    }

    fn listening(&self) -> bool {
        self.active && self.phase == SpeechPhase::Listening
    }
}

fn system_note(text: &str) -> SpeechAction {
    SpeechAction::Record(Utterance::new(Speaker::System, text))
}
