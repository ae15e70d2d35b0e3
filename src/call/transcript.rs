use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
    System,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Assistant => "Assistant",
            Speaker::System => "System",
        }
    }
}

/// A single line of the call transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,

    /// Display only; ordering comes from position in the log
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Parse a `"Speaker: text"` line.
    ///
    /// `AI:` is read as the assistant; lines without a known prefix are
    /// attributed to the user.
    pub fn parse_line(line: &str) -> Self {
        let line = line.trim();
        let prefixes = [
            ("User:", Speaker::User),
            ("Assistant:", Speaker::Assistant),
            ("AI:", Speaker::Assistant),
            ("System:", Speaker::System),
        ];
        for (prefix, speaker) in prefixes {
            if let Some(rest) = line.strip_prefix(prefix) {
                return Self::new(speaker, rest.trim());
            }
        }
        Self::new(Speaker::User, line)
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker.label(), self.text)
    }
}

/// Append-only utterance log, sealed when the call ends
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptLog {
    entries: Vec<Utterance>,
    finalized: bool,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an utterance. Returns `false` once the log is finalized.
    pub fn append(&mut self, utterance: Utterance) -> bool {
        if self.finalized {
            return false;
        }
        self.entries.push(utterance);
        true
    }

    pub fn push_line(&mut self, line: &str) -> bool {
        self.append(Utterance::parse_line(line))
    }

    /// Import a multi-line provider transcript
    pub fn import_text(&mut self, text: &str) -> usize {
        let mut added = 0;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            if self.push_line(line) {
                added += 1;
            }
        }
        added
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn entries(&self) -> &[Utterance] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `Speaker: text` lines, the shape the analyzer expects
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
