use serde::{Deserialize, Serialize};
use std::fmt;

/// Authoritative call state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Initiating,
    Ringing,
    Connected,
    Ended,
    Error,
}

impl CallStatus {
    /// `ended` and `error` accept no further backend-driven transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, CallStatus::Ended | CallStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Initiating => "initiating",
            CallStatus::Ringing => "ringing",
            CallStatus::Connected => "connected",
            CallStatus::Ended => "ended",
            CallStatus::Error => "error",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a provider status string onto the five-state vocabulary.
///
/// Matching is case-insensitive. Unrecognized values (including the
/// simulation's `not_found`) yield `None` and are ignored by the poller.
pub fn normalize_status(raw: &str) -> Option<CallStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "completed" | "ended" => Some(CallStatus::Ended),
        "in_progress" | "ongoing" | "active" | "connected" => Some(CallStatus::Connected),
        "failed" | "error" => Some(CallStatus::Error),
        "initiated" | "ringing" | "queued" => Some(CallStatus::Ringing),
        "initiating" => Some(CallStatus::Initiating),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_vocabulary_is_normalized() {
        for raw in ["completed", "ended", "COMPLETED"] {
            assert_eq!(normalize_status(raw), Some(CallStatus::Ended));
        }
        for raw in ["in_progress", "ongoing", "active", "Active"] {
            assert_eq!(normalize_status(raw), Some(CallStatus::Connected));
        }
        for raw in ["failed", "error"] {
            assert_eq!(normalize_status(raw), Some(CallStatus::Error));
        }
        assert_eq!(normalize_status("initiated"), Some(CallStatus::Ringing));
        assert_eq!(normalize_status("ringing"), Some(CallStatus::Ringing));
        assert_eq!(normalize_status("not_found"), None);
        assert_eq!(normalize_status(""), None);
    }

    #[test]
    fn terminal_states() {
        assert!(CallStatus::Ended.is_terminal());
        assert!(CallStatus::Error.is_terminal());
        assert!(!CallStatus::Connected.is_terminal());
        assert!(!CallStatus::Ringing.is_terminal());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&CallStatus::Connected).unwrap();
        assert_eq!(json, "\"connected\"");
    }
}
