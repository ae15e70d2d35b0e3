use super::status::CallStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One attempt at a practice call, real or simulated.
///
/// Mutated only by [`super::CallStateMachine`]; everything else reads it.
#[derive(Debug, Clone, Serialize)]
pub struct CallSession {
    pub session_id: String,

    /// Issued by whichever backend dispatched the call
    pub call_id: Option<String>,

    pub status: CallStatus,

    /// Set once, the instant the call first connects
    pub started_at: Option<DateTime<Utc>>,

    /// Live while connected, frozen once the call leaves `connected`
    pub duration_seconds: u64,

    /// Chosen when the call is dispatched; selects the poll target and
    /// whether the speech loop runs
    pub using_simulation: bool,

    /// Why the real provider was bypassed, when it was
    pub demo_mode_reason: Option<String>,

    /// Guard: the `ringing -> connected` transition has been processed
    pub connection_announced: bool,

    /// Guard: the analysis trigger has been fired for this attempt
    pub analysis_started: bool,

    /// Last failure surfaced to the user
    pub last_error: Option<String>,

    /// User-triggered restarts from `error`
    pub restarts: u32,
}

impl CallSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            call_id: None,
            status: CallStatus::Initiating,
            started_at: None,
            duration_seconds: 0,
            using_simulation: false,
            demo_mode_reason: None,
            connection_announced: false,
            analysis_started: false,
            last_error: None,
            restarts: 0,
        }
    }

    /// True once the call reached a terminal state or analysis is running
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal() || self.analysis_started
    }

    /// Clear per-attempt state before a restart
    pub(crate) fn reset_attempt(&mut self) {
        self.call_id = None;
        self.status = CallStatus::Initiating;
        self.started_at = None;
        self.duration_seconds = 0;
        self.using_simulation = false;
        self.demo_mode_reason = None;
        self.connection_announced = false;
        self.analysis_started = false;
    }
}
