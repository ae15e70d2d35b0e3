use crate::call::{CallStatus, Utterance};
use crate::speech::SpeechPhase;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time view of a call session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,

    pub call_id: Option<String>,

    pub status: CallStatus,

    /// When the call first connected
    pub started_at: Option<DateTime<Utc>>,

    /// Live while connected, frozen afterwards
    pub duration_seconds: u64,

    /// Running against the local simulation
    pub demo_mode: bool,

    pub demo_mode_reason: Option<String>,

    pub last_error: Option<String>,

    pub restarts: u32,

    /// `None` when the speech loop is not running (real call, or text-only)
    pub speech_phase: Option<SpeechPhase>,

    /// Latest interim recognition result
    pub live_caption: Option<String>,

    pub transcript_entries: usize,

    pub analysis_ready: bool,

    /// Timer tasks still armed for this session
    pub live_timers: usize,
}

/// Transcript as served to clients
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptView {
    pub finalized: bool,
    pub entries: Vec<Utterance>,
    pub text: String,
}
