//! Call lifecycle core
//!
//! - [`CallStateMachine`]: authoritative status, guards, duration timer
//! - [`Poller`]: fast/slow status polling with transition filtering
//! - [`TimerSupervisor`]: owns every timer task of a session
//! - [`TranscriptLog`]: append-only utterance log

mod machine;
mod poller;
mod session;
mod status;
mod supervisor;
mod timer;
mod transcript;

pub use machine::{CallEvent, CallStateMachine, Effect, Transition};
pub use poller::{PollCadence, PollFilter, PollIntervals, PollTarget, Poller};
pub use session::CallSession;
pub use status::{normalize_status, CallStatus};
pub use supervisor::TimerSupervisor;
pub use timer::DurationTimer;
pub use transcript::{Speaker, TranscriptLog, Utterance};
