use super::poller::PollCadence;
use super::session::CallSession;
use super::status::CallStatus;
use super::timer::DurationTimer;
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Everything that can move a call between states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// A backend accepted the call and issued an id
    Dispatched {
        call_id: String,
        simulated: bool,
        demo_reason: Option<String>,
    },
    /// Neither the provider nor the simulation could dispatch
    DispatchFailed { reason: String },
    /// Normalized status reported by the poller
    StatusObserved(CallStatus),
    /// The user hung up
    EndRequested,
    /// The user retries after an error
    RestartRequested,
}

/// Side effects the owner must carry out, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    StartPolling(PollCadence),
    StopPolling,
    StartTicker,
    StopTicker,
    StartSpeech,
    StopSpeech,
    /// Tell the backend to hang up (user-initiated ends only)
    EndRemoteCall,
    RunAnalysis,
    RecordFailure,
    Redispatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: CallStatus,
    pub to: CallStatus,
    pub effects: Vec<Effect>,
}

/// Owns the authoritative [`CallSession`] and its duration timer.
///
/// Every event is either turned into exactly one [`Transition`] or
/// ignored (`None`). Terminal entries happen at most once per attempt:
/// the `connection_announced` and `analysis_started` guards on the
/// session absorb duplicate reports from overlapping poll cycles.
#[derive(Debug)]
pub struct CallStateMachine {
    session: CallSession,
    timer: DurationTimer,
}

impl CallStateMachine {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session: CallSession::new(session_id),
            timer: DurationTimer::new(),
        }
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn status(&self) -> CallStatus {
        self.session.status
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Apply an event observed at `now`
    pub fn handle(&mut self, event: CallEvent, now: Instant) -> Option<Transition> {
        let from = self.session.status;
        let transition = match event {
            CallEvent::Dispatched {
                call_id,
                simulated,
                demo_reason,
            } => self.on_dispatched(call_id, simulated, demo_reason),
            CallEvent::DispatchFailed { reason } => self.on_dispatch_failed(reason, now),
            CallEvent::StatusObserved(status) => self.on_status(status, now),
            CallEvent::EndRequested => self.on_end_requested(now),
            CallEvent::RestartRequested => self.on_restart(),
        };

        match &transition {
            Some(t) => info!(
                "Call {} transition {} -> {} ({} effects)",
                self.session.session_id,
                t.from,
                t.to,
                t.effects.len()
            ),
            None => debug!(
                "Call {} ignored event in state {}",
                self.session.session_id, from
            ),
        }

        transition
    }

    /// One duration sample; `None` once the timer is disarmed
    pub fn tick(&mut self, now: Instant) -> Option<u64> {
        if self.session.status != CallStatus::Connected {
            return None;
        }
        let elapsed = self.timer.sample(now)?;
        self.session.duration_seconds = elapsed;
        Some(elapsed)
    }

    fn on_dispatched(
        &mut self,
        call_id: String,
        simulated: bool,
        demo_reason: Option<String>,
    ) -> Option<Transition> {
        if self.session.status != CallStatus::Initiating {
            return None;
        }
        self.session.call_id = Some(call_id);
        self.session.using_simulation = simulated;
        self.session.demo_mode_reason = demo_reason;
        self.session.last_error = None;
        Some(self.enter(
            CallStatus::Ringing,
            vec![Effect::StartPolling(PollCadence::Fast)],
        ))
    }

    fn on_dispatch_failed(&mut self, reason: String, now: Instant) -> Option<Transition> {
        if self.session.status != CallStatus::Initiating {
            return None;
        }
        warn!(
            "Call {} could not be dispatched: {}",
            self.session.session_id, reason
        );
        self.session.last_error = Some(reason);
        Some(self.enter_error(now))
    }

    fn on_status(&mut self, status: CallStatus, now: Instant) -> Option<Transition> {
        if self.session.is_settled() {
            return None;
        }
        match (self.session.status, status) {
            (CallStatus::Ringing, CallStatus::Connected) if !self.session.connection_announced => {
                Some(self.enter_connected(now))
            }
            (CallStatus::Ringing | CallStatus::Connected, CallStatus::Ended) => {
                Some(self.enter_ended(now, false))
            }
            (CallStatus::Ringing | CallStatus::Connected, CallStatus::Error) => {
                self.session.last_error = Some("Call failed at the provider".to_string());
                Some(self.enter_error(now))
            }
            _ => None,
        }
    }

    fn on_end_requested(&mut self, now: Instant) -> Option<Transition> {
        if self.session.is_settled() {
            return None;
        }
        match self.session.status {
            CallStatus::Ringing | CallStatus::Connected => Some(self.enter_ended(now, true)),
            _ => None,
        }
    }

    fn on_restart(&mut self) -> Option<Transition> {
        if self.session.status != CallStatus::Error {
            return None;
        }
        let from = self.session.status;
        self.session.reset_attempt();
        self.session.restarts += 1;
        self.timer.reset();
        Some(Transition {
            from,
            to: CallStatus::Initiating,
            effects: vec![Effect::Redispatch],
        })
    }

    fn enter_connected(&mut self, now: Instant) -> Transition {
        self.session.connection_announced = true;
        self.session.started_at = Some(Utc::now());
        self.session.duration_seconds = 0;
        self.timer.arm(now);

        let mut effects = vec![
            Effect::StartTicker,
            Effect::StopPolling,
            Effect::StartPolling(PollCadence::Slow),
        ];
        if self.session.using_simulation {
            effects.push(Effect::StartSpeech);
        }
        self.enter(CallStatus::Connected, effects)
    }

    fn enter_ended(&mut self, now: Instant, user_initiated: bool) -> Transition {
        self.freeze_duration(now);
        self.session.analysis_started = true;

        let mut effects = vec![Effect::StopTicker, Effect::StopPolling, Effect::StopSpeech];
        if user_initiated {
            effects.push(Effect::EndRemoteCall);
        }
        effects.push(Effect::RunAnalysis);
        self.enter(CallStatus::Ended, effects)
    }

    fn enter_error(&mut self, now: Instant) -> Transition {
        self.freeze_duration(now);
        self.enter(
            CallStatus::Error,
            vec![
                Effect::StopTicker,
                Effect::StopPolling,
                Effect::StopSpeech,
                Effect::RecordFailure,
            ],
        )
    }

    fn freeze_duration(&mut self, now: Instant) {
        if self.session.started_at.is_some() {
            self.session.duration_seconds = self.timer.disarm(now);
        }
    }

    fn enter(&mut self, to: CallStatus, effects: Vec<Effect>) -> Transition {
        let from = self.session.status;
        self.session.status = to;
        Transition { from, to, effects }
    }
}
