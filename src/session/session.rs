use super::config::SessionConfig;
use super::services::CallServices;
use super::stats::{SessionSnapshot, TranscriptView};
use crate::analysis::{AnalysisRequest, AnalysisResult};
use crate::backend::{CallBackend, DispatchReceipt, InitiateRequest};
use crate::call::{
    CallEvent, CallStateMachine, CallStatus, Effect, PollCadence, PollTarget, Poller, Speaker,
    TimerSupervisor, TranscriptLog, Utterance,
};
use crate::speech::{
    language_code, ReplyGenerator, SpeechAction, SpeechCapabilities, SpeechErrorKind, SpeechLoop,
};
use crate::store::{ANALYTICS, CALLS};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const TICK: Duration = Duration::from_secs(1);

/// One practice call: owns the state machine, the transcript, the speech
/// loop and every timer task of the session.
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct CallController {
    inner: Arc<Inner>,
}

struct Inner {
    /// Handle back to the owning `Arc`, for callbacks that only get `&self`
    me: Weak<Inner>,
    config: SessionConfig,
    services: CallServices,
    capabilities: SpeechCapabilities,
    core: Mutex<Core>,
    status_tx: watch::Sender<CallStatus>,
    analysis_tx: watch::Sender<Option<AnalysisResult>>,
}

/// Everything guarded by the session lock
struct Core {
    machine: CallStateMachine,
    transcript: TranscriptLog,
    speech: Option<SpeechLoop>,
    supervisor: TimerSupervisor,
    /// Replies to typed messages when no speech loop runs
    replies: ReplyGenerator,
    typed_turns: usize,
    record_id: Option<String>,
    torn_down: bool,
}

/// How the dispatch attempt went
enum Placement {
    Provider(DispatchReceipt),
    Simulated {
        receipt: DispatchReceipt,
        reason: Option<String>,
    },
    Failed(String),
}

impl CallController {
    /// Create the session, persist its call record and dispatch the call.
    ///
    /// Returns once the call is ringing (or in error); everything after
    /// that is driven by the session's own timers.
    pub async fn start(
        config: SessionConfig,
        services: CallServices,
        capabilities: SpeechCapabilities,
    ) -> Self {
        let controller = Self::new(config, services, capabilities);
        controller.inner.open_record().await;
        controller.inner.initiate().await;
        controller
    }

    fn new(config: SessionConfig, services: CallServices, capabilities: SpeechCapabilities) -> Self {
        info!("Creating call session: {}", config.session_id);

        let machine = CallStateMachine::new(config.session_id.clone());
        let (status_tx, _) = watch::channel(machine.status());
        let (analysis_tx, _) = watch::channel(None);
        let replies = ReplyGenerator::new(
            config.scenario.title.clone(),
            language_code(&config.language),
        );

        Self {
            inner: Arc::new_cyclic(|me| Inner {
                me: me.clone(),
                config,
                services,
                capabilities,
                core: Mutex::new(Core {
                    machine,
                    transcript: TranscriptLog::new(),
                    speech: None,
                    supervisor: TimerSupervisor::new(),
                    replies,
                    typed_turns: 0,
                    record_id: None,
                    torn_down: false,
                }),
                status_tx,
                analysis_tx,
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.config.session_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn status(&self) -> CallStatus {
        *self.inner.status_tx.borrow()
    }

    /// Follow status changes
    pub fn subscribe_status(&self) -> watch::Receiver<CallStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Follow the analysis result; `None` until it is available
    pub fn subscribe_analysis(&self) -> watch::Receiver<Option<AnalysisResult>> {
        self.inner.analysis_tx.subscribe()
    }

    pub fn analysis(&self) -> Option<AnalysisResult> {
        self.inner.analysis_tx.borrow().clone()
    }

    /// Hang up. `false` when the call is not live or is already ending.
    pub async fn end(&self) -> bool {
        let mut core = self.inner.core.lock().await;
        if core.torn_down {
            return false;
        }
        self.inner.dispatch(&mut core, CallEvent::EndRequested)
    }

    /// Retry after an error. `false` unless the call is in `error`.
    pub async fn restart(&self) -> bool {
        let mut core = self.inner.core.lock().await;
        if core.torn_down {
            return false;
        }
        self.inner.dispatch(&mut core, CallEvent::RestartRequested)
    }

    /// Append a typed user message (text-only mode).
    ///
    /// During a connected simulated call without a running speech loop,
    /// the coach answers in the transcript. `false` if the message was
    /// empty or the transcript is already finalized.
    pub async fn send_message(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let mut core = self.inner.core.lock().await;
        if !core.transcript.append(Utterance::new(Speaker::User, text)) {
            return false;
        }

        let session = core.machine.session();
        let replies_here = session.using_simulation
            && session.status == CallStatus::Connected
            && core.speech.as_ref().map_or(true, |s| !s.is_active());
        if replies_here {
            let reply = core.replies.reply(text, core.typed_turns);
            core.typed_turns += 1;
            core.transcript.append(Utterance::new(Speaker::Assistant, reply));
        }
        true
    }

    pub async fn speech_interim(&self, text: &str) {
        self.inner
            .drive_speech(|speech| speech.on_interim_result(text))
            .await;
    }

    pub async fn speech_final(&self, text: &str, confidence: Option<f32>) {
        self.inner
            .drive_speech(|speech| speech.on_final_result(text, confidence))
            .await;
    }

    pub async fn speech_error(&self, code: &str) {
        let kind = SpeechErrorKind::from_code(code);
        self.inner.drive_speech(|speech| speech.on_error(kind)).await;
    }

    /// Recognition session ended
    pub async fn speech_ended(&self) {
        self.inner.drive_speech(|speech| speech.on_end()).await;
    }

    /// Synthesis finished speaking
    pub async fn speech_spoken(&self) {
        self.inner
            .drive_speech(|speech| speech.on_speech_finished())
            .await;
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let core = self.inner.core.lock().await;
        let session = core.machine.session();
        SessionSnapshot {
            session_id: session.session_id.clone(),
            call_id: session.call_id.clone(),
            status: session.status,
            started_at: session.started_at,
            duration_seconds: session.duration_seconds,
            demo_mode: session.using_simulation,
            demo_mode_reason: session.demo_mode_reason.clone(),
            last_error: session.last_error.clone(),
            restarts: session.restarts,
            speech_phase: core.speech.as_ref().map(|s| s.phase()),
            live_caption: core
                .speech
                .as_ref()
                .and_then(|s| s.caption().map(str::to_string)),
            transcript_entries: core.transcript.len(),
            analysis_ready: self.inner.analysis_tx.borrow().is_some(),
            live_timers: core.supervisor.live_count(),
        }
    }

    pub async fn transcript(&self) -> TranscriptView {
        let core = self.inner.core.lock().await;
        TranscriptView {
            finalized: core.transcript.is_finalized(),
            entries: core.transcript.entries().to_vec(),
            text: core.transcript.render(),
        }
    }

    /// Timer tasks still armed for this session
    pub async fn live_timers(&self) -> usize {
        self.inner.core.lock().await.supervisor.live_count()
    }

    /// Stop everything the session runs. Safe in any state; the session
    /// schedules nothing further afterwards.
    pub async fn shutdown(&self) {
        let simulated_call = {
            let mut core = self.inner.core.lock().await;
            if core.torn_down {
                return;
            }
            info!("Tearing down call session: {}", self.inner.config.session_id);
            core.torn_down = true;
            if let Some(actions) = core.speech.as_mut().map(|s| s.deactivate()) {
                self.inner.apply_speech(&mut core, actions);
            }
            core.supervisor.clear_all();
            core.supervisor.abort_background();

            let session = core.machine.session();
            let call_id = if session.using_simulation {
                session.call_id.clone()
            } else {
                None
            };
            call_id
        };

        if let Some(call_id) = simulated_call {
            self.inner.services.registry().delete(&call_id).await;
            debug!("Removed simulated call {}", call_id);
        }
    }
}

impl Inner {
    /// Run one event through the state machine and carry out its effects.
    ///
    /// Effects run synchronously under the session lock: the caller may be
    /// the poller task that one of them aborts.
    fn dispatch(self: &Arc<Self>, core: &mut Core, event: CallEvent) -> bool {
        let Some(transition) = core.machine.handle(event, Instant::now()) else {
            return false;
        };
        self.status_tx.send_replace(transition.to);

        let mut end_remote = false;
        for effect in transition.effects {
            match effect {
                Effect::StartPolling(cadence) => self.start_polling(core, cadence),
                Effect::StopPolling => core.supervisor.stop_poller(),
                Effect::StartTicker => self.start_ticker(core),
                Effect::StopTicker => core.supervisor.stop_ticker(),
                Effect::StartSpeech => self.start_speech(core),
                Effect::StopSpeech => {
                    if let Some(actions) = core.speech.as_mut().map(|s| s.deactivate()) {
                        self.apply_speech(core, actions);
                    }
                }
                Effect::EndRemoteCall => end_remote = true,
                Effect::RunAnalysis => self.wrap_up(core, end_remote),
                Effect::RecordFailure => self.record_failure(core),
                Effect::Redispatch => {
                    core.transcript = TranscriptLog::new();
                    core.speech = None;
                    core.typed_turns = 0;
                    let this = Arc::clone(self);
                    core.supervisor
                        .track_background(tokio::spawn(async move { this.initiate().await }));
                }
            }
        }

        if transition.to.is_terminal() {
            core.supervisor.clear_all();
        }
        true
    }

    async fn initiate(self: &Arc<Self>) {
        let request = self.config.initiate_request();
        let placement = self.place_call(&request).await;

        let mut core = self.core.lock().await;
        if core.torn_down {
            if let Placement::Simulated { receipt, .. } = placement {
                drop(core);
                self.services.registry().delete(&receipt.call_id).await;
            }
            return;
        }

        let event = match placement {
            Placement::Provider(receipt) => CallEvent::Dispatched {
                call_id: receipt.call_id,
                simulated: false,
                demo_reason: None,
            },
            Placement::Simulated { receipt, reason } => CallEvent::Dispatched {
                call_id: receipt.call_id,
                simulated: true,
                demo_reason: reason,
            },
            Placement::Failed(reason) => CallEvent::DispatchFailed { reason },
        };
        self.dispatch(&mut core, event);
    }

    /// Provider first; on any failure, the simulation if enabled
    async fn place_call(&self, request: &InitiateRequest) -> Placement {
        let provider = &self.services.provider;
        let failure = match provider.initiate(request).await {
            Ok(receipt) => {
                info!(
                    "Call {} dispatched via {}",
                    receipt.call_id,
                    provider.name()
                );
                return Placement::Provider(receipt);
            }
            Err(e) => e,
        };

        warn!(
            "Dispatch via {} failed for {}: {}",
            provider.name(),
            request.session_id,
            failure
        );
        if !self.services.simulation_fallback {
            return Placement::Failed(failure.to_string());
        }

        let reason = failure.fallback_reason().to_string();
        match self.services.simulation.initiate(request).await {
            Ok(receipt) => {
                info!("Falling back to demo mode: {}", reason);
                Placement::Simulated {
                    receipt,
                    reason: Some(reason),
                }
            }
            Err(e) => {
                error!("Simulation could not dispatch either: {}", e);
                Placement::Failed(e.to_string())
            }
        }
    }

    fn start_polling(self: &Arc<Self>, core: &mut Core, cadence: PollCadence) {
        let session = core.machine.session();
        let Some(call_id) = session.call_id.clone() else {
            warn!("No call id to poll for {}", session.session_id);
            return;
        };
        let simulated = session.using_simulation;
        let poller = Poller::new(
            self.services.backend(simulated),
            call_id,
            cadence,
            self.services.intervals(simulated).period(cadence),
            self.services.status_timeout,
            self.status_tx.subscribe(),
        );
        let target: Weak<Inner> = Arc::downgrade(self);
        core.supervisor
            .arm_poller(tokio::spawn(async move { poller.run(target).await }));
    }

    fn start_ticker(self: &Arc<Self>, core: &mut Core) {
        let weak = Arc::downgrade(self);
        core.supervisor.arm_ticker(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let sample = inner.core.lock().await.machine.tick(Instant::now());
                if sample.is_none() {
                    break;
                }
            }
        }));
    }

    fn start_speech(self: &Arc<Self>, core: &mut Core) {
        if !self.services.speech.enabled || !self.capabilities.can_listen() {
            info!(
                "Speech unavailable for {}, continuing in text-only mode",
                self.config.session_id
            );
            return;
        }
        let mut speech = SpeechLoop::new(
            &self.config.scenario.title,
            &self.config.language,
            &self.services.speech,
            self.capabilities.can_speak(),
        );
        let actions = speech.activate();
        core.speech = Some(speech);
        self.apply_speech(core, actions);
    }

    async fn drive_speech<F>(self: &Arc<Self>, f: F)
    where
        F: FnOnce(&mut SpeechLoop) -> Vec<SpeechAction>,
    {
        let mut core = self.core.lock().await;
        if core.torn_down {
            return;
        }
        let Some(speech) = core.speech.as_mut() else {
            debug!("Speech event ignored: loop not running");
            return;
        };
        let actions = f(speech);
        self.apply_speech(&mut core, actions);
    }

    fn apply_speech(self: &Arc<Self>, core: &mut Core, actions: Vec<SpeechAction>) {
        let language = core
            .speech
            .as_ref()
            .map(|s| s.language().to_string())
            .unwrap_or_else(|| language_code(&self.config.language).to_string());

        for action in actions {
            match action {
                SpeechAction::StartListening { delay } if delay.is_zero() => {
                    core.supervisor.stop_speech_restart();
                    if let Some(recognizer) = &self.capabilities.recognizer {
                        recognizer.start(&language);
                    }
                }
                SpeechAction::StartListening { delay } => {
                    let weak = Arc::downgrade(self);
                    core.supervisor.arm_speech_restart(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Some(inner) = weak.upgrade() {
                            inner.restart_listening().await;
                        }
                    }));
                }
                SpeechAction::Cancel => {
                    core.supervisor.stop_speech_restart();
                    if let Some(recognizer) = &self.capabilities.recognizer {
                        recognizer.abort();
                    }
                    if let Some(synthesizer) = &self.capabilities.synthesizer {
                        synthesizer.cancel();
                    }
                }
                SpeechAction::Speak { text, language } => {
                    if let Some(synthesizer) = &self.capabilities.synthesizer {
                        synthesizer.speak(&text, &language);
                    }
                }
                SpeechAction::Record(utterance) => {
                    if !core.transcript.append(utterance) {
                        debug!("Transcript finalized, utterance dropped");
                    }
                }
                SpeechAction::Caption(caption) => debug!("Caption: {}", caption),
            }
        }
    }

    async fn restart_listening(&self) {
        let mut core = self.core.lock().await;
        if core.torn_down {
            return;
        }
        let Some(speech) = core.speech.as_mut() else {
            return;
        };
        if speech.on_restart_due() {
            if let Some(recognizer) = &self.capabilities.recognizer {
                recognizer.start(speech.language());
            }
        }
    }

    /// Seal the transcript, then hang up (if asked), analyze and persist
    /// off the lock.
    fn wrap_up(self: &Arc<Self>, core: &mut Core, end_remote: bool) {
        core.transcript.finalize();
        let session = core.machine.session().clone();
        let transcript = core.transcript.render();
        let record_id = core.record_id.clone();
        let request = AnalysisRequest {
            transcript: transcript.clone(),
            scenario_context: self.scenario_context(),
            language: self.config.language.clone(),
            difficulty: self.config.difficulty.clone(),
        };

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if end_remote {
                if let Some(call_id) = &session.call_id {
                    this.hang_up(call_id, session.using_simulation).await;
                }
            }

            info!("Analyzing call session {}", session.session_id);
            let result = this.services.analysis.run(&request).await;

            // Held through the writes so teardown cannot interleave
            let core = this.core.lock().await;
            if core.torn_down {
                debug!("Session {} torn down, dropping analysis", session.session_id);
                return;
            }
            this.analysis_tx.send_replace(Some(result.clone()));

            let analysis = serde_json::to_value(&result).unwrap_or(Value::Null);
            if let Some(id) = record_id {
                this.persist_update(
                    &id,
                    json!({
                        "status": "completed",
                        "duration": session.duration_seconds,
                        "transcript": transcript,
                        "analysis": analysis,
                        "isRealCall": !session.using_simulation,
                        "isMockCall": session.using_simulation,
                        "endedAt": Utc::now().to_rfc3339(),
                    }),
                )
                .await;
            }
            let mut analytics = json!({
                "userId": this.config.user_id,
                "sessionId": session.session_id,
                "callId": session.call_id,
                "scenarioId": this.config.scenario.id,
                "language": this.config.language,
                "difficulty": this.config.difficulty,
                "duration": session.duration_seconds,
                "createdAt": Utc::now().to_rfc3339(),
            });
            if let (Some(fields), Value::Object(scores)) = (analytics.as_object_mut(), analysis) {
                fields.extend(scores);
            }
            if let Err(e) = this.services.store.create(ANALYTICS, analytics).await {
                warn!("Failed to store analytics for {}: {}", session.session_id, e);
            }
            drop(core);
        });
        core.supervisor.track_background(handle);
    }

    async fn hang_up(&self, call_id: &str, simulated: bool) {
        let backend = self.services.backend(simulated);
        match timeout(self.services.end_timeout, backend.end(call_id)).await {
            Ok(Ok(report)) if report.success => info!("Call {} ended", call_id),
            Ok(Ok(report)) => warn!("Ending call {}: {}", call_id, report.message),
            Ok(Err(e)) => warn!("Ending call {} failed: {}", call_id, e),
            Err(_) => warn!("Ending call {} timed out", call_id),
        }
    }

    fn record_failure(self: &Arc<Self>, core: &mut Core) {
        let Some(id) = core.record_id.clone() else {
            return;
        };
        let session = core.machine.session();
        let payload = json!({
            "status": "error",
            "error": session.last_error,
            "duration": session.duration_seconds,
            "isRealCall": !session.using_simulation,
            "isMockCall": session.using_simulation,
        });
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let core = this.core.lock().await;
            if !core.torn_down {
                this.persist_update(&id, payload).await;
            }
        });
        core.supervisor.track_background(handle);
    }

    async fn open_record(&self) {
        let payload = json!({
            "userId": self.config.user_id,
            "sessionId": self.config.session_id,
            "scenarioId": self.config.scenario.id,
            "scenarioTitle": self.config.scenario.title,
            "language": self.config.language,
            "difficulty": self.config.difficulty,
            "phoneNumber": self.config.phone_number,
            "type": "phone",
            "status": "initiating",
            "createdAt": Utc::now().to_rfc3339(),
        });
        match self.services.store.create(CALLS, payload).await {
            Ok(id) => self.core.lock().await.record_id = Some(id),
            Err(e) => warn!(
                "Failed to create call record for {}: {}",
                self.config.session_id, e
            ),
        }
    }

    async fn persist_update(&self, id: &str, payload: Value) {
        if let Err(e) = self.services.store.update(CALLS, id, payload).await {
            warn!("Failed to update call record {}: {}", id, e);
        }
    }

    fn scenario_context(&self) -> String {
        let scenario = &self.config.scenario;
        if scenario.context.trim().is_empty() {
            scenario.title.clone()
        } else {
            scenario.context.clone()
        }
    }
}

#[async_trait]
impl PollTarget for Inner {
    async fn deliver(&self, status: CallStatus, transcript: Option<String>) {
        let Some(this) = self.me.upgrade() else {
            return;
        };
        let mut core = this.core.lock().await;
        if core.torn_down || core.machine.session().is_settled() {
            return;
        }
        if status == CallStatus::Ended && core.transcript.is_empty() {
            if let Some(text) = transcript {
                let added = core.transcript.import_text(&text);
                debug!("Imported {} transcript lines from the backend", added);
            }
        }
        this.dispatch(&mut core, CallEvent::StatusObserved(status));
    }
}
