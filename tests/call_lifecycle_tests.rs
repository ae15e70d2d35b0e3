// Call lifecycle tests against the session controller
//
// All tests run on tokio's paused clock: the poller, the duration ticker
// and the simulation progress in virtual time.

use linguacall::analysis::AnalysisRequest;
use linguacall::backend::{DispatchReceipt, EndReport, InitiateRequest, StatusReport};
use linguacall::call::CallStatus;
use linguacall::store::{ANALYTICS, CALLS};
use linguacall::{
    AnalysisError, AnalysisResult, AnalysisTrigger, Analyzer, BackendError, CallBackend,
    CallController, CallServices, Config, MemoryStore, SessionConfig, SpeechCapabilities,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

/// Provider whose reported status is set by the test
struct ScriptedProvider {
    status: Mutex<Result<String, String>>,
    transcript: Mutex<Option<String>>,
    dispatch_fails: bool,
    polls: AtomicUsize,
    ends: AtomicUsize,
}

impl ScriptedProvider {
    fn build(dispatch_fails: bool) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(Ok("queued".to_string())),
            transcript: Mutex::new(None),
            dispatch_fails,
            polls: AtomicUsize::new(0),
            ends: AtomicUsize::new(0),
        })
    }

    fn new() -> Arc<Self> {
        Self::build(false)
    }

    fn unreachable() -> Arc<Self> {
        Self::build(true)
    }

    fn report(&self, status: &str) {
        *self.status.lock().unwrap() = Ok(status.to_string());
    }

    fn fail_polls(&self) {
        *self.status.lock().unwrap() = Err("connection reset".to_string());
    }
}

#[async_trait::async_trait]
impl CallBackend for ScriptedProvider {
    async fn initiate(&self, _: &InitiateRequest) -> Result<DispatchReceipt, BackendError> {
        if self.dispatch_fails {
            return Err(BackendError::Unreachable("connection refused".to_string()));
        }
        Ok(DispatchReceipt {
            call_id: "provider-call-1".to_string(),
            status: "queued".to_string(),
            message: "Call dispatched".to_string(),
        })
    }

    async fn get_status(&self, _: &str) -> Result<StatusReport, BackendError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let status = self.status.lock().unwrap().clone();
        match status {
            Ok(status) => Ok(StatusReport {
                status,
                transcript: self.transcript.lock().unwrap().clone(),
            }),
            Err(e) => Err(BackendError::Unreachable(e)),
        }
    }

    async fn end(&self, _: &str) -> Result<EndReport, BackendError> {
        self.ends.fetch_add(1, Ordering::SeqCst);
        Ok(EndReport {
            success: true,
            message: "Call ended".to_string(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Analyzer that takes its time before giving up
struct SlowAnalyzer {
    delay: Duration,
}

#[async_trait::async_trait]
impl Analyzer for SlowAnalyzer {
    async fn analyze(&self, _: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        sleep(self.delay).await;
        Err(AnalysisError::EmptyContent)
    }

    fn name(&self) -> &str {
        "slow"
    }
}

fn session(language: &str) -> SessionConfig {
    SessionConfig {
        phone_number: "+15551234567".to_string(),
        language: language.to_string(),
        difficulty: "Beginner".to_string(),
        ..SessionConfig::default()
    }
}

fn services(store: &MemoryStore) -> CallServices {
    CallServices::from_config(&Config::default()).with_store(Arc::new(store.clone()))
}

async fn wait_for_status(rx: &mut watch::Receiver<CallStatus>, target: CallStatus) {
    timeout(Duration::from_secs(900), rx.wait_for(|s| *s == target))
        .await
        .expect("status never reached")
        .expect("session dropped");
}

async fn wait_for_analysis(controller: &CallController) {
    let mut rx = controller.subscribe_analysis();
    timeout(Duration::from_secs(60), rx.wait_for(|a| a.is_some()))
        .await
        .expect("analysis never arrived")
        .expect("session dropped");
    // Persistence follows the analysis in the same task
    sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn unconfigured_provider_falls_back_to_demo_mode() {
    let store = MemoryStore::new();
    let controller =
        CallController::start(session("English"), services(&store), SpeechCapabilities::unavailable())
            .await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, CallStatus::Ringing);
    assert!(snapshot.demo_mode);
    assert_eq!(
        snapshot.demo_mode_reason.as_deref(),
        Some("Voice service configuration missing")
    );
    assert!(snapshot
        .call_id
        .as_deref()
        .is_some_and(|id| id.starts_with("mock_call_")));

    let calls = store.all(CALLS).await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["status"], "initiating");

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn demo_call_runs_to_completion_on_its_own() {
    let store = MemoryStore::new();
    let controller =
        CallController::start(session("English"), services(&store), SpeechCapabilities::unavailable())
            .await;
    let mut status = controller.subscribe_status();

    wait_for_status(&mut status, CallStatus::Connected).await;
    assert!(controller.snapshot().await.started_at.is_some());

    wait_for_status(&mut status, CallStatus::Ended).await;
    wait_for_analysis(&controller).await;

    let snapshot = controller.snapshot().await;
    assert!(snapshot.duration_seconds >= 295 && snapshot.duration_seconds <= 305);
    assert_eq!(snapshot.live_timers, 0);

    // The simulation hands back a scripted transcript once it ends
    let transcript = controller.transcript().await;
    assert!(transcript.finalized);
    assert!(!transcript.entries.is_empty());

    let analysis = controller.analysis().unwrap();
    assert!(analysis.is_fallback);
    assert!((60..=75).contains(&analysis.overall_score));

    let calls = store.all(CALLS).await;
    assert_eq!(calls[0]["status"], "completed");
    assert_eq!(calls[0]["isMockCall"], true);
}

#[tokio::test(start_paused = true)]
async fn connected_is_announced_once_across_poll_cycles() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new();
    let controller = CallController::start(
        session("English"),
        services(&store).with_provider(provider.clone()),
        SpeechCapabilities::unavailable(),
    )
    .await;
    let mut status = controller.subscribe_status();
    assert!(!controller.snapshot().await.demo_mode);

    provider.report("in_progress");
    wait_for_status(&mut status, CallStatus::Connected).await;
    let started_at = controller.snapshot().await.started_at;

    // Several slow poll cycles keep reporting the same status
    sleep(Duration::from_secs(45)).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, CallStatus::Connected);
    assert_eq!(snapshot.started_at, started_at);
    assert!(provider.polls.load(Ordering::SeqCst) >= 4);
    // Ticker and exactly one poller
    assert_eq!(snapshot.live_timers, 2);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn duration_freezes_when_the_call_ends() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new();
    let controller = CallController::start(
        session("English"),
        services(&store).with_provider(provider.clone()),
        SpeechCapabilities::unavailable(),
    )
    .await;
    let mut status = controller.subscribe_status();

    provider.report("active");
    wait_for_status(&mut status, CallStatus::Connected).await;

    sleep(Duration::from_secs(10)).await;
    let live = controller.snapshot().await.duration_seconds;
    assert!((9..=10).contains(&live), "live duration {}", live);

    assert!(controller.end().await);
    let frozen = controller.snapshot().await.duration_seconds;
    assert!((9..=10).contains(&frozen), "frozen duration {}", frozen);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(controller.snapshot().await.duration_seconds, frozen);
}

#[tokio::test(start_paused = true)]
async fn ending_twice_runs_analysis_once() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new();
    let controller = CallController::start(
        session("English"),
        services(&store).with_provider(provider.clone()),
        SpeechCapabilities::unavailable(),
    )
    .await;
    let mut status = controller.subscribe_status();

    provider.report("ongoing");
    wait_for_status(&mut status, CallStatus::Connected).await;

    assert!(controller.end().await);
    assert!(!controller.end().await);
    wait_for_analysis(&controller).await;
    assert!(!controller.end().await);

    // A late poll result reporting the provider-side end changes nothing
    provider.report("completed");
    sleep(Duration::from_secs(30)).await;

    assert_eq!(store.all(ANALYTICS).await.len(), 1);
    assert_eq!(provider.ends.load(Ordering::SeqCst), 1);
    assert_eq!(controller.status(), CallStatus::Ended);
}

#[tokio::test(start_paused = true)]
async fn provider_end_imports_its_transcript() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new();
    let controller = CallController::start(
        session("English"),
        services(&store).with_provider(provider.clone()),
        SpeechCapabilities::unavailable(),
    )
    .await;
    let mut status = controller.subscribe_status();

    provider.report("connected");
    wait_for_status(&mut status, CallStatus::Connected).await;

    *provider.transcript.lock().unwrap() =
        Some("AI: Welcome to the hotel!\nUser: I have a reservation.".to_string());
    provider.report("completed");
    wait_for_status(&mut status, CallStatus::Ended).await;
    wait_for_analysis(&controller).await;

    let transcript = controller.transcript().await;
    assert_eq!(
        transcript.text,
        "Assistant: Welcome to the hotel!\nUser: I have a reservation."
    );
    // The provider ended the call itself; no hang-up request
    assert_eq!(provider.ends.load(Ordering::SeqCst), 0);
    assert_eq!(store.all(CALLS).await[0]["isRealCall"], true);
}

#[tokio::test(start_paused = true)]
async fn transient_poll_failures_are_swallowed() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new();
    let controller = CallController::start(
        session("English"),
        services(&store).with_provider(provider.clone()),
        SpeechCapabilities::unavailable(),
    )
    .await;
    let mut status = controller.subscribe_status();

    provider.fail_polls();
    sleep(Duration::from_secs(20)).await;
    assert_eq!(controller.status(), CallStatus::Ringing);
    assert!(provider.polls.load(Ordering::SeqCst) >= 5);

    provider.report("in_progress");
    wait_for_status(&mut status, CallStatus::Connected).await;
    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn provider_failure_ends_in_error_and_restart_redispatches() {
    let store = MemoryStore::new();
    let provider = ScriptedProvider::new();
    let controller = CallController::start(
        session("English"),
        services(&store).with_provider(provider.clone()),
        SpeechCapabilities::unavailable(),
    )
    .await;
    let mut status = controller.subscribe_status();

    provider.report("failed");
    wait_for_status(&mut status, CallStatus::Error).await;

    let snapshot = controller.snapshot().await;
    assert!(snapshot.last_error.is_some());
    assert_eq!(snapshot.live_timers, 0);
    assert!(controller.analysis().is_none());

    provider.report("ringing");
    assert!(controller.restart().await);
    wait_for_status(&mut status, CallStatus::Ringing).await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.restarts, 1);
    assert!(snapshot.last_error.is_none());
    assert!(snapshot.started_at.is_none());

    // Restart only applies to failed calls
    assert!(!controller.restart().await);
    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dispatch_failure_without_fallback_is_an_error() {
    let store = MemoryStore::new();
    let mut services = services(&store).with_provider(ScriptedProvider::unreachable());
    services.simulation_fallback = false;

    let controller =
        CallController::start(session("English"), services, SpeechCapabilities::unavailable())
            .await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.status, CallStatus::Error);
    assert!(snapshot.call_id.is_none());
    assert!(snapshot
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("unreachable")));

    sleep(Duration::from_millis(10)).await;
    assert_eq!(store.all(CALLS).await[0]["status"], "error");
}

#[tokio::test(start_paused = true)]
async fn unreachable_provider_reports_demo_reason() {
    let store = MemoryStore::new();
    let controller = CallController::start(
        session("English"),
        services(&store).with_provider(ScriptedProvider::unreachable()),
        SpeechCapabilities::unavailable(),
    )
    .await;

    let snapshot = controller.snapshot().await;
    assert!(snapshot.demo_mode);
    assert_eq!(
        snapshot.demo_mode_reason.as_deref(),
        Some("Voice service not configured or unreachable")
    );
    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn typed_messages_get_replies_in_text_only_demo_calls() {
    let store = MemoryStore::new();
    let controller =
        CallController::start(session("English"), services(&store), SpeechCapabilities::unavailable())
            .await;
    let mut status = controller.subscribe_status();
    wait_for_status(&mut status, CallStatus::Connected).await;

    assert!(controller.send_message("Hello there").await);
    assert!(controller.send_message("It is hard to order food").await);
    assert!(!controller.send_message("   ").await);

    let transcript = controller.transcript().await;
    assert_eq!(transcript.entries.len(), 4);
    assert!(transcript.text.starts_with("User: Hello there\nAssistant: "));
    assert!(transcript.entries[3].text.contains("challenging"));

    assert!(controller.end().await);
    assert!(!controller.send_message("Too late").await);
}

#[tokio::test(start_paused = true)]
async fn teardown_during_analysis_stores_nothing() {
    let store = MemoryStore::new();
    let analyzer = Arc::new(SlowAnalyzer {
        delay: Duration::from_secs(10),
    });
    let services = services(&store)
        .with_analysis(AnalysisTrigger::new(Some(analyzer), Duration::from_secs(60)));
    let controller =
        CallController::start(session("English"), services, SpeechCapabilities::unavailable())
            .await;
    let mut status = controller.subscribe_status();
    wait_for_status(&mut status, CallStatus::Connected).await;

    assert!(controller.send_message("I would like to book a table").await);
    assert!(controller.end().await);
    // Wrap-up is now waiting on the analyzer
    sleep(Duration::from_secs(1)).await;

    controller.shutdown().await;
    sleep(Duration::from_secs(30)).await;

    assert!(controller.analysis().is_none());
    assert!(store.all(ANALYTICS).await.is_empty());
    let calls = store.all(CALLS).await;
    assert_ne!(calls[0]["status"], "completed");
    assert_eq!(controller.snapshot().await.live_timers, 0);
}
