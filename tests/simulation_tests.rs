// Simulated call backend tests (virtual time)

use linguacall::backend::{InitiateRequest, SimulationTiming};
use linguacall::call::{normalize_status, CallStatus};
use linguacall::{CallBackend, SimulationBackend, SimulationRegistry};
use std::time::Duration;
use tokio::time::advance;

fn request(scenario_id: &str) -> InitiateRequest {
    InitiateRequest {
        phone_number: "555-0100".to_string(),
        language: "French".to_string(),
        scenario_id: scenario_id.to_string(),
        scenario: "Hotel check-in".to_string(),
        difficulty: "Beginner".to_string(),
        user_id: "user-1".to_string(),
        session_id: "session-1".to_string(),
    }
}

async fn status_of(backend: &SimulationBackend, call_id: &str) -> Option<CallStatus> {
    let report = backend.get_status(call_id).await.unwrap();
    normalize_status(&report.status)
}

#[tokio::test(start_paused = true)]
async fn progresses_ringing_connected_ended_in_order() {
    let backend = SimulationBackend::new(SimulationRegistry::new(), SimulationTiming::default());
    let receipt = backend.initiate(&request("travel-hotel")).await.unwrap();
    let call_id = receipt.call_id;

    assert_eq!(
        status_of(&backend, &call_id).await,
        Some(CallStatus::Initiating)
    );

    advance(Duration::from_secs(1)).await;
    assert_eq!(status_of(&backend, &call_id).await, Some(CallStatus::Ringing));

    advance(Duration::from_secs(3)).await;
    assert_eq!(
        status_of(&backend, &call_id).await,
        Some(CallStatus::Connected)
    );

    advance(Duration::from_secs(300)).await;
    let report = backend.get_status(&call_id).await.unwrap();
    assert_eq!(normalize_status(&report.status), Some(CallStatus::Ended));
    assert!(report.transcript.is_some_and(|t| t.contains("check")));
}

#[tokio::test(start_paused = true)]
async fn transcript_is_withheld_until_the_call_ends() {
    let backend = SimulationBackend::new(SimulationRegistry::new(), SimulationTiming::default());
    let call_id = backend.initiate(&request("job-interview")).await.unwrap().call_id;

    advance(Duration::from_secs(10)).await;
    assert!(backend.get_status(&call_id).await.unwrap().transcript.is_none());

    let ended = backend.end(&call_id).await.unwrap();
    assert!(ended.success);
    let report = backend.get_status(&call_id).await.unwrap();
    assert_eq!(report.status, "ended");
    assert!(report.transcript.is_some());
}

#[tokio::test(start_paused = true)]
async fn registries_are_independent() {
    let first = SimulationBackend::new(SimulationRegistry::new(), SimulationTiming::default());
    let second = SimulationBackend::new(SimulationRegistry::new(), SimulationTiming::default());

    let call_id = first.initiate(&request("casual")).await.unwrap().call_id;
    assert_eq!(first.registry().len().await, 1);
    assert!(second.registry().is_empty().await);
    assert_eq!(second.get_status(&call_id).await.unwrap().status, "not_found");
    assert!(!second.end(&call_id).await.unwrap().success);

    assert!(first.registry().delete(&call_id).await.is_some());
    assert!(first.registry().is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn custom_timing_is_honored() {
    let timing = SimulationTiming {
        ring_after: Duration::from_millis(200),
        connect_after: Duration::from_millis(500),
        max_duration: Duration::from_secs(5),
    };
    let backend = SimulationBackend::new(SimulationRegistry::new(), timing);
    let call_id = backend.initiate(&request("casual")).await.unwrap().call_id;

    advance(Duration::from_millis(500)).await;
    assert_eq!(
        status_of(&backend, &call_id).await,
        Some(CallStatus::Connected)
    );
    advance(Duration::from_secs(5)).await;
    assert_eq!(status_of(&backend, &call_id).await, Some(CallStatus::Ended));
}
