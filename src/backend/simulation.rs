use super::{CallBackend, DispatchReceipt, EndReport, InitiateRequest, StatusReport};
use crate::config::SimulationConfig;
use crate::error::BackendError;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;

/// A locally simulated call
#[derive(Debug, Clone)]
pub struct SimulatedCall {
    pub call_id: String,
    pub scenario_id: String,
    pub language: String,
    pub difficulty: String,
    pub created_at: Instant,
    /// Set when the call was hung up explicitly
    pub ended_at: Option<Instant>,
}

/// Simulated progression: `initiating -> ringing -> connected -> ended`
#[derive(Debug, Clone, Copy)]
pub struct SimulationTiming {
    pub ring_after: Duration,
    pub connect_after: Duration,
    pub max_duration: Duration,
}

impl From<&SimulationConfig> for SimulationTiming {
    fn from(cfg: &SimulationConfig) -> Self {
        Self {
            ring_after: Duration::from_millis(cfg.ring_after_ms),
            connect_after: Duration::from_millis(cfg.connect_after_ms),
            max_duration: Duration::from_secs(cfg.max_duration_secs),
        }
    }
}

impl Default for SimulationTiming {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

impl SimulatedCall {
    /// Status is a pure function of elapsed time and the hang-up flag
    pub fn status_at(&self, timing: &SimulationTiming, now: Instant) -> &'static str {
        if self.ended_at.is_some() {
            return "ended";
        }
        let elapsed = now.saturating_duration_since(self.created_at);
        if elapsed < timing.ring_after {
            "initiating"
        } else if elapsed < timing.connect_after {
            "ringing"
        } else if elapsed - timing.connect_after >= timing.max_duration {
            "ended"
        } else {
            "connected"
        }
    }
}

/// Explicitly owned store of simulated calls, one per application
#[derive(Debug, Clone, Default)]
pub struct SimulationRegistry {
    calls: Arc<RwLock<HashMap<String, SimulatedCall>>>,
}

impl SimulationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, call: SimulatedCall) {
        let mut calls = self.calls.write().await;
        calls.insert(call.call_id.clone(), call);
    }

    pub async fn get(&self, call_id: &str) -> Option<SimulatedCall> {
        let calls = self.calls.read().await;
        calls.get(call_id).cloned()
    }

    /// Apply `f` to a stored call; `false` if the id is unknown
    pub async fn update<F>(&self, call_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut SimulatedCall),
    {
        let mut calls = self.calls.write().await;
        match calls.get_mut(call_id) {
            Some(call) => {
                f(call);
                true
            }
            None => false,
        }
    }

    pub async fn delete(&self, call_id: &str) -> Option<SimulatedCall> {
        let mut calls = self.calls.write().await;
        calls.remove(call_id)
    }

    pub async fn len(&self) -> usize {
        self.calls.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.calls.read().await.is_empty()
    }
}

/// Local stand-in for the voice provider (demo mode)
#[derive(Debug, Clone)]
pub struct SimulationBackend {
    registry: SimulationRegistry,
    timing: SimulationTiming,
}

impl SimulationBackend {
    pub fn new(registry: SimulationRegistry, timing: SimulationTiming) -> Self {
        Self { registry, timing }
    }

    pub fn registry(&self) -> &SimulationRegistry {
        &self.registry
    }

    fn generate_call_id() -> String {
        const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut rng = rand::thread_rng();
        let suffix: String = (0..9)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        format!(
            "mock_call_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            suffix
        )
    }
}

#[async_trait::async_trait]
impl CallBackend for SimulationBackend {
    async fn initiate(&self, request: &InitiateRequest) -> Result<DispatchReceipt, BackendError> {
        let call_id = Self::generate_call_id();
        self.registry
            .create(SimulatedCall {
                call_id: call_id.clone(),
                scenario_id: request.scenario_id.clone(),
                language: request.language.clone(),
                difficulty: request.difficulty.clone(),
                created_at: Instant::now(),
                ended_at: None,
            })
            .await;

        info!(
            "Simulated call {} started for session {}",
            call_id, request.session_id
        );

        Ok(DispatchReceipt {
            call_id,
            status: "initiated".to_string(),
            message: "Mock call initiated successfully".to_string(),
        })
    }

    async fn get_status(&self, call_id: &str) -> Result<StatusReport, BackendError> {
        let Some(call) = self.registry.get(call_id).await else {
            return Ok(StatusReport {
                status: "not_found".to_string(),
                transcript: None,
            });
        };

        let status = call.status_at(&self.timing, Instant::now());
        let transcript = (status == "ended").then(|| canned_transcript(&call.scenario_id).to_string());

        Ok(StatusReport {
            status: status.to_string(),
            transcript,
        })
    }

    async fn end(&self, call_id: &str) -> Result<EndReport, BackendError> {
        let now = Instant::now();
        let found = self
            .registry
            .update(call_id, |call| {
                call.ended_at.get_or_insert(now);
            })
            .await;

        Ok(if found {
            EndReport {
                success: true,
                message: "Call ended successfully".to_string(),
            }
        } else {
            EndReport {
                success: false,
                message: "Call not found".to_string(),
            }
        })
    }

    fn name(&self) -> &str {
        "simulation"
    }
}

/// Scripted conversation returned once a simulated call has ended
pub fn canned_transcript(scenario_id: &str) -> &'static str {
    match scenario_id {
        "job-interview" => "AI: Hello! Thank you for coming in today. Can you tell me a bit about yourself?
User: Hi, thank you for having me. I'm a software developer with 5 years of experience in web development.
AI: That's great! What programming languages are you most comfortable with?
User: I primarily work with JavaScript, React, and Node.js. I also have experience with Python and databases.
AI: Excellent. Can you describe a challenging project you've worked on recently?
User: Sure, I recently built a real-time chat application that handles thousands of concurrent users.",
        "travel-hotel" => "AI: Welcome to Grand Hotel! How can I help you today?
User: Hi, I have a reservation under the name Smith.
AI: Let me check that for you. Yes, I see your reservation for a deluxe room for 3 nights.
User: Great! Could you tell me about the hotel amenities?
AI: Of course! We have a fitness center, spa, restaurant, and free WiFi throughout the hotel.",
        _ => "AI: Hey! How's your weekend going?
User: It's been pretty good! I went hiking yesterday and tried a new restaurant.
AI: That sounds fun! Where did you go hiking?
User: I went to the local nature trail. The weather was perfect for it.
AI: Nice! And how was the restaurant? What kind of food did they serve?
User: It was a Thai restaurant. The pad thai was amazing, and the service was excellent.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InitiateRequest {
        InitiateRequest {
            phone_number: "+15551234567".into(),
            language: "Spanish".into(),
            scenario_id: "travel-hotel".into(),
            scenario: "Checking into a hotel".into(),
            difficulty: "Beginner".into(),
            user_id: "u1".into(),
            session_id: "s1".into(),
        }
    }

    #[test]
    fn call_ids_follow_mock_format() {
        let id = SimulationBackend::generate_call_id();
        assert!(id.starts_with("mock_call_"));
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_end_overrides_progression() {
        let backend = SimulationBackend::new(SimulationRegistry::new(), SimulationTiming::default());
        let receipt = backend.initiate(&request()).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(backend.get_status(&receipt.call_id).await.unwrap().status, "ringing");

        let ended = backend.end(&receipt.call_id).await.unwrap();
        assert!(ended.success);

        let report = backend.get_status(&receipt.call_id).await.unwrap();
        assert_eq!(report.status, "ended");
        assert!(report.transcript.unwrap().contains("Grand Hotel"));
    }

    #[tokio::test]
    async fn unknown_calls_report_not_found() {
        let backend = SimulationBackend::new(SimulationRegistry::new(), SimulationTiming::default());
        let report = backend.get_status("missing").await.unwrap();
        assert_eq!(report.status, "not_found");
        assert!(!backend.end("missing").await.unwrap().success);
    }

    #[tokio::test]
    async fn registry_supports_crud() {
        let registry = SimulationRegistry::new();
        registry
            .create(SimulatedCall {
                call_id: "c1".into(),
                scenario_id: "casual-conversation".into(),
                language: "English".into(),
                difficulty: "Advanced".into(),
                created_at: Instant::now(),
                ended_at: None,
            })
            .await;

        assert_eq!(registry.len().await, 1);
        assert!(registry.update("c1", |c| c.difficulty = "Beginner".into()).await);
        assert_eq!(registry.get("c1").await.unwrap().difficulty, "Beginner");
        assert!(!registry.update("c2", |_| {}).await);
        assert!(registry.delete("c1").await.is_some());
        assert!(registry.is_empty().await);
    }
}
