//! Call backends: the real voice provider and the local simulation

mod http;
mod simulation;

pub use http::HttpCallBackend;
pub use simulation::{
    canned_transcript, SimulatedCall, SimulationBackend, SimulationRegistry, SimulationTiming,
};

use crate::error::BackendError;
use serde::{Deserialize, Serialize};

/// Everything a backend needs to place a practice call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateRequest {
    pub phone_number: String,
    pub language: String,
    /// Scenario id, used to pick canned content in the simulation
    pub scenario_id: String,
    /// Free-text scenario context handed to the provider's agent
    pub scenario: String,
    pub difficulty: String,
    pub user_id: String,
    pub session_id: String,
}

/// Accepted dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub call_id: String,
    pub status: String,
    pub message: String,
}

/// Raw status as reported by the backend; normalized by the poller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndReport {
    pub success: bool,
    pub message: String,
}

/// Call backend trait
///
/// Implementations:
/// - [`HttpCallBackend`]: hosted voice-call provider over HTTPS
/// - [`SimulationBackend`]: local, time-driven stand-in for demo mode
#[async_trait::async_trait]
pub trait CallBackend: Send + Sync {
    /// Dispatch a call and return its identifier
    async fn initiate(&self, request: &InitiateRequest) -> Result<DispatchReceipt, BackendError>;

    /// Current status of a dispatched call
    async fn get_status(&self, call_id: &str) -> Result<StatusReport, BackendError>;

    /// Ask the backend to hang up
    async fn end(&self, call_id: &str) -> Result<EndReport, BackendError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
