//! Error types for the collaborator seams.
//!
//! Orchestration code uses `anyhow`; these typed errors exist where the
//! caller has to pick a recovery path based on *what* failed.

use thiserror::Error;

/// Failures reported by a call backend (real provider or simulation)
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("voice provider is not configured")]
    NotConfigured,

    #[error("phone number must include country code (e.g. +15551234567): {0}")]
    InvalidPhoneNumber(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("voice provider is unreachable: {0}")]
    Unreachable(String),

    #[error("voice provider rejected credentials")]
    Unauthorized,

    #[error("voice provider returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("call not found: {0}")]
    CallNotFound(String),
}

impl BackendError {
    /// Short user-facing explanation shown with the demo-mode notice
    pub fn fallback_reason(&self) -> &'static str {
        match self {
            BackendError::Unreachable(_) => "Voice service not configured or unreachable",
            BackendError::Timeout(_) => "Voice service not responding",
            BackendError::NotConfigured => "Voice service configuration missing",
            BackendError::InvalidPhoneNumber(_) => "Phone number is missing a country code",
            _ => "Voice API service unavailable",
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            BackendError::Unreachable(err.to_string())
        } else if err.is_decode() {
            BackendError::Malformed(err.to_string())
        } else {
            BackendError::Unreachable(err.to_string())
        }
    }
}

/// Failures from the analysis collaborator
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis provider is not configured")]
    NotConfigured,

    #[error("transcript too short for analysis ({0} chars)")]
    TranscriptTooShort(usize),

    #[error("analysis request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("analysis provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("analysis provider returned no content")]
    EmptyContent,

    #[error("could not parse analysis: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("analysis timed out")]
    Timeout,
}

/// Failures from the record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("payload is not a JSON object")]
    InvalidPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_reason_reflects_failure_kind() {
        assert_eq!(
            BackendError::Timeout("dispatch".into()).fallback_reason(),
            "Voice service not responding"
        );
        assert_eq!(
            BackendError::NotConfigured.fallback_reason(),
            "Voice service configuration missing"
        );
        assert_eq!(
            BackendError::Unauthorized.fallback_reason(),
            "Voice API service unavailable"
        );
    }
}
