use crate::backend::InitiateRequest;
use serde::{Deserialize, Serialize};

/// Practice scenario the call is built around
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioInfo {
    /// Template id (e.g. "job-interview"); selects canned simulation content
    pub id: String,

    pub title: String,

    /// Free-text context handed to the agent and the analyzer
    #[serde(default)]
    pub context: String,
}

/// Configuration for a call session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "call-3f1c...")
    pub session_id: String,

    /// International format; validated by the real backend only
    pub phone_number: String,

    /// Language name as chosen by the learner (e.g., "Spanish")
    pub language: String,

    pub scenario: ScenarioInfo,

    /// Beginner, Intermediate or Advanced
    pub difficulty: String,

    pub user_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("call-{}", uuid::Uuid::new_v4()),
            phone_number: String::new(),
            language: "English".to_string(),
            scenario: ScenarioInfo {
                id: "casual-conversation".to_string(),
                title: "Casual Conversation".to_string(),
                context: "A relaxed everyday conversation".to_string(),
            },
            difficulty: "Intermediate".to_string(),
            user_id: "anonymous".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn initiate_request(&self) -> InitiateRequest {
        let scenario = if self.scenario.context.trim().is_empty() {
            self.scenario.title.clone()
        } else {
            format!("{}: {}", self.scenario.title, self.scenario.context)
        };
        InitiateRequest {
            phone_number: self.phone_number.clone(),
            language: self.language.clone(),
            scenario_id: self.scenario.id.clone(),
            scenario,
            difficulty: self.difficulty.clone(),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}
