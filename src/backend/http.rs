use super::{CallBackend, DispatchReceipt, EndReport, InitiateRequest, StatusReport};
use crate::config::VoiceConfig;
use crate::error::BackendError;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Country code followed by at least ten digits
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+\d{1,3}\d{10,}$").expect("valid phone regex"));

/// Strip formatting characters and require an international number
pub fn normalize_phone_number(raw: &str) -> Result<String, BackendError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if PHONE_PATTERN.is_match(&cleaned) {
        Ok(cleaned)
    } else {
        Err(BackendError::InvalidPhoneNumber(cleaned))
    }
}

#[derive(Debug, Deserialize)]
struct Agent {
    id: Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl Agent {
    fn is_language_coach(&self) -> bool {
        let name = self.name.as_deref().unwrap_or_default().to_lowercase();
        let description = self.description.as_deref().unwrap_or_default().to_lowercase();
        name.contains("language coach")
            || description.contains("language")
            || description.contains("coach")
    }
}

/// Hosted voice-call provider
#[derive(Clone)]
pub struct HttpCallBackend {
    client: Client,
    config: VoiceConfig,
}

impl HttpCallBackend {
    pub fn new(config: VoiceConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.config.api_key)
            .header("Accept", "application/json")
    }

    async fn check_response(response: reqwest::Response) -> Result<Value, BackendError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let data: Value = response.json().await?;
        // Some deployments wrap the payload in a `json` envelope
        Ok(match data.get("json") {
            Some(inner) if inner.is_object() => inner.clone(),
            _ => data,
        })
    }

    /// Configured agent, an existing language-coach agent, or a new one
    async fn resolve_agent(&self, request: &InitiateRequest) -> Result<String, BackendError> {
        if let Some(agent_id) = &self.config.agent_id {
            return Ok(agent_id.clone());
        }

        let listed = self
            .authorized(self.client.get(self.url("agents")))
            .timeout(self.config.agent_timeout())
            .send()
            .await;

        match listed {
            Ok(response) => match Self::check_response(response).await {
                Ok(data) => {
                    if let Some(agent) = parse_agents(data).into_iter().find(Agent::is_language_coach) {
                        debug!("Reusing agent {}", agent.id);
                        return id_to_string(&agent.id)
                            .ok_or_else(|| BackendError::Malformed("agent id".to_string()));
                    }
                }
                Err(e) => warn!("Listing agents failed: {}", e),
            },
            Err(e) => warn!("Listing agents failed: {}", e),
        }

        info!("Creating language coach agent for {}", request.language);
        let body = json!({
            "name": format!("Language Coach - {}", request.language),
            "description": format!("AI language coach for {} conversation practice", request.language),
            "system_prompt": call_instructions(request),
            "voice": "sarah",
            "language": request.language.to_lowercase(),
        });
        let response = self
            .authorized(self.client.post(self.url("agents")))
            .timeout(self.config.dispatch_timeout())
            .json(&body)
            .send()
            .await?;
        let created = Self::check_response(response).await?;
        created
            .get("id")
            .and_then(id_to_string)
            .ok_or_else(|| BackendError::Malformed("created agent has no id".to_string()))
    }
}

fn parse_agents(data: Value) -> Vec<Agent> {
    let list = match data {
        Value::Array(_) => data,
        Value::Object(mut map) => map
            .remove("agents")
            .or_else(|| map.remove("data"))
            .unwrap_or(Value::Array(Vec::new())),
        _ => Value::Array(Vec::new()),
    };
    serde_json::from_value(list).unwrap_or_default()
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn call_instructions(request: &InitiateRequest) -> String {
    format!(
        "You are a friendly {language} language coach on a practice phone call. \
         Scenario: {scenario}. Learner level: {difficulty}. \
         Speak only {language}, keep turns short, gently correct mistakes, \
         and encourage the learner to keep talking.",
        language = request.language,
        scenario = request.scenario,
        difficulty = request.difficulty,
    )
}

#[async_trait::async_trait]
impl CallBackend for HttpCallBackend {
    async fn initiate(&self, request: &InitiateRequest) -> Result<DispatchReceipt, BackendError> {
        if !self.config.is_configured() {
            return Err(BackendError::NotConfigured);
        }

        let to_number = normalize_phone_number(&request.phone_number)?;
        let agent_id = self.resolve_agent(request).await?;
        // The provider expects a numeric agent id when it is one
        let agent_id = agent_id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(agent_id));

        info!("Dispatching call to {} with agent {}", to_number, agent_id);

        let body = json!({
            "agent_id": agent_id,
            "to_number": to_number,
            "call_context": {
                "scenario": request.scenario,
                "language": request.language,
                "difficulty": request.difficulty,
                "session_id": request.session_id,
                "user_id": request.user_id,
                "customer_name": "Language Learner",
                "practice_type": "language_coaching",
                "priority": "normal",
            },
        });

        let response = self
            .authorized(self.client.post(self.url("calls/dispatch")))
            .timeout(self.config.dispatch_timeout())
            .json(&body)
            .send()
            .await?;
        let data = Self::check_response(response).await?;

        let call_id = ["requestId", "call_log_id", "id"]
            .iter()
            .find_map(|key| data.get(*key).and_then(id_to_string))
            .ok_or_else(|| BackendError::Malformed("dispatch response has no call id".to_string()))?;

        Ok(DispatchReceipt {
            call_id,
            status: data
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("initiated")
                .to_string(),
            message: data
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Call dispatched successfully")
                .to_string(),
        })
    }

    async fn get_status(&self, call_id: &str) -> Result<StatusReport, BackendError> {
        let response = self
            .authorized(self.client.get(self.url(&format!("calls/logs/{}", call_id))))
            .timeout(self.config.status_timeout())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::CallNotFound(call_id.to_string()));
        }
        let data = Self::check_response(response).await?;

        let status = data
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let transcript = ["transcript", "call_transcript"]
            .iter()
            .find_map(|key| data.get(*key).and_then(Value::as_str))
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string);

        Ok(StatusReport { status, transcript })
    }

    async fn end(&self, call_id: &str) -> Result<EndReport, BackendError> {
        // The provider has no hang-up endpoint; calls end on their own
        info!("End requested for call {}; provider ends calls naturally", call_id);
        Ok(EndReport {
            success: true,
            message: "Call end requested successfully".to_string(),
        })
    }

    fn name(&self) -> &str {
        "voice-provider"
    }
}
