use super::{AnalysisRequest, AnalysisResult, Analyzer};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are an expert language learning coach and conversation analyst. \
Analyze conversations and provide detailed, constructive feedback to help learners improve \
their language skills. Always respond with valid JSON only.";

const DEFAULT_FEEDBACK: &str = "Good conversation practice session.";

/// Scorecards from an OpenAI-compatible chat completions endpoint
pub struct LlmAnalyzer {
    client: Client,
    config: AnalysisConfig,
}

impl LlmAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl Analyzer for LlmAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        if !self.config.is_configured() {
            return Err(AnalysisError::NotConfigured);
        }

        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(request) },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: Completion = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AnalysisError::EmptyContent)?;

        debug!("Analysis response: {} chars", content.len());
        parse_scorecard(&content)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

fn build_prompt(request: &AnalysisRequest) -> String {
    format!(
        r#"Analyze this {language} conversation practice session and provide detailed feedback in JSON format.

Scenario Context: {scenario}
User Level: {level}
Language: {language}

Conversation Transcript:
{transcript}

Provide analysis in this exact JSON structure:
{{
  "fluency": 85,
  "confidence": 78,
  "grammar": 82,
  "vocabulary": 80,
  "pronunciation": 75,
  "hesitations": ["occasional pauses"],
  "suggestions": ["practice speaking more naturally"],
  "strengths": ["clear communication"],
  "weaknesses": ["could speak more fluently"],
  "overallScore": 80,
  "detailedFeedback": "Comprehensive feedback paragraph here",
  "improvementAreas": ["fluency"],
  "nextSteps": ["practice daily"]
}}

All scores are integers from 0 to 100. Keep the feedback constructive and encouraging."#,
        language = request.language,
        scenario = request.scenario_context,
        level = request.difficulty,
        transcript = request.transcript,
    )
}

/// Parse the model's JSON, clamping scores and filling gaps with defaults
pub(crate) fn parse_scorecard(content: &str) -> Result<AnalysisResult, AnalysisError> {
    let parsed: Value = serde_json::from_str(content.trim())?;

    let mut result = AnalysisResult {
        fluency: score(&parsed, "fluency", 75),
        confidence: score(&parsed, "confidence", 70),
        grammar: score(&parsed, "grammar", 80),
        vocabulary: score(&parsed, "vocabulary", 75),
        pronunciation: score(&parsed, "pronunciation", 70),
        overall_score: 0,
        suggestions: strings(&parsed, "suggestions"),
        strengths: strings(&parsed, "strengths"),
        weaknesses: strings(&parsed, "weaknesses"),
        hesitations: strings(&parsed, "hesitations"),
        detailed_feedback: Some(
            parsed
                .get("detailedFeedback")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(DEFAULT_FEEDBACK)
                .to_string(),
        ),
        improvement_areas: strings(&parsed, "improvementAreas"),
        next_steps: strings(&parsed, "nextSteps"),
        is_fallback: false,
    };
    result.overall_score = match number(&parsed, "overallScore") {
        Some(n) => clamp(n),
        None => result.mean_score(),
    };
    Ok(result)
}

fn number(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64).filter(|n| *n != 0.0)
}

fn score(value: &Value, key: &str, default: u8) -> u8 {
    number(value, key).map(clamp).unwrap_or(default)
}

fn clamp(n: f64) -> u8 {
    n.round().clamp(0.0, 100.0) as u8
}

fn strings(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
