use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub voice: VoiceConfig,
    pub analysis: AnalysisConfig,
    pub polling: PollingConfig,
    pub simulation: SimulationConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "linguacall".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

/// Real voice-call provider.
///
/// An empty `api_key` leaves the provider unconfigured; every call then
/// runs against the simulation backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub base_url: String,
    pub api_key: String,
    /// Skip agent discovery and dispatch with this agent
    pub agent_id: Option<String>,
    pub status_timeout_secs: u64,
    pub dispatch_timeout_secs: u64,
    pub agent_timeout_secs: u64,
    pub end_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://backend.omnidim.io/api/v1".to_string(),
            api_key: String::new(),
            agent_id: None,
            status_timeout_secs: 5,
            dispatch_timeout_secs: 15,
            agent_timeout_secs: 10,
            end_timeout_secs: 5,
        }
    }
}

impl VoiceConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    pub fn end_timeout(&self) -> Duration {
        Duration::from_secs(self.end_timeout_secs)
    }
}

/// OpenAI-compatible chat completions endpoint used for scorecards
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: String::new(),
            model: "llama-3.1-70b-versatile".to_string(),
            temperature: 0.3,
            max_tokens: 1500,
            timeout_secs: 20,
        }
    }
}

impl AnalysisConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Cadence while a real call is ringing
    pub fast_ms: u64,
    /// Cadence once a real call is connected
    pub slow_ms: u64,
    pub simulation_fast_ms: u64,
    pub simulation_slow_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fast_ms: 3_000,
            slow_ms: 10_000,
            simulation_fast_ms: 2_000,
            simulation_slow_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fall back to the simulation when the real provider cannot dispatch
    pub fallback_enabled: bool,
    pub ring_after_ms: u64,
    pub connect_after_ms: u64,
    /// Connected calls end on their own after this many seconds
    pub max_duration_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            ring_after_ms: 1_000,
            connect_after_ms: 3_000,
            max_duration_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Expose the speech bridge to clients; disabled means text-only calls
    pub enabled: bool,
    pub restart_delay_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    /// Utterances must be longer than this many characters
    pub min_utterance_chars: usize,
    pub min_confidence: f32,
    /// Low-confidence utterances longer than this are still accepted
    pub long_utterance_chars: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            restart_delay_ms: 1_000,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 10_000,
            min_utterance_chars: 2,
            min_confidence: 0.5,
            long_utterance_chars: 10,
        }
    }
}

impl Config {
    /// Load configuration from `path` (any format the `config` crate
    /// understands), then apply `LINGUACALL__SECTION__KEY` overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("LINGUACALL").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to deserialize config")
    }
}
