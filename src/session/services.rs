use crate::analysis::{AnalysisTrigger, Analyzer, LlmAnalyzer};
use crate::backend::{
    CallBackend, HttpCallBackend, SimulationBackend, SimulationRegistry,
};
use crate::call::PollIntervals;
use crate::config::{Config, SpeechConfig};
use crate::store::{MemoryStore, RecordStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Collaborators shared by every call session of one application
#[derive(Clone)]
pub struct CallServices {
    /// Hosted voice provider
    pub provider: Arc<dyn CallBackend>,

    pub simulation: Arc<SimulationBackend>,

    /// Fall back to the simulation when the provider cannot dispatch
    pub simulation_fallback: bool,

    pub provider_intervals: PollIntervals,
    pub simulation_intervals: PollIntervals,

    /// Per status request
    pub status_timeout: Duration,

    /// Hang-up request on user-initiated ends
    pub end_timeout: Duration,

    pub analysis: AnalysisTrigger,

    pub store: Arc<dyn RecordStore>,

    pub speech: SpeechConfig,
}

impl CallServices {
    pub fn from_config(config: &Config) -> Self {
        let analyzer: Option<Arc<dyn Analyzer>> = if config.analysis.is_configured() {
            Some(Arc::new(LlmAnalyzer::new(config.analysis.clone())))
        } else {
            info!("Analysis provider not configured, scorecards will use the fallback");
            None
        };
        if !config.voice.is_configured() {
            info!("Voice provider not configured, calls will run in demo mode");
        }

        let polling = &config.polling;
        Self {
            provider: Arc::new(HttpCallBackend::new(config.voice.clone())),
            simulation: Arc::new(SimulationBackend::new(
                SimulationRegistry::new(),
                (&config.simulation).into(),
            )),
            simulation_fallback: config.simulation.fallback_enabled,
            provider_intervals: PollIntervals {
                fast: Duration::from_millis(polling.fast_ms),
                slow: Duration::from_millis(polling.slow_ms),
            },
            simulation_intervals: PollIntervals {
                fast: Duration::from_millis(polling.simulation_fast_ms),
                slow: Duration::from_millis(polling.simulation_slow_ms),
            },
            status_timeout: config.voice.status_timeout(),
            end_timeout: config.voice.end_timeout(),
            analysis: AnalysisTrigger::new(analyzer, config.analysis.timeout()),
            store: Arc::new(MemoryStore::new()),
            speech: config.speech.clone(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn CallBackend>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisTrigger) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn registry(&self) -> &SimulationRegistry {
        self.simulation.registry()
    }

    pub(crate) fn backend(&self, simulated: bool) -> Arc<dyn CallBackend> {
        if simulated {
            self.simulation.clone()
        } else {
            Arc::clone(&self.provider)
        }
    }

    pub(crate) fn intervals(&self, simulated: bool) -> PollIntervals {
        if simulated {
            self.simulation_intervals
        } else {
            self.provider_intervals
        }
    }
}
