pub mod analysis;
pub mod backend;
pub mod call;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod speech;
pub mod store;

pub use analysis::{AnalysisRequest, AnalysisResult, AnalysisTrigger, Analyzer, LlmAnalyzer};
pub use backend::{CallBackend, HttpCallBackend, SimulationBackend, SimulationRegistry};
pub use call::{CallSession, CallStateMachine, CallStatus, TranscriptLog};
pub use config::Config;
pub use error::{AnalysisError, BackendError, StoreError};
pub use http::{create_router, AppState};
pub use session::{CallController, CallServices, SessionConfig, SessionSnapshot};
pub use speech::{SpeechBridge, SpeechCapabilities, SpeechLoop};
pub use store::{MemoryStore, RecordStore};
