//! Call session management
//!
//! This module provides the `CallController` abstraction that manages:
//! - Dispatch through the voice provider, with simulation fallback
//! - Status polling, the duration ticker and speech restarts
//! - The transcript, the speech loop and the analysis trigger
//! - Persistence of call and analytics records

mod config;
mod services;
mod session;
mod stats;

pub use config::{ScenarioInfo, SessionConfig};
pub use services::CallServices;
pub use session::CallController;
pub use stats::{SessionSnapshot, TranscriptView};
