//! HTTP API server for practice-call clients
//!
//! This module provides a REST API for driving call sessions:
//! - POST /calls - Start a call (falls back to demo mode)
//! - GET /calls/:id - Session snapshot
//! - POST /calls/:id/end, POST /calls/:id/restart
//! - GET|POST /calls/:id/transcript - Read transcript / type a message
//! - POST /calls/:id/speech/{interim,final,error,end,spoken} - Speech events
//! - GET /calls/:id/speech/commands - Pending speech commands
//! - GET /calls/:id/analysis - Scorecard once the call has ended
//! - DELETE /calls/:id - Tear down a session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, SessionHandle};
