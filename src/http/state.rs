use crate::session::{CallController, CallServices};
use crate::speech::SpeechBridge;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// A live session plus the queue its speech client drains
#[derive(Clone)]
pub struct SessionHandle {
    pub controller: CallController,
    pub bridge: Arc<SpeechBridge>,
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active call sessions (session_id → session)
    pub sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,

    pub services: CallServices,
}

impl AppState {
    pub fn new(services: CallServices) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            services,
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Tear down every session, e.g. on server shutdown
    pub async fn shutdown_all(&self) {
        let sessions: Vec<SessionHandle> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, handle)| handle).collect()
        };
        info!("Shutting down {} call sessions", sessions.len());
        futures::future::join_all(sessions.iter().map(|s| s.controller.shutdown())).await;
    }
}
