use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::agent::TurnRunner;
use crate::llm::LanguageModel;
use crate::tools::ToolRegistry;

/// Sessions kept before the least recently used one is dropped
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Book-keeping for one chat session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_turn_at: DateTime<Utc>,
    pub turns: u64,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    max_sessions: usize,
}

struct AppStateInner {
    model: Arc<dyn LanguageModel>,
    server_tools: Arc<ToolRegistry>,
    max_steps: usize,
    sessions: Mutex<HashMap<String, SessionInfo>>,
}

impl AppState {
    pub fn new(model: Arc<dyn LanguageModel>, server_tools: ToolRegistry, max_steps: usize) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                model,
                server_tools: Arc::new(server_tools),
                max_steps,
                sessions: Mutex::new(HashMap::new()),
            }),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn model_id(&self) -> String {
        self.inner.model.model_id().to_string()
    }

    pub fn turn_runner(&self) -> TurnRunner {
        TurnRunner::new(self.inner.model.clone(), self.inner.server_tools.clone())
            .with_max_steps(self.inner.max_steps)
    }

    /// Resolve the session for a turn. A missing or blank id starts a new
    /// session; a known or client-supplied id is kept as is.
    pub async fn begin_turn(&self, requested: Option<&str>) -> SessionInfo {
        let session_id = requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| ulid::Ulid::new().to_string());

        let now = Utc::now();
        let mut sessions = self.inner.sessions.lock().await;
        if !sessions.contains_key(&session_id) && sessions.len() >= self.max_sessions {
            evict_least_recent(&mut sessions);
        }
        let info = sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                tracing::info!(session_id = %session_id, "New chat session");
                SessionInfo {
                    session_id: session_id.clone(),
                    created_at: now,
                    last_turn_at: now,
                    turns: 0,
                }
            });
        info.turns += 1;
        info.last_turn_at = now;
        info.clone()
    }

    pub async fn session(&self, session_id: &str) -> Option<SessionInfo> {
        self.inner.sessions.lock().await.get(session_id).cloned()
    }
}

fn evict_least_recent(sessions: &mut HashMap<String, SessionInfo>) {
    let oldest = sessions
        .values()
        .min_by_key(|info| info.last_turn_at)
        .map(|info| info.session_id.clone());
    if let Some(session_id) = oldest {
        sessions.remove(&session_id);
        tracing::debug!(session_id = %session_id, "Evicted least recently used session");
    }
}
