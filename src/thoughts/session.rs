//! Per-session ownership of [`SessionState`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, MutexGuard, RwLock};

use crate::llm::ChatResponse;

use super::{EmitReceipt, Extraction, SessionState, ThoughtStatus, ThoughtToken};

/// Snapshots buffered per subscriber before it starts lagging.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

pub type SharedSession = Arc<SessionHandle>;

/// Owner of one session's live state.
///
/// Every mutation runs inside a single lock scope and is followed by a snapshot
/// broadcast, so subscribers observe states in mutation order.
pub struct SessionHandle {
    session_id: String,
    state: Mutex<SessionState>,
    updates: broadcast::Sender<SessionState>,
    /// Held for the duration of a turn.
    turn: Mutex<()>,
}

impl SessionHandle {
    pub fn new(session_id: impl Into<String>, state: SessionState) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            session_id: session_id.into(),
            state: Mutex::new(state),
            updates,
            turn: Mutex::new(()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Apply `f` under the session lock, then publish the resulting state.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.lock().await;
        let result = f(&mut state);
        // No subscribers is fine.
        let _ = self.updates.send(state.clone());
        result
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionState> {
        self.updates.subscribe()
    }

    /// Wait until no other turn is running on this session.
    pub async fn lock_turn(&self) -> MutexGuard<'_, ()> {
        self.turn.lock().await
    }

    pub async fn begin_turn(&self) {
        self.mutate(|s| s.begin_turn()).await
    }

    pub async fn on_agent_start(&self, agent_name: &str) {
        self.mutate(|s| s.on_agent_start(agent_name)).await
    }

    pub async fn on_agent_end(&self, agent_name: &str) {
        self.mutate(|s| s.on_agent_end(agent_name)).await
    }

    pub async fn emit(
        &self,
        agent_name: &str,
        message: &str,
        status: ThoughtStatus,
    ) -> EmitReceipt {
        self.mutate(|s| s.emit(agent_name, message, status)).await
    }

    pub async fn emit_scoped(&self, agent_name: &str, message: &str) -> ThoughtToken {
        self.mutate(|s| s.emit_scoped(agent_name, message)).await
    }

    pub async fn complete(
        &self,
        token: &ThoughtToken,
        message: &str,
        status: ThoughtStatus,
    ) -> bool {
        self.mutate(|s| s.complete(token, message, status)).await
    }

    pub async fn before_model(&self) {
        self.mutate(|s| s.before_model()).await
    }

    /// Post-process a model output and hand it back unchanged.
    pub async fn after_model(&self, response: ChatResponse) -> ChatResponse {
        let extraction: Extraction = self.mutate(|s| s.observe_model_output(&response)).await;
        if extraction.summary_id.is_some() || extraction.reasoning_tokens > 0 {
            tracing::debug!(
                "Session {}: extracted {} reasoning segments, {} reasoning tokens",
                self.session_id,
                extraction.reasoning_segments,
                extraction.reasoning_tokens
            );
        }
        response
    }
}

/// Live session handles keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Return the live handle, creating it from `load()` on first use.
    ///
    /// `load` runs outside the registry lock; if two callers race, the first
    /// handle inserted wins and both get it.
    pub async fn get_or_load<F, Fut>(&self, session_id: &str, load: F) -> SharedSession
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = SessionState>,
    {
        if let Some(handle) = self.get(session_id).await {
            return handle;
        }

        let state = load().await;
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(SessionHandle::new(session_id, state))),
        )
    }

    /// Drop the live handle (session deleted).
    pub async fn remove(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.write().await.remove(session_id)
    }

    /// Drop the live handle when nothing but the registry holds it and no
    /// stream is subscribed. The next `get_or_load` reloads from the store, so
    /// only call this once the state has been saved.
    pub async fn release_if_idle(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let idle = sessions.get(session_id).is_some_and(|handle| {
            Arc::strong_count(handle) == 1 && handle.updates.receiver_count() == 0
        });
        if idle {
            sessions.remove(session_id);
        }
        idle
    }

    /// Every live handle.
    pub async fn all(&self) -> Vec<SharedSession> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thoughts::ROOT_AGENT;

    #[tokio::test]
    async fn sessions_are_isolated() {
        let registry = SessionRegistry::new();
        let a = registry.get_or_load("a", || async { SessionState::new() }).await;
        let b = registry.get_or_load("b", || async { SessionState::new() }).await;

        a.on_agent_start("research_agent").await;
        a.emit("research_agent", "searching", ThoughtStatus::Running).await;

        let b_state = b.snapshot().await;
        assert!(b_state.thought_stream().is_empty());
        assert_eq!(b_state.delegated_agent(), ROOT_AGENT);
        assert_eq!(a.snapshot().await.delegated_agent(), "research_agent");
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn get_or_load_reuses_live_handle() {
        let registry = SessionRegistry::new();
        let first = registry.get_or_load("s", || async { SessionState::new() }).await;
        first.emit("x", "hello", ThoughtStatus::Running).await;

        let second = registry
            .get_or_load("s", || async { panic!("should not reload") })
            .await;
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.remove("s").await.is_some());
        assert!(registry.get("s").await.is_none());
    }

    #[tokio::test]
    async fn idle_handles_are_released() {
        let registry = SessionRegistry::new();
        let handle = registry.get_or_load("s", || async { SessionState::new() }).await;
        let rx = handle.subscribe();

        // Held by a caller and subscribed.
        assert!(!registry.release_if_idle("s").await);
        drop(handle);
        assert!(!registry.release_if_idle("s").await);
        drop(rx);
        assert!(registry.release_if_idle("s").await);
        assert_eq!(registry.len().await, 0);
        assert!(!registry.release_if_idle("s").await);
    }

    #[tokio::test]
    async fn subscribers_see_every_mutation_in_order() {
        let handle = SessionHandle::new("s", SessionState::new());
        let mut rx = handle.subscribe();

        handle.on_agent_start(ROOT_AGENT).await;
        handle.emit(ROOT_AGENT, "planning", ThoughtStatus::Running).await;
        handle.emit(ROOT_AGENT, "done", ThoughtStatus::Completed).await;

        let first = rx.recv().await.unwrap();
        assert!(first.thought_stream().is_empty());
        let second = rx.recv().await.unwrap();
        assert_eq!(second.thought_stream().len(), 1);
        let third = rx.recv().await.unwrap();
        assert_eq!(
            third.thought_stream().last().map(|e| e.status),
            Some(ThoughtStatus::Completed)
        );
    }

    #[tokio::test]
    async fn concurrent_emitters_respect_cap() {
        let handle = Arc::new(SessionHandle::new("s", SessionState::new()));
        let mut tasks = Vec::new();
        for worker in 0..8 {
            let handle = Arc::clone(&handle);
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    let token = handle
                        .emit_scoped(&format!("worker_{}", worker), &format!("step {}", i))
                        .await;
                    handle.complete(&token, "ok", ThoughtStatus::Completed).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        let state = handle.snapshot().await;
        assert_eq!(state.thought_stream().len(), crate::thoughts::THOUGHT_STREAM_CAP);
    }

    #[tokio::test]
    async fn after_model_returns_response_unchanged() {
        use crate::llm::{ReasoningContent, TokenUsage};

        let handle = SessionHandle::new("s", SessionState::new());
        let response = ChatResponse {
            content: Some("visible".to_string()),
            reasoning: Some(vec![
                ReasoningContent::text("first thought"),
                ReasoningContent::text("second thought"),
            ]),
            usage: Some(TokenUsage::new(1, 2).with_reasoning_tokens(Some(7))),
            ..Default::default()
        };

        let returned = handle.after_model(response.clone()).await;
        assert_eq!(returned, response);
        let state = handle.snapshot().await;
        assert_eq!(state.thought_stream().len(), 1);
        assert_eq!(state.thinking_tokens_total(), 7);
    }
}
