//! Best-effort audit logging of completed chat turns.
//!
//! A [`ChatTurn`] is created once per successful chat request, immutable,
//! and persisted append-only: exactly one attempt, on a detached task
//! scheduled after the reply payload is finalized. A persistence failure is
//! logged and swallowed; a lost log entry is an accepted availability
//! trade-off, never a failed chat request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Error type produced by a chat-log sink.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// One user message paired with the system's response, the unit of audit
/// logging.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub user_id: String,
    pub message: String,
    pub response: String,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only destination for chat turns. Implemented by the PostgreSQL
/// store, and by in-memory fakes in tests.
#[async_trait]
pub trait ChatLogSink: Send + Sync {
    async fn insert_chat_turn(&self, turn: &ChatTurn) -> Result<(), SinkError>;
}

/// Schedules chat-turn persistence off the response path.
pub struct AuditLogger {
    sink: Arc<dyn ChatLogSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn ChatLogSink>) -> Self {
        Self { sink }
    }

    /// Spawn the single persistence attempt for a finished turn.
    ///
    /// Returns the task handle; the response path drops it (detaching the
    /// task) and must never await it.
    pub fn record(&self, turn: ChatTurn) -> tokio::task::JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(error) = sink.insert_chat_turn(&turn).await {
                tracing::warn!(
                    user_id = %turn.user_id,
                    channel = %turn.channel,
                    %error,
                    "failed to persist chat turn"
                );
            }
        })
    }
}
