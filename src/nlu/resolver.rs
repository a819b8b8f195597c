//! Two-tier fallback resolution across the NLU engines.
//!
//! Policy: every message goes to the primary engine first, scoped to a
//! session keyed by the caller identity. When the primary flags the result
//! as fallback, or reports a confidence below the configured floor, its
//! reply text is discarded and the secondary engine produces the reply.
//! The intent label always comes from the primary's classification.
//!
//! Engine outage is not fallback: a primary transport or protocol error
//! fails the request outright, and the secondary engine is never consulted
//! for it. Neither engine call is retried.

use std::sync::Arc;

use thiserror::Error;

use crate::nlu::engine::{EngineError, IntentEngine, ReplyEngine};

/// Normalized NLU outcome handed back to the gateway.
#[derive(Debug, Clone)]
pub struct NluReply {
    pub text: String,
    pub intent: String,
}

/// Which engine failed, for error reporting.
#[derive(Debug, Error)]
pub enum NluError {
    #[error("primary engine: {0}")]
    Primary(#[source] EngineError),

    #[error("secondary engine: {0}")]
    Secondary(#[source] EngineError),
}

/// Resolves a message to a reply via the primary engine, deferring to the
/// secondary engine on low-confidence results.
#[derive(Debug)]
pub struct FallbackResolver {
    primary: Arc<dyn IntentEngine>,
    secondary: Arc<dyn ReplyEngine>,
    confidence_floor: f32,
}

impl FallbackResolver {
    pub fn new(
        primary: Arc<dyn IntentEngine>,
        secondary: Arc<dyn ReplyEngine>,
        confidence_floor: f32,
    ) -> Self {
        Self {
            primary,
            secondary,
            confidence_floor,
        }
    }

    /// Resolve one message for the given caller session.
    ///
    /// Issues at most one primary and at most one secondary call, in
    /// sequence; the secondary call depends on the primary's outcome.
    pub async fn resolve(&self, session: &str, message: &str) -> Result<NluReply, NluError> {
        let primary = self
            .primary
            .detect_intent(session, message)
            .await
            .map_err(NluError::Primary)?;

        let needs_fallback =
            primary.is_fallback || primary.confidence < self.confidence_floor;

        if !needs_fallback {
            return Ok(NluReply {
                text: primary.text,
                intent: primary.intent,
            });
        }

        tracing::debug!(
            intent = %primary.intent,
            confidence = primary.confidence,
            explicit_fallback = primary.is_fallback,
            "primary result below confidence floor, deferring to secondary engine"
        );

        let text = self
            .secondary
            .reply(message, session)
            .await
            .map_err(NluError::Secondary)?;

        Ok(NluReply {
            text,
            intent: primary.intent,
        })
    }
}
