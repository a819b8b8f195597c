//! Engine traits and shared NLU types.
//!
//! Engines are constructed once at startup and passed into the resolver as
//! trait objects, so tests substitute fakes without touching the network.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// What a primary-engine query produced.
///
/// Transient: only the derived reply text ever reaches storage, as part of
/// a chat turn.
#[derive(Debug, Clone)]
pub struct IntentResult {
    /// Engine-produced reply text; may be empty on a fallback result.
    pub text: String,
    /// Intent label from the engine's classification.
    pub intent: String,
    /// Intent-detection confidence in 0.0..=1.0.
    pub confidence: f32,
    /// Engine-reported indicator that it could not confidently classify
    /// the input.
    pub is_fallback: bool,
}

/// Failure talking to an NLU engine.
///
/// Transport and protocol failures are deliberately kept distinct from a
/// low-confidence classification: an unreachable engine never triggers the
/// fallback path, it fails the request.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Connection, DNS, or timeout failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The engine answered with a non-success HTTP status.
    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The engine answered 2xx but the payload was not the expected shape.
    #[error("malformed {service} response: {detail}")]
    Protocol {
        service: &'static str,
        detail: String,
    },
}

/// Primary engine: classifies intent and proposes a reply, scoped to a
/// per-caller session.
#[async_trait]
pub trait IntentEngine: Send + Sync + fmt::Debug {
    async fn detect_intent(&self, session: &str, message: &str)
        -> Result<IntentResult, EngineError>;
}

/// Secondary engine: produces a reply for messages the primary could not
/// confidently handle.
#[async_trait]
pub trait ReplyEngine: Send + Sync + fmt::Debug {
    async fn reply(&self, message: &str, sender: &str) -> Result<String, EngineError>;
}
