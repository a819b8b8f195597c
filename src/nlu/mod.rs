//! Natural-language-understanding layer.
//!
//! Two engine seams ([`IntentEngine`] for the primary classifier,
//! [`ReplyEngine`] for the secondary responder) with concrete clients under
//! `providers`, and the [`resolver::FallbackResolver`] that owns the
//! cross-engine fallback policy.

pub mod engine;
pub mod providers;
pub mod resolver;

pub use engine::{EngineError, IntentEngine, IntentResult, ReplyEngine};
pub use resolver::{FallbackResolver, NluReply};
