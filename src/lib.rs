//! # HRMS Chat Gateway
//!
//! An HTTP gateway for an HR assistant: authenticates end users with JWT
//! bearer tokens, resolves free-text messages through a two-tier NLU
//! pipeline (Dialogflow first, Rasa when Dialogflow signals a fallback),
//! records every chat turn off the response path, and serves the HR
//! read endpoints (leave, attendance, payslips, tax, onboarding, policies,
//! FAQs, holidays) straight from PostgreSQL.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod nlu;
pub mod notify;
pub mod server;
pub mod store;

pub use auth::{Claims, TokenVerifier};
pub use config::Config;
pub use error::AppError;
pub use nlu::resolver::FallbackResolver;
pub use server::{app_router, AppState};
pub use store::Store;

/// Service version reported by the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
