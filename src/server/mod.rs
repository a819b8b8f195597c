//! HTTP server for the HRMS chat gateway.
//!
//! # Endpoints
//!
//! - `GET  /api/healthz`       — Liveness probe (unauthenticated)
//! - `POST /api/chat`          — Chat with NLU fallback resolution
//! - `GET  /api/history`       — Caller's chat history
//! - `GET  /api/analytics`     — Chat usage counters
//! - `POST /api/leave/apply`   — File a leave request
//! - `GET  /api/leave/*`       — Leave status / balances
//! - `GET  /api/attendance/*`  — Attendance today / history
//! - `GET  /api/payslip/*`     — Payslips
//! - `GET  /api/tax/summary`   — Tax summaries
//! - `GET  /api/onboarding/*`  — Onboarding steps / documents
//! - `GET  /api/policy/:name`  — Policy lookup
//! - `GET  /api/faq`           — FAQs
//! - `GET  /api/reimbursement/process` — Reimbursement steps
//! - `GET  /api/holiday/calendar`      — Holiday calendar
//! - `POST /api/hrms/webhook`  — Inbound HRMS event webhook (unauthenticated)

pub mod routes;

pub use routes::{app_router, AppState};
