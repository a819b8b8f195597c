//! PostgreSQL storage for chat logs and the HR read endpoints.
//!
//! The gateway owns exactly one table, `chat_logs`, created by
//! [`Store::migrate`]. Every other table queried here (`leave_requests`,
//! `leave_balances`, `attendance`, `payslips`, `tax_summary`,
//! `onboarding_steps`, `onboarding_documents`, `hr_policies`, `hr_faqs`,
//! `reimbursement_process`, `holiday_calendar`) is provisioned by the HRMS
//! schema and treated as an external contract.
//!
//! All queries are parameterized and return explicit per-endpoint records,
//! never generic row maps.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::audit::{ChatLogSink, ChatTurn, SinkError};

/// PostgreSQL store shared by every handler.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `chat_logs` table if it does not exist (idempotent).
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_logs (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                message TEXT NOT NULL,
                response TEXT NOT NULL,
                channel TEXT NOT NULL DEFAULT 'web',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        log::debug!("chat_logs table migrated");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Chat history and analytics
    // -----------------------------------------------------------------------

    /// The caller's chat turns, newest first.
    pub async fn chat_history(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatLogRow>, sqlx::Error> {
        sqlx::query_as::<_, ChatLogRow>(
            r#"
            SELECT message, response, channel, created_at
            FROM chat_logs
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Aggregate usage counters over the whole chat log.
    pub async fn chat_analytics(&self) -> Result<ChatAnalytics, sqlx::Error> {
        let total_sessions: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM chat_logs")
                .fetch_one(&self.pool)
                .await?;

        let total_messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_logs")
            .fetch_one(&self.pool)
            .await?;

        let top_responses = sqlx::query_as::<_, ResponseCount>(
            r#"
            SELECT response, COUNT(*) AS count
            FROM chat_logs
            GROUP BY response
            ORDER BY count DESC
            LIMIT 5
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ChatAnalytics {
            total_sessions,
            total_messages,
            top_responses,
        })
    }

    // -----------------------------------------------------------------------
    // Leave
    // -----------------------------------------------------------------------

    /// File a new leave request in `pending` status.
    pub async fn insert_leave_request(
        &self,
        user_id: &str,
        application: &LeaveApplication,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO leave_requests (user_id, start_date, end_date, type, reason, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            "#,
        )
        .bind(user_id)
        .bind(application.start_date)
        .bind(application.end_date)
        .bind(&application.leave_type)
        .bind(&application.reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The caller's 5 most recent leave requests.
    pub async fn leave_requests(&self, user_id: &str) -> Result<Vec<LeaveRequestRow>, sqlx::Error> {
        sqlx::query_as::<_, LeaveRequestRow>(
            r#"
            SELECT id, start_date, end_date, type AS leave_type, status, reason, created_at
            FROM leave_requests
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 5
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// The caller's per-type leave balances.
    pub async fn leave_balances(&self, user_id: &str) -> Result<Vec<LeaveBalanceRow>, sqlx::Error> {
        sqlx::query_as::<_, LeaveBalanceRow>(
            "SELECT leave_type, balance FROM leave_balances WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    // -----------------------------------------------------------------------
    // Attendance
    // -----------------------------------------------------------------------

    /// Today's punch record, if any.
    pub async fn attendance_today(
        &self,
        user_id: &str,
    ) -> Result<Option<AttendanceTodayRow>, sqlx::Error> {
        sqlx::query_as::<_, AttendanceTodayRow>(
            r#"
            SELECT punch_in, punch_out, status
            FROM attendance
            WHERE user_id = $1 AND date = CURRENT_DATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// The caller's most recent attendance days, newest first.
    pub async fn attendance_history(
        &self,
        user_id: &str,
        days: i64,
    ) -> Result<Vec<AttendanceDayRow>, sqlx::Error> {
        sqlx::query_as::<_, AttendanceDayRow>(
            r#"
            SELECT date, punch_in, punch_out, status
            FROM attendance
            WHERE user_id = $1
            ORDER BY date DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(days)
        .fetch_all(&self.pool)
        .await
    }

    // -----------------------------------------------------------------------
    // Payslips and tax
    // -----------------------------------------------------------------------

    /// Newest payslip, if any.
    pub async fn latest_payslip(&self, user_id: &str) -> Result<Option<PayslipRow>, sqlx::Error> {
        sqlx::query_as::<_, PayslipRow>(
            "SELECT url, date FROM payslips WHERE user_id = $1 ORDER BY date DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// The caller's most recent payslips, newest first.
    pub async fn payslip_history(
        &self,
        user_id: &str,
        months: i64,
    ) -> Result<Vec<PayslipRow>, sqlx::Error> {
        sqlx::query_as::<_, PayslipRow>(
            "SELECT url, date FROM payslips WHERE user_id = $1 ORDER BY date DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(months)
        .fetch_all(&self.pool)
        .await
    }

    /// The caller's 3 most recent tax years.
    pub async fn tax_summaries(&self, user_id: &str) -> Result<Vec<TaxSummaryRow>, sqlx::Error> {
        sqlx::query_as::<_, TaxSummaryRow>(
            r#"
            SELECT year, total_income, tax_paid, tax_due
            FROM tax_summary
            WHERE user_id = $1
            ORDER BY year DESC
            LIMIT 3
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    // -----------------------------------------------------------------------
    // Onboarding
    // -----------------------------------------------------------------------

    /// The caller's onboarding steps in step order.
    pub async fn onboarding_steps(
        &self,
        user_id: &str,
    ) -> Result<Vec<OnboardingStepRow>, sqlx::Error> {
        sqlx::query_as::<_, OnboardingStepRow>(
            r#"
            SELECT step, completed, notes
            FROM onboarding_steps
            WHERE user_id = $1
            ORDER BY step
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// The caller's onboarding documents.
    pub async fn onboarding_documents(
        &self,
        user_id: &str,
    ) -> Result<Vec<OnboardingDocumentRow>, sqlx::Error> {
        sqlx::query_as::<_, OnboardingDocumentRow>(
            "SELECT document, status, url FROM onboarding_documents WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    // -----------------------------------------------------------------------
    // Company-wide lookups
    // -----------------------------------------------------------------------

    /// Case-insensitive policy lookup.
    pub async fn policy(&self, name: &str) -> Result<Option<PolicyRow>, sqlx::Error> {
        sqlx::query_as::<_, PolicyRow>(
            "SELECT name, content FROM hr_policies WHERE LOWER(name) = LOWER($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    /// All FAQs in id order.
    pub async fn faqs(&self) -> Result<Vec<FaqRow>, sqlx::Error> {
        sqlx::query_as::<_, FaqRow>("SELECT question, answer FROM hr_faqs ORDER BY id")
            .fetch_all(&self.pool)
            .await
    }

    /// Reimbursement steps in order.
    pub async fn reimbursement_process(&self) -> Result<Vec<ReimbursementStepRow>, sqlx::Error> {
        sqlx::query_as::<_, ReimbursementStepRow>(
            "SELECT process, notes FROM reimbursement_process ORDER BY step",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Holidays in date order, optionally restricted to one year.
    pub async fn holiday_calendar(
        &self,
        year: Option<i32>,
    ) -> Result<Vec<HolidayRow>, sqlx::Error> {
        match year {
            Some(year) => {
                sqlx::query_as::<_, HolidayRow>(
                    r#"
                    SELECT date, name
                    FROM holiday_calendar
                    WHERE EXTRACT(YEAR FROM date)::int = $1
                    ORDER BY date
                    "#,
                )
                .bind(year)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, HolidayRow>(
                    "SELECT date, name FROM holiday_calendar ORDER BY date",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
    }
}

#[async_trait]
impl ChatLogSink for Store {
    async fn insert_chat_turn(&self, turn: &ChatTurn) -> Result<(), SinkError> {
        sqlx::query(
            r#"
            INSERT INTO chat_logs (user_id, message, response, channel, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&turn.user_id)
        .bind(&turn.message)
        .bind(&turn.response)
        .bind(&turn.channel)
        .bind(turn.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Result records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatLogRow {
    pub message: String,
    pub response: String,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnalytics {
    pub total_sessions: i64,
    pub total_messages: i64,
    pub top_responses: Vec<ResponseCount>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ResponseCount {
    pub response: String,
    pub count: i64,
}

/// Body of a leave application.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveApplication {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(rename = "type")]
    pub leave_type: String,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeaveBalanceRow {
    pub leave_type: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttendanceTodayRow {
    pub punch_in: Option<DateTime<Utc>>,
    pub punch_out: Option<DateTime<Utc>>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttendanceDayRow {
    pub date: NaiveDate,
    pub punch_in: Option<DateTime<Utc>>,
    pub punch_out: Option<DateTime<Utc>>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PayslipRow {
    pub url: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TaxSummaryRow {
    pub year: i32,
    pub total_income: f64,
    pub tax_paid: f64,
    pub tax_due: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OnboardingStepRow {
    pub step: i32,
    pub completed: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OnboardingDocumentRow {
    pub document: String,
    pub status: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PolicyRow {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FaqRow {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReimbursementStepRow {
    pub process: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct HolidayRow {
    pub date: NaiveDate,
    pub name: String,
}
