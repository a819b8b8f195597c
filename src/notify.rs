//! Fire-and-forget user notifications.
//!
//! Emits a structured log event per notification; downstream shippers pick
//! these up. No delivery guarantee.

/// Notify a user about an HR event.
pub fn send_notification(user_id: &str, event_type: &str, details: &str) {
    tracing::info!(
        target: "hrms_gateway::notify",
        user_id,
        event_type,
        details,
        "notification dispatched"
    );
}
