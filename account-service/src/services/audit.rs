//! Audit event recording.

use crate::models::AuditEvent;

use super::database::Database;
use super::error::ServiceError;

/// Writes audit events to the store.
#[derive(Clone)]
pub struct AuditService {
    db: Database,
}

impl AuditService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record an event in the calling flow. Used where the event is a
    /// required side effect of the operation (impersonation, conversions,
    /// two-factor changes).
    pub async fn record(&self, event: AuditEvent) -> Result<(), ServiceError> {
        self.db.insert_audit_event(&event).await
    }

    /// Record an advisory event without blocking the caller (sign-in
    /// outcomes and similar high-volume events).
    pub fn record_background(&self, event: AuditEvent) {
        let db = self.db.clone();
        tokio::spawn(async move {
            if let Err(e) = db.insert_audit_event(&event).await {
                tracing::warn!(error = %e, event_type = %event.event_type_code, "Failed to write audit event");
            }
        });
    }
}
