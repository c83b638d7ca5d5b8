//! Audit event model - security and compliance logging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Audit event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    UserRegistered,
    SignInSucceeded,
    SignInFailed,
    SignedOut,
    AccountSwitched,
    AccountRenamed,
    AccountConvertedToTeam,
    AccountConvertedToPersonal,
    MemberAdded,
    MemberRemoved,
    ImpersonationStarted,
    ImpersonationStopped,
    TwoFactorEnabled,
    TwoFactorDisabled,
    RecoveryCodesRegenerated,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::UserRegistered => "user_registered",
            AuditEventType::SignInSucceeded => "sign_in_succeeded",
            AuditEventType::SignInFailed => "sign_in_failed",
            AuditEventType::SignedOut => "signed_out",
            AuditEventType::AccountSwitched => "account_switched",
            AuditEventType::AccountRenamed => "account_renamed",
            AuditEventType::AccountConvertedToTeam => "account_converted_to_team",
            AuditEventType::AccountConvertedToPersonal => "account_converted_to_personal",
            AuditEventType::MemberAdded => "member_added",
            AuditEventType::MemberRemoved => "member_removed",
            AuditEventType::ImpersonationStarted => "impersonation_started",
            AuditEventType::ImpersonationStopped => "impersonation_stopped",
            AuditEventType::TwoFactorEnabled => "two_factor_enabled",
            AuditEventType::TwoFactorDisabled => "two_factor_disabled",
            AuditEventType::RecoveryCodesRegenerated => "recovery_codes_regenerated",
        }
    }
}

/// Audit event entity.
#[derive(Debug, Clone, FromRow)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub event_type_code: String,
    pub target_type: Option<String>,
    pub target_id: Option<Uuid>,
    pub event_data: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl AuditEvent {
    /// Create a new audit event for a user action.
    pub fn user_action(
        actor_user_id: Uuid,
        event_type: AuditEventType,
        target_type: Option<String>,
        target_id: Option<Uuid>,
        event_data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            actor_user_id: Some(actor_user_id),
            event_type_code: event_type.as_str().to_string(),
            target_type,
            target_id,
            event_data,
            ip_address: None,
            created_utc: Utc::now(),
        }
    }

    /// Create a system-level audit event (no actor).
    pub fn system_action(
        event_type: AuditEventType,
        target_type: Option<String>,
        target_id: Option<Uuid>,
        event_data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            actor_user_id: None,
            event_type_code: event_type.as_str().to_string(),
            target_type,
            target_id,
            event_data,
            ip_address: None,
            created_utc: Utc::now(),
        }
    }

    /// Attach the requester's IP.
    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}
