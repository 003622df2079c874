use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::UserId;

/// Workflow outcomes communicated to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AssignmentConfirmed,
    ShiftCovered,
    AssignmentRevoked,
}

impl EventKind {
    pub const fn label(self) -> &'static str {
        match self {
            EventKind::AssignmentConfirmed => "assignment_confirmed",
            EventKind::ShiftCovered => "shift_covered",
            EventKind::AssignmentRevoked => "assignment_revoked",
        }
    }
}

/// Delivery channels the gateway fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Chat,
}

impl Channel {
    pub const fn label(self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Chat => "chat",
        }
    }
}

/// Payload handed to the notification gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub event: EventKind,
    pub details: BTreeMap<String, String>,
}

/// Per-channel acceptance for one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelAck {
    pub channel: Channel,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Acknowledgement that a dispatch was queued. Acceptance is not delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchAck {
    pub attempts: Vec<ChannelAck>,
}

impl DispatchAck {
    pub fn accepted(&self) -> bool {
        self.attempts.iter().any(|attempt| attempt.accepted)
    }
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Trait describing outbound notification hooks (e-mail and chat adapters).
pub trait NotificationGateway: Send + Sync {
    fn dispatch(&self, notification: Notification) -> Result<DispatchAck, NotifyError>;
}

/// Actions recorded in the append-only audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    ApplicationSubmitted,
    ApplicationWithdrawn,
    ApplicationReactivated,
    ApplicationRejected,
    ApplicationApproved,
    AssignmentReverted,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            AuditAction::ApplicationSubmitted => "application-submitted",
            AuditAction::ApplicationWithdrawn => "application-withdrawn",
            AuditAction::ApplicationReactivated => "application-reactivated",
            AuditAction::ApplicationRejected => "application-rejected",
            AuditAction::ApplicationApproved => "application-approved",
            AuditAction::AssignmentReverted => "assignment-reverted",
        }
    }
}

/// One who-did-what-when record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub actor: UserId,
    pub action: AuditAction,
    pub entity: String,
    pub at: DateTime<Utc>,
}

/// Audit transport error.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}

/// Best-effort append-only record of workflow decisions.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}
