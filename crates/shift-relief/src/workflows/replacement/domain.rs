use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::StoreError;

/// Identifier wrapper for replacement requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplacementId(pub String);

/// Identifier wrapper for candidate applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for shifts in the duty calendar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShiftId(pub String);

/// Identifier wrapper for teams.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

/// Identifier wrapper for users (applicants, requesters, administrators).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for ReplacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ShiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of shift a replacement request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    Day,
    Night,
    #[serde(rename = "full_24h")]
    Full24,
}

impl ShiftType {
    pub const fn label(self) -> &'static str {
        match self {
            ShiftType::Day => "day",
            ShiftType::Night => "night",
            ShiftType::Full24 => "full_24h",
        }
    }

    /// Parses the labels used by planning exports.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Some(ShiftType::Day),
            "night" => Some(ShiftType::Night),
            "24h" | "full_24h" => Some(ShiftType::Full24),
            _ => None,
        }
    }
}

/// Lifecycle status of a replacement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Open,
    Assigned,
    Cancelled,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Open => "open",
            RequestStatus::Assigned => "assigned",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

/// Lifecycle status of a candidate application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    /// Withdrawn applications do not count against the one-active-application rule.
    pub const fn is_active(self) -> bool {
        !matches!(self, ApplicationStatus::Withdrawn)
    }
}

/// Temporary supervisory designation a replacement can assume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActingRole {
    Lieutenant,
    Captain,
}

impl ActingRole {
    pub const fn label(self) -> &'static str {
        match self {
            ActingRole::Lieutenant => "lieutenant",
            ActingRole::Captain => "captain",
        }
    }
}

/// Privilege level resolved through the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Member,
    Admin,
}

impl ActorRole {
    pub const fn is_admin(self) -> bool {
        matches!(self, ActorRole::Admin)
    }
}

/// Clock-time window bounding a partial replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl PartialWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, WorkflowError> {
        if start >= end {
            return Err(WorkflowError::Validation(format!(
                "partial window must end after it starts ({start} >= {end})"
            )));
        }
        Ok(Self { start, end })
    }
}

/// A vacant shift seeking a covering worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementRequest {
    pub id: ReplacementId,
    pub shift_id: ShiftId,
    pub shift_date: NaiveDate,
    pub shift_type: ShiftType,
    pub team_id: TeamId,
    pub requesting_user_id: UserId,
    pub status: RequestStatus,
    pub partial: Option<PartialWindow>,
    pub notification_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ReplacementRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: ReplacementId,
        shift_id: ShiftId,
        shift_date: NaiveDate,
        shift_type: ShiftType,
        team_id: TeamId,
        requesting_user_id: UserId,
        partial: Option<PartialWindow>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            shift_id,
            shift_date,
            shift_type,
            team_id,
            requesting_user_id,
            status: RequestStatus::Open,
            partial,
            notification_sent_at: None,
            created_at,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }

    pub fn view(&self, applications: &[Application]) -> ReplacementView {
        ReplacementView {
            replacement_id: self.id.clone(),
            shift_id: self.shift_id.clone(),
            shift_date: self.shift_date,
            shift_type: self.shift_type.label(),
            team_id: self.team_id.clone(),
            requesting_user_id: self.requesting_user_id.clone(),
            status: self.status.label(),
            is_partial: self.is_partial(),
            start_time: self.partial.map(|window| window.start),
            end_time: self.partial.map(|window| window.end),
            notification_sent_at: self.notification_sent_at,
            applications: applications.iter().map(Application::view).collect(),
        }
    }
}

/// A candidate's bid to cover a replacement request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub replacement_id: ReplacementId,
    pub applicant_id: UserId,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Application {
    pub fn pending(
        id: ApplicationId,
        replacement_id: ReplacementId,
        applicant_id: UserId,
        applied_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            replacement_id,
            applicant_id,
            status: ApplicationStatus::Pending,
            applied_at,
            decided_at: None,
        }
    }

    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id.clone(),
            replacement_id: self.replacement_id.clone(),
            applicant_id: self.applicant_id.clone(),
            status: self.status.label(),
            applied_at: self.applied_at,
            decided_at: self.decided_at,
        }
    }
}

/// Temporary rank elevation recorded when a replacement fills a supervisory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftRoleOverride {
    pub shift_id: ShiftId,
    pub user_id: UserId,
    pub acting_lieutenant: bool,
    pub acting_captain: bool,
}

impl ShiftRoleOverride {
    pub fn for_role(shift_id: ShiftId, user_id: UserId, role: ActingRole) -> Self {
        Self {
            shift_id,
            user_id,
            acting_lieutenant: matches!(role, ActingRole::Lieutenant),
            acting_captain: matches!(role, ActingRole::Captain),
        }
    }
}

/// Sanitized representation of an application's exposed state.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub replacement_id: ReplacementId,
    pub applicant_id: UserId,
    pub status: &'static str,
    pub applied_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

/// Sanitized representation of a replacement request and its applications.
#[derive(Debug, Clone, Serialize)]
pub struct ReplacementView {
    pub replacement_id: ReplacementId,
    pub shift_id: ShiftId,
    pub shift_date: NaiveDate,
    pub shift_type: &'static str,
    pub team_id: TeamId,
    pub requesting_user_id: UserId,
    pub status: &'static str,
    pub is_partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_sent_at: Option<DateTime<Utc>>,
    pub applications: Vec<ApplicationView>,
}

/// State-machine precondition that a mutation ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    AlreadyApplied,
    RequestClosed,
    AlreadyAssigned,
    NotAssigned,
    NotPending,
}

impl ConflictKind {
    /// Stable label callers branch on (retry UX differs per kind).
    pub const fn label(self) -> &'static str {
        match self {
            ConflictKind::AlreadyApplied => "already-applied",
            ConflictKind::RequestClosed => "request-closed",
            ConflictKind::AlreadyAssigned => "already-assigned",
            ConflictKind::NotAssigned => "not-assigned",
            ConflictKind::NotPending => "not-pending",
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            ConflictKind::AlreadyApplied => {
                "applicant already holds an active application on this request"
            }
            ConflictKind::RequestClosed => {
                "replacement request is no longer accepting applications"
            }
            ConflictKind::AlreadyAssigned => "replacement request has already been assigned",
            ConflictKind::NotAssigned => "replacement request has no matching active assignment",
            ConflictKind::NotPending => "application is not pending",
        }
    }
}

/// Error raised by the workflow engine's public operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("replacement request not found")]
    RequestNotFound,
    #[error("application not found")]
    ApplicationNotFound,
    #[error("{}", .0.message())]
    Conflict(ConflictKind),
    #[error("withdrawal throttled, retry in {}ms", .retry_after.as_millis())]
    RateLimited { retry_after: Duration },
    #[error("actor '{0}' is not allowed to perform this operation")]
    Unauthorized(UserId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Machine-readable kind used by the uniform response envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation",
            WorkflowError::RequestNotFound | WorkflowError::ApplicationNotFound => "not-found",
            WorkflowError::Conflict(kind) => kind.label(),
            WorkflowError::RateLimited { .. } => "rate-limited",
            WorkflowError::Unauthorized(_) => "unauthorized",
            WorkflowError::Store(_) => "storage",
        }
    }
}

/// Sequence-backed id source so services mint ids without coordinating.
#[derive(Debug)]
pub struct IdAllocator {
    requests: AtomicU64,
    applications: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(1),
            applications: AtomicU64::new(1),
        }
    }

    pub fn next_replacement_id(&self) -> ReplacementId {
        let id = self.requests.fetch_add(1, Ordering::Relaxed);
        ReplacementId(format!("req-{id:06}"))
    }

    pub fn next_application_id(&self) -> ApplicationId {
        let id = self.applications.fetch_add(1, Ordering::Relaxed);
        ApplicationId(format!("app-{id:06}"))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
