use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{ActorRole, ShiftId, ShiftType, TeamId, UserId, WorkflowError};

/// Calendar facts used to annotate notifications.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftSummary {
    pub shift_id: ShiftId,
    pub date: NaiveDate,
    pub shift_type: ShiftType,
    pub team_id: TeamId,
}

/// Read-only view of the duty calendar owned by the scheduling subsystem.
pub trait CalendarService: Send + Sync {
    fn shift(&self, id: &ShiftId) -> Option<ShiftSummary>;
}

/// Directory facts used for display content and privilege checks.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub name: String,
    pub role: ActorRole,
}

/// Read-only view of the user directory owned by the identity subsystem.
pub trait IdentityService: Send + Sync {
    fn user(&self, id: &UserId) -> Option<UserSummary>;
}

/// Resolves the actor through the directory and requires the admin role.
pub fn require_admin(identity: &dyn IdentityService, actor: &UserId) -> Result<(), WorkflowError> {
    match identity.user(actor) {
        Some(user) if user.role.is_admin() => Ok(()),
        _ => Err(WorkflowError::Unauthorized(actor.clone())),
    }
}
