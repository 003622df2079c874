//! Replacement workflow engine: the request/application state machine, the
//! single-assignment invariant, withdrawal throttling, and the
//! unassignment lifecycle.
//!
//! Notification and audit collaborators are narrow traits invoked strictly
//! after the storage transaction commits; their failures never invalidate a
//! committed transition.

pub mod applications;
pub mod assignment;
pub mod clock;
pub mod collaborators;
pub mod domain;
pub mod notify;
pub mod router;
pub mod store;
pub mod throttle;

#[cfg(test)]
mod tests;

pub use applications::ApplicationManager;
pub use assignment::{AssignmentCoordinator, AssignmentReceipt, UnassignmentReceipt};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{
    require_admin, CalendarService, IdentityService, ShiftSummary, UserSummary,
};
pub use domain::{
    ActingRole, ActorRole, Application, ApplicationId, ApplicationStatus, ApplicationView,
    ConflictKind, IdAllocator, PartialWindow, ReplacementId, ReplacementRequest, ReplacementView,
    RequestStatus, ShiftId, ShiftRoleOverride, ShiftType, TeamId, UserId, WorkflowError,
};
pub use notify::{
    AuditAction, AuditEntry, AuditError, AuditSink, Channel, ChannelAck, DispatchAck, EventKind,
    Notification, NotificationGateway, NotifyError,
};
pub use router::{replacement_router, WorkflowState};
pub use store::{
    AssignmentCommit, CommitError, MemoryReplacementStore, ReplacementStore, StoreError,
    UnassignmentCommit,
};
pub use throttle::{ThrottlePolicy, WithdrawalLimiter};
