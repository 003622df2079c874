use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::clock::Clock;
use super::collaborators::{require_admin, CalendarService, IdentityService};
use super::domain::{
    ActingRole, Application, ApplicationId, ApplicationStatus, ConflictKind, ReplacementRequest,
    RequestStatus, UserId, WorkflowError,
};
use super::notify::{
    AuditAction, AuditEntry, AuditSink, EventKind, Notification, NotificationGateway,
};
use super::store::{AssignmentCommit, CommitError, ReplacementStore, StoreError};

/// Outcome of a committed approval.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentReceipt {
    pub request: ReplacementRequest,
    pub approved: Application,
    pub rejected: Vec<Application>,
    pub notified: bool,
}

/// Outcome of a committed unassignment.
#[derive(Debug, Clone, Serialize)]
pub struct UnassignmentReceipt {
    pub request: ReplacementRequest,
    pub reactivated: Application,
}

/// The transactional core: approves one application per request and reverses
/// assignments. Notification and audit run strictly after the commit and can
/// never roll it back.
pub struct AssignmentCoordinator<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    audit: Arc<dyn AuditSink>,
    calendar: Arc<dyn CalendarService>,
    identity: Arc<dyn IdentityService>,
    clock: Arc<dyn Clock>,
}

impl<S, G> AssignmentCoordinator<S, G>
where
    S: ReplacementStore + 'static,
    G: NotificationGateway + 'static,
{
    pub fn new(
        store: Arc<S>,
        gateway: Arc<G>,
        audit: Arc<dyn AuditSink>,
        calendar: Arc<dyn CalendarService>,
        identity: Arc<dyn IdentityService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            audit,
            calendar,
            identity,
            clock,
        }
    }

    /// Administrator-only: approves one application, rejecting its pending
    /// siblings and assigning the request in a single atomic unit.
    ///
    /// A retried approve after a prior success sees the request already
    /// assigned and gets the `already-assigned` conflict instead of
    /// re-running side effects.
    pub fn approve(
        &self,
        actor: &UserId,
        application_id: &ApplicationId,
        acting_role: Option<ActingRole>,
    ) -> Result<AssignmentReceipt, WorkflowError> {
        require_admin(self.identity.as_ref(), actor)?;

        let application = self
            .store
            .application(application_id)?
            .ok_or(WorkflowError::ApplicationNotFound)?;
        let request = self
            .store
            .request(&application.replacement_id)?
            .ok_or(WorkflowError::RequestNotFound)?;
        if request.status != RequestStatus::Open {
            return Err(WorkflowError::Conflict(ConflictKind::AlreadyAssigned));
        }
        if application.status != ApplicationStatus::Pending {
            return Err(WorkflowError::Conflict(ConflictKind::NotPending));
        }

        // The commit re-verifies both preconditions under its lock; of two
        // racing approvals exactly one passes.
        let commit = self
            .store
            .commit_assignment(&request.id, &application.id, acting_role, self.clock.now())
            .map_err(map_commit_error)?;

        let notified = self.notify_assignment(&commit);
        self.audit_best_effort(actor, AuditAction::ApplicationApproved, &commit.approved.id.0);

        let request = if notified {
            match self.store.mark_notified(&commit.request.id, self.clock.now()) {
                Ok(updated) => updated,
                Err(error) => {
                    warn!(error = %error, "could not stamp notification time");
                    commit.request.clone()
                }
            }
        } else {
            commit.request.clone()
        };

        Ok(AssignmentReceipt {
            request,
            approved: commit.approved,
            rejected: commit.rejected,
            notified,
        })
    }

    /// Administrator-only: reverses an approved assignment. The request
    /// reopens and the unassigned applicant re-enters the candidate pool as
    /// pending.
    pub fn unassign(
        &self,
        actor: &UserId,
        application_id: &ApplicationId,
    ) -> Result<UnassignmentReceipt, WorkflowError> {
        require_admin(self.identity.as_ref(), actor)?;

        let application = self
            .store
            .application(application_id)?
            .ok_or(WorkflowError::ApplicationNotFound)?;
        let request = self
            .store
            .request(&application.replacement_id)?
            .ok_or(WorkflowError::RequestNotFound)?;
        if request.status != RequestStatus::Assigned
            || application.status != ApplicationStatus::Approved
        {
            return Err(WorkflowError::Conflict(ConflictKind::NotAssigned));
        }

        let commit = self
            .store
            .revert_assignment(&request.id, &application.id)
            .map_err(map_commit_error)?;

        let details = self.shift_details(&commit.request, &commit.reactivated.applicant_id);
        self.dispatch_best_effort(Notification {
            recipient: commit.reactivated.applicant_id.clone(),
            event: EventKind::AssignmentRevoked,
            details,
        });
        self.audit_best_effort(actor, AuditAction::AssignmentReverted, &commit.request.id.0);

        Ok(UnassignmentReceipt {
            request: commit.request,
            reactivated: commit.reactivated,
        })
    }

    fn notify_assignment(&self, commit: &AssignmentCommit) -> bool {
        let details = self.shift_details(&commit.request, &commit.approved.applicant_id);
        let recipients = [
            (
                commit.approved.applicant_id.clone(),
                EventKind::AssignmentConfirmed,
            ),
            (
                commit.request.requesting_user_id.clone(),
                EventKind::ShiftCovered,
            ),
        ];

        let mut accepted = false;
        for (recipient, event) in recipients {
            let delivered = self.dispatch_best_effort(Notification {
                recipient,
                event,
                details: details.clone(),
            });
            accepted = accepted || delivered;
        }
        accepted
    }

    fn dispatch_best_effort(&self, notification: Notification) -> bool {
        let event = notification.event;
        match self.gateway.dispatch(notification) {
            Ok(ack) if ack.accepted() => true,
            Ok(_) => {
                warn!(
                    event = event.label(),
                    "no notification channel accepted the dispatch"
                );
                false
            }
            Err(error) => {
                warn!(event = event.label(), error = %error, "notification dispatch failed");
                false
            }
        }
    }

    fn shift_details(
        &self,
        request: &ReplacementRequest,
        covering_user: &UserId,
    ) -> BTreeMap<String, String> {
        // Calendar and identity are annotation-only; the request's own copy
        // of the shift facts is the fallback.
        let shift = self.calendar.shift(&request.shift_id);
        let (date, shift_type, team) = match &shift {
            Some(summary) => (summary.date, summary.shift_type, summary.team_id.clone()),
            None => (request.shift_date, request.shift_type, request.team_id.clone()),
        };

        let mut details = BTreeMap::new();
        details.insert("replacement_id".to_string(), request.id.0.clone());
        details.insert("shift_id".to_string(), request.shift_id.0.clone());
        details.insert("shift_date".to_string(), date.to_string());
        details.insert("shift_type".to_string(), shift_type.label().to_string());
        details.insert("team_id".to_string(), team.0);
        if let Some(window) = request.partial {
            details.insert(
                "window".to_string(),
                format!(
                    "{}-{}",
                    window.start.format("%H:%M"),
                    window.end.format("%H:%M")
                ),
            );
        }
        if let Some(user) = self.identity.user(covering_user) {
            details.insert("covered_by".to_string(), user.name);
        }
        if let Some(requester) = self.identity.user(&request.requesting_user_id) {
            details.insert("requested_by".to_string(), requester.name);
        }
        details
    }

    fn audit_best_effort(&self, actor: &UserId, action: AuditAction, entity: &str) {
        let entry = AuditEntry {
            actor: actor.clone(),
            action,
            entity: entity.to_string(),
            at: self.clock.now(),
        };
        if let Err(error) = self.audit.record(entry) {
            warn!(action = action.label(), error = %error, "audit record dropped");
        }
    }
}

fn map_commit_error(error: CommitError) -> WorkflowError {
    match error {
        CommitError::RequestNotOpen => WorkflowError::Conflict(ConflictKind::AlreadyAssigned),
        CommitError::ApplicationNotPending => WorkflowError::Conflict(ConflictKind::NotPending),
        CommitError::RequestNotAssigned | CommitError::ApplicationNotApproved => {
            WorkflowError::Conflict(ConflictKind::NotAssigned)
        }
        CommitError::Store(StoreError::NotFound) => WorkflowError::ApplicationNotFound,
        CommitError::Store(error) => WorkflowError::Store(error),
    }
}
