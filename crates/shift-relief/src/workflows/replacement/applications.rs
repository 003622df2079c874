use std::sync::Arc;

use tracing::warn;

use super::clock::Clock;
use super::collaborators::{require_admin, IdentityService};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, ConflictKind, IdAllocator, ReplacementId,
    RequestStatus, UserId, WorkflowError,
};
use super::notify::{AuditAction, AuditEntry, AuditSink};
use super::store::{ReplacementStore, StoreError};
use super::throttle::WithdrawalLimiter;

/// Service recording and revising candidate applications.
pub struct ApplicationManager<S> {
    store: Arc<S>,
    limiter: Arc<WithdrawalLimiter>,
    clock: Arc<dyn Clock>,
    ids: Arc<IdAllocator>,
    identity: Arc<dyn IdentityService>,
    audit: Arc<dyn AuditSink>,
}

impl<S> ApplicationManager<S>
where
    S: ReplacementStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        limiter: Arc<WithdrawalLimiter>,
        clock: Arc<dyn Clock>,
        ids: Arc<IdAllocator>,
        identity: Arc<dyn IdentityService>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            limiter,
            clock,
            ids,
            identity,
            audit,
        }
    }

    /// Opens a pending application for `applicant_id` on an open request.
    pub fn apply(
        &self,
        replacement_id: &ReplacementId,
        applicant_id: &UserId,
    ) -> Result<Application, WorkflowError> {
        if applicant_id.0.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "applicant id must not be empty".to_string(),
            ));
        }

        let request = self
            .store
            .request(replacement_id)?
            .ok_or(WorkflowError::RequestNotFound)?;
        if request.status != RequestStatus::Open {
            return Err(WorkflowError::Conflict(ConflictKind::RequestClosed));
        }

        let duplicate = self
            .store
            .applications_for(replacement_id)?
            .iter()
            .any(|existing| {
                existing.applicant_id == *applicant_id && existing.status.is_active()
            });
        if duplicate {
            return Err(WorkflowError::Conflict(ConflictKind::AlreadyApplied));
        }

        let application = Application::pending(
            self.ids.next_application_id(),
            replacement_id.clone(),
            applicant_id.clone(),
            self.clock.now(),
        );
        // The store re-checks uniqueness under its lock.
        let stored = match self.store.insert_application(application) {
            Ok(stored) => stored,
            Err(StoreError::Conflict) => {
                return Err(WorkflowError::Conflict(ConflictKind::AlreadyApplied))
            }
            Err(error) => return Err(error.into()),
        };

        self.audit_best_effort(applicant_id, AuditAction::ApplicationSubmitted, &stored.id.0);
        Ok(stored)
    }

    /// Retracts a pending application, subject to the withdrawal throttle.
    pub fn withdraw(&self, application_id: &ApplicationId) -> Result<Application, WorkflowError> {
        let application = self
            .store
            .application(application_id)?
            .ok_or(WorkflowError::ApplicationNotFound)?;
        if application.status != ApplicationStatus::Pending {
            return Err(WorkflowError::Conflict(ConflictKind::NotPending));
        }

        self.limiter
            .acquire(&application.applicant_id, &application.replacement_id)
            .map_err(|retry_after| WorkflowError::RateLimited { retry_after })?;

        let mut withdrawn = application;
        withdrawn.status = ApplicationStatus::Withdrawn;
        withdrawn.decided_at = Some(self.clock.now());
        self.store.update_application(withdrawn.clone())?;

        self.audit_best_effort(
            &withdrawn.applicant_id,
            AuditAction::ApplicationWithdrawn,
            &withdrawn.id.0,
        );
        Ok(withdrawn)
    }

    /// Returns a withdrawn or rejected application to the candidate pool.
    pub fn reactivate(&self, application_id: &ApplicationId) -> Result<Application, WorkflowError> {
        let application = self
            .store
            .application(application_id)?
            .ok_or(WorkflowError::ApplicationNotFound)?;
        if !matches!(
            application.status,
            ApplicationStatus::Withdrawn | ApplicationStatus::Rejected
        ) {
            return Err(WorkflowError::Validation(
                "only withdrawn or rejected applications can be reactivated".to_string(),
            ));
        }

        let request = self
            .store
            .request(&application.replacement_id)?
            .ok_or(WorkflowError::RequestNotFound)?;
        match request.status {
            RequestStatus::Open => {}
            RequestStatus::Assigned => {
                return Err(WorkflowError::Conflict(ConflictKind::AlreadyAssigned))
            }
            RequestStatus::Cancelled => {
                return Err(WorkflowError::Conflict(ConflictKind::RequestClosed))
            }
        }

        let duplicate = self
            .store
            .applications_for(&request.id)?
            .iter()
            .any(|existing| {
                existing.id != application.id
                    && existing.applicant_id == application.applicant_id
                    && existing.status.is_active()
            });
        if duplicate {
            return Err(WorkflowError::Conflict(ConflictKind::AlreadyApplied));
        }

        let mut reactivated = application;
        reactivated.status = ApplicationStatus::Pending;
        reactivated.decided_at = None;
        self.store.update_application(reactivated.clone())?;

        self.audit_best_effort(
            &reactivated.applicant_id,
            AuditAction::ApplicationReactivated,
            &reactivated.id.0,
        );
        Ok(reactivated)
    }

    /// Administrator-only: rejects a pending application without touching the
    /// request's status.
    pub fn reject(
        &self,
        actor: &UserId,
        application_id: &ApplicationId,
    ) -> Result<Application, WorkflowError> {
        require_admin(self.identity.as_ref(), actor)?;

        let application = self
            .store
            .application(application_id)?
            .ok_or(WorkflowError::ApplicationNotFound)?;
        if application.status != ApplicationStatus::Pending {
            return Err(WorkflowError::Conflict(ConflictKind::NotPending));
        }

        let mut rejected = application;
        rejected.status = ApplicationStatus::Rejected;
        rejected.decided_at = Some(self.clock.now());
        self.store.update_application(rejected.clone())?;

        self.audit_best_effort(actor, AuditAction::ApplicationRejected, &rejected.id.0);
        Ok(rejected)
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
