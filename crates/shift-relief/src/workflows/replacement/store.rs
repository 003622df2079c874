use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::domain::{
    ActingRole, Application, ApplicationId, ApplicationStatus, ReplacementId, ReplacementRequest,
    RequestStatus, ShiftId, ShiftRoleOverride, UserId,
};

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Typed failure of the atomic assignment transitions. The checks run again
/// inside the transaction, so racing callers get these instead of torn writes.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("replacement request is not open")]
    RequestNotOpen,
    #[error("application is not pending")]
    ApplicationNotPending,
    #[error("replacement request is not assigned")]
    RequestNotAssigned,
    #[error("application is not the approved one")]
    ApplicationNotApproved,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rows written by a committed assignment.
#[derive(Debug, Clone)]
pub struct AssignmentCommit {
    pub request: ReplacementRequest,
    pub approved: Application,
    pub rejected: Vec<Application>,
}

/// Rows written by a committed unassignment.
#[derive(Debug, Clone)]
pub struct UnassignmentCommit {
    pub request: ReplacementRequest,
    pub reactivated: Application,
}

/// Storage abstraction for replacement requests and their applications.
///
/// Implementations must enforce the uniqueness of active applications per
/// (replacement, applicant) and execute `commit_assignment` /
/// `revert_assignment` as single atomic units.
pub trait ReplacementStore: Send + Sync {
    fn insert_request(&self, request: ReplacementRequest)
        -> Result<ReplacementRequest, StoreError>;
    fn request(&self, id: &ReplacementId) -> Result<Option<ReplacementRequest>, StoreError>;
    fn insert_application(&self, application: Application) -> Result<Application, StoreError>;
    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError>;
    fn update_application(&self, application: Application) -> Result<(), StoreError>;
    fn applications_for(&self, id: &ReplacementId) -> Result<Vec<Application>, StoreError>;

    /// Atomically approve one application, reject its pending siblings, flip
    /// the request to `assigned`, and upsert the acting-role override.
    fn commit_assignment(
        &self,
        replacement: &ReplacementId,
        application: &ApplicationId,
        acting_role: Option<ActingRole>,
        decided_at: DateTime<Utc>,
    ) -> Result<AssignmentCommit, CommitError>;

    /// Atomically return the approved application to `pending`, reopen the
    /// request, clear `notification_sent_at`, and drop the role override.
    fn revert_assignment(
        &self,
        replacement: &ReplacementId,
        application: &ApplicationId,
    ) -> Result<UnassignmentCommit, CommitError>;

    /// Stamps the first successful notification enqueue; later calls keep the
    /// original timestamp.
    fn mark_notified(
        &self,
        replacement: &ReplacementId,
        at: DateTime<Utc>,
    ) -> Result<ReplacementRequest, StoreError>;

    fn role_override(
        &self,
        shift: &ShiftId,
        user: &UserId,
    ) -> Result<Option<ShiftRoleOverride>, StoreError>;
}

#[derive(Default)]
struct StoreState {
    requests: HashMap<ReplacementId, ReplacementRequest>,
    applications: HashMap<ApplicationId, Application>,
    role_overrides: HashMap<(ShiftId, UserId), ShiftRoleOverride>,
}

/// In-process store. The single mutex over the whole state is the
/// transaction: every trait method holds it for its full duration, so the
/// multi-row commits are observed either entirely or not at all.
#[derive(Default)]
pub struct MemoryReplacementStore {
    state: Mutex<StoreState>,
}

impl MemoryReplacementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplacementStore for MemoryReplacementStore {
    fn insert_request(
        &self,
        request: ReplacementRequest,
    ) -> Result<ReplacementRequest, StoreError> {
        let mut state = self.state.lock().expect("replacement store mutex poisoned");
        if state.requests.contains_key(&request.id) {
            return Err(StoreError::Conflict);
        }
        state.requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn request(&self, id: &ReplacementId) -> Result<Option<ReplacementRequest>, StoreError> {
        let state = self.state.lock().expect("replacement store mutex poisoned");
        Ok(state.requests.get(id).cloned())
    }

    fn insert_application(&self, application: Application) -> Result<Application, StoreError> {
        let mut state = self.state.lock().expect("replacement store mutex poisoned");
        if !state.requests.contains_key(&application.replacement_id) {
            return Err(StoreError::NotFound);
        }
        if state.applications.contains_key(&application.id) {
            return Err(StoreError::Conflict);
        }
        let duplicate = state.applications.values().any(|existing| {
            existing.replacement_id == application.replacement_id
                && existing.applicant_id == application.applicant_id
                && existing.status.is_active()
        });
        if duplicate {
            return Err(StoreError::Conflict);
        }
        state
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, StoreError> {
        let state = self.state.lock().expect("replacement store mutex poisoned");
        Ok(state.applications.get(id).cloned())
    }

    fn update_application(&self, application: Application) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("replacement store mutex poisoned");
        if !state.applications.contains_key(&application.id) {
            return Err(StoreError::NotFound);
        }
        state.applications.insert(application.id.clone(), application);
        Ok(())
    }

    fn applications_for(&self, id: &ReplacementId) -> Result<Vec<Application>, StoreError> {
        let state = self.state.lock().expect("replacement store mutex poisoned");
        let mut applications: Vec<Application> = state
            .applications
            .values()
            .filter(|application| application.replacement_id == *id)
            .cloned()
            .collect();
        applications.sort_by(|a, b| {
            a.applied_at
                .cmp(&b.applied_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(applications)
    }

    fn commit_assignment(
        &self,
        replacement: &ReplacementId,
        application: &ApplicationId,
        acting_role: Option<ActingRole>,
        decided_at: DateTime<Utc>,
    ) -> Result<AssignmentCommit, CommitError> {
        let mut state = self.state.lock().expect("replacement store mutex poisoned");

        match state.requests.get(replacement) {
            None => return Err(StoreError::NotFound.into()),
            Some(request) if request.status != RequestStatus::Open => {
                return Err(CommitError::RequestNotOpen)
            }
            Some(_) => {}
        }

        let target = match state.applications.get(application) {
            None => return Err(StoreError::NotFound.into()),
            Some(found) if found.replacement_id != *replacement => {
                return Err(StoreError::NotFound.into())
            }
            Some(found) => found.clone(),
        };
        if target.status != ApplicationStatus::Pending {
            return Err(CommitError::ApplicationNotPending);
        }

        let mut approved = target;
        approved.status = ApplicationStatus::Approved;
        approved.decided_at = Some(decided_at);
        state
            .applications
            .insert(approved.id.clone(), approved.clone());

        let mut rejected = Vec::new();
        for sibling in state.applications.values_mut() {
            if sibling.replacement_id == *replacement
                && sibling.id != approved.id
                && sibling.status == ApplicationStatus::Pending
            {
                sibling.status = ApplicationStatus::Rejected;
                sibling.decided_at = Some(decided_at);
                rejected.push(sibling.clone());
            }
        }
        rejected.sort_by(|a, b| a.id.0.cmp(&b.id.0));

        let Some(request) = state.requests.get_mut(replacement) else {
            return Err(StoreError::NotFound.into());
        };
        request.status = RequestStatus::Assigned;
        let request = request.clone();

        if let Some(role) = acting_role {
            let key = (request.shift_id.clone(), approved.applicant_id.clone());
            state.role_overrides.insert(
                key,
                ShiftRoleOverride::for_role(
                    request.shift_id.clone(),
                    approved.applicant_id.clone(),
                    role,
                ),
            );
        }

        Ok(AssignmentCommit {
            request,
            approved,
            rejected,
        })
    }

    fn revert_assignment(
        &self,
        replacement: &ReplacementId,
        application: &ApplicationId,
    ) -> Result<UnassignmentCommit, CommitError> {
        let mut state = self.state.lock().expect("replacement store mutex poisoned");

        match state.requests.get(replacement) {
            None => return Err(StoreError::NotFound.into()),
            Some(request) if request.status != RequestStatus::Assigned => {
                return Err(CommitError::RequestNotAssigned)
            }
            Some(_) => {}
        }

        let target = match state.applications.get(application) {
            None => return Err(StoreError::NotFound.into()),
            Some(found) if found.replacement_id != *replacement => {
                return Err(StoreError::NotFound.into())
            }
            Some(found) => found.clone(),
        };
        if target.status != ApplicationStatus::Approved {
            return Err(CommitError::ApplicationNotApproved);
        }

        let mut reactivated = target;
        reactivated.status = ApplicationStatus::Pending;
        reactivated.decided_at = None;
        state
            .applications
            .insert(reactivated.id.clone(), reactivated.clone());

        let Some(request) = state.requests.get_mut(replacement) else {
            return Err(StoreError::NotFound.into());
        };
        request.status = RequestStatus::Open;
        request.notification_sent_at = None;
        let request = request.clone();

        state
            .role_overrides
            .remove(&(request.shift_id.clone(), reactivated.applicant_id.clone()));

        Ok(UnassignmentCommit {
            request,
            reactivated,
        })
    }

    fn mark_notified(
        &self,
        replacement: &ReplacementId,
        at: DateTime<Utc>,
    ) -> Result<ReplacementRequest, StoreError> {
        let mut state = self.state.lock().expect("replacement store mutex poisoned");
        let Some(request) = state.requests.get_mut(replacement) else {
            return Err(StoreError::NotFound);
        };
        if request.notification_sent_at.is_none() {
            request.notification_sent_at = Some(at);
        }
        Ok(request.clone())
    }

    fn role_override(
        &self,
        shift: &ShiftId,
        user: &UserId,
    ) -> Result<Option<ShiftRoleOverride>, StoreError> {
        let state = self.state.lock().expect("replacement store mutex poisoned");
        Ok(state
            .role_overrides
            .get(&(shift.clone(), user.clone()))
            .cloned())
    }
}
