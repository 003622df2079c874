use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::replacement::applications::ApplicationManager;
use crate::workflows::replacement::assignment::AssignmentCoordinator;
use crate::workflows::replacement::clock::{Clock, ManualClock};
use crate::workflows::replacement::collaborators::{
    CalendarService, IdentityService, ShiftSummary, UserSummary,
};
use crate::workflows::replacement::domain::{
    ActorRole, IdAllocator, PartialWindow, ReplacementRequest, ShiftId, ShiftType, TeamId, UserId,
};
use crate::workflows::replacement::notify::{
    AuditEntry, AuditError, AuditSink, Channel, ChannelAck, DispatchAck, Notification,
    NotificationGateway, NotifyError,
};
use crate::workflows::replacement::router::{replacement_router, WorkflowState};
use crate::workflows::replacement::store::{MemoryReplacementStore, ReplacementStore};
use crate::workflows::replacement::throttle::{ThrottlePolicy, WithdrawalLimiter};

pub(super) fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn shift_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 8).expect("valid date")
}

pub(super) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

pub(super) fn admin() -> UserId {
    user("u-chief")
}

pub(super) fn afternoon_window() -> PartialWindow {
    let start = NaiveTime::from_hms_opt(13, 0, 0).expect("valid time");
    let end = NaiveTime::from_hms_opt(17, 0, 0).expect("valid time");
    PartialWindow::new(start, end).expect("valid window")
}

/// Gateway that records payloads and accepts on both channels.
#[derive(Default)]
pub(super) struct RecordingGateway {
    events: Mutex<Vec<Notification>>,
}

impl RecordingGateway {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("gateway mutex poisoned").clone()
    }
}

impl NotificationGateway for RecordingGateway {
    fn dispatch(&self, notification: Notification) -> Result<DispatchAck, NotifyError> {
        self.events
            .lock()
            .expect("gateway mutex poisoned")
            .push(notification);
        Ok(DispatchAck {
            attempts: vec![
                ChannelAck {
                    channel: Channel::Email,
                    accepted: true,
                    detail: None,
                },
                ChannelAck {
                    channel: Channel::Chat,
                    accepted: true,
                    detail: None,
                },
            ],
        })
    }
}

/// Gateway whose channels all decline the dispatch.
#[derive(Default)]
pub(super) struct RefusingGateway;

impl NotificationGateway for RefusingGateway {
    fn dispatch(&self, _notification: Notification) -> Result<DispatchAck, NotifyError> {
        Ok(DispatchAck {
            attempts: vec![ChannelAck {
                channel: Channel::Email,
                accepted: false,
                detail: Some("mailbox over quota".to_string()),
            }],
        })
    }
}

/// Gateway whose transport is down entirely.
#[derive(Default)]
pub(super) struct FailingGateway;

impl NotificationGateway for FailingGateway {
    fn dispatch(&self, _notification: Notification) -> Result<DispatchAck, NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct FailingAudit;

impl AuditSink for FailingAudit {
    fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Transport("log store offline".to_string()))
    }
}

/// Fixed in-memory directory backing both read-only collaborators.
pub(super) struct StaticDirectory {
    users: HashMap<UserId, UserSummary>,
    shifts: HashMap<ShiftId, ShiftSummary>,
}

impl StaticDirectory {
    pub(super) fn seeded() -> Self {
        let mut users = HashMap::new();
        for (id, name, role) in [
            ("u-chief", "Cmdt. Perrin", ActorRole::Admin),
            ("u-requester", "V. Charvet", ActorRole::Member),
            ("u-x", "A. Roux", ActorRole::Member),
            ("u-y", "B. Morel", ActorRole::Member),
            ("u-z", "C. Lopez", ActorRole::Member),
        ] {
            users.insert(
                user(id),
                UserSummary {
                    user_id: user(id),
                    name: name.to_string(),
                    role,
                },
            );
        }

        let mut shifts = HashMap::new();
        shifts.insert(
            ShiftId("S-401".to_string()),
            ShiftSummary {
                shift_id: ShiftId("S-401".to_string()),
                date: shift_date(),
                shift_type: ShiftType::Night,
                team_id: TeamId("T2".to_string()),
            },
        );

        Self { users, shifts }
    }
}

impl IdentityService for StaticDirectory {
    fn user(&self, id: &UserId) -> Option<UserSummary> {
        self.users.get(id).cloned()
    }
}

impl CalendarService for StaticDirectory {
    fn shift(&self, id: &ShiftId) -> Option<ShiftSummary> {
        self.shifts.get(id).cloned()
    }
}

/// Fully wired engine over the in-memory store and recording collaborators.
pub(super) struct Harness {
    pub(super) store: Arc<MemoryReplacementStore>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) ids: Arc<IdAllocator>,
    pub(super) gateway: Arc<RecordingGateway>,
    pub(super) audit: Arc<RecordingAudit>,
    pub(super) manager: Arc<ApplicationManager<MemoryReplacementStore>>,
    pub(super) coordinator: Arc<AssignmentCoordinator<MemoryReplacementStore, RecordingGateway>>,
}

pub(super) fn harness() -> Harness {
    harness_with_policy(ThrottlePolicy::default())
}

pub(super) fn harness_with_policy(policy: ThrottlePolicy) -> Harness {
    let store = Arc::new(MemoryReplacementStore::new());
    let clock = Arc::new(ManualClock::starting_at(epoch()));
    let ids = Arc::new(IdAllocator::new());
    let gateway = Arc::new(RecordingGateway::default());
    let audit = Arc::new(RecordingAudit::default());
    let directory = Arc::new(StaticDirectory::seeded());
    let limiter = Arc::new(WithdrawalLimiter::new(policy, clock.clone()));

    let manager = Arc::new(ApplicationManager::new(
        store.clone(),
        limiter,
        clock.clone(),
        ids.clone(),
        directory.clone(),
        audit.clone(),
    ));
    let coordinator = Arc::new(AssignmentCoordinator::new(
        store.clone(),
        gateway.clone(),
        audit.clone(),
        directory.clone(),
        directory,
        clock.clone(),
    ));

    Harness {
        store,
        clock,
        ids,
        gateway,
        audit,
        manager,
        coordinator,
    }
}

pub(super) fn seed_request(
    harness: &Harness,
    partial: Option<PartialWindow>,
) -> ReplacementRequest {
    let request = ReplacementRequest::open(
        harness.ids.next_replacement_id(),
        ShiftId("S-401".to_string()),
        shift_date(),
        ShiftType::Night,
        TeamId("T2".to_string()),
        user("u-requester"),
        partial,
        harness.clock.now(),
    );
    harness
        .store
        .insert_request(request.clone())
        .expect("seed request")
}

pub(super) fn workflow_router(harness: &Harness) -> axum::Router {
    replacement_router(WorkflowState {
        applications: harness.manager.clone(),
        assignments: harness.coordinator.clone(),
        store: harness.store.clone(),
    })
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
