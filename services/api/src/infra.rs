use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use shift_relief::config::ThrottleConfig;
use shift_relief::error::AppError;
use shift_relief::workflows::intake::RosterVacancyImporter;
use shift_relief::workflows::replacement::{
    ActorRole, ApplicationManager, AssignmentCoordinator, AuditEntry, AuditError, AuditSink,
    CalendarService, Channel, ChannelAck, Clock, DispatchAck, IdAllocator, IdentityService,
    MemoryReplacementStore, Notification, NotificationGateway, NotifyError, ReplacementRequest,
    ReplacementStore, ShiftId, ShiftSummary, SystemClock, ThrottlePolicy, UserId, UserSummary,
    WithdrawalLimiter,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Gateway stub standing in for the e-mail and chat delivery subsystems.
/// Dispatches are logged and acknowledged; physical delivery is not this
/// service's concern.
#[derive(Default)]
pub(crate) struct InMemoryNotificationGateway {
    events: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationGateway {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("gateway mutex poisoned").clone()
    }
}

impl NotificationGateway for InMemoryNotificationGateway {
    fn dispatch(&self, notification: Notification) -> Result<DispatchAck, NotifyError> {
        info!(
            recipient = %notification.recipient.0,
            event = notification.event.label(),
            "notification queued"
        );
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

/// Audit sink stub retaining entries in memory.
#[derive(Default)]
pub(crate) struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub(crate) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        debug!(
            actor = %entry.actor.0,
            action = entry.action.label(),
            entity = %entry.entity,
            "audit entry recorded"
        );
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

/// In-process stand-in for the external identity and calendar services.
pub(crate) struct StaticDirectory {
    users: HashMap<UserId, UserSummary>,
    shifts: Mutex<HashMap<ShiftId, ShiftSummary>>,
}

impl StaticDirectory {
    pub(crate) fn station_roster() -> Self {
        let mut users = HashMap::new();
        for (id, name, role) in [
            ("u-chief", "Cmdt. Perrin", ActorRole::Admin),
            ("u-requester", "V. Charvet", ActorRole::Member),
            ("u-x", "A. Roux", ActorRole::Member),
            ("u-y", "B. Morel", ActorRole::Member),
            ("u-z", "C. Lopez", ActorRole::Member),
        ] {
            users.insert(
                UserId(id.to_string()),
                UserSummary {
                    user_id: UserId(id.to_string()),
                    name: name.to_string(),
                    role,
                },
            );
        }

        Self {
            users,
            shifts: Mutex::new(HashMap::new()),
        }
    }

    /// Mirrors seeded requests into the calendar lookup so notifications can
    /// be annotated.
    pub(crate) fn learn_shift(&self, request: &ReplacementRequest) {
        self.shifts.lock().expect("directory mutex poisoned").insert(
            request.shift_id.clone(),
            ShiftSummary {
                shift_id: request.shift_id.clone(),
                date: request.shift_date,
                shift_type: request.shift_type,
                team_id: request.team_id.clone(),
            },
        );
    }
}

impl IdentityService for StaticDirectory {
    fn user(&self, id: &UserId) -> Option<UserSummary> {
        self.users.get(id).cloned()
    }
}

impl CalendarService for StaticDirectory {
    fn shift(&self, id: &ShiftId) -> Option<ShiftSummary> {
        self.shifts
            .lock()
            .expect("directory mutex poisoned")
            .get(id)
            .cloned()
    }
}

/// Fully wired workflow engine over the in-process collaborators.
#[derive(Clone)]
pub(crate) struct Engine {
    pub(crate) store: Arc<MemoryReplacementStore>,
    pub(crate) ids: Arc<IdAllocator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) directory: Arc<StaticDirectory>,
    pub(crate) gateway: Arc<InMemoryNotificationGateway>,
    pub(crate) audit: Arc<InMemoryAuditSink>,
    pub(crate) manager: Arc<ApplicationManager<MemoryReplacementStore>>,
    pub(crate) coordinator:
        Arc<AssignmentCoordinator<MemoryReplacementStore, InMemoryNotificationGateway>>,
}

pub(crate) fn build_engine(throttle: &ThrottleConfig) -> Engine {
    let store = Arc::new(MemoryReplacementStore::new());
    let ids = Arc::new(IdAllocator::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let directory = Arc::new(StaticDirectory::station_roster());
    let gateway = Arc::new(InMemoryNotificationGateway::default());
    let audit = Arc::new(InMemoryAuditSink::default());
    let limiter = Arc::new(WithdrawalLimiter::new(
        ThrottlePolicy {
            retry_cooldown: throttle.withdrawal_retry_cooldown,
            min_spacing: throttle.withdrawal_min_spacing,
        },
        clock.clone(),
    ));

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
        directory.clone(),
        clock.clone(),
    ));

    Engine {
        store,
        ids,
        clock,
        directory,
        gateway,
        audit,
        manager,
        coordinator,
    }
}

/// Stores freshly imported requests and teaches the calendar stub about
/// their shifts.
pub(crate) fn seed_requests(
    engine: &Engine,
    requests: Vec<ReplacementRequest>,
) -> Result<Vec<ReplacementRequest>, AppError> {
    let mut seeded = Vec::with_capacity(requests.len());
    for request in requests {
        engine.directory.learn_shift(&request);
        seeded.push(
            engine
                .store
                .insert_request(request)
                .map_err(shift_relief::workflows::replacement::WorkflowError::Store)
                .map_err(AppError::Workflow)?,
        );
    }
    Ok(seeded)
}

/// Seeds open replacement requests from a planning CSV export on disk.
pub(crate) fn seed_from_roster<P: AsRef<Path>>(
    engine: &Engine,
    path: P,
) -> Result<Vec<ReplacementRequest>, AppError> {
    let requests = RosterVacancyImporter::from_path(path, &engine.ids, engine.clock.as_ref())?;
    seed_requests(engine, requests)
}
