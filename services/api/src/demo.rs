use crate::infra::{build_engine, seed_from_roster, Engine};
use chrono::NaiveTime;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use shift_relief::config::ThrottleConfig;
use shift_relief::error::AppError;
use shift_relief::workflows::replacement::{
    ActingRole, Application, Clock, PartialWindow, ReplacementRequest, ReplacementStore, ShiftId,
    ShiftType, TeamId, UserId, WorkflowError,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Planning CSV export used to seed the demo requests
    #[arg(long)]
    pub(crate) roster_csv: Option<PathBuf>,
}

fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let throttle = ThrottleConfig {
        withdrawal_retry_cooldown: Duration::from_secs(3),
        withdrawal_min_spacing: Duration::from_secs(1),
    };
    let engine = build_engine(&throttle);

    println!("Replacement workflow demo");
    let requests = match args.roster_csv {
        Some(path) => {
            let seeded = seed_from_roster(&engine, &path)?;
            println!("Data source: planning export ({} requests)", seeded.len());
            seeded
        }
        None => {
            let seeded = seed_sample_requests(&engine)?;
            println!("Data source: built-in sample ({} requests)", seeded.len());
            seeded
        }
    };

    let Some(first) = requests.first() else {
        println!("No open replacement requests to work with.");
        return Ok(());
    };

    println!("\nOpen requests");
    for request in &requests {
        let window = match request.partial {
            Some(window) => format!(
                " (partial {}-{})",
                window.start.format("%H:%M"),
                window.end.format("%H:%M")
            ),
            None => String::new(),
        };
        println!(
            "- {} | shift {} on {} [{}]{}",
            request.id.0,
            request.shift_id.0,
            request.shift_date,
            request.shift_type.label(),
            window
        );
    }

    println!("\nCandidates apply");
    let from_x = match engine.manager.apply(&first.id, &user("u-x")) {
        Ok(application) => application,
        Err(err) => {
            println!("  Application from u-x rejected: {err}");
            return Ok(());
        }
    };
    println!("- u-x applied -> {}", from_x.id.0);
    match engine.manager.apply(&first.id, &user("u-y")) {
        Ok(application) => println!("- u-y applied -> {}", application.id.0),
        Err(err) => println!("  Application from u-y rejected: {err}"),
    }
    match engine.manager.apply(&first.id, &user("u-x")) {
        Err(WorkflowError::Conflict(kind)) => {
            println!("- duplicate u-x application refused ({})", kind.label())
        }
        other => println!("  unexpected duplicate outcome: {other:?}"),
    }

    println!("\nAdministrator approves u-x as acting lieutenant");
    let receipt = match engine
        .coordinator
        .approve(&user("u-chief"), &from_x.id, Some(ActingRole::Lieutenant))
    {
        Ok(receipt) => receipt,
        Err(err) => {
            println!("  Approval failed: {err}");
            return Ok(());
        }
    };
    println!(
        "- request {} -> {} | {} competitor(s) rejected | notified: {}",
        receipt.request.id.0,
        receipt.request.status.label(),
        receipt.rejected.len(),
        receipt.notified
    );
    for event in engine.gateway.events() {
        println!(
            "  notification {} -> {}",
            event.event.label(),
            event.recipient.0
        );
    }

    println!("\nWithdrawal throttle");
    demo_withdrawal_throttle(&engine);

    println!("\nAdministrator reverses the assignment");
    match engine.coordinator.unassign(&user("u-chief"), &from_x.id) {
        Ok(receipt) => println!(
            "- request {} -> {} | {} back to {}",
            receipt.request.id.0,
            receipt.request.status.label(),
            receipt.reactivated.applicant_id.0,
            receipt.reactivated.status.label()
        ),
        Err(err) => println!("  Unassignment failed: {err}"),
    }

    println!("\nFinal request state");
    match engine.store.request(&first.id) {
        Ok(Some(request)) => {
            let applications = engine
                .store
                .applications_for(&request.id)
                .unwrap_or_default();
            match serde_json::to_string_pretty(&request.view(&applications)) {
                Ok(json) => println!("{json}"),
                Err(err) => println!("  view unavailable: {err}"),
            }
        }
        Ok(None) => println!("  request vanished"),
        Err(err) => println!("  store unavailable: {err}"),
    }

    println!("\nAudit trail: {} entries", engine.audit.entries().len());
    Ok(())
}

fn demo_withdrawal_throttle(engine: &Engine) {
    let Ok(application) = seed_throttle_request(engine) else {
        println!("  throttle demo skipped (seed failed)");
        return;
    };

    match engine.manager.withdraw(&application.id) {
        Ok(_) => println!("- u-z withdrew their application"),
        Err(err) => {
            println!("  withdrawal failed: {err}");
            return;
        }
    }
    if let Err(err) = engine.manager.reactivate(&application.id) {
        println!("  reactivation failed: {err}");
        return;
    }
    println!("- u-z reactivated it, then tried to withdraw again immediately");
    match engine.manager.withdraw(&application.id) {
        Err(WorkflowError::RateLimited { retry_after }) => println!(
            "- second withdrawal throttled, retry in {}ms",
            retry_after.as_millis()
        ),
        other => println!("  unexpected throttle outcome: {other:?}"),
    }
}

fn seed_throttle_request(engine: &Engine) -> Result<Application, AppError> {
    let request = ReplacementRequest::open(
        engine.ids.next_replacement_id(),
        ShiftId("S-901".to_string()),
        chrono::Local::now().date_naive(),
        ShiftType::Day,
        TeamId("T1".to_string()),
        user("u-requester"),
        None,
        engine.clock.now(),
    );
    engine.directory.learn_shift(&request);
    let request = engine
        .store
        .insert_request(request)
        .map_err(WorkflowError::Store)
        .map_err(AppError::Workflow)?;
    engine
        .manager
        .apply(&request.id, &user("u-z"))
        .map_err(AppError::Workflow)
}

fn seed_sample_requests(engine: &Engine) -> Result<Vec<ReplacementRequest>, AppError> {
    let today = chrono::Local::now().date_naive();
    let window = PartialWindow::new(
        NaiveTime::from_hms_opt(13, 0, 0).expect("valid time"),
        NaiveTime::from_hms_opt(17, 0, 0).expect("valid time"),
    )
    .map_err(AppError::Workflow)?;

    let samples = [
        ReplacementRequest::open(
            engine.ids.next_replacement_id(),
            ShiftId("S-401".to_string()),
            today + chrono::Duration::days(7),
            ShiftType::Night,
            TeamId("T2".to_string()),
            user("u-requester"),
            None,
            engine.clock.now(),
        ),
        ReplacementRequest::open(
            engine.ids.next_replacement_id(),
            ShiftId("S-402".to_string()),
            today + chrono::Duration::days(8),
            ShiftType::Day,
            TeamId("T1".to_string()),
            user("u-requester"),
            Some(window),
            engine.clock.now(),
        ),
    ];

    let mut seeded = Vec::with_capacity(samples.len());
    for request in samples {
        engine.directory.learn_shift(&request);
        seeded.push(
            engine
                .store
                .insert_request(request)
                .map_err(WorkflowError::Store)
                .map_err(AppError::Workflow)?,
        );
    }
    Ok(seeded)
}
