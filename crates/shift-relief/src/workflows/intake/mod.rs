//! Planning-export intake: turns a CSV of vacant shifts into open
//! replacement requests. This is how requests "created externally" enter the
//! workflow engine in bulk.

mod parser;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use crate::workflows::replacement::{
    Clock, IdAllocator, PartialWindow, ReplacementRequest, ShiftId, TeamId, UserId, WorkflowError,
};

use parser::VacancyRecord;

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Invalid(String),
    Workflow(WorkflowError),
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read planning export: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid planning CSV data: {}", err),
            RosterImportError::Invalid(reason) => {
                write!(f, "planning export row rejected: {}", reason)
            }
            RosterImportError::Workflow(err) => {
                write!(f, "could not open replacement request from row: {}", err)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::Invalid(_) => None,
            RosterImportError::Workflow(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<WorkflowError> for RosterImportError {
    fn from(err: WorkflowError) -> Self {
        Self::Workflow(err)
    }
}

pub struct RosterVacancyImporter;

impl RosterVacancyImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        ids: &IdAllocator,
        clock: &dyn Clock,
    ) -> Result<Vec<ReplacementRequest>, RosterImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, ids, clock)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        ids: &IdAllocator,
        clock: &dyn Clock,
    ) -> Result<Vec<ReplacementRequest>, RosterImportError> {
        let mut requests = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for record in parser::parse_records(reader)? {
            if !seen.insert(record.shift_id.clone()) {
                continue;
            }
            requests.push(open_request(record, ids, clock)?);
        }

        Ok(requests)
    }
}

fn open_request(
    record: VacancyRecord,
    ids: &IdAllocator,
    clock: &dyn Clock,
) -> Result<ReplacementRequest, RosterImportError> {
    let partial = match (record.window_start, record.window_end) {
        (Some(start), Some(end)) => Some(PartialWindow::new(start, end)?),
        (None, None) => None,
        _ => {
            return Err(RosterImportError::Invalid(format!(
                "shift {}: partial rows need both window bounds",
                record.shift_id
            )))
        }
    };

    Ok(ReplacementRequest::open(
        ids.next_replacement_id(),
        ShiftId(record.shift_id),
        record.date,
        record.shift_type,
        TeamId(record.team),
        UserId(record.requested_by),
        partial,
        clock.now(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::replacement::{Clock as _, ManualClock, RequestStatus, ShiftType};
    use chrono::{TimeZone, Utc};
    use std::io::Cursor;

    const HEADER: &str = "Shift ID,Date,Shift Type,Team,Requested By,Window Start,Window End\n";

    fn importer_inputs() -> (IdAllocator, ManualClock) {
        let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap());
        (IdAllocator::new(), clock)
    }

    #[test]
    fn parse_time_supports_minutes_and_seconds() {
        let short = parser::parse_time_for_tests("13:00").expect("parse HH:MM");
        assert_eq!(short.format("%H:%M:%S").to_string(), "13:00:00");

        let long = parser::parse_time_for_tests("13:00:30").expect("parse HH:MM:SS");
        assert_eq!(long.format("%H:%M:%S").to_string(), "13:00:30");

        assert!(parser::parse_time_for_tests("25:00").is_none());
        assert!(parser::parse_time_for_tests("soon").is_none());
    }

    #[test]
    fn importer_opens_full_and_partial_requests() {
        let csv = format!(
            "{HEADER}S-401,2025-03-08,night,T2,u-requester,,\n\
             S-402,2025-03-09,day,T1,u-other,13:00,17:00\n"
        );
        let (ids, clock) = importer_inputs();
        let requests = RosterVacancyImporter::from_reader(Cursor::new(csv), &ids, &clock)
            .expect("import succeeds");

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].status, RequestStatus::Open);
        assert!(!requests[0].is_partial());
        assert_eq!(requests[0].shift_type, ShiftType::Night);

        let partial = requests[1].partial.expect("partial window");
        assert_eq!(partial.start.format("%H:%M").to_string(), "13:00");
        assert_eq!(partial.end.format("%H:%M").to_string(), "17:00");
        assert_eq!(requests[1].created_at, clock.now());
    }

    #[test]
    fn importer_skips_duplicate_shift_rows() {
        let csv = format!(
            "{HEADER}S-401,2025-03-08,night,T2,u-requester,,\n\
             S-401,2025-03-08,night,T2,u-requester,,\n"
        );
        let (ids, clock) = importer_inputs();
        let requests = RosterVacancyImporter::from_reader(Cursor::new(csv), &ids, &clock)
            .expect("import succeeds");
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn importer_rejects_half_open_windows() {
        let csv = format!("{HEADER}S-403,2025-03-10,day,T1,u-other,13:00,\n");
        let (ids, clock) = importer_inputs();
        let error = RosterVacancyImporter::from_reader(Cursor::new(csv), &ids, &clock)
            .expect_err("half-open window rejected");
        match error {
            RosterImportError::Invalid(reason) => assert!(reason.contains("both window bounds")),
            other => panic!("expected invalid row error, got {other:?}"),
        }
    }

    #[test]
    fn importer_rejects_inverted_windows() {
        let csv = format!("{HEADER}S-404,2025-03-10,day,T1,u-other,17:00,13:00\n");
        let (ids, clock) = importer_inputs();
        let error = RosterVacancyImporter::from_reader(Cursor::new(csv), &ids, &clock)
            .expect_err("inverted window rejected");
        match error {
            RosterImportError::Workflow(err) => {
                assert!(err.to_string().contains("partial window"));
            }
            other => panic!("expected workflow error, got {other:?}"),
        }
    }

    #[test]
    fn importer_rejects_unknown_shift_types() {
        let csv = format!("{HEADER}S-405,2025-03-10,swing,T1,u-other,,\n");
        let (ids, clock) = importer_inputs();
        let error = RosterVacancyImporter::from_reader(Cursor::new(csv), &ids, &clock)
            .expect_err("unknown shift type rejected");
        match error {
            RosterImportError::Invalid(reason) => assert!(reason.contains("shift type")),
            other => panic!("expected invalid row error, got {other:?}"),
        }
    }

    #[test]
    fn importer_from_path_propagates_io_errors() {
        let (ids, clock) = importer_inputs();
        let error = RosterVacancyImporter::from_path("./does-not-exist.csv", &ids, &clock)
            .expect_err("expected io error");
        match error {
            RosterImportError::Io(_) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
