use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::RosterImportError;
use crate::workflows::replacement::ShiftType;

#[derive(Debug)]
pub(crate) struct VacancyRecord {
    pub(crate) shift_id: String,
    pub(crate) date: NaiveDate,
    pub(crate) shift_type: ShiftType,
    pub(crate) team: String,
    pub(crate) requested_by: String,
    pub(crate) window_start: Option<NaiveTime>,
    pub(crate) window_end: Option<NaiveTime>,
}

pub(crate) fn parse_records<R: Read>(reader: R) -> Result<Vec<VacancyRecord>, RosterImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for row in csv_reader.deserialize::<VacancyRow>() {
        let row = row?;
        records.push(row.into_record()?);
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct VacancyRow {
    #[serde(rename = "Shift ID")]
    shift_id: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Shift Type")]
    shift_type: String,
    #[serde(rename = "Team")]
    team: String,
    #[serde(rename = "Requested By")]
    requested_by: String,
    #[serde(
        rename = "Window Start",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    window_start: Option<String>,
    #[serde(
        rename = "Window End",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    window_end: Option<String>,
}

impl VacancyRow {
    fn into_record(self) -> Result<VacancyRecord, RosterImportError> {
        if self.shift_id.is_empty() {
            return Err(RosterImportError::Invalid(
                "row is missing a shift id".to_string(),
            ));
        }
        if self.requested_by.is_empty() {
            return Err(RosterImportError::Invalid(format!(
                "shift {}: row is missing the requesting user",
                self.shift_id
            )));
        }

        let date = parse_date(&self.date).ok_or_else(|| {
            RosterImportError::Invalid(format!(
                "shift {}: '{}' is not a YYYY-MM-DD date",
                self.shift_id, self.date
            ))
        })?;
        let shift_type = ShiftType::parse(&self.shift_type).ok_or_else(|| {
            RosterImportError::Invalid(format!(
                "shift {}: '{}' is not a known shift type",
                self.shift_id, self.shift_type
            ))
        })?;

        let window_start = self.parse_window_time(self.window_start.as_deref())?;
        let window_end = self.parse_window_time(self.window_end.as_deref())?;

        Ok(VacancyRecord {
            shift_id: self.shift_id,
            date,
            shift_type,
            team: self.team,
            requested_by: self.requested_by,
            window_start,
            window_end,
        })
    }

    fn parse_window_time(&self, value: Option<&str>) -> Result<Option<NaiveTime>, RosterImportError> {
        let Some(raw) = value else {
            return Ok(None);
        };
        parse_time(raw).map(Some).ok_or_else(|| {
            RosterImportError::Invalid(format!(
                "shift {}: '{}' is not an HH:MM clock time",
                self.shift_id, raw
            ))
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
pub(crate) fn parse_time_for_tests(value: &str) -> Option<NaiveTime> {
    parse_time(value)
}
