//! Row-level types and write outcomes for the query layer.
//!
//! Read queries return `roamlog_types::models` values directly. The types
//! here cover what never leaves the server (password hashes) and the typed
//! results of writes whose failure modes callers must tell apart.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use roamlog_types::api::NewUser;
use roamlog_types::models::{Comment, Connection, Like};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// What login needs: the stored hash plus the figures for the session.
pub struct LoginRow {
    pub id: i64,
    pub account_name: String,
    pub email: String,
    pub password_hash: String,
    pub last_trip_area: Option<String>,
    pub own_entries: i64,
    pub shared_entries: i64,
    pub foreign_cities: i64,
}

/// Field values for inserting or updating a history entry.
#[derive(Debug, Clone)]
pub struct NewTravelEntry {
    pub user_id: i64,
    pub title: String,
    pub area_name: String,
    pub location_name: String,
    pub description: String,
    pub experiences: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub enum SignupOutcome {
    Created(NewUser),
    EmailTaken,
    NameTaken,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HistoryWrite {
    Saved(i64),
    /// No row matched (unknown user on insert, not owned on update).
    NotFound,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HistoryDelete {
    /// Stored filenames of the removed media, to be deleted from disk.
    Deleted { files: Vec<String> },
    NotFound,
}

pub enum LikeOutcome {
    Created(Like),
    AlreadyLiked,
    UnknownTarget,
}

pub enum CommentOutcome {
    Created(Comment),
    UnknownTarget,
}

pub enum GoalWrite {
    Created(i64),
    UnknownUser,
}

pub enum ConnectionOutcome {
    Created(Connection),
    Duplicate,
    UnknownTarget,
    /// The shared entry belongs to neither participant.
    NotParticipant,
}

/// Result of an action only a specific participant may take.
#[derive(Debug)]
pub enum Scoped<T> {
    Done(T),
    NotFound,
    Forbidden,
}

/// Read a `datetime('now')` column as UTC.
pub fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

/// Read a `YYYY-MM-DD` column.
pub fn date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    raw.parse::<DateTime<Utc>>().or_else(|_| {
        // SQLite stores "YYYY-MM-DD HH:MM:SS" without a timezone; it is UTC.
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        let sqlite = parse_timestamp("2024-05-01 12:30:00").unwrap();
        let rfc = parse_timestamp("2024-05-01T12:30:00Z").unwrap();
        assert_eq!(sqlite, rfc);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn formats_dates_as_iso_text() {
        let d = NaiveDate::from_ymd_opt(2023, 7, 4).unwrap();
        assert_eq!(format_date(d), "2023-07-04");
    }
}
