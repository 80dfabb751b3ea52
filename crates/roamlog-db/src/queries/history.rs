use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, Row, params};
use tracing::info;

use roamlog_types::models::{ConnectionStatus, HistoryType, Media, SharedHistory, TravelEntry};

use super::refresh_aggregates;
use crate::models::{
    HistoryDelete, HistoryWrite, NewTravelEntry, date, format_date, timestamp,
};
use crate::{Constraint, Database, constraint_violation};

/// Columns for [`entry_from_row`]; the caller appends the history type as
/// column 12.
const ENTRY_COLUMNS: &str = "th.id AS history_id, th.user_id, u.account_name, th.title,
     th.area_name, th.location_name, th.description, th.experiences,
     th.start_date, th.end_date, th.created_at, th.updated_at";

/// A user's own entries plus entries shared with them through accepted
/// connections, optionally narrowed to one area (case-insensitive).
const USER_LISTING: &str = "
    SELECT th.id AS history_id, th.user_id, u.account_name, th.title,
           th.area_name, th.location_name, th.description, th.experiences,
           th.start_date, th.end_date, th.created_at, th.updated_at,
           'personal' AS history_type
    FROM travel_history th
    JOIN users u ON u.id = th.user_id
    WHERE th.user_id = ?1
      AND (?2 IS NULL OR LOWER(th.area_name) = LOWER(?2))

    UNION

    SELECT th.id AS history_id, th.user_id, u.account_name, th.title,
           th.area_name, th.location_name, th.description, th.experiences,
           th.start_date, th.end_date, th.created_at, th.updated_at,
           'shared' AS history_type
    FROM travel_history th
    JOIN connections c ON c.shared_history_id = th.id
    JOIN users u ON u.id = th.user_id
    WHERE c.status = 'accepted'
      AND th.user_id != ?1
      AND (c.requester_id = ?1 OR c.receiver_id = ?1)
      AND (?2 IS NULL OR LOWER(th.area_name) = LOWER(?2))

    ORDER BY start_date DESC, history_id DESC";

impl Database {
    /// Insert an entry, one media row per stored file, and refresh the
    /// owner's counters in a single transaction.
    pub fn create_history(&self, entry: &NewTravelEntry, files: &[String]) -> Result<HistoryWrite> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                "INSERT INTO travel_history
                    (user_id, title, area_name, location_name, description, experiences,
                     start_date, end_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.user_id,
                    entry.title,
                    entry.area_name,
                    entry.location_name,
                    entry.description,
                    entry.experiences,
                    format_date(entry.start_date),
                    format_date(entry.end_date),
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if constraint_violation(&e) == Some(Constraint::ForeignKey) => {
                    return Ok(HistoryWrite::NotFound);
                }
                Err(e) => return Err(e.into()),
            }
            let history_id = tx.last_insert_rowid();

            insert_media(&tx, entry.user_id, history_id, files)?;
            refresh_aggregates(&tx, entry.user_id)?;
            tx.commit()?;

            info!(
                "Travel history {} created for user {} with {} photo(s)",
                history_id,
                entry.user_id,
                files.len()
            );
            Ok(HistoryWrite::Saved(history_id))
        })
    }

    /// Update an entry owned by `entry.user_id` and append media rows for
    /// newly stored files. Existing media is kept.
    pub fn update_history(
        &self,
        history_id: i64,
        entry: &NewTravelEntry,
        files: &[String],
    ) -> Result<HistoryWrite> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE travel_history SET
                    title = ?3,
                    area_name = ?4,
                    location_name = ?5,
                    description = ?6,
                    experiences = ?7,
                    start_date = ?8,
                    end_date = ?9,
                    updated_at = datetime('now')
                 WHERE id = ?1 AND user_id = ?2",
                params![
                    history_id,
                    entry.user_id,
                    entry.title,
                    entry.area_name,
                    entry.location_name,
                    entry.description,
                    entry.experiences,
                    format_date(entry.start_date),
                    format_date(entry.end_date),
                ],
            )?;
            if updated == 0 {
                return Ok(HistoryWrite::NotFound);
            }

            insert_media(&tx, entry.user_id, history_id, files)?;
            refresh_aggregates(&tx, entry.user_id)?;
            tx.commit()?;

            Ok(HistoryWrite::Saved(history_id))
        })
    }

    /// Delete an entry and everything hanging off it: likes, comments,
    /// media rows, and the connections sharing it, in that order. Nothing
    /// is removed unless the entry belongs to `user_id`.
    pub fn delete_history(&self, history_id: i64, user_id: i64) -> Result<HistoryDelete> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let files = {
                let mut stmt =
                    tx.prepare("SELECT media_url FROM travel_media WHERE history_id = ?1")?;
                let files = stmt
                    .query_map([history_id], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                files
            };

            tx.execute("DELETE FROM likes WHERE history_id = ?1", [history_id])?;
            tx.execute("DELETE FROM comments WHERE history_id = ?1", [history_id])?;
            tx.execute("DELETE FROM travel_media WHERE history_id = ?1", [history_id])?;
            tx.execute(
                "DELETE FROM connections WHERE shared_history_id = ?1",
                [history_id],
            )?;
            let deleted = tx.execute(
                "DELETE FROM travel_history WHERE id = ?1 AND user_id = ?2",
                [history_id, user_id],
            )?;
            if deleted == 0 {
                return Ok(HistoryDelete::NotFound);
            }

            refresh_aggregates(&tx, user_id)?;
            tx.commit()?;

            info!("Travel history {} deleted by user {}", history_id, user_id);
            Ok(HistoryDelete::Deleted { files })
        })
    }

    /// Every entry from every user, newest trip first.
    pub fn list_all_entries(&self) -> Result<Vec<TravelEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, NULL AS history_type
                 FROM travel_history th
                 JOIN users u ON u.id = th.user_id
                 ORDER BY th.start_date DESC, th.id DESC",
                ENTRY_COLUMNS
            );
            let mut entries = query_entries(conn, &sql, [])?;
            attach_media(conn, &mut entries)?;
            Ok(entries)
        })
    }

    /// Personal ∪ shared entries for one user.
    pub fn list_user_entries(&self, user_id: i64, area: Option<&str>) -> Result<Vec<TravelEntry>> {
        self.with_conn(|conn| {
            let mut entries = query_entries(conn, USER_LISTING, params![user_id, area])?;
            attach_media(conn, &mut entries)?;
            Ok(entries)
        })
    }

    /// Entries from any user whose area matches, case-insensitively.
    pub fn entries_by_area(&self, area: &str) -> Result<Vec<TravelEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, 'personal' AS history_type
                 FROM travel_history th
                 JOIN users u ON u.id = th.user_id
                 WHERE LOWER(th.area_name) = LOWER(?1)
                 ORDER BY th.start_date DESC, th.id DESC",
                ENTRY_COLUMNS
            );
            let mut entries = query_entries(conn, &sql, [area])?;
            attach_media(conn, &mut entries)?;
            Ok(entries)
        })
    }

    /// A user's own most recent trips by start date.
    pub fn recent_entries(&self, user_id: i64, limit: u32) -> Result<Vec<TravelEntry>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, 'personal' AS history_type
                 FROM travel_history th
                 JOIN users u ON u.id = th.user_id
                 WHERE th.user_id = ?1
                 ORDER BY th.start_date DESC, th.id DESC
                 LIMIT ?2",
                ENTRY_COLUMNS
            );
            let mut entries = query_entries(conn, &sql, params![user_id, limit])?;
            attach_media(conn, &mut entries)?;
            Ok(entries)
        })
    }

    pub fn media_for_history(&self, history_id: i64) -> Result<Vec<Media>> {
        self.with_conn(|conn| {
            let mut by_history = query_media(conn, &[history_id])?;
            Ok(by_history.remove(&history_id).unwrap_or_default())
        })
    }

    /// Entries other users shared with `user_id` through accepted
    /// connections, one row per connection.
    pub fn shared_history_details(&self, user_id: i64) -> Result<Vec<SharedHistory>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    th.id, th.title, th.area_name, th.location_name,
                    th.start_date, th.end_date, th.description, th.experiences,
                    owner.id, owner.account_name,
                    c.id, c.status,
                    CASE WHEN c.requester_id = ?1 THEN c.receiver_id ELSE c.requester_id END,
                    CASE WHEN c.requester_id = ?1 THEN receiver.account_name
                         ELSE requester.account_name END
                 FROM travel_history th
                 JOIN connections c ON c.shared_history_id = th.id
                 JOIN users owner ON owner.id = th.user_id
                 LEFT JOIN users receiver ON receiver.id = c.receiver_id
                 LEFT JOIN users requester ON requester.id = c.requester_id
                 WHERE c.status = 'accepted'
                   AND th.user_id != ?1
                   AND (c.requester_id = ?1 OR c.receiver_id = ?1)
                 ORDER BY th.start_date DESC, c.id DESC",
            )?;
            let mut shared = stmt
                .query_map([user_id], |row| {
                    let status: String = row.get(11)?;
                    Ok(SharedHistory {
                        history_id: row.get(0)?,
                        title: row.get(1)?,
                        area_name: row.get(2)?,
                        location_name: row.get(3)?,
                        start_date: date(row, 4)?,
                        end_date: date(row, 5)?,
                        description: row.get(6)?,
                        experiences: row.get(7)?,
                        owner_id: row.get(8)?,
                        owner_account_name: row.get(9)?,
                        connection_id: row.get(10)?,
                        status: status.parse().unwrap_or(ConnectionStatus::Accepted),
                        other_user_id: row.get(12)?,
                        other_account_name: row.get(13)?,
                        media: Vec::new(),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let ids: Vec<i64> = shared.iter().map(|s| s.history_id).collect();
            let media = query_media(conn, &ids)?;
            for item in &mut shared {
                item.media = media.get(&item.history_id).cloned().unwrap_or_default();
            }
            Ok(shared)
        })
    }
}

fn insert_media(conn: &Connection, user_id: i64, history_id: i64, files: &[String]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO travel_media (user_id, history_id, media_url, media_type)
         VALUES (?1, ?2, ?3, 'photo')",
    )?;
    for file in files {
        stmt.execute(params![user_id, history_id, file])?;
    }
    Ok(())
}

fn query_entries<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<TravelEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, entry_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<TravelEntry> {
    let history_type: Option<String> = row.get(12)?;
    Ok(TravelEntry {
        history_id: row.get(0)?,
        user_id: row.get(1)?,
        account_name: row.get(2)?,
        title: row.get(3)?,
        area_name: row.get(4)?,
        location_name: row.get(5)?,
        description: row.get(6)?,
        experiences: row.get(7)?,
        start_date: date(row, 8)?,
        end_date: date(row, 9)?,
        created_at: timestamp(row, 10)?,
        updated_at: timestamp(row, 11)?,
        history_type: history_type.and_then(|t| t.parse::<HistoryType>().ok()),
        media: Vec::new(),
    })
}

/// Fill in `media` for a page of entries with one batched query.
fn attach_media(conn: &Connection, entries: &mut [TravelEntry]) -> Result<()> {
    let ids: Vec<i64> = entries.iter().map(|e| e.history_id).collect();
    let media = query_media(conn, &ids)?;
    for entry in entries.iter_mut() {
        entry.media = media.get(&entry.history_id).cloned().unwrap_or_default();
    }
    Ok(())
}

fn query_media(conn: &Connection, history_ids: &[i64]) -> Result<HashMap<i64, Vec<Media>>> {
    let mut grouped: HashMap<i64, Vec<Media>> = HashMap::new();
    if history_ids.is_empty() {
        return Ok(grouped);
    }

    let placeholders: Vec<String> = (1..=history_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT id, user_id, history_id, media_url, media_type, created_at
         FROM travel_media
         WHERE history_id IN ({})
         ORDER BY id ASC",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(history_ids.iter()), |row| {
        let filename: String = row.get(3)?;
        Ok(Media::from_stored(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            &filename,
            row.get(4)?,
            timestamp(row, 5)?,
        ))
    })?;

    for media in rows {
        let media = media?;
        grouped.entry(media.history_id).or_default().push(media);
    }
    Ok(grouped)
}
