use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use roamlog_types::api::NewUser;
use roamlog_types::models::{UserProfile, UserStats};

use crate::models::{LoginRow, SignupOutcome, timestamp};
use crate::{Constraint, Database, constraint_violation};

const PROFILE_COLUMNS: &str = "id, account_name, email, age, last_trip,
     num_cities_travelled, num_foreign_cities_travelled, created_at";

impl Database {
    /// Check for an existing email or account name, then insert, all in one
    /// transaction. A UNIQUE violation from the insert itself (a concurrent
    /// signup) is reported the same way as the pre-check.
    pub fn create_user(
        &self,
        account_name: &str,
        email: &str,
        password_hash: &str,
        age: Option<i64>,
    ) -> Result<SignupOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let conflict: Option<String> = tx
                .query_row(
                    "SELECT CASE WHEN email = ?1 THEN 'email' ELSE 'username' END
                     FROM users
                     WHERE email = ?1 OR account_name = ?2
                     ORDER BY (email = ?1) DESC
                     LIMIT 1",
                    (email, account_name),
                    |row| row.get(0),
                )
                .optional()?;

            match conflict.as_deref() {
                Some("email") => return Ok(SignupOutcome::EmailTaken),
                Some(_) => return Ok(SignupOutcome::NameTaken),
                None => {}
            }

            let inserted = tx.execute(
                "INSERT INTO users (account_name, email, password_hash, age)
                 VALUES (?1, ?2, ?3, ?4)",
                (account_name, email, password_hash, age),
            );
            if let Err(e) = inserted {
                return match (constraint_violation(&e), &e) {
                    (Some(Constraint::Unique), rusqlite::Error::SqliteFailure(_, Some(msg)))
                        if msg.contains("users.email") =>
                    {
                        Ok(SignupOutcome::EmailTaken)
                    }
                    (Some(Constraint::Unique), _) => Ok(SignupOutcome::NameTaken),
                    _ => Err(e.into()),
                };
            }

            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(SignupOutcome::Created(NewUser {
                id,
                account_name: account_name.to_string(),
                email: email.to_string(),
            }))
        })
    }

    /// Look a user up by email for login, with the figures the session shows.
    pub fn find_login(&self, email: &str) -> Result<Option<LoginRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT
                        u.id, u.account_name, u.email, u.password_hash,
                        (SELECT th.area_name FROM travel_history th
                         WHERE th.user_id = u.id
                         ORDER BY th.end_date DESC, th.id DESC
                         LIMIT 1),
                        (SELECT COUNT(*) FROM travel_history th WHERE th.user_id = u.id),
                        (SELECT COUNT(DISTINCT th.id)
                         FROM travel_history th
                         JOIN connections c ON c.shared_history_id = th.id
                         WHERE c.status = 'accepted'
                           AND (c.requester_id = u.id OR c.receiver_id = u.id)
                           AND th.user_id != u.id),
                        u.num_foreign_cities_travelled
                     FROM users u
                     WHERE u.email = ?1",
                    [email],
                    |row| {
                        Ok(LoginRow {
                            id: row.get(0)?,
                            account_name: row.get(1)?,
                            email: row.get(2)?,
                            password_hash: row.get(3)?,
                            last_trip_area: row.get(4)?,
                            own_entries: row.get(5)?,
                            shared_entries: row.get(6)?,
                            foreign_cities: row.get(7)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserProfile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY id ASC",
                PROFILE_COLUMNS
            ))?;
            let users = stmt
                .query_map([], profile_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| query_profile(conn, id))
    }

    pub fn user_stats(&self, id: i64) -> Result<Option<UserStats>> {
        self.with_conn(|conn| {
            let stats = conn
                .query_row(
                    "SELECT num_cities_travelled, num_foreign_cities_travelled, last_trip
                     FROM users WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(UserStats {
                            cities_visited: row.get(0)?,
                            foreign_cities: row.get(1)?,
                            last_trip: row
                                .get::<_, Option<String>>(2)?
                                .unwrap_or_else(|| "Never".to_string()),
                        })
                    },
                )
                .optional()?;
            Ok(stats)
        })
    }
}

fn query_profile(conn: &Connection, id: i64) -> Result<Option<UserProfile>> {
    let profile = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", PROFILE_COLUMNS),
            [id],
            profile_from_row,
        )
        .optional()?;
    Ok(profile)
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        account_name: row.get(1)?,
        email: row.get(2)?,
        age: row.get(3)?,
        last_trip: row.get(4)?,
        cities_travelled: row.get(5)?,
        foreign_cities_travelled: row.get(6)?,
        created_at: timestamp(row, 7)?,
    })
}
