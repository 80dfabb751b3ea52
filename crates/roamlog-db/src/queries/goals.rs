use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, Row, params};

use roamlog_types::models::FutureGoal;

use crate::models::{GoalWrite, date, format_date, timestamp};
use crate::{Constraint, Database, constraint_violation};

const GOAL_COLUMNS: &str = "fg.id, fg.user_id, u.account_name, fg.title, fg.description,
     fg.target_date, fg.created_at, fg.updated_at";

impl Database {
    pub fn create_goal(
        &self,
        user_id: i64,
        title: &str,
        description: &str,
        target_date: NaiveDate,
    ) -> Result<GoalWrite> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO future_goals (user_id, title, description, target_date)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, title, description, format_date(target_date)],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if constraint_violation(&e) == Some(Constraint::ForeignKey) => {
                    return Ok(GoalWrite::UnknownUser);
                }
                Err(e) => return Err(e.into()),
            }
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(GoalWrite::Created(id))
        })
    }

    /// A user's goals, nearest target date first.
    pub fn list_goals(&self, user_id: i64) -> Result<Vec<FutureGoal>> {
        self.with_conn(|conn| query_goals(conn, user_id, None))
    }

    pub fn upcoming_goals(&self, user_id: i64, limit: u32) -> Result<Vec<FutureGoal>> {
        self.with_conn(|conn| query_goals(conn, user_id, Some(limit)))
    }

    /// Returns false when no goal has this id.
    pub fn update_goal(
        &self,
        goal_id: i64,
        title: &str,
        description: &str,
        target_date: NaiveDate,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE future_goals SET
                    title = ?2,
                    description = ?3,
                    target_date = ?4,
                    updated_at = datetime('now')
                 WHERE id = ?1",
                params![goal_id, title, description, format_date(target_date)],
            )?;
            tx.commit()?;
            Ok(updated > 0)
        })
    }

    /// Returns false when no goal has this id.
    pub fn delete_goal(&self, goal_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute("DELETE FROM future_goals WHERE id = ?1", [goal_id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }
}

fn query_goals(conn: &Connection, user_id: i64, limit: Option<u32>) -> Result<Vec<FutureGoal>> {
    let sql = format!(
        "SELECT {}
         FROM future_goals fg
         JOIN users u ON u.id = fg.user_id
         WHERE fg.user_id = ?1
         ORDER BY fg.target_date ASC, fg.id ASC
         LIMIT ?2",
        GOAL_COLUMNS
    );
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.map(i64::from).unwrap_or(-1);

    let mut stmt = conn.prepare(&sql)?;
    let goals = stmt
        .query_map(params![user_id, limit], goal_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(goals)
}

fn goal_from_row(row: &Row<'_>) -> rusqlite::Result<FutureGoal> {
    Ok(FutureGoal {
        future_goal_id: row.get(0)?,
        user_id: row.get(1)?,
        account_name: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        target_date: date(row, 5)?,
        created_at: timestamp(row, 6)?,
        updated_at: timestamp(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::models::GoalWrite;
    use crate::queries::fixtures;
    use crate::test_support::open_temp;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn goals_are_listed_by_target_date() {
        let (db, _dir) = open_temp();
        let ana = fixtures::user(&db, "ana");
        for (title, date) in [("Japan", day(2027, 1, 1)), ("Peru", day(2026, 6, 1)), ("Chile", day(2026, 9, 1)), ("Nepal", day(2028, 1, 1))] {
            assert!(matches!(db.create_goal(ana, title, "", date).unwrap(), GoalWrite::Created(_)));
        }

        let titles: Vec<String> = db.list_goals(ana).unwrap().into_iter().map(|g| g.title).collect();
        assert_eq!(titles, ["Peru", "Chile", "Japan", "Nepal"]);

        let upcoming = db.upcoming_goals(ana, 3).unwrap();
        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].account_name, "ana");
    }

    #[test]
    fn update_and_delete_report_missing_goals() {
        let (db, _dir) = open_temp();
        let ana = fixtures::user(&db, "ana");
        let id = match db.create_goal(ana, "Iceland", "", day(2026, 1, 1)).unwrap() {
            GoalWrite::Created(id) => id,
            GoalWrite::UnknownUser => panic!("user exists"),
        };

        assert!(db.update_goal(id, "Iceland again", "ring road", day(2026, 2, 1)).unwrap());
        assert!(!db.update_goal(id + 1, "x", "", day(2026, 2, 1)).unwrap());
        assert_eq!(db.list_goals(ana).unwrap()[0].description, "ring road");

        assert!(db.delete_goal(id).unwrap());
        assert!(!db.delete_goal(id).unwrap());
    }

    #[test]
    fn goal_for_unknown_user_is_rejected() {
        let (db, _dir) = open_temp();
        assert!(matches!(
            db.create_goal(7, "Mars", "", day(2030, 1, 1)).unwrap(),
            GoalWrite::UnknownUser
        ));
    }
}
