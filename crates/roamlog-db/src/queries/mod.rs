mod goals;
mod history;
mod social;
mod users;

use rusqlite::Connection;

/// Recompute a user's denormalized trip counters from their own entries.
/// Runs inside the caller's transaction.
fn refresh_aggregates(conn: &Connection, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET
            last_trip = (SELECT area_name FROM travel_history
                         WHERE user_id = ?1
                         ORDER BY end_date DESC, id DESC
                         LIMIT 1),
            num_cities_travelled = (SELECT COUNT(*) FROM travel_history
                                    WHERE user_id = ?1)
         WHERE id = ?1",
        [user_id],
    )?;
    Ok(())
}
