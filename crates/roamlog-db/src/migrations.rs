use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id                              INTEGER PRIMARY KEY AUTOINCREMENT,
                account_name                    TEXT NOT NULL UNIQUE,
                email                           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash                   TEXT NOT NULL,
                age                             INTEGER,
                last_trip                       TEXT,
                num_cities_travelled            INTEGER NOT NULL DEFAULT 0,
                num_foreign_cities_travelled    INTEGER NOT NULL DEFAULT 0,
                created_at                      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE travel_history (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                title           TEXT NOT NULL,
                area_name       TEXT NOT NULL,
                location_name   TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                experiences     TEXT NOT NULL DEFAULT '',
                start_date      TEXT NOT NULL,
                end_date        TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_travel_history_user
                ON travel_history(user_id, start_date);

            CREATE TABLE travel_media (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                history_id  INTEGER NOT NULL REFERENCES travel_history(id),
                media_url   TEXT NOT NULL,
                media_type  TEXT NOT NULL DEFAULT 'photo',
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_travel_media_history
                ON travel_media(history_id);

            CREATE TABLE future_goals (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                target_date TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_future_goals_user
                ON future_goals(user_id, target_date);

            CREATE TABLE connections (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                requester_id        INTEGER NOT NULL REFERENCES users(id),
                receiver_id         INTEGER NOT NULL REFERENCES users(id),
                shared_history_id   INTEGER NOT NULL REFERENCES travel_history(id),
                status              TEXT NOT NULL DEFAULT 'pending'
                                    CHECK (status IN ('pending', 'accepted')),
                created_at          TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at          TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(requester_id, receiver_id, shared_history_id)
            );

            CREATE INDEX idx_connections_history
                ON connections(shared_history_id);

            CREATE TABLE likes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                history_id  INTEGER NOT NULL REFERENCES travel_history(id),
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(user_id, history_id)
            );

            CREATE TABLE comments (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL REFERENCES users(id),
                history_id      INTEGER NOT NULL REFERENCES travel_history(id),
                comment_text    TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_comments_history
                ON comments(history_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
