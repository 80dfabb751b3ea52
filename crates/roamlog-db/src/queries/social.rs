use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

use roamlog_types::models::{Comment, Connection as FriendConnection, ConnectionStatus, Like};

use crate::models::{CommentOutcome, ConnectionOutcome, LikeOutcome, Scoped, timestamp};
use crate::{Constraint, Database, constraint_violation};

const CONNECTION_COLUMNS: &str =
    "id, requester_id, receiver_id, shared_history_id, status, created_at, updated_at";

impl Database {
    // -- Likes --

    /// Insert a like. The UNIQUE(user_id, history_id) constraint decides
    /// whether it is a duplicate.
    pub fn insert_like(&self, user_id: i64, history_id: i64) -> Result<LikeOutcome> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO likes (user_id, history_id) VALUES (?1, ?2)",
                [user_id, history_id],
            );
            match inserted {
                Ok(_) => {}
                Err(e) => {
                    return match constraint_violation(&e) {
                        Some(Constraint::Unique) => Ok(LikeOutcome::AlreadyLiked),
                        Some(Constraint::ForeignKey) => Ok(LikeOutcome::UnknownTarget),
                        _ => Err(e.into()),
                    };
                }
            }
            let id = conn.last_insert_rowid();
            let like = conn.query_row(
                "SELECT l.id, l.user_id, l.history_id, u.account_name, l.created_at
                 FROM likes l JOIN users u ON u.id = l.user_id
                 WHERE l.id = ?1",
                [id],
                like_from_row,
            )?;
            Ok(LikeOutcome::Created(like))
        })
    }

    /// Likes on an entry, newest first.
    pub fn likes_for_history(&self, history_id: i64) -> Result<Vec<Like>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT l.id, l.user_id, l.history_id, u.account_name, l.created_at
                 FROM likes l JOIN users u ON u.id = l.user_id
                 WHERE l.history_id = ?1
                 ORDER BY l.created_at DESC, l.id DESC",
            )?;
            let likes = stmt
                .query_map([history_id], like_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(likes)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, user_id: i64, history_id: i64, text: &str) -> Result<CommentOutcome> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO comments (user_id, history_id, comment_text) VALUES (?1, ?2, ?3)",
                params![user_id, history_id, text],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if constraint_violation(&e) == Some(Constraint::ForeignKey) => {
                    return Ok(CommentOutcome::UnknownTarget);
                }
                Err(e) => return Err(e.into()),
            }
            let id = conn.last_insert_rowid();
            let comment = conn.query_row(
                "SELECT c.id, c.user_id, c.history_id, u.account_name, c.comment_text, c.created_at
                 FROM comments c JOIN users u ON u.id = c.user_id
                 WHERE c.id = ?1",
                [id],
                comment_from_row,
            )?;
            Ok(CommentOutcome::Created(comment))
        })
    }

    /// Comments on an entry, newest first.
    pub fn comments_for_history(&self, history_id: i64) -> Result<Vec<Comment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.user_id, c.history_id, u.account_name, c.comment_text, c.created_at
                 FROM comments c JOIN users u ON u.id = c.user_id
                 WHERE c.history_id = ?1
                 ORDER BY c.created_at DESC, c.id DESC",
            )?;
            let comments = stmt
                .query_map([history_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(comments)
        })
    }

    // -- Connections --

    /// Open a pending connection sharing `history_id` between two users.
    /// The entry must belong to one of them.
    pub fn create_connection(
        &self,
        requester_id: i64,
        receiver_id: i64,
        history_id: i64,
    ) -> Result<ConnectionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let owner: Option<i64> = tx
                .query_row(
                    "SELECT user_id FROM travel_history WHERE id = ?1",
                    [history_id],
                    |row| row.get(0),
                )
                .optional()?;
            match owner {
                None => return Ok(ConnectionOutcome::UnknownTarget),
                Some(owner) if owner != requester_id && owner != receiver_id => {
                    return Ok(ConnectionOutcome::NotParticipant);
                }
                Some(_) => {}
            }

            let inserted = tx.execute(
                "INSERT INTO connections (requester_id, receiver_id, shared_history_id, status)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    requester_id,
                    receiver_id,
                    history_id,
                    ConnectionStatus::Pending.as_str()
                ],
            );
            if let Err(e) = inserted {
                return match constraint_violation(&e) {
                    Some(Constraint::Unique) => Ok(ConnectionOutcome::Duplicate),
                    Some(Constraint::ForeignKey) => Ok(ConnectionOutcome::UnknownTarget),
                    _ => Err(e.into()),
                };
            }

            let connection = query_connection(&tx, tx.last_insert_rowid())?
                .ok_or_else(|| anyhow::anyhow!("inserted connection vanished"))?;
            tx.commit()?;
            Ok(ConnectionOutcome::Created(connection))
        })
    }

    /// Accept a connection. Only its receiver may do so; accepting twice is
    /// a no-op.
    pub fn accept_connection(&self, connection_id: i64, user_id: i64) -> Result<Scoped<FriendConnection>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(current) = query_connection(&tx, connection_id)? else {
                return Ok(Scoped::NotFound);
            };
            if current.receiver_id != user_id {
                return Ok(Scoped::Forbidden);
            }
            if current.status == ConnectionStatus::Accepted {
                return Ok(Scoped::Done(current));
            }

            tx.execute(
                "UPDATE connections SET status = ?2, updated_at = datetime('now')
                 WHERE id = ?1",
                params![connection_id, ConnectionStatus::Accepted.as_str()],
            )?;
            let accepted = query_connection(&tx, connection_id)?
                .ok_or_else(|| anyhow::anyhow!("accepted connection vanished"))?;
            tx.commit()?;
            Ok(Scoped::Done(accepted))
        })
    }

    /// Remove a connection. Either participant may do so.
    pub fn delete_connection(&self, connection_id: i64, user_id: i64) -> Result<Scoped<()>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(current) = query_connection(&tx, connection_id)? else {
                return Ok(Scoped::NotFound);
            };
            if !current.involves(user_id) {
                return Ok(Scoped::Forbidden);
            }
            tx.execute("DELETE FROM connections WHERE id = ?1", [connection_id])?;
            tx.commit()?;
            Ok(Scoped::Done(()))
        })
    }

    /// Every connection a user takes part in, newest first.
    pub fn connections_for_user(&self, user_id: i64) -> Result<Vec<FriendConnection>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM connections
                 WHERE requester_id = ?1 OR receiver_id = ?1
                 ORDER BY created_at DESC, id DESC",
                CONNECTION_COLUMNS
            ))?;
            let connections = stmt
                .query_map([user_id], connection_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(connections)
        })
    }
}

fn query_connection(conn: &Connection, id: i64) -> Result<Option<FriendConnection>> {
    let connection = conn
        .query_row(
            &format!("SELECT {} FROM connections WHERE id = ?1", CONNECTION_COLUMNS),
            [id],
            connection_from_row,
        )
        .optional()?;
    Ok(connection)
}

fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<FriendConnection> {
    let status: String = row.get(4)?;
    let status = status.parse::<ConnectionStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;
    Ok(FriendConnection {
        connection_id: row.get(0)?,
        requester_id: row.get(1)?,
        receiver_id: row.get(2)?,
        shared_history_id: row.get(3)?,
        status,
        created_at: timestamp(row, 5)?,
        updated_at: timestamp(row, 6)?,
    })
}

fn like_from_row(row: &Row<'_>) -> rusqlite::Result<Like> {
    Ok(Like {
        like_id: row.get(0)?,
        user_id: row.get(1)?,
        history_id: row.get(2)?,
        account_name: row.get(3)?,
        created_at: timestamp(row, 4)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        comment_id: row.get(0)?,
        user_id: row.get(1)?,
        history_id: row.get(2)?,
        account_name: row.get(3)?,
        comment_text: row.get(4)?,
        created_at: timestamp(row, 5)?,
    })
}
