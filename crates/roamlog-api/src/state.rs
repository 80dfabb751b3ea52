use std::sync::Arc;

use roamlog_db::{Database, DbPool};

use crate::error::ApiError;
use crate::uploads::UploadStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub pool: DbPool,
    pub uploads: UploadStore,
}

impl AppStateInner {
    pub fn new(pool: DbPool, uploads: UploadStore) -> AppState {
        Arc::new(Self { pool, uploads })
    }

    /// Run a blocking query against the current database.
    ///
    /// Errors come back as `Internal` carrying `context`, except connection
    /// failures: those are reported to the pool (which schedules a reconnect)
    /// and surface as `Unavailable`.
    pub async fn db<F, T>(&self, context: &'static str, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let db = pool.current().ok_or(ApiError::Unavailable)?;
            f(&db).map_err(|e| {
                if pool.report_failure(&e) {
                    ApiError::Unavailable
                } else {
                    ApiError::internal(context, e)
                }
            })
        })
        .await
        .map_err(|e| ApiError::internal(context, e))?
    }
}
