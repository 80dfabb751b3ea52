//! Owner of the process-wide database handle.
//!
//! The pool holds at most one open [`Database`]. A connection-level failure
//! drops it and starts a background loop that re-opens it after a fixed
//! delay, forever, until it succeeds. Request handlers go through
//! [`DbPool::probe`], which re-opens synchronously when the pool is
//! disconnected and then checks liveness with `SELECT 1`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::{Database, is_connection_error};

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Read-only connections opened next to the writer.
    pub readers: usize,
    /// Pause before each background re-initialization attempt.
    pub reconnect_delay: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            readers: 4,
            reconnect_delay: Duration::from_millis(5000),
        }
    }
}

#[derive(Clone)]
pub struct DbPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    path: PathBuf,
    options: PoolOptions,
    current: RwLock<Option<Arc<Database>>>,
    reconnecting: AtomicBool,
}

impl DbPool {
    /// Open the first database. Callers treat an error here as fatal.
    pub fn connect(path: impl Into<PathBuf>, options: PoolOptions) -> Result<Self> {
        let pool = Self {
            inner: Arc::new(PoolInner {
                path: path.into(),
                options,
                current: RwLock::new(None),
                reconnecting: AtomicBool::new(false),
            }),
        };
        pool.initialize()?;
        Ok(pool)
    }

    /// Open a fresh database and make it current.
    pub fn initialize(&self) -> Result<Arc<Database>> {
        let db = Arc::new(Database::open(&self.inner.path, self.inner.options.readers)?);
        let mut current = self
            .inner
            .current
            .write()
            .map_err(|e| anyhow!("pool lock poisoned: {}", e))?;
        *current = Some(db.clone());
        info!("Database pool connected ({})", self.inner.path.display());
        Ok(db)
    }

    pub fn current(&self) -> Option<Arc<Database>> {
        self.inner.current.read().ok().and_then(|c| c.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_some()
    }

    /// Liveness gate for request handling. Blocking: call from
    /// `spawn_blocking`.
    pub fn probe(&self) -> Result<Arc<Database>> {
        let db = match self.current() {
            Some(db) => db,
            None => {
                info!("Database pool disconnected, re-initializing");
                self.initialize().inspect_err(|_| self.schedule_reconnect())?
            }
        };

        if let Err(e) = db.ping() {
            self.report_failure(&e);
            return Err(e);
        }
        Ok(db)
    }

    /// Inspect a query error. Connection-level failures disconnect the pool
    /// and schedule a re-initialization; returns whether that happened.
    pub fn report_failure(&self, err: &anyhow::Error) -> bool {
        if !is_connection_error(err) {
            return false;
        }
        warn!("Database connection error: {:#}", err);
        self.disconnect();
        self.schedule_reconnect();
        true
    }

    /// Drop the current database without scheduling a reconnect.
    pub fn close(&self) {
        self.disconnect();
        info!("Database pool closed");
    }

    fn disconnect(&self) {
        if let Ok(mut current) = self.inner.current.write() {
            current.take();
        }
    }

    fn schedule_reconnect(&self) {
        if self.inner.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; database reconnect not scheduled");
            self.inner.reconnecting.store(false, Ordering::SeqCst);
            return;
        };

        let pool = self.clone();
        let delay = self.inner.options.reconnect_delay;
        handle.spawn(async move {
            loop {
                tokio::time::sleep(delay).await;
                if pool.is_connected() {
                    break;
                }
                let attempt = pool.clone();
                match tokio::task::spawn_blocking(move || attempt.initialize()).await {
                    Ok(Ok(_)) => break,
                    Ok(Err(e)) => warn!(
                        "Database reconnect failed, retrying in {:?}: {:#}",
                        delay, e
                    ),
                    Err(e) => warn!("Database reconnect task failed: {}", e),
                }
            }
            pool.inner.reconnecting.store(false, Ordering::SeqCst);
        });
    }
}
