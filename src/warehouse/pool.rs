// src/warehouse/pool.rs

//! Scoped warehouse connection pool.
//!
//! A task checks out exactly one connection, does its work on a blocking
//! thread, and the [`PooledConnection`] guard puts the connection back when
//! it is dropped, whether the work succeeded, failed or panicked.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use super::{SqliteWarehouse, Warehouse, WarehouseError};

struct PoolInner {
    path: PathBuf,
    busy_timeout: Duration,
    idle: Mutex<Vec<SqliteWarehouse>>,
    permits: Arc<Semaphore>,
}

/// Cheaply cloneable handle to the shared pool.
#[derive(Clone)]
pub struct WarehousePool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for WarehousePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehousePool")
            .field("path", &self.inner.path)
            .field("available", &self.inner.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl WarehousePool {
    /// Create a pool of at most `size` connections to the database at `path`.
    ///
    /// One connection is opened eagerly so an unreachable warehouse is
    /// reported at startup.
    pub fn open(
        path: impl AsRef<Path>,
        size: usize,
        busy_timeout: Duration,
    ) -> Result<Self, WarehouseError> {
        let path = path.as_ref().to_path_buf();
        let first = SqliteWarehouse::open(&path, busy_timeout)?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                path,
                busy_timeout,
                idle: Mutex::new(vec![first]),
                permits: Arc::new(Semaphore::new(size.max(1))),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Number of connections that can be checked out right now.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Check out a connection, waiting for a free slot if necessary.
    pub async fn acquire(&self) -> Result<PooledConnection, WarehouseError> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| WarehouseError::PoolClosed)?;

        let reused = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();

        let conn = match reused {
            Some(conn) => conn,
            None => SqliteWarehouse::open(&self.inner.path, self.inner.busy_timeout)?,
        };

        trace!(available = self.available(), "warehouse connection checked out");

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Run blocking warehouse work on a dedicated thread with one pooled
    /// connection.
    pub async fn with_connection<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Warehouse) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<WarehouseError> + Send + 'static,
    {
        let mut conn = self.acquire().await?;
        tokio::task::spawn_blocking(move || f(&mut *conn))
            .await
            .map_err(|e| E::from(WarehouseError::Worker(e.to_string())))?
    }
}

/// A checked-out connection; returned to the pool on drop.
pub struct PooledConnection {
    conn: Option<SqliteWarehouse>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = SqliteWarehouse;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection is only taken in drop"))
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection is only taken in drop"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(conn);
        }
    }
}
