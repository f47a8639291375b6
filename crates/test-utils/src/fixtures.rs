//! A throwaway warehouse (SQLite file in a temp dir) plus an in-memory
//! object store, wired into a `TaskEnv`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use loaddag::operators::{TaskContext, TaskEnv};
use loaddag::schedule::DataInterval;
use loaddag::storage::ObjectSource;
use loaddag::warehouse::{SqlValue, WarehousePool};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tempfile::TempDir;

use crate::builders::sample_start;

pub struct TestEnv {
    _dir: TempDir,
    pub env: Arc<TaskEnv>,
    store: Arc<InMemory>,
}

impl TestEnv {
    /// Empty warehouse, empty bucket.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let pool = WarehousePool::open(dir.path().join("warehouse.db"), 4, Duration::from_secs(5))
            .expect("open warehouse");
        let store = Arc::new(InMemory::new());
        let source = ObjectSource::new(store.clone(), "memory://");

        Self {
            _dir: dir,
            env: Arc::new(TaskEnv {
                warehouse: pool,
                storage: source,
            }),
            store,
        }
    }

    /// Warehouse with every song plays table created.
    pub async fn with_schema() -> Self {
        let env = Self::new();
        loaddag::init_schema(env.pool()).await.expect("create schema");
        env
    }

    pub fn pool(&self) -> &WarehousePool {
        &self.env.warehouse
    }

    pub fn source(&self) -> &ObjectSource {
        &self.env.storage
    }

    /// Store an object at `key`.
    pub async fn put(&self, key: &str, contents: impl Into<Bytes>) {
        self.store
            .put(&Path::from(key), PutPayload::from_bytes(contents.into()))
            .await
            .expect("put object");
    }

    /// Run `sql` and return all rows.
    pub async fn query(&self, sql: &str) -> Vec<Vec<SqlValue>> {
        let sql = sql.to_string();
        self.pool()
            .with_connection(move |wh| wh.get_records(&sql))
            .await
            .expect("query")
    }

    /// Run statements that return nothing.
    pub async fn exec(&self, sql: &str) {
        let sql = sql.to_string();
        self.pool()
            .with_connection(move |wh| wh.execute_batch(&sql))
            .await
            .expect("exec")
    }

    pub async fn count(&self, table: &str) -> i64 {
        let rows = self
            .query(&format!("SELECT count(*) FROM \"{table}\""))
            .await;
        match rows.first().and_then(|r| r.first()) {
            Some(SqlValue::Integer(n)) => *n,
            other => panic!("unexpected count result: {other:?}"),
        }
    }

    /// Context for executing one operator directly.
    pub fn context(&self, task: &str) -> TaskContext {
        self.context_at(task, sample_start())
    }

    pub fn context_at(&self, task: &str, start: DateTime<Utc>) -> TaskContext {
        TaskContext {
            task: task.to_string(),
            run_id: 1,
            try_number: 1,
            interval: DataInterval::new(start, start + chrono::Duration::hours(1)),
            env: Arc::clone(&self.env),
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
