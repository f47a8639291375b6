use std::sync::Arc;

use crate::engine::TaskName;
use crate::schedule::DataInterval;
use crate::storage::ObjectSource;
use crate::warehouse::WarehousePool;

/// External systems shared by every task of a process.
#[derive(Debug, Clone)]
pub struct TaskEnv {
    pub warehouse: WarehousePool,
    pub storage: ObjectSource,
}

/// Everything one task execution gets to see.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task: TaskName,
    pub run_id: u64,
    /// 1 for the first attempt, incremented on every retry.
    pub try_number: u32,
    pub interval: DataInterval,
    pub env: Arc<TaskEnv>,
}
