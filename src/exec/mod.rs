// src/exec/mod.rs

//! Task execution layer.
//!
//! Runs the operators of scheduled tasks against the warehouse and object
//! store, and reports each final outcome back to the runtime as a
//! `RuntimeEvent`.
//!
//! - [`executor_loop`] receives scheduled tasks and runs them concurrently,
//!   bounded by `[dag].max_active_tasks`.
//! - [`task_runner`] executes one task, applying its retry policy.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`; tests replace it with a fake.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::{spawn_executor, spawn_executor_with};
