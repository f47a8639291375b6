// src/config/mod.rs

//! Configuration loading and validation for loaddag.
//!
//! - `model.rs` defines the TOML-backed data model.
//! - `loader.rs` reads a config file from disk.
//! - `validate.rs` turns a `RawConfigFile` into a checked `ConfigFile`
//!   (built-in workflow expansion, DAG correctness, operator settings).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_and_validate};
pub use model::{
    BuiltinWorkflow, ConfigFile, DagSection, DefaultSection, OperatorConfig, RawConfigFile,
    RetryPolicy, StorageSection, TaskConfig, WarehouseSection,
};
