// src/workflows.rs

//! Built-in workflows.
//!
//! Storage locations come from [`SongPlaysParams`], which is built from the
//! `[storage]` config section at startup.

use crate::config::model::{OperatorConfig, StorageSection};
use crate::dag::DagBuilder;
use crate::sql;
use crate::storage;
use crate::types::JsonShape;
use crate::warehouse::SqlValue;

pub const BEGIN: &str = "begin_execution";
pub const STAGE_EVENTS: &str = "stage_events";
pub const STAGE_SONGS: &str = "stage_songs";
pub const LOAD_SONGPLAYS: &str = "load_songplays_fact_table";
pub const LOAD_USERS: &str = "load_user_dim_table";
pub const LOAD_SONGS: &str = "load_song_dim_table";
pub const LOAD_ARTISTS: &str = "load_artist_dim_table";
pub const LOAD_TIME: &str = "load_time_dim_table";
pub const QUALITY_CHECKS: &str = "run_data_quality_checks";
pub const END: &str = "stop_execution";

/// Inputs of the song plays workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongPlaysParams {
    pub events_key: String,
    pub songs_key: String,
    /// Shape hint for the event log; song records load with `auto`.
    pub events_shape: JsonShape,
}

impl SongPlaysParams {
    /// Defaults relative to the configured bucket: `log_data/`, `song_data/`
    /// and the `log_json_path.json` mapping at the bucket root.
    pub fn from_storage(cfg: &StorageSection) -> Self {
        let root = storage::normalize_root(&cfg.url);
        Self {
            events_key: "log_data".to_string(),
            songs_key: "song_data".to_string(),
            events_shape: JsonShape::Paths(storage::join_location(&root, "log_json_path.json")),
        }
    }
}

fn dimension(table: &str, query: &str) -> OperatorConfig {
    OperatorConfig::LoadDimension {
        table: table.to_string(),
        select: None,
        query: Some(query.to_string()),
        replace: true,
    }
}

/// `begin → {stage_songs, stage_events} → load_songplays → {users, songs,
/// artists, time} → quality check → end`.
pub fn song_plays(params: &SongPlaysParams) -> DagBuilder {
    DagBuilder::new()
        .task(BEGIN, OperatorConfig::Noop)
        .task(
            STAGE_EVENTS,
            OperatorConfig::Stage {
                table: "staging_events".to_string(),
                key: params.events_key.clone(),
                json: params.events_shape.clone(),
            },
        )
        .task(
            STAGE_SONGS,
            OperatorConfig::Stage {
                table: "staging_songs".to_string(),
                key: params.songs_key.clone(),
                json: JsonShape::Auto,
            },
        )
        .task(
            LOAD_SONGPLAYS,
            OperatorConfig::LoadFact {
                table: "songplays".to_string(),
                select: None,
                query: Some("songplay_table_insert".to_string()),
            },
        )
        .task(LOAD_USERS, dimension("users", "user_table_insert"))
        .task(LOAD_SONGS, dimension("songs", "song_table_insert"))
        .task(LOAD_ARTISTS, dimension("artists", "artist_table_insert"))
        .task(LOAD_TIME, dimension("time", "time_table_insert"))
        .task(
            QUALITY_CHECKS,
            OperatorConfig::QualityCheck {
                sql: sql::SONGPLAYS_MISSING_KEYS_CHECK.to_string(),
                expected: SqlValue::Integer(0),
            },
        )
        .task(END, OperatorConfig::Noop)
        .chain(&[
            &[BEGIN],
            &[STAGE_SONGS, STAGE_EVENTS],
            &[LOAD_SONGPLAYS],
            &[LOAD_USERS, LOAD_SONGS, LOAD_ARTISTS, LOAD_TIME],
            &[QUALITY_CHECKS],
            &[END],
        ])
}
