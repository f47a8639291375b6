// tests/song_plays_end_to_end.rs
//
// Full song plays runs against a temporary SQLite warehouse and an in-memory
// bucket, executed by the real executor.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use loaddag::config::{ConfigFile, RetryPolicy};
use loaddag::dag::{ScheduledTask, TaskRunState};
use loaddag::engine::TaskOutcome;
use loaddag::errors::TaskError;
use loaddag::exec::task_runner::run_with_retries;
use loaddag::operators::Operator;
use loaddag::schedule::DataInterval;
use loaddag::storage::StorageError;
use loaddag::types::FailureKind;
use loaddag::warehouse::SqlValue;
use loaddag::workflows::{self, QUALITY_CHECKS, STAGE_EVENTS};
use loaddag_test_utils::builders::{sample_start, ConfigFileBuilder};
use loaddag_test_utils::fixtures::TestEnv;
use loaddag_test_utils::{init_tracing, with_timeout};

const LOG_JSON_PATH: &str = r#"{
    "jsonpaths": [
        "$['artist']",
        "$['auth']",
        "$['firstName']",
        "$['gender']",
        "$['itemInSession']",
        "$['lastName']",
        "$['length']",
        "$['level']",
        "$['location']",
        "$['method']",
        "$['page']",
        "$['registration']",
        "$['sessionId']",
        "$['song']",
        "$['status']",
        "$['ts']",
        "$['userAgent']",
        "$['userId']"
    ]
}"#;

const SONG_SOUL_DEEP: &str = r#"{"num_songs": 1, "artist_id": "ARMJAGH1187FB546F3", "artist_latitude": 35.14968, "artist_longitude": -90.04892, "artist_location": "Memphis, TN", "artist_name": "The Box Tops", "song_id": "SOCIWDW12A8C13D406", "title": "Soul Deep", "duration": 148.03546, "year": 1969}"#;
const SONG_CASUAL: &str = r#"{"num_songs": 1, "artist_id": "ARD7TVE1187B99BFB1", "artist_latitude": null, "artist_longitude": null, "artist_location": "California - LA", "artist_name": "Casual", "song_id": "SOMZWCG12A8C13C480", "title": "I Didn't Mean To", "duration": 218.93179, "year": 0}"#;

fn event(user: u32, first: &str, page: &str, song: Option<(&str, &str, f64)>, ts: i64) -> String {
    let (artist, title, length) = match song {
        Some((artist, title, length)) => (
            format!("\"{artist}\""),
            format!("\"{title}\""),
            length.to_string(),
        ),
        None => ("null".to_string(), "null".to_string(), "null".to_string()),
    };
    format!(
        r#"{{"artist": {artist}, "auth": "Logged In", "firstName": "{first}", "gender": "F", "itemInSession": 0, "lastName": "Doe", "length": {length}, "level": "free", "location": "Tampa, FL", "method": "PUT", "page": "{page}", "registration": 1540266185796.0, "sessionId": 139, "song": {title}, "status": 200, "ts": {ts}, "userAgent": "Mozilla/5.0", "userId": "{user}"}}"#
    )
}

fn sample_events() -> String {
    [
        event(8, "Kaylee", "NextSong", Some(("The Box Tops", "Soul Deep", 148.03546)), 1541106106796),
        event(10, "Sylvie", "NextSong", Some(("Casual", "I Didn't Mean To", 218.93179)), 1541106352796),
        event(26, "Ryan", "Home", None, 1541106496796),
    ]
    .join("\n")
}

async fn seeded_bucket(events: &str) -> TestEnv {
    init_tracing();
    let env = TestEnv::with_schema().await;
    env.put("log_json_path.json", LOG_JSON_PATH).await;
    env.put("song_data/A/A/A/TRAAAAW128F429D538.json", SONG_CASUAL).await;
    env.put("song_data/A/A/B/TRAABJL12903CDCF1A.json", SONG_SOUL_DEEP).await;
    if !events.is_empty() {
        env.put("log_data/2018/11/2018-11-01-events.json", events.to_string()).await;
    }
    env
}

fn config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_song_plays()
        .with_storage_url("memory://")
        .with_max_active_tasks(2)
        .build()
}

fn interval() -> DataInterval {
    DataInterval::new(sample_start(), sample_start() + ChronoDuration::hours(1))
}

#[tokio::test]
async fn song_plays_loads_every_table_and_passes_the_gate() {
    let env = seeded_bucket(&sample_events()).await;
    let cfg = config();

    let report = with_timeout(loaddag::execute_run(&cfg, interval(), Arc::clone(&env.env)))
        .await
        .unwrap();

    assert!(report.succeeded(), "{report}");
    assert_eq!(env.count("staging_events").await, 3);
    assert_eq!(env.count("staging_songs").await, 2);
    assert_eq!(env.count("songplays").await, 2);
    assert_eq!(env.count("users").await, 2);
    assert_eq!(env.count("songs").await, 2);
    assert_eq!(env.count("artists").await, 2);
    assert_eq!(env.count("time").await, 2);

    let plays = env
        .query("SELECT userid, songid, artistid, start_time FROM songplays ORDER BY userid")
        .await;
    assert_eq!(
        plays[0],
        vec![
            SqlValue::Integer(8),
            SqlValue::from("SOCIWDW12A8C13D406"),
            SqlValue::from("ARMJAGH1187FB546F3"),
            SqlValue::from("2018-11-01 21:01:46"),
        ]
    );

    let hours = env.query("SELECT DISTINCT hour FROM \"time\"").await;
    assert_eq!(hours, vec![vec![SqlValue::Integer(21)]]);
}

#[tokio::test]
async fn rerunning_an_interval_appends_facts_and_replaces_dimensions() {
    let env = seeded_bucket(&sample_events()).await;
    let cfg = config();

    for _ in 0..2 {
        let report = with_timeout(loaddag::execute_run(&cfg, interval(), Arc::clone(&env.env)))
            .await
            .unwrap();
        assert!(report.succeeded(), "{report}");
    }

    assert_eq!(env.count("staging_events").await, 3);
    assert_eq!(env.count("songplays").await, 4);
    assert_eq!(env.count("users").await, 2);
    assert_eq!(env.count("time").await, 2);
}

#[tokio::test]
async fn unmatched_play_fails_the_quality_gate() {
    let events = format!(
        "{}\n{}",
        sample_events(),
        event(9, "Wyatt", "NextSong", Some(("Nobody", "Unknown", 1.0)), 1541107053796)
    );
    let env = seeded_bucket(&events).await;
    let cfg = config();

    let report = with_timeout(loaddag::execute_run(&cfg, interval(), Arc::clone(&env.env)))
        .await
        .unwrap();

    assert!(!report.succeeded());
    assert_eq!(report.state_of(QUALITY_CHECKS), Some(TaskRunState::DoneFailed));
    assert_eq!(report.failures.get(QUALITY_CHECKS), Some(&FailureKind::DataQuality));
    assert_eq!(report.state_of(workflows::END), Some(TaskRunState::UpstreamFailed));
    assert_eq!(env.count("songplays").await, 3, "loads ran before the gate");
}

#[tokio::test]
async fn missing_event_log_blocks_the_fact_load() {
    let env = seeded_bucket("").await;
    let cfg = config();

    let report = with_timeout(loaddag::execute_run(&cfg, interval(), Arc::clone(&env.env)))
        .await
        .unwrap();

    assert_eq!(report.state_of(STAGE_EVENTS), Some(TaskRunState::DoneFailed));
    assert_eq!(report.failures.get(STAGE_EVENTS), Some(&FailureKind::MalformedInput));
    assert_eq!(
        report.state_of(workflows::STAGE_SONGS),
        Some(TaskRunState::DoneSuccess)
    );
    assert_eq!(
        report.state_of(workflows::LOAD_SONGPLAYS),
        Some(TaskRunState::UpstreamFailed)
    );
    assert_eq!(env.count("songplays").await, 0);
}

fn scheduled(retries: u32) -> ScheduledTask {
    ScheduledTask {
        name: "flaky".to_string(),
        operator: Arc::new(Operator::Noop),
        retry: RetryPolicy {
            retries,
            delay: Duration::from_millis(1),
            email_on_retry: true,
        },
        run_id: 1,
        interval: interval(),
    }
}

fn outage() -> TaskError {
    TaskError::Storage(StorageError::ObjectStore(object_store::Error::Generic {
        store: "test",
        source: "connection reset".into(),
    }))
}

#[tokio::test]
async fn connectivity_failures_are_retried_until_success() {
    init_tracing();
    let attempts = AtomicU32::new(0);

    let outcome = run_with_retries(&scheduled(3), |try_number| {
        attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if try_number < 3 { Err(outage()) } else { Ok(()) }
        }
    })
    .await;

    assert_eq!(outcome, TaskOutcome::Success);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    init_tracing();
    let attempts = AtomicU32::new(0);

    let outcome = run_with_retries(&scheduled(1), |_| {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(outage()) }
    })
    .await;

    assert_eq!(outcome, TaskOutcome::Failed(FailureKind::Connectivity));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn malformed_input_and_quality_failures_are_never_retried() {
    init_tracing();

    let errors: [fn() -> TaskError; 2] = [
        || TaskError::NoObjectsFound {
            location: "memory://log_data".to_string(),
        },
        || {
            TaskError::Quality(loaddag::errors::QualityError::Mismatch {
                expected: SqlValue::Integer(0),
                actual: SqlValue::Integer(3),
            })
        },
    ];

    for error in errors {
        let attempts = AtomicU32::new(0);
        let outcome = run_with_retries(&scheduled(5), |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            let err = error();
            async move { Err(err) }
        })
        .await;

        assert!(matches!(outcome, TaskOutcome::Failed(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
