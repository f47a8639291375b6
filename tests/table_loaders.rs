// tests/table_loaders.rs

use loaddag::errors::TaskError;
use loaddag::operators::{LoadDimension, LoadFact, Operator};
use loaddag::types::FailureKind;
use loaddag_test_utils::fixtures::TestEnv;
use loaddag_test_utils::init_tracing;

const SEED_EVENTS: &str = r#"
INSERT INTO staging_events (userid, firstname, lastname, gender, level, page, ts, sessionid, song, artist, length)
VALUES
    (8, 'Kaylee', 'Summers', 'F', 'free', 'NextSong', 1541106106796, 139, 'Hey', 'Pixies', 243.5),
    (8, 'Kaylee', 'Summers', 'F', 'free', 'NextSong', 1541106352796, 139, 'Hey', 'Pixies', 243.5),
    (10, 'Sylvie', 'Cruz', 'F', 'free', 'NextSong', 1541106496796, 9, 'Other', 'Someone', 100.0),
    (26, 'Ryan', 'Smith', 'M', 'free', 'Home', 1541106673796, 169, NULL, NULL, NULL);
"#;

async fn seeded() -> TestEnv {
    init_tracing();
    let env = TestEnv::with_schema().await;
    env.exec(SEED_EVENTS).await;
    env
}

fn users_dimension(replace: bool) -> Operator {
    Operator::LoadDimension(LoadDimension {
        table: "users".to_string(),
        select: loaddag::sql::USER_TABLE_INSERT.to_string(),
        replace,
    })
}

fn songplays_fact() -> Operator {
    Operator::LoadFact(LoadFact {
        table: "songplays".to_string(),
        select: loaddag::sql::SONGPLAY_TABLE_INSERT.to_string(),
    })
}

#[tokio::test]
async fn dimension_with_replace_is_idempotent() {
    let env = seeded().await;
    let op = users_dimension(true);

    op.execute(&env.context("load_user_dim_table")).await.unwrap();
    assert_eq!(env.count("users").await, 2);

    op.execute(&env.context("load_user_dim_table")).await.unwrap();
    assert_eq!(env.count("users").await, 2, "rerun replaces the rows");
}

#[tokio::test]
async fn dimension_without_replace_appends() {
    let env = seeded().await;
    let op = users_dimension(false);

    op.execute(&env.context("load_user_dim_table")).await.unwrap();
    op.execute(&env.context("load_user_dim_table")).await.unwrap();

    assert_eq!(env.count("users").await, 4);
}

#[tokio::test]
async fn fact_load_always_appends() {
    let env = seeded().await;
    let op = songplays_fact();

    op.execute(&env.context("load_songplays_fact_table")).await.unwrap();
    assert_eq!(env.count("songplays").await, 3, "only NextSong events become plays");

    op.execute(&env.context("load_songplays_fact_table")).await.unwrap();
    assert_eq!(env.count("songplays").await, 6);

    let rows = env
        .query("SELECT start_time FROM songplays WHERE userid = 10 LIMIT 1")
        .await;
    assert_eq!(
        rows[0][0],
        loaddag::warehouse::SqlValue::Text("2018-11-01 21:08:16".to_string())
    );
}

#[tokio::test]
async fn bad_select_is_malformed_input_with_statement() {
    let env = seeded().await;
    let op = Operator::LoadFact(LoadFact {
        table: "songplays".to_string(),
        select: "SELEC nonsense FROM nowhere".to_string(),
    });

    let err = op
        .execute(&env.context("load_songplays_fact_table"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::MalformedInput);
    assert!(!err.is_retryable());
    match err {
        TaskError::Sql { statement, .. } => {
            assert!(statement.contains("SELEC nonsense"), "{statement}");
            assert!(statement.starts_with("INSERT INTO \"songplays\""), "{statement}");
        }
        other => panic!("expected Sql error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_dimension_table_fails_the_truncate() {
    init_tracing();
    let env = TestEnv::new();
    let op = Operator::LoadDimension(LoadDimension {
        table: "users".to_string(),
        select: "SELECT 1".to_string(),
        replace: true,
    });

    let err = op.execute(&env.context("load_user_dim_table")).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::MalformedInput);
    match err {
        TaskError::Sql { statement, .. } => assert_eq!(statement, "TRUNCATE TABLE users"),
        other => panic!("expected Sql error, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_insert_after_truncate_leaves_dimension_empty() {
    let env = seeded().await;
    users_dimension(true)
        .execute(&env.context("load_user_dim_table"))
        .await
        .unwrap();
    assert_eq!(env.count("users").await, 2);

    let broken = Operator::LoadDimension(LoadDimension {
        table: "users".to_string(),
        select: "SELECT missing_column FROM staging_events".to_string(),
        replace: true,
    });
    broken
        .execute(&env.context("load_user_dim_table"))
        .await
        .unwrap_err();

    assert_eq!(env.count("users").await, 0);
}
