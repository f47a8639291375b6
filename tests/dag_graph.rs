// tests/dag_graph.rs

use loaddag::config::{OperatorConfig, StorageSection};
use loaddag::dag::{DagBuilder, DagGraph};
use loaddag::errors::LoaddagError;
use loaddag::warehouse::SqlValue;
use loaddag::workflows::{self, SongPlaysParams};
use loaddag_test_utils::init_tracing;

fn song_plays_graph() -> DagGraph {
    let params = SongPlaysParams::from_storage(&StorageSection::default());
    workflows::song_plays(&params)
        .build_graph()
        .expect("song plays graph is valid")
}

fn position(order: &[String], task: &str) -> usize {
    order
        .iter()
        .position(|t| t == task)
        .unwrap_or_else(|| panic!("{task} missing from order"))
}

#[test]
fn song_plays_topological_order_respects_every_edge() {
    let graph = song_plays_graph();
    let order = graph.topological_order().unwrap();

    assert_eq!(order.len(), 10);
    assert_eq!(order.first().map(String::as_str), Some(workflows::BEGIN));
    assert_eq!(order.last().map(String::as_str), Some(workflows::END));

    for task in graph.tasks() {
        for dep in graph.dependencies_of(task) {
            assert!(
                position(&order, dep) < position(&order, task),
                "{dep} must come before {task}"
            );
        }
    }
}

#[test]
fn song_plays_edges() {
    let graph = song_plays_graph();

    assert_eq!(graph.roots(), vec![workflows::BEGIN.to_string()]);

    let mut staging = graph.dependents_of(workflows::BEGIN).to_vec();
    staging.sort();
    assert_eq!(staging, vec![workflows::STAGE_EVENTS, workflows::STAGE_SONGS]);

    assert_eq!(
        graph.dependents_of(workflows::LOAD_SONGPLAYS).len(),
        4,
        "fact load fans out to the four dimensions"
    );
    assert_eq!(graph.dependencies_of(workflows::QUALITY_CHECKS).len(), 4);
    assert_eq!(
        graph.dependencies_of(workflows::END),
        &[workflows::QUALITY_CHECKS.to_string()]
    );

    // A failed staging task blocks everything downstream of the fact load.
    let blocked = graph.descendants_of(workflows::STAGE_EVENTS);
    assert_eq!(blocked.len(), 7);
    assert!(blocked.contains(workflows::END));
    assert!(!blocked.contains(workflows::STAGE_SONGS));
}

#[test]
fn duplicate_fan_in_edge_is_collapsed() {
    init_tracing();

    let graph = DagBuilder::new()
        .task("users", OperatorConfig::Noop)
        .task("songs", OperatorConfig::Noop)
        .task("check", OperatorConfig::Noop)
        .fan(&["users", "songs", "users"], &["check"])
        .build_graph()
        .unwrap();

    assert_eq!(
        graph.dependencies_of("check"),
        &["users".to_string(), "songs".to_string()]
    );
    assert_eq!(graph.dependents_of("users"), &["check".to_string()]);
}

#[test]
fn from_pairs_dedupes_dependencies() {
    let graph = DagGraph::from_pairs(vec![
        ("a", vec![]),
        ("b", vec!["a", "a"]),
    ])
    .unwrap();

    assert_eq!(graph.dependencies_of("b"), &["a".to_string()]);
}

#[test]
fn from_pairs_rejects_bad_graphs() {
    let unknown = DagGraph::from_pairs(vec![("a", vec!["ghost"])]).unwrap_err();
    assert!(matches!(unknown, LoaddagError::TaskNotFound(_)), "{unknown:?}");

    let twice = DagGraph::from_pairs(vec![("a", vec![]), ("a", vec![])]).unwrap_err();
    assert!(twice.to_string().contains("declared twice"), "{twice}");

    let cycle = DagGraph::from_pairs(vec![
        ("a", vec!["c"]),
        ("b", vec!["a"]),
        ("c", vec!["b"]),
    ])
    .unwrap_err();
    assert!(matches!(cycle, LoaddagError::DagCycle(_)), "{cycle:?}");
}

#[test]
fn builder_rejects_edges_to_undeclared_tasks() {
    let err = DagBuilder::new()
        .task("a", OperatorConfig::Noop)
        .fan(&["a"], &["b"])
        .build()
        .unwrap_err();
    assert!(matches!(err, LoaddagError::TaskNotFound(_)), "{err:?}");
}

#[test]
fn redeclaring_a_task_keeps_its_edges() {
    let tasks = DagBuilder::new()
        .task("a", OperatorConfig::Noop)
        .task("b", OperatorConfig::Noop)
        .fan(&["a"], &["b"])
        .task(
            "b",
            OperatorConfig::QualityCheck {
                sql: "SELECT 0".to_string(),
                expected: SqlValue::Integer(0),
            },
        )
        .build()
        .unwrap();

    assert_eq!(tasks["b"].after, vec!["a".to_string()]);
    assert_eq!(tasks["b"].operator.kind(), "quality_check");
}
