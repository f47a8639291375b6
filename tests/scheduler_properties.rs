// tests/scheduler_properties.rs

use std::collections::{HashMap, HashSet};

use chrono::Duration;
use loaddag::config::ConfigFile;
use loaddag::dag::{Scheduler, TaskRunState};
use loaddag::engine::TaskOutcome;
use loaddag::schedule::DataInterval;
use loaddag::types::FailureKind;
use loaddag_test_utils::builders::{sample_start, ConfigFileBuilder, TaskConfigBuilder};
use proptest::prelude::*;

// Task N may only depend on tasks 0..N-1, which keeps every generated graph
// acyclic.
fn dag_config_strategy(max_tasks: usize) -> impl Strategy<Value = ConfigFile> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(move |raw_deps| {
            let mut builder = ConfigFileBuilder::new();
            for (i, potential) in raw_deps.into_iter().enumerate() {
                let mut task = TaskConfigBuilder::noop();
                let deps: HashSet<usize> = potential
                    .into_iter()
                    .filter(|_| i > 0)
                    .map(|d| d % i)
                    .collect();
                for dep in deps {
                    task = task.after(&format!("task_{dep}"));
                }
                builder = builder.with_task(&format!("task_{i}"), task.build());
            }
            builder.build()
        })
    })
}

fn interval() -> DataInterval {
    DataInterval::new(sample_start(), sample_start() + Duration::hours(1))
}

proptest! {
    #[test]
    fn runs_terminate_and_respect_dependencies(
        cfg in dag_config_strategy(12),
        failing_indices in proptest::collection::vec(0..12usize, 0..4),
        picks in proptest::collection::vec(any::<usize>(), 64),
    ) {
        let mut scheduler = Scheduler::from_config(&cfg).unwrap();
        let names: Vec<String> = scheduler.task_names().map(str::to_string).collect();
        let failing: HashSet<String> = failing_indices
            .into_iter()
            .filter(|i| *i < names.len())
            .map(|i| names[i].clone())
            .collect();

        let mut succeeded: HashSet<String> = HashSet::new();
        let mut dispatched: HashMap<String, usize> = HashMap::new();
        let mut executing: Vec<String> = Vec::new();

        for task in scheduler.start_new_run(interval()) {
            executing.push(task.name);
        }
        let run_id = scheduler.current_run_id().unwrap_or_default();

        let mut steps = 0;
        while !executing.is_empty() {
            steps += 1;
            prop_assert!(steps <= names.len(), "more completions than tasks");

            // Complete tasks in an arbitrary order.
            let pick = picks[steps % picks.len()] % executing.len();
            let task = executing.swap_remove(pick);
            *dispatched.entry(task.clone()).or_default() += 1;

            for dep in cfg.task[&task].after.iter() {
                prop_assert!(succeeded.contains(dep), "{} ran before {} succeeded", task, dep);
            }

            let outcome = if failing.contains(&task) {
                TaskOutcome::Failed(FailureKind::MalformedInput)
            } else {
                succeeded.insert(task.clone());
                TaskOutcome::Success
            };

            for next in scheduler.handle_completion(&task, run_id, outcome) {
                prop_assert_eq!(next.run_id, run_id);
                executing.push(next.name);
            }
        }

        prop_assert!(scheduler.is_idle(), "run did not finish");
        prop_assert!(dispatched.values().all(|n| *n == 1), "a task was dispatched twice");

        let report = scheduler.report();
        for name in &names {
            let state = report.state_of(name).unwrap();
            let expected_blocked = !dispatched.contains_key(name);
            prop_assert_eq!(
                state == TaskRunState::UpstreamFailed,
                expected_blocked,
                "{} ended as {:?}", name, state
            );
            if failing.contains(name) && dispatched.contains_key(name) {
                prop_assert_eq!(state, TaskRunState::DoneFailed);
            }
        }
        let every_task_succeeded = succeeded.len() == names.len();
        prop_assert_eq!(report.succeeded(), every_task_succeeded);
    }
}
