use serde_json::json;
use std::fs;
use std::sync::Arc;
use steplog::cache::codec::BINARY_MAGIC;
use steplog::environment::EnvironmentManager;
use steplog::executor::{RunExecutor, RunSpec};
use steplog::procedures::{ProcedureDef, ProcedureRegistry};
use steplog::store::{ArgumentBinding, RunRecord, RunStatus};
use tempfile::tempdir;

#[test]
fn csv_and_binary_artifacts_round_trip() {
    let temp = tempdir().expect("temp dir");
    let manager = EnvironmentManager::new(temp.path());
    let (environment, _) = manager.create("default").expect("create env");
    let cache = environment.cache();

    let vector = json!([1, 2, 3, -4]);
    let matrix = json!([[1.5, 2.0], [3.25, -4.5]]);
    let column = json!([[1], [2], [3]]);
    let model = json!({"weights": [0.1, 0.2], "label": "rf", "trees": 10});
    cache.save("vector.csv", &vector, None).expect("save vector");
    cache.save("matrix.csv", &matrix, None).expect("save matrix");
    cache.save("column.csv", &column, None).expect("save column");
    cache.save("model.bin", &model, None).expect("save model");

    assert_eq!(cache.load("vector.csv").expect("load vector"), vector);
    assert_eq!(cache.load("matrix.csv").expect("load matrix"), matrix);
    assert_eq!(cache.load("column.csv").expect("load column"), column);
    assert_eq!(cache.load("model.bin").expect("load model"), model);

    let csv = fs::read_to_string(cache.blob_path("vector.csv").expect("path")).expect("read csv");
    assert_eq!(csv.lines().collect::<Vec<_>>(), vec!["1", "2", "3", "-4"]);
    let blob = fs::read(cache.blob_path("model.bin").expect("path")).expect("read blob");
    assert!(blob.starts_with(BINARY_MAGIC));

    assert!(cache.exists("model.bin").expect("exists"));
    assert!(!cache.exists("absent.bin").expect("exists"));
    let names = cache
        .list()
        .expect("list")
        .into_iter()
        .map(|entry| entry.filename)
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["column.csv", "matrix.csv", "model.bin", "vector.csv"]
    );
}

#[test]
fn second_save_replaces_entry_and_points_at_latest_step() {
    let temp = tempdir().expect("temp dir");
    let mut registry = ProcedureRegistry::new();
    registry
        .register(
            ProcedureDef::new("produce", |_ctx, args| Ok(json!([args.i64("n")?])))
                .param("n")
                .cache_outputs(["x"]),
        )
        .expect("register produce");
    let mut environments = EnvironmentManager::new(temp.path());
    environments.bootstrap("default").expect("bootstrap");
    let executor = RunExecutor::new(environments, Arc::new(registry));

    let first = executor
        .execute_run(RunSpec::new("first").step("produce", vec![ArgumentBinding::literal("n", 1)]))
        .expect("first run");
    let second = executor
        .execute_run(RunSpec::new("second").step("produce", vec![ArgumentBinding::literal("n", 2)]))
        .expect("second run");

    let environment = executor.environments().open("default").expect("open env");
    let entries = environment.cache().list().expect("list entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].filename, "x");
    assert_eq!(entries[0].step_id, second.steps[0].id);
    assert_ne!(entries[0].step_id, first.steps[0].id);
    assert_eq!(environment.cache().load("x").expect("load x"), json!([2]));
}

#[test]
fn records_with_ids_are_not_inserted() {
    let temp = tempdir().expect("temp dir");
    let manager = EnvironmentManager::new(temp.path());
    let (environment, _) = manager.create("default").expect("create env");
    let store = environment.store();

    let mut run = RunRecord::new("default", "already stored", RunStatus::Pending);
    run.id = Some(99);
    assert_eq!(store.insert_run(&run).expect("insert"), None);
    assert!(store.list_runs(None).expect("list").is_empty());
    assert!(store.get_run(99).expect("get").is_none());
}
