use serde_json::json;
use std::sync::Arc;
use steplog::app::demo_procedures::{CLASSIFIER, DATASET_X, DATASET_Y};
use steplog::app::demo_registry;
use steplog::cache::CacheError;
use steplog::environment::{EnvironmentError, EnvironmentManager};
use steplog::executor::{RunExecutor, RunSpec};
use steplog::procedures::ProcedureDef;
use steplog::store::{ArgumentBinding, RunStatus};
use tempfile::tempdir;

fn executor(root: &std::path::Path) -> RunExecutor {
    let mut registry = demo_registry();
    registry
        .register(
            ProcedureDef::new("remember", |ctx, args| {
                ctx.write_cache("shared.csv", args.require("values")?)?;
                Ok(json!(null))
            })
            .param("values"),
        )
        .expect("register remember");
    let mut environments = EnvironmentManager::new(root);
    environments.bootstrap("default").expect("bootstrap");
    RunExecutor::new(environments, Arc::new(registry))
}

#[test]
fn create_is_idempotent_and_listing_is_sorted() {
    let temp = tempdir().expect("temp dir");
    let manager = EnvironmentManager::new(temp.path());
    let (_, created) = manager.create("zeta").expect("create zeta");
    assert!(created);
    let (_, created) = manager.create("zeta").expect("create zeta again");
    assert!(!created);
    manager.create("alpha").expect("create alpha");
    assert_eq!(manager.list().expect("list"), vec!["alpha", "zeta"]);

    let err = manager.open("missing").expect_err("missing env");
    assert!(matches!(err, EnvironmentError::NotFound { .. }));
    let err = manager.create("../escape").expect_err("bad name");
    assert!(matches!(err, EnvironmentError::InvalidName { .. }));
    assert_eq!(
        manager
            .path_for("alpha", &["cache", "X.csv"])
            .expect("path for"),
        temp.path().join("envs/alpha/cache/X.csv")
    );
}

#[test]
fn use_environment_selects_current() {
    let temp = tempdir().expect("temp dir");
    let mut manager = EnvironmentManager::new(temp.path());
    assert!(matches!(
        manager.current(),
        Err(EnvironmentError::NoneSelected)
    ));
    manager.create("exp").expect("create exp");
    manager.use_environment("exp").expect("use exp");
    assert_eq!(manager.current().expect("current").name().as_str(), "exp");
    assert!(manager.use_environment("other").is_err());
    assert_eq!(manager.current_name().map(|name| name.as_str()), Some("exp"));
}

#[test]
fn artifacts_saved_in_one_environment_are_invisible_in_another() {
    let temp = tempdir().expect("temp dir");
    let executor = executor(temp.path());
    executor.environments().create("A").expect("create A");
    executor.environments().create("B").expect("create B");

    let run = executor
        .execute_run(
            RunSpec::new("remember in A")
                .in_environment("A")
                .step("remember", vec![ArgumentBinding::literal("values", json!([1, 2, 3]))]),
        )
        .expect("run in A");
    assert_eq!(run.status, RunStatus::Complete);

    let a = executor.environments().open("A").expect("open A");
    let b = executor.environments().open("B").expect("open B");
    assert_eq!(a.cache().load("shared.csv").expect("load in A"), json!([1, 2, 3]));
    let entry = a
        .cache()
        .entry("shared.csv")
        .expect("entry")
        .expect("entry exists");
    assert_eq!(entry.step_id, run.steps[0].id);

    assert!(matches!(
        b.cache().load("shared.csv"),
        Err(CacheError::NotFound { .. })
    ));
    assert!(b.store().list_runs(None).expect("runs in B").is_empty());

    let err = executor
        .execute_run(
            RunSpec::new("read from B")
                .in_environment("B")
                .step("foo", vec![ArgumentBinding::from_cache("a", "shared.csv")]),
        )
        .expect_err("cache entry lives in A only");
    assert!(err.is_validation());
}

#[test]
fn reset_then_load_and_train_produces_a_classifier() {
    let temp = tempdir().expect("temp dir");
    let executor = executor(temp.path());

    executor
        .execute_run(RunSpec::new("before reset").step("foo", vec![ArgumentBinding::literal("a", 1)]))
        .expect("run before reset");
    executor.environments().reset("default").expect("reset");
    let environment = executor.environments().open("default").expect("open default");
    assert!(environment.store().list_runs(None).expect("list").is_empty());

    let spec = RunSpec::new("load and train")
        .step("load", Vec::new())
        .step(
            "train",
            vec![
                ArgumentBinding::from_cache("X", DATASET_X),
                ArgumentBinding::from_cache("Y", DATASET_Y),
                ArgumentBinding::literal("n_estimators", 10),
            ],
        );
    let run = executor.execute_run(spec).expect("execute run");
    assert_eq!(run.status, RunStatus::Complete);
    assert_eq!(run.steps.len(), 2);
    assert_eq!(run.steps[0].result.display(), "cached: X.csv, Y.csv");

    let classifier = environment.cache().load(CLASSIFIER).expect("load classifier");
    assert_eq!(classifier["kind"], "perceptron");
    assert_eq!(classifier["n_estimators"], 10);

    let x = environment.cache().load(DATASET_X).expect("load X");
    assert_eq!(x.as_array().expect("rows").len(), 40);
    assert!(environment.paths().cache_dir().join(DATASET_X).is_file());
}
