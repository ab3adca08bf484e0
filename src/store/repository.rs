use super::error::{sql_error, StoreError};
use super::records::{
    ArgumentBinding, CacheEntry, RunRecord, RunStatus, StepRecord, StepResult,
};
use crate::shared::now_millis;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const RUN_COLUMNS: &str =
    "id, timestamp_start, timestamp_stop, description, status, environment_name, error";
const STEP_COLUMNS: &str = "id, proc_name, run_order, timestamp_start, timestamp_stop, \
     result_json, arguments_json, arguments_str, run_id";

type RunRow = (
    i64,
    Option<i64>,
    Option<i64>,
    String,
    String,
    String,
    Option<String>,
);
type StepRow = (i64, String, i64, i64, i64, String, String, String, i64);

/// Durable log of environments, runs, steps and cache entries for one
/// environment directory. Every mutating call commits on its own.
#[derive(Debug, Clone)]
pub struct RecordStore {
    db_path: PathBuf,
}

impl RecordStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        let _ = store.connect()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let connection = self.connect()?;
        connection
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS environment (
                    name TEXT PRIMARY KEY,
                    created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS run (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp_start INTEGER,
                    timestamp_stop INTEGER,
                    description TEXT NOT NULL,
                    status TEXT NOT NULL,
                    environment_name TEXT NOT NULL REFERENCES environment(name),
                    error TEXT,
                    spec_json TEXT,
                    admitted_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS step (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    proc_name TEXT NOT NULL,
                    run_order INTEGER NOT NULL,
                    timestamp_start INTEGER NOT NULL,
                    timestamp_stop INTEGER NOT NULL,
                    result_json TEXT NOT NULL,
                    arguments_json TEXT NOT NULL,
                    arguments_str TEXT NOT NULL,
                    run_id INTEGER NOT NULL REFERENCES run(id),
                    UNIQUE (run_id, run_order)
                );

                CREATE TABLE IF NOT EXISTS cache_entry (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    environment_name TEXT NOT NULL REFERENCES environment(name),
                    filename TEXT NOT NULL,
                    step_id INTEGER REFERENCES step(id),
                    digest TEXT NOT NULL,
                    updated_at INTEGER NOT NULL,
                    UNIQUE (environment_name, filename)
                );

                CREATE INDEX IF NOT EXISTS idx_run_environment
                    ON run(environment_name, id);
                CREATE INDEX IF NOT EXISTS idx_step_run_order
                    ON step(run_id, run_order);
                ",
            )
            .map_err(sql_error)?;
        Ok(())
    }

    /// Returns `false` when the environment already exists.
    pub fn create_environment(&self, name: &str) -> Result<bool, StoreError> {
        let connection = self.connect()?;
        let inserted = connection
            .execute(
                "
                INSERT INTO environment (name, created_at) VALUES (?1, ?2)
                ON CONFLICT(name) DO NOTHING
                ",
                params![name, now_millis()],
            )
            .map_err(sql_error)?;
        Ok(inserted > 0)
    }

    pub fn list_environments(&self) -> Result<Vec<String>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare("SELECT name FROM environment ORDER BY name ASC")
            .map_err(sql_error)?;
        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sql_error)?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row.map_err(sql_error)?);
        }
        Ok(names)
    }

    /// Inserts a run whose id is unset and returns the assigned id. A run that
    /// already carries an id yields `None` and writes nothing.
    pub fn insert_run(&self, run: &RunRecord) -> Result<Option<i64>, StoreError> {
        self.insert_run_with_spec(run, None)
    }

    pub fn insert_run_with_spec(
        &self,
        run: &RunRecord,
        spec: Option<&Value>,
    ) -> Result<Option<i64>, StoreError> {
        if run.id.is_some() {
            return Ok(None);
        }
        let spec_json = spec
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| StoreError::Encode {
                what: "run spec",
                source,
            })?;

        let mut connection = self.connect()?;
        let tx = connection.transaction().map_err(sql_error)?;
        ensure_environment_registered(&tx, &run.environment_name)?;
        tx.execute(
            "
            INSERT INTO run (
                timestamp_start, timestamp_stop, description, status,
                environment_name, error, spec_json, admitted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                run.timestamp_start,
                run.timestamp_stop,
                run.description,
                run.status.as_str(),
                run.environment_name,
                run.error,
                spec_json,
                now_millis(),
            ],
        )
        .map_err(sql_error)?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(sql_error)?;
        Ok(Some(id))
    }

    /// Full-row update keyed by `run.id`. Status may only move forward.
    pub fn update_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        let run_id = run.id.ok_or(StoreError::RunIdMissing)?;
        if let (Some(start), Some(stop)) = (run.timestamp_start, run.timestamp_stop) {
            if stop < start {
                return Err(StoreError::InvalidTimestamps { run_id, start, stop });
            }
        }

        let mut connection = self.connect()?;
        let tx = connection.transaction().map_err(sql_error)?;
        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM run WHERE id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_error)?;
        let Some(current) = current else {
            return Err(StoreError::RunNotFound { run_id });
        };
        let current = decode_status(&current)?;
        if current != run.status && !current.can_transition_to(run.status) {
            return Err(StoreError::InvalidTransition {
                run_id,
                from: current,
                to: run.status,
            });
        }
        ensure_environment_registered(&tx, &run.environment_name)?;

        tx.execute(
            "
            UPDATE run SET
                timestamp_start = ?1,
                timestamp_stop = ?2,
                description = ?3,
                status = ?4,
                environment_name = ?5,
                error = ?6
            WHERE id = ?7
            ",
            params![
                run.timestamp_start,
                run.timestamp_stop,
                run.description,
                run.status.as_str(),
                run.environment_name,
                run.error,
                run_id,
            ],
        )
        .map_err(sql_error)?;
        tx.commit().map_err(sql_error)?;
        Ok(())
    }

    pub fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>, StoreError> {
        let connection = self.connect()?;
        let row: Option<RunRow> = connection
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM run WHERE id = ?1"),
                params![run_id],
                read_run_row,
            )
            .optional()
            .map_err(sql_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut run = run_from_row(row)?;
        run.steps = self.list_steps(Some(run_id))?;
        Ok(Some(run))
    }

    pub fn list_runs(&self, environment: Option<&str>) -> Result<Vec<RunRecord>, StoreError> {
        let connection = self.connect()?;
        let rows = match environment {
            Some(environment) => {
                let mut statement = connection
                    .prepare(&format!(
                        "SELECT {RUN_COLUMNS} FROM run WHERE environment_name = ?1 ORDER BY id ASC"
                    ))
                    .map_err(sql_error)?;
                let rows = statement
                    .query_map(params![environment], read_run_row)
                    .map_err(sql_error)?;
                collect_rows(rows)?
            }
            None => {
                let mut statement = connection
                    .prepare(&format!("SELECT {RUN_COLUMNS} FROM run ORDER BY id ASC"))
                    .map_err(sql_error)?;
                let rows = statement.query_map([], read_run_row).map_err(sql_error)?;
                collect_rows(rows)?
            }
        };

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            let mut run = run_from_row(row)?;
            if let Some(id) = run.id {
                run.steps = self.list_steps(Some(id))?;
            }
            runs.push(run);
        }
        Ok(runs)
    }

    /// Runs currently in `status`, oldest first, without their steps.
    pub fn runs_with_status(&self, status: RunStatus) -> Result<Vec<RunRecord>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM run WHERE status = ?1 ORDER BY id ASC"
            ))
            .map_err(sql_error)?;
        let rows = statement
            .query_map(params![status.as_str()], read_run_row)
            .map_err(sql_error)?;
        collect_rows(rows)?.into_iter().map(run_from_row).collect()
    }

    /// `(run_id, admitted_at)` of every pending run, oldest admission first.
    pub fn pending_admissions(&self) -> Result<Vec<(i64, i64)>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(
                "SELECT id, admitted_at FROM run WHERE status = ?1 ORDER BY admitted_at ASC, id ASC",
            )
            .map_err(sql_error)?;
        let rows = statement
            .query_map(params![RunStatus::Pending.as_str()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(sql_error)?;
        collect_rows(rows)
    }

    pub fn load_run_spec(&self, run_id: i64) -> Result<Option<Value>, StoreError> {
        let connection = self.connect()?;
        let raw: Option<Option<String>> = connection
            .query_row(
                "SELECT spec_json FROM run WHERE id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_error)?;
        match raw {
            None => Err(StoreError::RunNotFound { run_id }),
            Some(None) => Ok(None),
            Some(Some(raw)) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|err| StoreError::Decode {
                    column: "run.spec_json",
                    reason: err.to_string(),
                }),
        }
    }

    /// Insert-once: a step that already has an id yields `None`.
    pub fn insert_step(&self, step: &StepRecord) -> Result<Option<i64>, StoreError> {
        if step.id.is_some() {
            return Ok(None);
        }
        let run_id = step.run_id.ok_or_else(|| StoreError::StepRunIdMissing {
            proc_name: step.proc_name.clone(),
        })?;
        let result_json = serde_json::to_string(&step.result).map_err(|source| {
            StoreError::Encode {
                what: "step result",
                source,
            }
        })?;
        let arguments_json =
            serde_json::to_string(&step.arguments).map_err(|source| StoreError::Encode {
                what: "step arguments",
                source,
            })?;

        let mut connection = self.connect()?;
        let tx = connection.transaction().map_err(sql_error)?;
        let run_exists = tx
            .query_row("SELECT 1 FROM run WHERE id = ?1", params![run_id], |row| {
                row.get::<_, i64>(0)
            })
            .optional()
            .map_err(sql_error)?
            .is_some();
        if !run_exists {
            return Err(StoreError::RunNotFound { run_id });
        }
        let order_taken = tx
            .query_row(
                "SELECT 1 FROM step WHERE run_id = ?1 AND run_order = ?2",
                params![run_id, step.run_order],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(sql_error)?
            .is_some();
        if order_taken {
            return Err(StoreError::DuplicateRunOrder {
                run_id,
                run_order: step.run_order,
            });
        }

        tx.execute(
            "
            INSERT INTO step (
                proc_name, run_order, timestamp_start, timestamp_stop,
                result_json, arguments_json, arguments_str, run_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                step.proc_name,
                step.run_order,
                step.timestamp_start,
                step.timestamp_stop,
                result_json,
                arguments_json,
                step.arguments_str,
                run_id,
            ],
        )
        .map_err(sql_error)?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(sql_error)?;
        Ok(Some(id))
    }

    /// Steps of one run ordered by `run_order`, or every step ordered by id.
    pub fn list_steps(&self, run_id: Option<i64>) -> Result<Vec<StepRecord>, StoreError> {
        let connection = self.connect()?;
        let rows = match run_id {
            Some(run_id) => {
                let mut statement = connection
                    .prepare(&format!(
                        "SELECT {STEP_COLUMNS} FROM step WHERE run_id = ?1 ORDER BY run_order ASC"
                    ))
                    .map_err(sql_error)?;
                let rows = statement
                    .query_map(params![run_id], read_step_row)
                    .map_err(sql_error)?;
                collect_rows(rows)?
            }
            None => {
                let mut statement = connection
                    .prepare(&format!("SELECT {STEP_COLUMNS} FROM step ORDER BY id ASC"))
                    .map_err(sql_error)?;
                let rows = statement.query_map([], read_step_row).map_err(sql_error)?;
                collect_rows(rows)?
            }
        };
        rows.into_iter().map(step_from_row).collect()
    }

    /// Insert-or-update of the single live entry for `(environment, filename)`.
    pub fn upsert_cache_entry(
        &self,
        environment: &str,
        filename: &str,
        step_id: Option<i64>,
        digest: &str,
    ) -> Result<CacheEntry, StoreError> {
        let mut connection = self.connect()?;
        let tx = connection.transaction().map_err(sql_error)?;
        ensure_environment_registered(&tx, environment)?;
        tx.execute(
            "
            INSERT INTO cache_entry (environment_name, filename, step_id, digest, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(environment_name, filename) DO UPDATE SET
                step_id=excluded.step_id,
                digest=excluded.digest,
                updated_at=excluded.updated_at
            ",
            params![environment, filename, step_id, digest, now_millis()],
        )
        .map_err(sql_error)?;
        let entry = tx
            .query_row(
                "
                SELECT id, environment_name, filename, step_id, digest, updated_at
                FROM cache_entry
                WHERE environment_name = ?1 AND filename = ?2
                ",
                params![environment, filename],
                read_cache_entry,
            )
            .map_err(sql_error)?;
        tx.commit().map_err(sql_error)?;
        Ok(entry)
    }

    pub fn get_cache_entry(
        &self,
        environment: &str,
        filename: &str,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let connection = self.connect()?;
        connection
            .query_row(
                "
                SELECT id, environment_name, filename, step_id, digest, updated_at
                FROM cache_entry
                WHERE environment_name = ?1 AND filename = ?2
                ",
                params![environment, filename],
                read_cache_entry,
            )
            .optional()
            .map_err(sql_error)
    }

    pub fn list_cache_entries(&self, environment: &str) -> Result<Vec<CacheEntry>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection
            .prepare(
                "
                SELECT id, environment_name, filename, step_id, digest, updated_at
                FROM cache_entry
                WHERE environment_name = ?1
                ORDER BY filename ASC
                ",
            )
            .map_err(sql_error)?;
        let rows = statement
            .query_map(params![environment], read_cache_entry)
            .map_err(sql_error)?;
        collect_rows(rows)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let connection = Connection::open(&self.db_path).map_err(|source| StoreError::Open {
            path: self.db_path.display().to_string(),
            source,
        })?;
        connection
            .execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(sql_error)?;
        Ok(connection)
    }
}

fn ensure_environment_registered(tx: &Transaction<'_>, environment: &str) -> Result<(), StoreError> {
    let known = tx
        .query_row(
            "SELECT 1 FROM environment WHERE name = ?1",
            params![environment],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map_err(sql_error)?
        .is_some();
    if !known {
        return Err(StoreError::UnknownEnvironment {
            environment: environment.to_string(),
        });
    }
    Ok(())
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(sql_error)?);
    }
    Ok(out)
}

fn read_run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn read_step_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StepRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn read_cache_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        id: row.get(0)?,
        environment_name: row.get(1)?,
        filename: row.get(2)?,
        step_id: row.get(3)?,
        digest: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn run_from_row(row: RunRow) -> Result<RunRecord, StoreError> {
    let (id, timestamp_start, timestamp_stop, description, status, environment_name, error) = row;
    Ok(RunRecord {
        id: Some(id),
        timestamp_start,
        timestamp_stop,
        description,
        status: decode_status(&status)?,
        environment_name,
        error,
        steps: Vec::new(),
    })
}

fn step_from_row(row: StepRow) -> Result<StepRecord, StoreError> {
    let (
        id,
        proc_name,
        run_order,
        timestamp_start,
        timestamp_stop,
        result_json,
        arguments_json,
        arguments_str,
        run_id,
    ) = row;
    let run_order = u32::try_from(run_order).map_err(|_| StoreError::Decode {
        column: "step.run_order",
        reason: format!("{run_order} is out of range"),
    })?;
    let result: StepResult =
        serde_json::from_str(&result_json).map_err(|err| StoreError::Decode {
            column: "step.result_json",
            reason: err.to_string(),
        })?;
    let arguments: Vec<ArgumentBinding> =
        serde_json::from_str(&arguments_json).map_err(|err| StoreError::Decode {
            column: "step.arguments_json",
            reason: err.to_string(),
        })?;
    Ok(StepRecord {
        id: Some(id),
        proc_name,
        run_order,
        timestamp_start,
        timestamp_stop,
        result,
        arguments,
        arguments_str,
        run_id: Some(run_id),
    })
}

fn decode_status(raw: &str) -> Result<RunStatus, StoreError> {
    RunStatus::parse(raw).map_err(|reason| StoreError::Decode {
        column: "run.status",
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn open_store(root: &Path) -> RecordStore {
        let store = RecordStore::open(&root.join("steplog.db")).expect("open store");
        store.ensure_schema().expect("schema");
        assert!(store.create_environment("default").expect("create env"));
        store
    }

    fn step(run_id: i64, run_order: u32) -> StepRecord {
        StepRecord {
            id: None,
            proc_name: "foo".to_string(),
            run_order,
            timestamp_start: 10,
            timestamp_stop: 11,
            result: StepResult::Value { value: json!(5) },
            arguments: vec![ArgumentBinding::literal("a", 1)],
            arguments_str: "a:1".to_string(),
            run_id: Some(run_id),
        }
    }

    #[test]
    fn create_environment_signals_duplicates_without_error() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());
        assert!(!store.create_environment("default").expect("duplicate env"));
        assert_eq!(
            store.list_environments().expect("list"),
            vec!["default".to_string()]
        );
    }

    #[test]
    fn insert_run_refuses_records_that_already_have_an_id() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());
        let mut run = RunRecord::new("default", "first", RunStatus::Running);
        let id = store.insert_run(&run).expect("insert").expect("new id");

        run.id = Some(id);
        assert_eq!(store.insert_run(&run).expect("second insert"), None);
        assert_eq!(store.list_runs(None).expect("list").len(), 1);
    }

    #[test]
    fn insert_step_refuses_records_that_already_have_an_id() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());
        let run_id = store
            .insert_run(&RunRecord::new("default", "r", RunStatus::Running))
            .expect("insert run")
            .expect("run id");

        let mut record = step(run_id, 0);
        let id = store.insert_step(&record).expect("insert").expect("step id");
        record.id = Some(id);
        assert_eq!(store.insert_step(&record).expect("re-insert"), None);
        assert_eq!(store.list_steps(Some(run_id)).expect("steps").len(), 1);
    }

    #[test]
    fn insert_step_requires_existing_run_and_free_run_order() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());
        let err = store.insert_step(&step(99, 0)).expect_err("missing run");
        assert!(matches!(err, StoreError::RunNotFound { run_id: 99 }));

        let run_id = store
            .insert_run(&RunRecord::new("default", "r", RunStatus::Running))
            .expect("insert run")
            .expect("run id");
        store.insert_step(&step(run_id, 0)).expect("first step");
        let err = store
            .insert_step(&step(run_id, 0))
            .expect_err("duplicate order");
        assert!(matches!(err, StoreError::DuplicateRunOrder { .. }));
    }

    #[test]
    fn update_run_rejects_missing_ids_and_backwards_transitions() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());
        let mut ghost = RunRecord::new("default", "ghost", RunStatus::Complete);
        ghost.id = Some(42);
        assert!(matches!(
            store.update_run(&ghost).expect_err("missing run"),
            StoreError::RunNotFound { run_id: 42 }
        ));

        let mut run = RunRecord::new("default", "r", RunStatus::Running);
        run.timestamp_start = Some(100);
        run.id = store.insert_run(&run).expect("insert");
        run.status = RunStatus::Complete;
        run.timestamp_stop = Some(120);
        store.update_run(&run).expect("complete run");

        run.status = RunStatus::Running;
        assert!(matches!(
            store.update_run(&run).expect_err("reversal"),
            StoreError::InvalidTransition { .. }
        ));

        run.status = RunStatus::Complete;
        run.timestamp_stop = Some(50);
        assert!(matches!(
            store.update_run(&run).expect_err("stop before start"),
            StoreError::InvalidTimestamps { .. }
        ));
    }

    #[test]
    fn list_steps_orders_by_run_order() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());
        let run_id = store
            .insert_run(&RunRecord::new("default", "r", RunStatus::Running))
            .expect("insert run")
            .expect("run id");
        store.insert_step(&step(run_id, 1)).expect("step 1");
        store.insert_step(&step(run_id, 0)).expect("step 0");

        let orders = store
            .list_steps(Some(run_id))
            .expect("steps")
            .iter()
            .map(|step| step.run_order)
            .collect::<Vec<_>>();
        assert_eq!(orders, vec![0, 1]);

        let run = store.get_run(run_id).expect("get").expect("run exists");
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.step_ids().len(), 2);
    }

    #[test]
    fn cache_entry_upsert_keeps_single_row_and_latest_step() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());
        let run_id = store
            .insert_run(&RunRecord::new("default", "r", RunStatus::Running))
            .expect("insert run")
            .expect("run id");
        let first = store.insert_step(&step(run_id, 0)).expect("step").expect("id");
        let second = store.insert_step(&step(run_id, 1)).expect("step").expect("id");

        store
            .upsert_cache_entry("default", "x", Some(first), "aa")
            .expect("first upsert");
        let entry = store
            .upsert_cache_entry("default", "x", Some(second), "bb")
            .expect("second upsert");

        assert_eq!(entry.step_id, Some(second));
        let entries = store.list_cache_entries("default").expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].digest, "bb");
    }

    #[test]
    fn run_spec_is_stored_alongside_the_run() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());
        let spec = json!({"description": "d", "proc_inits": []});
        let id = store
            .insert_run_with_spec(
                &RunRecord::new("default", "d", RunStatus::Pending),
                Some(&spec),
            )
            .expect("insert")
            .expect("id");
        assert_eq!(store.load_run_spec(id).expect("load spec"), Some(spec));
        assert_eq!(
            store
                .runs_with_status(RunStatus::Pending)
                .expect("pending")
                .len(),
            1
        );
    }

    #[test]
    fn runs_require_registered_environment() {
        let temp = tempdir().expect("tempdir");
        let store = open_store(temp.path());
        let err = store
            .insert_run(&RunRecord::new("other", "r", RunStatus::Running))
            .expect_err("unknown env");
        assert!(matches!(err, StoreError::UnknownEnvironment { .. }));
    }
}
