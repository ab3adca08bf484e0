use super::error::RuntimeError;
use super::logging::append_runtime_log;
use super::queue_worker::QueuedRun;
use crate::executor::{ExecutorError, RunExecutor};
use crate::store::RunStatus;

pub const INTERRUPTED_MESSAGE: &str = "interrupted before completion";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub failed: Vec<QueuedRun>,
    pub requeued: Vec<QueuedRun>,
}

/// Runs left `running` by a previous process are marked failed; runs still
/// `pending` are returned in admission order across all environments, to be
/// enqueued again.
pub fn recover_interrupted_runs(executor: &RunExecutor) -> Result<RecoveryReport, RuntimeError> {
    let environments = executor.environments();
    let paths = environments.state_paths();
    let mut report = RecoveryReport::default();
    let mut pending = Vec::new();

    for name in environments.list()? {
        let environment = environments.open(&name)?;
        let store = environment.store();

        for run in store
            .runs_with_status(RunStatus::Running)
            .map_err(ExecutorError::from)?
        {
            let Some(run_id) = run.id else {
                continue;
            };
            executor.fail_run(&name, run_id, INTERRUPTED_MESSAGE)?;
            append_runtime_log(
                paths,
                "warn",
                "run.recovered.failed",
                &format!("environment={name} run={run_id} {INTERRUPTED_MESSAGE}"),
            );
            report.failed.push(QueuedRun {
                environment_name: name.clone(),
                run_id,
            });
        }

        for (run_id, admitted_at) in store.pending_admissions().map_err(ExecutorError::from)? {
            pending.push((admitted_at, name.clone(), run_id));
        }
    }

    // Environments have separate stores, so only admission time orders runs
    // across them.
    pending.sort();
    for (_, environment_name, run_id) in pending {
        append_runtime_log(
            paths,
            "info",
            "run.recovered.requeued",
            &format!("environment={environment_name} run={run_id}"),
        );
        report.requeued.push(QueuedRun {
            environment_name,
            run_id,
        });
    }

    if !report.failed.is_empty() || !report.requeued.is_empty() {
        tracing::info!(
            failed = report.failed.len(),
            requeued = report.requeued.len(),
            "recovered runs from previous process"
        );
    }
    Ok(report)
}
