use super::error::RuntimeError;
use super::logging::append_runtime_log;
use super::recovery::{recover_interrupted_runs, RecoveryReport};
use super::worker_primitives::{QueueOptions, WorkerEvent};
use crate::environment::StatePaths;
use crate::executor::{ExecutorError, RunExecutor, RunSpec};
use crate::shared::now_millis;
use crate::store::{RunRecord, RunStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A run admitted as `pending` and waiting for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRun {
    pub environment_name: String,
    pub run_id: i64,
}

/// Submission side of the single-consumer run queue.
#[derive(Debug)]
pub struct RunQueue {
    executor: RunExecutor,
    paths: StatePaths,
    sender: Sender<QueuedRun>,
}

/// Owner of the worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    events: Receiver<WorkerEvent>,
    recovery: RecoveryReport,
}

struct QueueWorkerContext {
    executor: RunExecutor,
    paths: StatePaths,
    receiver: Receiver<QueuedRun>,
    stop: Arc<AtomicBool>,
    events: Sender<WorkerEvent>,
    poll_interval: Duration,
}

impl RunQueue {
    /// Recovers runs left behind by a previous process, then starts the one
    /// worker thread that drains the queue.
    pub fn start(
        executor: RunExecutor,
        options: QueueOptions,
    ) -> Result<(Self, WorkerHandle), RuntimeError> {
        let paths = executor.environments().state_paths().clone();
        let recovery = recover_interrupted_runs(&executor)?;

        let (sender, receiver) = mpsc::channel::<QueuedRun>();
        for queued in &recovery.requeued {
            // The receiver is alive until the worker below exits.
            let _ = sender.send(queued.clone());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (events_tx, events_rx) = mpsc::channel::<WorkerEvent>();
        let context = QueueWorkerContext {
            executor: executor.clone(),
            paths: paths.clone(),
            receiver,
            stop: stop.clone(),
            events: events_tx,
            poll_interval: options.poll_interval,
        };
        let thread = thread::Builder::new()
            .name("steplog-queue".to_string())
            .spawn(move || run_queue_worker(context))
            .map_err(|source| RuntimeError::SpawnWorker { source })?;

        append_runtime_log(
            &paths,
            "info",
            "queue.started",
            &format!("requeued={}", recovery.requeued.len()),
        );
        Ok((
            Self {
                executor,
                paths,
                sender,
            },
            WorkerHandle {
                stop,
                thread: Some(thread),
                events: events_rx,
                recovery,
            },
        ))
    }

    pub fn executor(&self) -> &RunExecutor {
        &self.executor
    }

    /// Admits the run as `pending` and hands it to the worker. Returns as soon
    /// as the run is recorded.
    pub fn submit(&self, spec: RunSpec) -> Result<RunRecord, RuntimeError> {
        let run = self.executor.admit(spec)?;
        let run_id = run.id.ok_or(ExecutorError::NotCreated { what: "run id" })?;
        let queued = QueuedRun {
            environment_name: run.environment_name.clone(),
            run_id,
        };
        if self.sender.send(queued).is_err() {
            self.executor
                .fail_run(&run.environment_name, run_id, "queue worker is not running")?;
            return Err(RuntimeError::WorkerStopped { run_id });
        }
        append_runtime_log(
            &self.paths,
            "info",
            "run.admitted",
            &format!("environment={} run={run_id}", run.environment_name),
        );
        Ok(run)
    }
}

impl WorkerHandle {
    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|thread| !thread.is_finished())
            .unwrap_or(false)
    }

    /// Stops after the run in progress, if any, and joins the thread. Runs
    /// still queued stay `pending` and are picked up on the next start.
    pub fn shutdown(mut self) -> Result<(), RuntimeError> {
        self.stop.store(true, Ordering::Relaxed);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| RuntimeError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn run_queue_worker(context: QueueWorkerContext) {
    let _ = context.events.send(WorkerEvent::Started { at: now_millis() });

    while !context.stop.load(Ordering::Relaxed) {
        match context.receiver.recv_timeout(context.poll_interval) {
            Ok(queued) => process_queued_run(&context, queued),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    append_runtime_log(&context.paths, "info", "queue.stopped", "queue worker stopped");
    let _ = context.events.send(WorkerEvent::Stopped { at: now_millis() });
}

fn process_queued_run(context: &QueueWorkerContext, queued: QueuedRun) {
    let QueuedRun {
        environment_name,
        run_id,
    } = queued;
    let outcome = context
        .executor
        .execute_admitted(&environment_name, run_id);

    let status = match outcome {
        Ok(run) => {
            append_runtime_log(
                &context.paths,
                "info",
                "run.complete",
                &format!(
                    "environment={environment_name} run={run_id} steps={}",
                    run.steps.len()
                ),
            );
            Some(run.status)
        }
        Err(err @ ExecutorError::NotPending { .. }) => {
            append_runtime_log(&context.paths, "warn", "run.skipped", &err.to_string());
            None
        }
        Err(err) => {
            let message = err.to_string();
            tracing::warn!(run_id, environment = %environment_name, "queued run failed: {message}");
            append_runtime_log(&context.paths, "warn", "run.failed", &message);
            if err.failed_run_id().is_some() {
                Some(RunStatus::Failed)
            } else {
                mark_failed_after_error(context, &environment_name, run_id, &message)
            }
        }
    };

    let event = match status {
        Some(status) => WorkerEvent::RunFinished {
            environment_name,
            run_id,
            status,
            at: now_millis(),
        },
        None => WorkerEvent::Error {
            at: now_millis(),
            message: format!("run `{run_id}` in `{environment_name}` was not executed"),
        },
    };
    let _ = context.events.send(event);
}

fn mark_failed_after_error(
    context: &QueueWorkerContext,
    environment_name: &str,
    run_id: i64,
    message: &str,
) -> Option<RunStatus> {
    let already_failed = context
        .executor
        .environments()
        .open(environment_name)
        .ok()
        .and_then(|environment| environment.store().get_run(run_id).ok().flatten())
        .map(|run| run.status == RunStatus::Failed)
        .unwrap_or(false);
    if already_failed {
        return Some(RunStatus::Failed);
    }
    match context.executor.fail_run(environment_name, run_id, message) {
        Ok(run) => Some(run.status),
        Err(err) => {
            append_runtime_log(
                &context.paths,
                "error",
                "run.fail.unrecorded",
                &format!("run={run_id}: {err}"),
            );
            None
        }
    }
}
