use crate::api::{serve, ApiState};
use crate::app::command_support::open_workbench;
use crate::procedures::ProcedureRegistry;
use crate::runtime::append_runtime_log;

/// Runs the HTTP API and the queue worker until ctrl-c.
pub fn cmd_serve(registry: ProcedureRegistry) -> Result<String, String> {
    let workbench = open_workbench(registry)?;
    let addr = workbench
        .settings()
        .http_bind_addr()
        .map_err(|e| e.to_string())?;
    let paths = workbench.environments().state_paths().clone();
    let (queue, handle) = workbench.start_queue().map_err(|e| e.to_string())?;
    let recovered = handle.recovery();
    if !recovered.failed.is_empty() || !recovered.requeued.is_empty() {
        tracing::info!(
            failed = recovered.failed.len(),
            requeued = recovered.requeued.len(),
            "recovered runs from previous session"
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {e}"))?;
    append_runtime_log(&paths, "info", "http.started", &format!("bind={addr}"));
    let served = runtime.block_on(serve(ApiState::new(workbench, queue), addr));
    append_runtime_log(&paths, "info", "http.stopped", "http server stopped");

    handle.shutdown().map_err(|e| e.to_string())?;
    served.map_err(|e| format!("{e:#}"))?;
    Ok(format!("stopped\nbind={addr}"))
}
