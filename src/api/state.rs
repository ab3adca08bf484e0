use super::error::ApiError;
use crate::runtime::RunQueue;
use crate::workbench::Workbench;
use axum::http::StatusCode;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ApiState {
    inner: Arc<ApiInner>,
}

#[derive(Debug)]
struct ApiInner {
    workbench: Workbench,
    queue: RunQueue,
}

impl ApiState {
    pub fn new(workbench: Workbench, queue: RunQueue) -> Self {
        Self {
            inner: Arc::new(ApiInner { workbench, queue }),
        }
    }

    pub fn workbench(&self) -> &Workbench {
        &self.inner.workbench
    }

    pub fn queue(&self) -> &RunQueue {
        &self.inner.queue
    }

    /// Runs store and filesystem work off the async executor.
    pub async fn run_blocking<T, F>(&self, operation_label: &'static str, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(ApiState) -> Result<T, ApiError> + Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || op(state))
            .await
            .map_err(|err| {
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    format!("{operation_label} join failure: {err}"),
                )
            })?
    }
}
