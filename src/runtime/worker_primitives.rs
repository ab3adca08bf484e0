use crate::store::RunStatus;
use std::time::Duration;

pub const QUEUE_DEFAULT_POLL_MS: u64 = 200;
pub const QUEUE_MIN_POLL_MS: u64 = 10;
pub const QUEUE_MAX_POLL_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    pub poll_interval: Duration,
}

impl QueueOptions {
    pub fn with_poll_ms(poll_ms: u64) -> Self {
        Self {
            poll_interval: Duration::from_millis(poll_ms.clamp(QUEUE_MIN_POLL_MS, QUEUE_MAX_POLL_MS)),
        }
    }
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::with_poll_ms(QUEUE_DEFAULT_POLL_MS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Started {
        at: i64,
    },
    RunFinished {
        environment_name: String,
        run_id: i64,
        status: RunStatus,
        at: i64,
    },
    Error {
        at: i64,
        message: String,
    },
    Stopped {
        at: i64,
    },
}
