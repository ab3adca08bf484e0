use crate::executor::ProcInit;
use crate::store::{ArgumentBinding, RunRecord, RunStatus, StepRecord, StepResult};
use serde::{Deserialize, Serialize};

/// Step as rendered to clients: `result` is the display string and
/// `result_value` keeps the structured form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepView {
    pub id: Option<i64>,
    pub proc_name: String,
    pub run_order: u32,
    pub timestamp_start: i64,
    pub timestamp_stop: i64,
    pub result: String,
    pub result_value: StepResult,
    pub arguments: Vec<ArgumentBinding>,
    pub arguments_str: String,
    pub run_id: Option<i64>,
}

impl From<StepRecord> for StepView {
    fn from(step: StepRecord) -> Self {
        Self {
            id: step.id,
            proc_name: step.proc_name,
            run_order: step.run_order,
            timestamp_start: step.timestamp_start,
            timestamp_stop: step.timestamp_stop,
            result: step.result.display(),
            result_value: step.result,
            arguments: step.arguments,
            arguments_str: step.arguments_str,
            run_id: step.run_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunView {
    pub id: Option<i64>,
    pub timestamp_start: Option<i64>,
    pub timestamp_stop: Option<i64>,
    pub description: String,
    pub status: RunStatus,
    pub environment_name: String,
    pub error: Option<String>,
    pub steps: Vec<StepView>,
}

impl From<RunRecord> for RunView {
    fn from(run: RunRecord) -> Self {
        Self {
            id: run.id,
            timestamp_start: run.timestamp_start,
            timestamp_stop: run.timestamp_stop,
            description: run.description,
            status: run.status,
            environment_name: run.environment_name,
            error: run.error,
            steps: run.steps.into_iter().map(StepView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub default_environment: String,
}

#[derive(Debug, Serialize)]
pub struct ProcInitsResponse {
    pub proc_inits: Vec<ProcInit>,
}

#[derive(Debug, Serialize)]
pub struct EnvironmentsResponse {
    pub environments: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEnvironmentRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateEnvironmentResponse {
    pub name: String,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct RunsResponse {
    pub run_results: Vec<RunView>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run_result: RunView,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub log: String,
}

#[derive(Debug, Serialize)]
pub struct FiguresResponse {
    pub figures: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnvironmentQuery {
    pub environment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_view_carries_display_and_structured_result() {
        let step = StepRecord {
            id: Some(3),
            proc_name: "load".to_string(),
            run_order: 0,
            timestamp_start: 10,
            timestamp_stop: 12,
            result: StepResult::Cached {
                filenames: vec!["X.csv".to_string(), "Y.csv".to_string()],
            },
            arguments: Vec::new(),
            arguments_str: String::new(),
            run_id: Some(1),
        };
        let encoded = serde_json::to_value(StepView::from(step)).expect("encode step view");
        assert_eq!(encoded["result"], json!("cached: X.csv, Y.csv"));
        assert_eq!(
            encoded["result_value"],
            json!({"kind": "cached", "filenames": ["X.csv", "Y.csv"]})
        );
    }
}
