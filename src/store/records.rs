use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl RunStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Complete)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "complete" => Ok(RunStatus::Complete),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status `{other}`")),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an argument's value comes from when the step is invoked.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentSource {
    Literal(Value),
    Cache(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArgumentWire", into = "ArgumentWire")]
pub struct ArgumentBinding {
    pub name: String,
    pub source: ArgumentSource,
}

impl ArgumentBinding {
    pub fn literal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            source: ArgumentSource::Literal(value.into()),
        }
    }

    pub fn from_cache(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ArgumentSource::Cache(filename.into()),
        }
    }

    pub fn cache_reference(&self) -> Option<&str> {
        match &self.source {
            ArgumentSource::Cache(filename) => Some(filename),
            ArgumentSource::Literal(_) => None,
        }
    }

    /// `name:value` as shown in run listings; cache references render as
    /// `name:cache(<file>)`.
    pub fn display(&self) -> String {
        match &self.source {
            ArgumentSource::Literal(value) => format!("{}:{}", self.name, display_value(value)),
            ArgumentSource::Cache(filename) => format!("{}:cache({filename})", self.name),
        }
    }
}

/// JSON shape shared with the HTTP layer: `{name, value, from_cache}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArgumentWire {
    name: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    from_cache: bool,
}

impl TryFrom<ArgumentWire> for ArgumentBinding {
    type Error = String;

    fn try_from(wire: ArgumentWire) -> Result<Self, Self::Error> {
        if wire.name.trim().is_empty() {
            return Err("argument name must be non-empty".to_string());
        }
        if !wire.from_cache {
            return Ok(ArgumentBinding::literal(wire.name, wire.value));
        }
        match wire.value {
            Value::String(filename) => Ok(ArgumentBinding::from_cache(wire.name, filename)),
            other => Err(format!(
                "argument `{}` is marked from_cache but its value `{other}` is not a cache filename",
                wire.name
            )),
        }
    }
}

impl From<ArgumentBinding> for ArgumentWire {
    fn from(binding: ArgumentBinding) -> Self {
        match binding.source {
            ArgumentSource::Literal(value) => ArgumentWire {
                name: binding.name,
                value,
                from_cache: false,
            },
            ArgumentSource::Cache(filename) => ArgumentWire {
                name: binding.name,
                value: Value::String(filename),
                from_cache: true,
            },
        }
    }
}

pub fn arguments_str(arguments: &[ArgumentBinding]) -> String {
    arguments
        .iter()
        .map(ArgumentBinding::display)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepResult {
    Value { value: Value },
    Cached { filenames: Vec<String> },
}

impl StepResult {
    pub fn display(&self) -> String {
        match self {
            StepResult::Value { value } => display_value(value),
            StepResult::Cached { filenames } => format!("cached: {}", filenames.join(", ")),
        }
    }
}

pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: Option<i64>,
    pub proc_name: String,
    pub run_order: u32,
    pub timestamp_start: i64,
    pub timestamp_stop: i64,
    pub result: StepResult,
    pub arguments: Vec<ArgumentBinding>,
    pub arguments_str: String,
    pub run_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Option<i64>,
    pub timestamp_start: Option<i64>,
    pub timestamp_stop: Option<i64>,
    pub description: String,
    pub status: RunStatus,
    pub environment_name: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

impl RunRecord {
    pub fn new(
        environment_name: impl Into<String>,
        description: impl Into<String>,
        status: RunStatus,
    ) -> Self {
        Self {
            id: None,
            timestamp_start: None,
            timestamp_stop: None,
            description: description.into(),
            status,
            environment_name: environment_name.into(),
            error: None,
            steps: Vec::new(),
        }
    }

    pub fn step_ids(&self) -> Vec<i64> {
        self.steps.iter().filter_map(|step| step.id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: i64,
    pub environment_name: String,
    pub filename: String,
    pub step_id: Option<i64>,
    pub digest: String,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_status_only_moves_forward() {
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Running));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Complete));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Complete.can_transition_to(RunStatus::Running));
        assert!(!RunStatus::Failed.can_transition_to(RunStatus::Complete));
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Pending));
        assert!(!RunStatus::Pending.can_transition_to(RunStatus::Complete));
    }

    #[test]
    fn argument_bindings_use_from_cache_wire_shape() {
        let binding: ArgumentBinding =
            serde_json::from_value(json!({"name": "X", "value": "X.csv", "from_cache": true}))
                .expect("parse cache binding");
        assert_eq!(binding.cache_reference(), Some("X.csv"));

        let literal: ArgumentBinding =
            serde_json::from_value(json!({"name": "n_estimators", "value": 10}))
                .expect("parse literal binding");
        assert_eq!(literal, ArgumentBinding::literal("n_estimators", 10));

        let encoded = serde_json::to_value(&binding).expect("encode binding");
        assert_eq!(
            encoded,
            json!({"name": "X", "value": "X.csv", "from_cache": true})
        );
    }

    #[test]
    fn cache_binding_requires_string_filename() {
        let err = serde_json::from_value::<ArgumentBinding>(
            json!({"name": "X", "value": 3, "from_cache": true}),
        )
        .expect_err("numeric cache reference must fail");
        assert!(err.to_string().contains("not a cache filename"));
    }

    #[test]
    fn arguments_str_joins_name_value_pairs() {
        let args = vec![
            ArgumentBinding::literal("a", 1),
            ArgumentBinding::literal("label", "x"),
            ArgumentBinding::from_cache("X", "X.csv"),
        ];
        assert_eq!(arguments_str(&args), "a:1, label:x, X:cache(X.csv)");
    }

    #[test]
    fn step_result_display_strings() {
        let value = StepResult::Value { value: json!(5) };
        assert_eq!(value.display(), "5");
        let cached = StepResult::Cached {
            filenames: vec!["X.csv".to_string(), "y.csv".to_string()],
        };
        assert_eq!(cached.display(), "cached: X.csv, y.csv");
    }
}
