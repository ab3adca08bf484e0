use crate::store::{arguments_str, ArgumentBinding, ArgumentSource};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// One requested procedure call. `run_order` is accepted from callers but
/// never trusted; steps are numbered by their position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcInit {
    pub proc_name: String,
    #[serde(default)]
    pub run_order: Option<u32>,
    #[serde(default)]
    pub arguments: Vec<ArgumentBinding>,
    #[serde(default)]
    pub arguments_str: String,
}

impl ProcInit {
    pub fn new(proc_name: impl Into<String>, arguments: Vec<ArgumentBinding>) -> Self {
        let arguments_str = arguments_str(&arguments);
        Self {
            proc_name: proc_name.into(),
            run_order: None,
            arguments,
            arguments_str,
        }
    }
}

/// Declarative description of a run, as submitted over HTTP or built in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub description: String,
    #[serde(default)]
    pub environment_name: Option<String>,
    pub proc_inits: Vec<ProcInit>,
}

impl RunSpec {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            environment_name: None,
            proc_inits: Vec::new(),
        }
    }

    pub fn in_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment_name = Some(environment.into());
        self
    }

    pub fn step(mut self, proc_name: impl Into<String>, arguments: Vec<ArgumentBinding>) -> Self {
        self.proc_inits.push(ProcInit::new(proc_name, arguments));
        self
    }

    /// Renumbers steps by position and recomputes each `arguments_str`.
    pub fn normalize(&mut self) {
        for (run_order, init) in (0u32..).zip(self.proc_inits.iter_mut()) {
            init.run_order = Some(run_order);
            init.arguments_str = arguments_str(&init.arguments);
        }
    }

    /// Web forms submit every value as text; literal strings that read as an
    /// integer or a float become numbers.
    pub fn coerce_numeric_strings(&mut self) {
        for init in &mut self.proc_inits {
            for binding in &mut init.arguments {
                if let ArgumentSource::Literal(value) = &mut binding.source {
                    coerce_value(value);
                }
            }
        }
    }
}

fn coerce_value(value: &mut Value) {
    match value {
        Value::String(text) => {
            if let Some(number) = to_number(text) {
                *value = Value::Number(number);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(coerce_value),
        _ => {}
    }
}

pub fn to_number(text: &str) -> Option<Number> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(Number::from(value));
    }
    trimmed.parse::<f64>().ok().and_then(Number::from_f64)
}
