use crate::config::{load_global_settings, ConfigError, Settings};
use crate::executor::{to_number, ProcInit};
use crate::procedures::ProcedureRegistry;
use crate::store::{ArgumentBinding, RunRecord};
use crate::workbench::Workbench;
use serde_json::Value;

pub const CACHE_REFERENCE_PREFIX: char = '@';
pub const EXPANSION_SEPARATOR: char = '|';

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub fn load_settings() -> Result<Settings, String> {
    load_global_settings().map_err(map_config_err)
}

pub fn open_workbench(registry: ProcedureRegistry) -> Result<Workbench, String> {
    let settings = load_settings()?;
    Workbench::open(settings, registry).map_err(|e| e.to_string())
}

/// Positional arguments plus the `--env` and `--description` flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    pub positional: Vec<String>,
    pub environment: Option<String>,
    pub description: Option<String>,
}

pub fn parse_command_args(args: &[String]) -> Result<CommandArgs, String> {
    let mut parsed = CommandArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--env" => {
                let value = iter.next().ok_or("`--env` requires a value")?;
                parsed.environment = Some(value.clone());
            }
            "--description" => {
                let value = iter.next().ok_or("`--description` requires a value")?;
                parsed.description = Some(value.clone());
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown flag `{other}`"));
            }
            _ => parsed.positional.push(arg.clone()),
        }
    }
    Ok(parsed)
}

pub fn parse_run_id(raw: &str) -> Result<i64, String> {
    raw.parse::<i64>()
        .map_err(|_| format!("invalid run id `{raw}`"))
}

/// Parses `proc[:k=v,...]`. Values read as numbers when they can, `@file`
/// binds a cache entry and `a|b` becomes a list for expansion.
pub fn parse_step(token: &str) -> Result<ProcInit, String> {
    let (proc_name, rest) = match token.split_once(':') {
        Some((name, rest)) => (name, Some(rest)),
        None => (token, None),
    };
    if proc_name.trim().is_empty() {
        return Err(format!("missing procedure name in `{token}`"));
    }

    let mut arguments = Vec::new();
    for pair in rest.into_iter().flat_map(|rest| rest.split(',')) {
        if pair.trim().is_empty() {
            continue;
        }
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("argument `{pair}` of `{proc_name}` must be `name=value`"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("argument `{pair}` of `{proc_name}` has no name"));
        }
        let raw = raw.trim();
        let binding = match raw.strip_prefix(CACHE_REFERENCE_PREFIX) {
            Some(filename) => ArgumentBinding::from_cache(name, filename),
            None if raw.contains(EXPANSION_SEPARATOR) => ArgumentBinding::literal(
                name,
                Value::Array(raw.split(EXPANSION_SEPARATOR).map(literal).collect()),
            ),
            None => ArgumentBinding::literal(name, literal(raw)),
        };
        arguments.push(binding);
    }
    Ok(ProcInit::new(proc_name.trim(), arguments))
}

fn literal(raw: &str) -> Value {
    let raw = raw.trim();
    match to_number(raw) {
        Some(number) => Value::Number(number),
        None => Value::String(raw.to_string()),
    }
}

pub fn render_run(run: &RunRecord) -> String {
    let mut lines = vec![
        format!("run={}", run.id.map(|id| id.to_string()).unwrap_or_default()),
        format!("environment={}", run.environment_name),
        format!("status={}", run.status),
        format!("description={}", run.description),
        format!("started_at={}", optional_millis(run.timestamp_start)),
        format!("stopped_at={}", optional_millis(run.timestamp_stop)),
    ];
    if let Some(error) = &run.error {
        lines.push(format!("error={error}"));
    }
    for step in &run.steps {
        lines.push(format!(
            "step {} {}({}) -> {} [{} ms]",
            step.run_order,
            step.proc_name,
            step.arguments_str,
            step.result.display(),
            step.timestamp_stop - step.timestamp_start
        ));
    }
    lines.join("\n")
}

pub fn render_run_summary(run: &RunRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        run.id.map(|id| id.to_string()).unwrap_or_default(),
        run.status,
        run.steps.len(),
        run.description
    )
}

fn optional_millis(value: Option<i64>) -> String {
    value.map(|ms| ms.to_string()).unwrap_or_default()
}
