use crate::app::command_support::{
    open_workbench, parse_command_args, parse_run_id, parse_step, render_run, render_run_summary,
};
use crate::executor::RunSpec;
use crate::procedures::ProcedureRegistry;

pub fn cmd_procedures(registry: &ProcedureRegistry) -> Result<String, String> {
    let mut lines = Vec::new();
    for name in registry.names() {
        let def = registry.get(name).map_err(|e| e.to_string())?;
        let params = def
            .params()
            .iter()
            .map(|param| match &param.default {
                Some(default) => format!("{}={default}", param.name),
                None => param.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let mut line = format!("{name}({params})");
        if !def.cache_output_names().is_empty() {
            line.push_str(&format!(" -> {}", def.cache_output_names().join(", ")));
        }
        if !def.description().is_empty() {
            line.push_str(&format!("  # {}", def.description()));
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

pub fn cmd_runs(args: &[String], registry: ProcedureRegistry) -> Result<String, String> {
    let parsed = parse_command_args(args)?;
    if !parsed.positional.is_empty() {
        return Err("usage: runs [--env E]".to_string());
    }
    let workbench = open_workbench(registry)?;
    let runs = workbench
        .list_runs(parsed.environment.as_deref())
        .map_err(|e| e.to_string())?;
    Ok(runs
        .iter()
        .map(render_run_summary)
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn cmd_show(args: &[String], registry: ProcedureRegistry) -> Result<String, String> {
    let parsed = parse_command_args(args)?;
    if parsed.positional.len() != 1 {
        return Err("usage: show <run_id> [--env E]".to_string());
    }
    let run_id = parse_run_id(&parsed.positional[0])?;
    let workbench = open_workbench(registry)?;
    let run = workbench
        .get_run(parsed.environment.as_deref(), run_id)
        .map_err(|e| e.to_string())?;
    Ok(render_run(&run))
}

pub fn cmd_log(args: &[String], registry: ProcedureRegistry) -> Result<String, String> {
    let parsed = parse_command_args(args)?;
    if parsed.positional.len() != 1 {
        return Err("usage: log <run_id> [--env E]".to_string());
    }
    let run_id = parse_run_id(&parsed.positional[0])?;
    let workbench = open_workbench(registry)?;
    workbench
        .read_log(parsed.environment.as_deref(), run_id)
        .map_err(|e| e.to_string())
}

/// Builds a run from `proc[:k=v,...]` tokens and executes it in-process.
pub fn cmd_run(args: &[String], registry: ProcedureRegistry) -> Result<String, String> {
    let parsed = parse_command_args(args)?;
    if parsed.positional.is_empty() {
        return Err("usage: run <proc>[:k=v,...]... [--env E] [--description D]".to_string());
    }
    let steps = parsed
        .positional
        .iter()
        .map(|token| parse_step(token))
        .collect::<Result<Vec<_>, _>>()?;
    let description = parsed.description.clone().unwrap_or_else(|| {
        steps
            .iter()
            .map(|step| step.proc_name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    });
    let mut spec = RunSpec::new(description);
    spec.environment_name = parsed.environment.clone();
    spec.proc_inits = steps;
    let spec = spec.expand_steps().map_err(|e| e.to_string())?;

    let workbench = open_workbench(registry)?;
    match workbench.run(spec) {
        Ok(run) => Ok(render_run(&run)),
        Err(err) => match err.failed_run_id() {
            Some(run_id) => {
                let run = workbench
                    .get_run(parsed.environment.as_deref(), run_id)
                    .map_err(|e| e.to_string())?;
                Err(format!("{err}\n{}", render_run(&run)))
            }
            None => Err(err.to_string()),
        },
    }
}
