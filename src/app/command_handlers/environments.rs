use crate::app::command_support::{load_settings, open_workbench};
use crate::config::{default_global_config_path, save_settings};
use crate::procedures::ProcedureRegistry;

pub fn cmd_setup(registry: ProcedureRegistry) -> Result<String, String> {
    let config_path = default_global_config_path().map_err(|e| e.to_string())?;
    let settings = load_settings()?;
    let wrote_config = if config_path.exists() {
        false
    } else {
        save_settings(&settings).map_err(|e| e.to_string())?;
        true
    };
    let workbench = open_workbench(registry)?;
    Ok(format!(
        "setup complete\nconfig={}\nconfig_written={}\nstate_root={}\ndefault_environment={}",
        config_path.display(),
        wrote_config,
        workbench.settings().state_root.display(),
        workbench.settings().default_environment
    ))
}

pub fn cmd_reset(args: &[String], registry: ProcedureRegistry) -> Result<String, String> {
    if args.len() != 1 {
        return Err("usage: reset <env>".to_string());
    }
    let workbench = open_workbench(registry)?;
    let name = workbench
        .reset_environment(&args[0])
        .map_err(|e| e.to_string())?;
    Ok(format!("environment reset\nenvironment={name}"))
}

pub fn cmd_envs(registry: ProcedureRegistry) -> Result<String, String> {
    let workbench = open_workbench(registry)?;
    let names = workbench.list_environments().map_err(|e| e.to_string())?;
    Ok(names.join("\n"))
}

pub fn cmd_env_create(args: &[String], registry: ProcedureRegistry) -> Result<String, String> {
    if args.len() != 1 {
        return Err("usage: env-create <env>".to_string());
    }
    let workbench = open_workbench(registry)?;
    let (name, created) = workbench
        .create_environment(&args[0])
        .map_err(|e| e.to_string())?;
    Ok(format!("environment={name}\ncreated={created}"))
}
