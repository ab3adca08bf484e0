use crate::app::cli::{help_text, parse_cli_verb, CliVerb};
use crate::procedures::ProcedureRegistry;

pub mod environments;
pub mod runs;
pub mod serve;

/// Dispatches one CLI invocation against the given procedures.
pub fn run_cli(args: Vec<String>, registry: ProcedureRegistry) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Setup => environments::cmd_setup(registry),
        CliVerb::Reset => environments::cmd_reset(&args[1..], registry),
        CliVerb::Envs => environments::cmd_envs(registry),
        CliVerb::EnvCreate => environments::cmd_env_create(&args[1..], registry),
        CliVerb::Procedures => runs::cmd_procedures(&registry),
        CliVerb::Runs => runs::cmd_runs(&args[1..], registry),
        CliVerb::Show => runs::cmd_show(&args[1..], registry),
        CliVerb::Log => runs::cmd_log(&args[1..], registry),
        CliVerb::Run => runs::cmd_run(&args[1..], registry),
        CliVerb::Serve => serve::cmd_serve(registry),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}
