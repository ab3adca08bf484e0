#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Setup,
    Reset,
    Envs,
    EnvCreate,
    Procedures,
    Runs,
    Show,
    Log,
    Run,
    Serve,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "setup" => CliVerb::Setup,
        "reset" => CliVerb::Reset,
        "envs" => CliVerb::Envs,
        "env-create" => CliVerb::EnvCreate,
        "procedures" => CliVerb::Procedures,
        "runs" => CliVerb::Runs,
        "show" => CliVerb::Show,
        "log" => CliVerb::Log,
        "run" => CliVerb::Run,
        "serve" => CliVerb::Serve,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  setup                                Write default config and create the state root"
            .to_string(),
        "  reset <env>                          Wipe an environment's runs, cache and records"
            .to_string(),
        "  envs                                 List environments".to_string(),
        "  env-create <env>                     Create an environment (idempotent)".to_string(),
        "  procedures                           List registered procedures".to_string(),
        "  runs [--env E]                       List runs".to_string(),
        "  show <run_id> [--env E]              Show a run and its steps".to_string(),
        "  log <run_id> [--env E]               Print a run's log".to_string(),
        "  run <proc>[:k=v,...]... [--env E] [--description D]".to_string(),
        "                                       Execute procedures in order and wait".to_string(),
        "  serve                                Start the HTTP API, UI and run queue".to_string(),
        String::new(),
        "Arguments written `k=@file` read the cache entry `file`; `k=1|2|3` runs the".to_string(),
        "procedure once per value.".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}
