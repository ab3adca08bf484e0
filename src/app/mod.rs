pub mod cli;
pub mod command_handlers;
pub mod command_support;
pub mod demo_procedures;

pub use command_handlers::run_cli;
pub use demo_procedures::demo_registry;
