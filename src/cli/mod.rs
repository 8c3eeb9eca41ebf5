pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{BuildSystemsArgs, CliArgs, Commands, ConfigArgs, InstallArgs, ShowArgs};
pub use output::{OutputFormat, OutputFormatter};
