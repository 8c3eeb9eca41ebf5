use phasekit::cli::commands::{CliArgs, Commands};
use phasekit::cli::handlers::{handle_build_systems, handle_config, handle_install, handle_show};
use phasekit::util::logging::{self, parse_level, LoggingConfig};
use phasekit::{NAME, VERSION};

use clap::Parser;
use std::env;
use std::process;
use tracing::{debug, Level};

fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Install(install_args) => handle_install(install_args),
        Commands::BuildSystems(list_args) => handle_build_systems(list_args),
        Commands::Show(show_args) => handle_show(show_args),
        Commands::Config(config_args) => handle_config(config_args),
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        env::var(phasekit::config::ENV_LOG_LEVEL)
            .map(|s| parse_level(&s))
            .unwrap_or(Level::INFO)
    };

    logging::init_logging(LoggingConfig {
        level,
        use_json: logging::json_requested(),
        ..Default::default()
    });
}
