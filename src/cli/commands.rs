use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Phase-driven package builder with install-time tests and mirror autopush
#[derive(Parser, Debug)]
#[command(
    name = "phasekit",
    about = "Phase-driven package builder with install-time tests and mirror autopush",
    version,
    long_about = "phasekit builds staged package sources with the build system their spec \
                  selects (cargo, go, cmake, autotools, makefile), runs install-time tests, \
                  and pushes locally built packages to autopush mirrors."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Build and install packages from request files",
        long_about = "Builds each request in order within one install session, runs \
                      install-time tests, and dispatches post-install hooks. Exits 2 when \
                      every package installed but some install-time test failed.\n\n\
                      Examples:\n  \
                      phasekit install ripgrep.yaml\n  \
                      phasekit install zlib.toml hub.yaml --mirrors mirrors.yaml --update-index\n  \
                      phasekit install hub.yaml --no-tests --format json"
    )]
    Install(InstallArgs),

    #[command(about = "List registered build systems and their phases")]
    BuildSystems(BuildSystemsArgs),

    #[command(
        about = "Show how a request would be built, without building it",
        long_about = "Prints the selected build system, its phases, the build directory, \
                      toolchain dependencies and the install prefix for a request file.\n\n\
                      Examples:\n  \
                      phasekit show hub.yaml\n  \
                      phasekit show hub.yaml --format yaml"
    )]
    Show(ShowArgs),

    #[command(about = "Print the effective configuration")]
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct InstallArgs {
    #[arg(
        value_name = "REQUEST",
        required = true,
        help = "Request files (YAML, TOML or JSON) naming a spec and its staged sources"
    )]
    pub requests: Vec<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Directory install prefixes are created under")]
    pub install_root: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Mirror definitions used for autopush")]
    pub mirrors: Option<PathBuf>,

    #[arg(long, help = "Record install-time tests as skipped instead of running them")]
    pub no_tests: bool,

    #[arg(long, help = "Regenerate the index of every mirror pushed to")]
    pub update_index: bool,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct BuildSystemsArgs {
    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ShowArgs {
    #[arg(value_name = "REQUEST", help = "Request file to inspect")]
    pub request: PathBuf,

    #[arg(long, value_name = "DIR", help = "Directory install prefixes are created under")]
    pub install_root: Option<PathBuf>,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
