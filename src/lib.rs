//! phasekit - phase-driven package builds with install-time tests and
//! mirror autopush
//!
//! A resolved [`PackageSpec`] selects one build system strategy from a
//! [`BuildSystemRegistry`]. The [`Installer`] runs that strategy's phases in
//! the package's build directory, records an install-time [`TestStatus`]
//! per test callback, and hands the finished install to post-install hooks
//! such as [`AutopushHook`].
//!
//! # Example
//!
//! ```no_run
//! use phasekit::{
//!     BuildSystemRegistry, InstallRequest, InstallSession, Installer, ProcessRunner,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let request = InstallRequest::load(Path::new("ripgrep.yaml"))?;
//! let installer = Installer::new(
//!     BuildSystemRegistry::with_defaults(),
//!     Arc::new(ProcessRunner::new()),
//!     "/opt/phasekit",
//! );
//!
//! let mut session = InstallSession::new();
//! let outcome = installer.install(&request, &mut session)?;
//! installer.finish(session, false)?;
//! println!("{} installed to {}", outcome.identity, outcome.prefix.display());
//! # Ok(())
//! # }
//! ```

pub mod build_systems;
pub mod cli;
pub mod config;
pub mod hooks;
pub mod mirror;
pub mod pipeline;
pub mod progress;
pub mod spec;
pub mod test_status;
pub mod tool;
pub mod util;

pub use build_systems::{BaseBuilder, BuildError, BuildSystem, BuildSystemRegistry, ConfigurationError, Phase};
pub use config::{ConfigError, PhasekitConfig};
pub use hooks::{AutopushHook, HookError, InstallHook, Provenance};
pub use mirror::{BuildCache, Mirror, MirrorCollection, PushError};
pub use pipeline::{InstallError, InstallOutcome, InstallRequest, InstallSession, Installer};
pub use spec::{BuildSystemKind, PackageSpec, SpecError, Version};
pub use test_status::TestStatus;
pub use tool::{ProcessRunner, ToolError, ToolRunner};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
