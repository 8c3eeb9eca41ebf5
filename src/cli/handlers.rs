//! Command handlers
//!
//! Each handler returns the process exit code: 0 on success, 1 on any
//! fatal error, 2 when every package installed but an install-time test
//! failed.

use super::commands::{BuildSystemsArgs, ConfigArgs, InstallArgs, ShowArgs};
use super::output::{BuildPlan, BuildSystemInfo, OutputFormatter};
use crate::build_systems::BuildSystemRegistry;
use crate::config::PhasekitConfig;
use crate::hooks::AutopushHook;
use crate::mirror::{DirectoryBuildCache, MirrorsFile};
use crate::pipeline::{InstallRequest, InstallSession, Installer};
use crate::progress::LoggingHandler;
use crate::tool::{absolutize, ProcessRunner};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_TESTS_FAILED: i32 = 2;

fn report(result: Result<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            EXIT_FAILURE
        }
    }
}

fn load_request(path: &Path) -> Result<InstallRequest> {
    InstallRequest::load(path)
        .with_context(|| format!("Failed to load request {}", path.display()))
}

pub fn handle_install(args: &InstallArgs) -> i32 {
    report(run_install(args))
}

fn run_install(args: &InstallArgs) -> Result<i32> {
    let defaults = PhasekitConfig::default();
    let config = PhasekitConfig {
        install_root: args.install_root.clone().unwrap_or(defaults.install_root),
        mirrors_file: args.mirrors.clone().or(defaults.mirrors_file),
        run_tests: !args.no_tests && defaults.run_tests,
        update_index: args.update_index || defaults.update_index,
        ..defaults
    };
    config.validate().context("Configuration error")?;
    debug!(config = ?config, "effective configuration");

    let requests = args
        .requests
        .iter()
        .map(|path| load_request(path))
        .collect::<Result<Vec<_>>>()?;

    let mut installer = Installer::new(
        BuildSystemRegistry::with_defaults(),
        Arc::new(ProcessRunner::new()),
        &config.install_root,
    )
    .with_progress(Box::new(LoggingHandler))
    .with_run_tests(config.run_tests);

    if let Some(mirrors_file) = &config.mirrors_file {
        info!(mirrors = %mirrors_file.display(), "autopush enabled");
        installer = installer.with_hook(Box::new(AutopushHook::new(
            Arc::new(MirrorsFile::new(mirrors_file)),
            Arc::new(DirectoryBuildCache::new()),
        )));
    }

    let mut session = InstallSession::new();
    let mut outcomes = Vec::with_capacity(requests.len());
    for request in &requests {
        let outcome = installer
            .install(request, &mut session)
            .with_context(|| format!("Failed to install {}", request.spec))?;
        outcomes.push(outcome);
    }
    installer
        .finish(session, config.update_index)
        .context("Failed to finish install session")?;

    let formatter = OutputFormatter::new(args.format.into());
    println!("{}", formatter.format_outcomes(&outcomes)?);

    if outcomes.iter().any(|o| o.tests_failed()) {
        Ok(EXIT_TESTS_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

pub fn handle_build_systems(args: &BuildSystemsArgs) -> i32 {
    report(run_build_systems(args))
}

fn run_build_systems(args: &BuildSystemsArgs) -> Result<i32> {
    let registry = BuildSystemRegistry::with_defaults();
    let systems: Vec<BuildSystemInfo> = registry.systems().map(BuildSystemInfo::describe).collect();
    let formatter = OutputFormatter::new(args.format.into());
    println!("{}", formatter.format_build_systems(&systems)?);
    Ok(EXIT_SUCCESS)
}

pub fn handle_show(args: &ShowArgs) -> i32 {
    report(run_show(args))
}

fn run_show(args: &ShowArgs) -> Result<i32> {
    let request = load_request(&args.request)?;
    let registry = BuildSystemRegistry::with_defaults();
    let system = registry
        .select(&request.spec)
        .with_context(|| format!("No builder for {}", request.spec))?;

    let install_root = args
        .install_root
        .clone()
        .unwrap_or_else(|| PhasekitConfig::default().install_root);
    let prefix = absolutize(&install_root).join(request.spec.prefix_dir_name());
    let plan = BuildPlan::new(&request.spec, system, request.source.clone(), prefix);

    let formatter = OutputFormatter::new(args.format.into());
    println!("{}", formatter.format_plan(&plan)?);
    Ok(EXIT_SUCCESS)
}

pub fn handle_config(args: &ConfigArgs) -> i32 {
    report(run_config(args))
}

fn run_config(args: &ConfigArgs) -> Result<i32> {
    let config = PhasekitConfig::from_env().context("Configuration error")?;
    let formatter = OutputFormatter::new(args.format.into());
    println!("{}", formatter.format_config(&config)?);
    Ok(EXIT_SUCCESS)
}
