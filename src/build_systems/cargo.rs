//! Cargo build system (Rust)

use super::{noop_edit, BuildError, BuildSystem, ManifestPattern, Phase, PhaseContext, PhaseFn, TestCallback};
use crate::spec::{BuildSystemKind, ConditionalDependency, DepType};
use crate::test_status::TestStatus;
use regex::Regex;

pub struct CargoBuildSystem;

fn install(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    let mut args = vec![
        "install".to_string(),
        "--root".to_string(),
        ctx.prefix_arg(),
        "--path".to_string(),
        ".".to_string(),
    ];
    args.extend(ctx.args.install_args.iter().cloned());
    ctx.run_tool("cargo", args)?;
    Ok(())
}

fn check(ctx: &PhaseContext<'_>) -> Result<TestStatus, BuildError> {
    let mut args = vec!["test".to_string()];
    args.extend(ctx.args.test_args.iter().cloned());
    let output = ctx.probe_tool("cargo", args)?;
    Ok(TestStatus::from_run(
        output.success(),
        discovered_tests(&output.stdout) > 0,
    ))
}

/// Sums the `running N tests` headers libtest prints per test binary.
fn discovered_tests(stdout: &str) -> u64 {
    let re = Regex::new(r"(?m)^running (\d+) tests?$").expect("valid regex");
    re.captures_iter(stdout)
        .filter_map(|c| c[1].parse::<u64>().ok())
        .sum()
}

impl BuildSystem for CargoBuildSystem {
    fn id(&self) -> BuildSystemKind {
        BuildSystemKind::Cargo
    }

    fn manifest_patterns(&self) -> &[ManifestPattern] {
        &[ManifestPattern { filename: "Cargo.toml" }]
    }

    fn tool(&self) -> &'static str {
        "cargo"
    }

    fn phase_handler(&self, phase: Phase) -> Option<PhaseFn> {
        match phase {
            Phase::Edit => Some(noop_edit),
            Phase::Install => Some(install),
            _ => None,
        }
    }

    fn install_time_tests(&self) -> Vec<TestCallback> {
        vec![TestCallback {
            name: "check",
            run: check,
        }]
    }

    fn implicit_dependencies(&self) -> Vec<ConditionalDependency> {
        vec![ConditionalDependency::on_build_system(
            "rust",
            None,
            &[DepType::Build],
            BuildSystemKind::Cargo,
        )]
    }
}
