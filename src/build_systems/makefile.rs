//! Plain Makefile build system

use super::{noop_edit, BuildError, BuildSystem, ManifestPattern, Phase, PhaseContext, PhaseFn, TestCallback};
use crate::spec::{BuildSystemKind, ConditionalDependency, DepType};
use crate::test_status::TestStatus;
use tracing::debug;

pub struct MakefileBuildSystem;

const MISSING_TARGET_MARKERS: &[&str] = &["No rule to make target", "don't know how to make"];

fn build(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    ctx.run_tool("make", ctx.args.build_args.iter().cloned())?;
    Ok(())
}

fn install(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    let mut args = vec![format!("PREFIX={}", ctx.prefix_arg()), "install".to_string()];
    args.extend(ctx.args.install_args.iter().cloned());
    ctx.run_tool("make", args)?;
    Ok(())
}

fn check(ctx: &PhaseContext<'_>) -> Result<TestStatus, BuildError> {
    for target in ["check", "test"] {
        if has_make_target(ctx, target)? {
            return run_make_target(ctx, target);
        }
    }
    Ok(TestStatus::NoTests)
}

/// Dry-runs `make <target>` to learn whether the target exists.
pub(crate) fn has_make_target(ctx: &PhaseContext<'_>, target: &str) -> Result<bool, BuildError> {
    let output = ctx.probe_tool("make", ["-n", target])?;
    if output.success() {
        return Ok(true);
    }
    let missing = MISSING_TARGET_MARKERS
        .iter()
        .any(|marker| output.stderr.contains(marker));
    if missing {
        debug!(package = %ctx.spec.name, make_target = %target, "make target not present");
    }
    Ok(!missing)
}

/// Runs `make <target>` with the package's test arguments.
pub(crate) fn run_make_target(ctx: &PhaseContext<'_>, target: &str) -> Result<TestStatus, BuildError> {
    let mut args = vec![target.to_string()];
    args.extend(ctx.args.test_args.iter().cloned());
    let output = ctx.probe_tool("make", args)?;
    Ok(TestStatus::from_run(output.success(), true))
}

/// Runs `make <target>` only when the Makefile defines it.
pub(crate) fn make_target_if_present(ctx: &PhaseContext<'_>, target: &str) -> Result<TestStatus, BuildError> {
    if has_make_target(ctx, target)? {
        run_make_target(ctx, target)
    } else {
        Ok(TestStatus::NoTests)
    }
}

impl BuildSystem for MakefileBuildSystem {
    fn id(&self) -> BuildSystemKind {
        BuildSystemKind::Makefile
    }

    fn manifest_patterns(&self) -> &[ManifestPattern] {
        &[
            ManifestPattern { filename: "Makefile" },
            ManifestPattern { filename: "GNUmakefile" },
            ManifestPattern { filename: "makefile" },
        ]
    }

    fn tool(&self) -> &'static str {
        "make"
    }

    fn phases(&self) -> &[Phase] {
        &[Phase::Edit, Phase::Build, Phase::Install]
    }

    fn phase_handler(&self, phase: Phase) -> Option<PhaseFn> {
        match phase {
            Phase::Edit => Some(noop_edit),
            Phase::Build => Some(build),
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
            "gmake",
            None,
            &[DepType::Build],
            BuildSystemKind::Makefile,
        )]
    }
}
