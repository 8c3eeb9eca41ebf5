//! CMake build system

use super::{BuildError, BuildSystem, ManifestPattern, Phase, PhaseContext, PhaseFn, TestCallback};
use crate::spec::{BuildSystemKind, ConditionalDependency, DepType, VariantValue};
use crate::test_status::TestStatus;
use std::path::{Path, PathBuf};

/// Out-of-source build directory, relative to the staged sources.
pub const BUILD_DIR_NAME: &str = "phasekit-build";

const DEFAULT_BUILD_TYPE: &str = "Release";

pub struct CMakeBuildSystem;

fn build_type(ctx: &PhaseContext<'_>) -> String {
    match ctx.spec.variant("build_type") {
        Some(VariantValue::Value(v)) => v.clone(),
        _ => DEFAULT_BUILD_TYPE.to_string(),
    }
}

fn cmake(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    let mut args = vec![
        ctx.source_root.display().to_string(),
        format!("-DCMAKE_INSTALL_PREFIX:PATH={}", ctx.prefix_arg()),
        format!("-DCMAKE_BUILD_TYPE:STRING={}", build_type(ctx)),
    ];
    args.extend(ctx.args.configure_args.iter().cloned());
    ctx.run_tool("cmake", args)?;
    Ok(())
}

fn build(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    let mut args = vec!["--build".to_string(), ".".to_string()];
    args.extend(ctx.args.build_args.iter().cloned());
    ctx.run_tool("cmake", args)?;
    Ok(())
}

fn install(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    let mut args = vec![
        "--build".to_string(),
        ".".to_string(),
        "--target".to_string(),
        "install".to_string(),
    ];
    args.extend(ctx.args.install_args.iter().cloned());
    ctx.run_tool("cmake", args)?;
    Ok(())
}

fn ctest(ctx: &PhaseContext<'_>) -> Result<TestStatus, BuildError> {
    let mut args = vec!["--output-on-failure".to_string()];
    args.extend(ctx.args.test_args.iter().cloned());
    let output = ctx.probe_tool("ctest", args)?;
    let combined = format!("{}{}", output.stdout, output.stderr);
    if combined.contains("No tests were found") {
        return Ok(TestStatus::NoTests);
    }
    Ok(TestStatus::from_run(output.success(), true))
}

impl BuildSystem for CMakeBuildSystem {
    fn id(&self) -> BuildSystemKind {
        BuildSystemKind::CMake
    }

    fn manifest_patterns(&self) -> &[ManifestPattern] {
        &[ManifestPattern { filename: "CMakeLists.txt" }]
    }

    fn tool(&self) -> &'static str {
        "cmake"
    }

    fn phases(&self) -> &[Phase] {
        &[Phase::Cmake, Phase::Build, Phase::Install]
    }

    fn phase_handler(&self, phase: Phase) -> Option<PhaseFn> {
        match phase {
            Phase::Cmake => Some(cmake),
            Phase::Build => Some(build),
            Phase::Install => Some(install),
            _ => None,
        }
    }

    fn install_time_tests(&self) -> Vec<TestCallback> {
        vec![TestCallback {
            name: "ctest",
            run: ctest,
        }]
    }

    fn implicit_dependencies(&self) -> Vec<ConditionalDependency> {
        vec![ConditionalDependency::on_build_system(
            "cmake",
            None,
            &[DepType::Build],
            BuildSystemKind::CMake,
        )]
    }

    fn build_directory(&self, source_root: &Path) -> PathBuf {
        source_root.join(BUILD_DIR_NAME)
    }
}
