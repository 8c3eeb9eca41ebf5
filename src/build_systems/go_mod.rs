//! Go modules build system

use super::{noop_edit, BuildError, BuildSystem, ManifestPattern, Phase, PhaseContext, PhaseFn, TestCallback};
use crate::spec::{BuildSystemKind, ConditionalDependency, DepType, PackageSpec, Version, VersionRange};
use crate::test_status::TestStatus;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

/// Oldest Go toolchain with module support enabled by `GO111MODULE`.
const MIN_GO_VERSION: &str = "1.14";

pub struct GoModBuildSystem;

fn install(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    let mut args = vec!["install".to_string()];
    args.extend(ctx.args.install_args.iter().cloned());
    ctx.run_tool("go", args)?;
    Ok(())
}

fn check(ctx: &PhaseContext<'_>) -> Result<TestStatus, BuildError> {
    let mut args = vec!["test".to_string()];
    args.extend(ctx.args.test_args.iter().cloned());
    let output = ctx.probe_tool("go", args)?;
    Ok(TestStatus::from_run(
        output.success(),
        ran_any_tests(&output.stdout),
    ))
}

/// `go test` prints `ok`/`FAIL` per package with tests, `?` for packages
/// without test files, and a bare `PASS` for the current directory.
fn ran_any_tests(stdout: &str) -> bool {
    let re = Regex::new(r"(?m)^(ok\s|FAIL|PASS|--- )").expect("valid regex");
    re.is_match(stdout)
}

impl BuildSystem for GoModBuildSystem {
    fn id(&self) -> BuildSystemKind {
        BuildSystemKind::Go
    }

    fn manifest_patterns(&self) -> &[ManifestPattern] {
        &[ManifestPattern { filename: "go.mod" }]
    }

    fn tool(&self) -> &'static str {
        "go"
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
        let versions = Version::parse(MIN_GO_VERSION).ok().map(|lower| VersionRange {
            lower: Some(lower),
            upper: None,
        });
        // Extending Go makes it both a build and a run dependency.
        vec![ConditionalDependency::on_build_system(
            "go",
            versions,
            &[DepType::Build, DepType::Run],
            BuildSystemKind::Go,
        )]
    }

    fn build_environment(&self, _spec: &PackageSpec, prefix: &Path) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("GO111MODULE".to_string(), "on".to_string());
        env.insert("GOTOOLCHAIN".to_string(), "local".to_string());
        env.insert("GOBIN".to_string(), prefix.join("bin").display().to_string());
        env
    }
}
