//! GNU autotools build system

use super::makefile::make_target_if_present;
use super::{BuildError, BuildSystem, ManifestPattern, Phase, PhaseContext, PhaseFn, TestCallback};
use crate::spec::{BuildSystemKind, ConditionalDependency, DepType};
use crate::test_status::TestStatus;
use tracing::debug;

pub struct AutotoolsBuildSystem;

fn autoreconf(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    if ctx.source_root.join("configure").is_file() {
        debug!(package = %ctx.spec.name, "configure script present, skipping autoreconf");
        return Ok(());
    }
    ctx.run_tool("autoreconf", ["--install", "--verbose", "--force"])?;
    Ok(())
}

fn configure(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    let mut args = vec![format!("--prefix={}", ctx.prefix_arg())];
    args.extend(ctx.args.configure_args.iter().cloned());
    ctx.run_script(&ctx.source_root.join("configure"), args)?;
    Ok(())
}

fn build(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    ctx.run_tool("make", ctx.args.build_args.iter().cloned())?;
    Ok(())
}

fn install(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
    let mut args = vec!["install".to_string()];
    args.extend(ctx.args.install_args.iter().cloned());
    ctx.run_tool("make", args)?;
    Ok(())
}

fn check(ctx: &PhaseContext<'_>) -> Result<TestStatus, BuildError> {
    make_target_if_present(ctx, "check")
}

fn installcheck(ctx: &PhaseContext<'_>) -> Result<TestStatus, BuildError> {
    make_target_if_present(ctx, "installcheck")
}

impl BuildSystem for AutotoolsBuildSystem {
    fn id(&self) -> BuildSystemKind {
        BuildSystemKind::Autotools
    }

    fn manifest_patterns(&self) -> &[ManifestPattern] {
        &[
            ManifestPattern { filename: "configure.ac" },
            ManifestPattern { filename: "configure" },
            ManifestPattern { filename: "configure.in" },
        ]
    }

    fn tool(&self) -> &'static str {
        "make"
    }

    fn phases(&self) -> &[Phase] {
        &[Phase::Autoreconf, Phase::Configure, Phase::Build, Phase::Install]
    }

    fn phase_handler(&self, phase: Phase) -> Option<PhaseFn> {
        match phase {
            Phase::Autoreconf => Some(autoreconf),
            Phase::Configure => Some(configure),
            Phase::Build => Some(build),
            Phase::Install => Some(install),
            _ => None,
        }
    }

    fn install_time_tests(&self) -> Vec<TestCallback> {
        vec![
            TestCallback {
                name: "check",
                run: check,
            },
            TestCallback {
                name: "installcheck",
                run: installcheck,
            },
        ]
    }

    fn implicit_dependencies(&self) -> Vec<ConditionalDependency> {
        ["gmake", "autoconf", "automake", "libtool", "m4"]
            .into_iter()
            .map(|tool| {
                ConditionalDependency::on_build_system(
                    tool,
                    None,
                    &[DepType::Build],
                    BuildSystemKind::Autotools,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_systems::{BaseBuilder, BuildArgs};
    use crate::spec::{PackageSpec, Version};
    use crate::tool::{MockToolRunner, ToolError, ToolOutput};
    use serial_test::serial;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn libiconv() -> PackageSpec {
        PackageSpec::new("libiconv", Version::parse("1.17").unwrap(), BuildSystemKind::Autotools)
    }

    fn success() -> ToolOutput {
        ToolOutput {
            code: Some(0),
            ..Default::default()
        }
    }

    #[test]
    #[serial]
    fn test_autoreconf_skipped_when_configure_exists() {
        let spec = libiconv();
        let src = TempDir::new().unwrap();
        std::fs::write(src.path().join("configure"), "#!/bin/sh\n").unwrap();
        let builder = BaseBuilder::new(&AutotoolsBuildSystem, &spec, src.path(), Path::new("/opt/libiconv"), BuildArgs::default()).unwrap();

        let mut runner = MockToolRunner::new();
        runner.expect_resolve().never();
        runner.expect_run().never();

        builder.run_phase(Phase::Autoreconf, &runner).unwrap();
    }

    #[test]
    #[serial]
    fn test_autoreconf_runs_without_configure() {
        let spec = libiconv();
        let src = TempDir::new().unwrap();
        std::fs::write(src.path().join("configure.ac"), "AC_INIT\n").unwrap();
        let builder = BaseBuilder::new(&AutotoolsBuildSystem, &spec, src.path(), Path::new("/opt/libiconv"), BuildArgs::default()).unwrap();

        let mut runner = MockToolRunner::new();
        runner
            .expect_resolve()
            .withf(|tool, _| tool == "autoreconf")
            .returning(|_, _| Some(PathBuf::from("/usr/bin/autoreconf")));
        runner
            .expect_run()
            .withf(|inv| inv.args == ["--install", "--verbose", "--force"])
            .times(1)
            .returning(|_| Ok(success()));

        builder.run_phase(Phase::Autoreconf, &runner).unwrap();
    }

    #[test]
    #[serial]
    fn test_configure_passes_prefix_and_args() {
        let spec = libiconv();
        let src = TempDir::new().unwrap();
        std::fs::write(src.path().join("configure"), "#!/bin/sh\n").unwrap();
        let args = BuildArgs {
            configure_args: vec!["--enable-static".to_string()],
            ..Default::default()
        };
        let builder = BaseBuilder::new(&AutotoolsBuildSystem, &spec, src.path(), Path::new("/opt/libiconv"), args).unwrap();

        let script = src.path().join("configure");
        let mut runner = MockToolRunner::new();
        runner
            .expect_run()
            .withf(move |inv| {
                inv.program == script && inv.args == ["--prefix=/opt/libiconv", "--enable-static"]
            })
            .times(1)
            .returning(|_| Ok(success()));

        builder.run_phase(Phase::Configure, &runner).unwrap();
    }

    #[test]
    #[serial]
    fn test_configure_missing_script_is_not_found() {
        let spec = libiconv();
        let src = TempDir::new().unwrap();
        let builder = BaseBuilder::new(&AutotoolsBuildSystem, &spec, src.path(), Path::new("/opt/libiconv"), BuildArgs::default()).unwrap();

        let err = builder.run_phase(Phase::Configure, &MockToolRunner::new()).unwrap_err();
        assert!(matches!(err.tool_error(), Some(ToolError::NotFound { .. })));
    }

    #[test]
    #[serial]
    fn test_both_checks_run_even_if_first_fails() {
        let spec = libiconv();
        let src = TempDir::new().unwrap();
        let builder = BaseBuilder::new(&AutotoolsBuildSystem, &spec, src.path(), Path::new("/opt/libiconv"), BuildArgs::default()).unwrap();

        let mut runner = MockToolRunner::new();
        runner
            .expect_resolve()
            .returning(|_, _| Some(PathBuf::from("/usr/bin/make")));
        runner
            .expect_run()
            .withf(|inv| inv.args[0] == "-n")
            .returning(|_| Ok(success()));
        runner
            .expect_run()
            .withf(|inv| inv.args == ["check"])
            .returning(|_| {
                Ok(ToolOutput {
                    code: Some(2),
                    ..Default::default()
                })
            });
        runner
            .expect_run()
            .withf(|inv| inv.args == ["installcheck"])
            .returning(|_| Ok(success()));

        let results = builder.run_install_time_tests(&runner);
        assert_eq!(
            results,
            vec![
                ("check".to_string(), TestStatus::Failed),
                ("installcheck".to_string(), TestStatus::Passed),
            ]
        );
    }
}
