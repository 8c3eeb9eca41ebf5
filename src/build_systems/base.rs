//! Per-package builder scaffolding shared by every build system
//!
//! A [`BaseBuilder`] binds one strategy to one [`PackageSpec`]. It resolves
//! phase handlers up front, scopes every phase and test callback to the
//! build directory, and turns test callback failures into recorded
//! statuses instead of errors.

use super::{BuildArgs, BuildError, BuildSystem, ConfigurationError, Phase, PhaseFn, TestCallback};
use crate::spec::PackageSpec;
use crate::test_status::TestStatus;
use crate::tool::{
    absolutize, render_command_line, ToolError, ToolInvocation, ToolOutput, ToolRunner,
    WorkingDirGuard,
};
use crate::util::render_chain;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything a phase handler or test callback may touch.
pub struct PhaseContext<'a> {
    pub spec: &'a PackageSpec,
    pub prefix: &'a Path,
    pub source_root: &'a Path,
    pub build_directory: &'a Path,
    pub args: &'a BuildArgs,
    pub env: &'a BTreeMap<String, String>,
    pub tool_dirs: &'a [PathBuf],
    pub runner: &'a dyn ToolRunner,
}

impl<'a> PhaseContext<'a> {
    pub fn prefix_arg(&self) -> String {
        self.prefix.display().to_string()
    }

    /// Resolves `tool` and builds an invocation in the build directory.
    pub fn invocation<I, S>(&self, tool: &str, args: I) -> Result<ToolInvocation, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let program = self
            .runner
            .resolve(tool, self.tool_dirs)
            .ok_or_else(|| ToolError::NotFound {
                tool: tool.to_string(),
                command: render_command_line(tool, &args),
            })?;

        Ok(ToolInvocation::new(program, self.build_directory)
            .args(args)
            .envs(self.env))
    }

    /// Runs `tool`, failing on a non-zero exit.
    pub fn run_tool<I, S>(&self, tool: &str, args: I) -> Result<ToolOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = self.invocation(tool, args)?;
        let command_line = invocation.command_line();
        info!(package = %self.spec.name, command = %command_line, "running");
        self.runner.run(&invocation)?.check(&command_line)
    }

    /// Runs an executable shipped with the sources, such as `./configure`.
    pub fn run_script<I, S>(&self, script: &Path, args: I) -> Result<ToolOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if !script.is_file() {
            return Err(ToolError::NotFound {
                tool: script.display().to_string(),
                command: render_command_line(&script.display().to_string(), &args),
            });
        }
        let invocation = ToolInvocation::new(script, self.build_directory)
            .args(args)
            .envs(self.env);
        let command_line = invocation.command_line();
        info!(package = %self.spec.name, command = %command_line, "running");
        self.runner.run(&invocation)?.check(&command_line)
    }

    /// Runs `tool` and returns its output whatever the exit status.
    pub fn probe_tool<I, S>(&self, tool: &str, args: I) -> Result<ToolOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = self.invocation(tool, args)?;
        info!(package = %self.spec.name, command = %invocation.command_line(), "running");
        self.runner.run(&invocation)
    }
}

pub struct BaseBuilder<'a> {
    system: &'a dyn BuildSystem,
    spec: &'a PackageSpec,
    source_root: PathBuf,
    build_directory: PathBuf,
    prefix: PathBuf,
    args: BuildArgs,
    env: BTreeMap<String, String>,
    tool_dirs: Vec<PathBuf>,
    phases: Vec<(Phase, PhaseFn)>,
    test_callbacks: Vec<TestCallback>,
}

impl<'a> BaseBuilder<'a> {
    pub fn new(
        system: &'a dyn BuildSystem,
        spec: &'a PackageSpec,
        source_root: &Path,
        prefix: &Path,
        args: BuildArgs,
    ) -> Result<Self, ConfigurationError> {
        if spec.build_system != system.id() {
            return Err(ConfigurationError::NoBuilder {
                kind: spec.build_system,
            });
        }
        // Phases run inside the build directory.
        let source_root = &absolutize(source_root);
        let prefix = &absolutize(prefix);
        if !source_root.is_dir() {
            return Err(ConfigurationError::MissingBuildDirectory {
                path: source_root.to_path_buf(),
            });
        }
        if !system.has_manifest(source_root) {
            warn!(
                package = %spec.name,
                build_system = %system.id(),
                path = %source_root.display(),
                "source tree has no recognised manifest"
            );
        }

        let phases = system
            .phases()
            .iter()
            .map(|&phase| {
                system
                    .phase_handler(phase)
                    .map(|handler| (phase, handler))
                    .ok_or(ConfigurationError::MissingPhase {
                        kind: system.id(),
                        phase,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let tool_dirs = tool_search_dirs(system, spec);
        let mut env = system.build_environment(spec, prefix);
        if let Some(path) = prepend_path(&tool_dirs) {
            env.entry("PATH".to_string()).or_insert(path);
        }

        Ok(Self {
            system,
            spec,
            source_root: source_root.to_path_buf(),
            build_directory: system.build_directory(source_root),
            prefix: prefix.to_path_buf(),
            args,
            env,
            tool_dirs,
            phases,
            test_callbacks: system.install_time_tests(),
        })
    }

    /// Replaces the handler of a phase this builder already runs.
    pub fn with_override(mut self, phase: Phase, handler: PhaseFn) -> Result<Self, ConfigurationError> {
        let slot = self
            .phases
            .iter_mut()
            .find(|(p, _)| *p == phase)
            .ok_or(ConfigurationError::UnexpectedOverride {
                kind: self.system.id(),
                phase,
            })?;
        slot.1 = handler;
        Ok(self)
    }

    pub fn system(&self) -> &dyn BuildSystem {
        self.system
    }

    pub fn spec(&self) -> &PackageSpec {
        self.spec
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.phases.iter().map(|(phase, _)| *phase).collect()
    }

    pub fn test_callbacks(&self) -> &[TestCallback] {
        &self.test_callbacks
    }

    pub fn build_directory(&self) -> &Path {
        &self.build_directory
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn tool_dirs(&self) -> &[PathBuf] {
        &self.tool_dirs
    }

    fn context<'c>(&'c self, runner: &'c dyn ToolRunner) -> PhaseContext<'c> {
        PhaseContext {
            spec: self.spec,
            prefix: &self.prefix,
            source_root: &self.source_root,
            build_directory: &self.build_directory,
            args: &self.args,
            env: &self.env,
            tool_dirs: &self.tool_dirs,
            runner,
        }
    }

    /// Runs `f` with the process working directory set to the build directory.
    fn scoped<T>(
        &self,
        runner: &dyn ToolRunner,
        f: impl FnOnce(&PhaseContext<'_>) -> Result<T, BuildError>,
    ) -> Result<T, BuildError> {
        std::fs::create_dir_all(&self.build_directory)?;
        let _guard = WorkingDirGuard::enter(&self.build_directory).map_err(|source| {
            BuildError::WorkingDirectory {
                path: self.build_directory.clone(),
                source,
            }
        })?;
        f(&self.context(runner))
    }

    /// Runs one declared phase.
    pub fn run_phase(&self, phase: Phase, runner: &dyn ToolRunner) -> Result<(), BuildError> {
        let handler = self
            .phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, handler)| *handler)
            .ok_or(ConfigurationError::MissingPhase {
                kind: self.system.id(),
                phase,
            })?;

        debug!(package = %self.spec.name, phase = %phase, dir = %self.build_directory.display(), "entering phase");
        self.scoped(runner, handler).map_err(|e| BuildError::PhaseFailed {
            package: format!("{}@{}", self.spec.name, self.spec.version),
            phase,
            source: Box::new(e),
        })
    }

    /// Runs a single install-time test callback.
    ///
    /// Errors become `Failed`; they never propagate.
    pub fn run_test_callback(&self, callback: &TestCallback, runner: &dyn ToolRunner) -> TestStatus {
        match self.scoped(runner, callback.run) {
            Ok(status) => status,
            Err(e) => {
                warn!(
                    package = %self.spec.name,
                    callback = callback.name,
                    error = %render_chain(&e),
                    "install-time test failed"
                );
                TestStatus::Failed
            }
        }
    }

    /// Runs every install-time test callback in order.
    pub fn run_install_time_tests(&self, runner: &dyn ToolRunner) -> Vec<(String, TestStatus)> {
        self.test_callbacks
            .iter()
            .map(|callback| {
                (
                    callback.name.to_string(),
                    self.run_test_callback(callback, runner),
                )
            })
            .collect()
    }
}

/// Binary directories searched for tools, toolchain dependencies first.
fn tool_search_dirs(system: &dyn BuildSystem, spec: &PackageSpec) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = system
        .implicit_dependencies()
        .iter()
        .filter(|dep| dep.is_active(spec))
        .filter_map(|dep| spec.dependency(dep.name()))
        .filter_map(|dep| dep.bin_dir())
        .collect();

    for dep in &spec.dependencies {
        if let Some(bin) = dep.bin_dir() {
            if !dirs.contains(&bin) {
                dirs.push(bin);
            }
        }
    }
    dirs
}

fn prepend_path(dirs: &[PathBuf]) -> Option<String> {
    if dirs.is_empty() {
        return None;
    }
    let mut paths: Vec<PathBuf> = dirs.to_vec();
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths)
        .ok()
        .map(|joined| joined.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_systems::{noop_edit, ManifestPattern};
    use crate::spec::{BuildSystemKind, Dependency, Version};
    use crate::tool::MockToolRunner;
    use serial_test::serial;
    use tempfile::TempDir;

    struct ScriptedSystem;

    fn failing_install(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
        ctx.run_tool("make", ["install"])?;
        Ok(())
    }

    fn erroring_check(_ctx: &PhaseContext<'_>) -> Result<TestStatus, BuildError> {
        Err(BuildError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "harness crashed",
        )))
    }

    fn passing_check(_ctx: &PhaseContext<'_>) -> Result<TestStatus, BuildError> {
        Ok(TestStatus::Passed)
    }

    fn touch_marker(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
        std::fs::write(ctx.build_directory.join("patched"), "yes")?;
        Ok(())
    }

    impl BuildSystem for ScriptedSystem {
        fn id(&self) -> BuildSystemKind {
            BuildSystemKind::Makefile
        }

        fn manifest_patterns(&self) -> &[ManifestPattern] {
            &[ManifestPattern { filename: "Makefile" }]
        }

        fn tool(&self) -> &'static str {
            "make"
        }

        fn phase_handler(&self, phase: Phase) -> Option<PhaseFn> {
            match phase {
                Phase::Edit => Some(noop_edit),
                Phase::Install => Some(failing_install),
                _ => None,
            }
        }

        fn install_time_tests(&self) -> Vec<TestCallback> {
            vec![
                TestCallback {
                    name: "crashes",
                    run: erroring_check,
                },
                TestCallback {
                    name: "passes",
                    run: passing_check,
                },
            ]
        }
    }

    struct HalfImplemented;

    impl BuildSystem for HalfImplemented {
        fn id(&self) -> BuildSystemKind {
            BuildSystemKind::Makefile
        }

        fn manifest_patterns(&self) -> &[ManifestPattern] {
            &[]
        }

        fn tool(&self) -> &'static str {
            "make"
        }

        fn phase_handler(&self, phase: Phase) -> Option<PhaseFn> {
            match phase {
                Phase::Edit => Some(noop_edit),
                _ => None,
            }
        }
    }

    fn make_spec() -> PackageSpec {
        PackageSpec::new("zlib", Version::parse("1.3").unwrap(), BuildSystemKind::Makefile)
    }

    fn staged() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Makefile"), "all:\n").unwrap();
        dir
    }

    #[test]
    fn test_missing_phase_is_configuration_error() {
        let spec = make_spec();
        let src = staged();
        let result = BaseBuilder::new(&HalfImplemented, &spec, src.path(), Path::new("/opt/zlib"), BuildArgs::default());
        assert!(matches!(
            result,
            Err(ConfigurationError::MissingPhase {
                phase: Phase::Install,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_source_is_configuration_error() {
        let spec = make_spec();
        let src = staged();
        let missing = src.path().join("gone");
        let result = BaseBuilder::new(&ScriptedSystem, &spec, &missing, Path::new("/opt/zlib"), BuildArgs::default());
        assert!(matches!(
            result,
            Err(ConfigurationError::MissingBuildDirectory { .. })
        ));
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let spec = PackageSpec::new("hub", Version::parse("2.14.2").unwrap(), BuildSystemKind::Go);
        let src = staged();
        let result = BaseBuilder::new(&ScriptedSystem, &spec, src.path(), Path::new("/opt/hub"), BuildArgs::default());
        assert!(matches!(result, Err(ConfigurationError::NoBuilder { .. })));
    }

    #[test]
    #[serial]
    fn test_default_edit_is_noop() {
        let spec = make_spec();
        let src = staged();
        let builder = BaseBuilder::new(&ScriptedSystem, &spec, src.path(), Path::new("/opt/zlib"), BuildArgs::default()).unwrap();

        let listing = |dir: &Path| {
            let mut entries: Vec<_> = std::fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
            entries.sort();
            entries
        };
        let before = listing(src.path());
        builder.run_phase(Phase::Edit, &MockToolRunner::new()).unwrap();
        assert_eq!(before, listing(src.path()));
    }

    #[test]
    #[serial]
    fn test_edit_override_runs_in_build_directory() {
        let spec = make_spec();
        let src = staged();
        let builder = BaseBuilder::new(&ScriptedSystem, &spec, src.path(), Path::new("/opt/zlib"), BuildArgs::default())
            .unwrap()
            .with_override(Phase::Edit, touch_marker)
            .unwrap();

        builder.run_phase(Phase::Edit, &MockToolRunner::new()).unwrap();
        assert!(src.path().join("patched").exists());
    }

    #[test]
    fn test_override_of_undeclared_phase_is_rejected() {
        let spec = make_spec();
        let src = staged();
        let result = BaseBuilder::new(&ScriptedSystem, &spec, src.path(), Path::new("/opt/zlib"), BuildArgs::default())
            .unwrap()
            .with_override(Phase::Configure, touch_marker);
        assert!(matches!(
            result,
            Err(ConfigurationError::UnexpectedOverride { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_failed_phase_restores_working_directory() {
        let spec = make_spec();
        let src = staged();
        let builder = BaseBuilder::new(&ScriptedSystem, &spec, src.path(), Path::new("/opt/zlib"), BuildArgs::default()).unwrap();

        let mut runner = MockToolRunner::new();
        runner
            .expect_resolve()
            .returning(|tool, _| Some(PathBuf::from(format!("/usr/bin/{}", tool))));
        runner.expect_run().times(1).returning(|_| {
            Ok(ToolOutput {
                code: Some(2),
                stdout: String::new(),
                stderr: "No rule to make target 'install'".to_string(),
            })
        });

        let before = std::env::current_dir().unwrap();
        let err = builder.run_phase(Phase::Install, &runner).unwrap_err();
        assert_eq!(std::env::current_dir().unwrap(), before);

        assert_eq!(err.failed_phase(), Some(Phase::Install));
        assert!(matches!(
            err.tool_error(),
            Some(ToolError::NonZeroExit { code: Some(2), .. })
        ));
        assert!(!err.to_string().contains("No rule to make target"));
        let cause = std::error::Error::source(&err).unwrap();
        assert!(cause.to_string().contains("No rule to make target"));
        assert_eq!(
            render_chain(&err).matches("No rule to make target").count(),
            1
        );
    }

    #[test]
    #[serial]
    fn test_relative_paths_survive_entering_build_directory() {
        let spec = make_spec();
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("src/zlib")).unwrap();
        std::fs::write(root.path().join("src/zlib/Makefile"), "all:\n").unwrap();

        let _guard = WorkingDirGuard::enter(root.path()).unwrap();
        let cwd = std::env::current_dir().unwrap();
        let builder = BaseBuilder::new(&ScriptedSystem, &spec, Path::new("src/zlib"), Path::new("opt/zlib"), BuildArgs::default()).unwrap();
        assert_eq!(builder.build_directory(), cwd.join("src/zlib"));
        assert_eq!(builder.prefix(), cwd.join("opt/zlib"));

        let expected_cwd = cwd.join("src/zlib");
        let mut runner = MockToolRunner::new();
        runner
            .expect_resolve()
            .returning(|tool, _| Some(PathBuf::from(format!("/usr/bin/{}", tool))));
        runner
            .expect_run()
            .withf(move |invocation| invocation.cwd == expected_cwd && invocation.cwd.is_dir())
            .times(1)
            .returning(|_| {
                Ok(ToolOutput {
                    code: Some(0),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            });

        builder.run_phase(Phase::Install, &runner).unwrap();
    }

    #[test]
    #[serial]
    fn test_unresolvable_tool_reports_command_line() {
        let spec = make_spec();
        let src = staged();
        let builder = BaseBuilder::new(&ScriptedSystem, &spec, src.path(), Path::new("/opt/zlib"), BuildArgs::default()).unwrap();

        let mut runner = MockToolRunner::new();
        runner.expect_resolve().returning(|_, _| None);
        runner.expect_run().never();

        let err = builder.run_phase(Phase::Install, &runner).unwrap_err();
        match err.tool_error() {
            Some(ToolError::NotFound { tool, command }) => {
                assert_eq!(tool, "make");
                assert_eq!(command, "make install");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_test_callback_errors_are_recorded_not_raised() {
        let spec = make_spec();
        let src = staged();
        let builder = BaseBuilder::new(&ScriptedSystem, &spec, src.path(), Path::new("/opt/zlib"), BuildArgs::default()).unwrap();

        let before = std::env::current_dir().unwrap();
        let results = builder.run_install_time_tests(&MockToolRunner::new());
        assert_eq!(std::env::current_dir().unwrap(), before);
        assert_eq!(
            results,
            vec![
                ("crashes".to_string(), TestStatus::Failed),
                ("passes".to_string(), TestStatus::Passed),
            ]
        );
    }

    #[test]
    fn test_dependency_bin_dirs_are_searched_and_on_path() {
        let spec = make_spec().with_dependency(Dependency::new("m4").with_prefix("/opt/m4-1.4.19"));
        let src = staged();
        let builder = BaseBuilder::new(&ScriptedSystem, &spec, src.path(), Path::new("/opt/zlib"), BuildArgs::default()).unwrap();

        assert_eq!(builder.tool_dirs(), &[PathBuf::from("/opt/m4-1.4.19/bin")]);
        let path = builder.environment().get("PATH").unwrap();
        assert!(path.starts_with("/opt/m4-1.4.19/bin"));
    }

    #[test]
    fn test_no_dependencies_leaves_path_alone() {
        let spec = make_spec();
        let src = staged();
        let builder = BaseBuilder::new(&ScriptedSystem, &spec, src.path(), Path::new("/opt/zlib"), BuildArgs::default()).unwrap();
        assert!(builder.environment().get("PATH").is_none());
    }
}
