use super::results::{write_test_log, TestResults, METADATA_DIR};
use super::session::InstallSession;
use super::state::{InstallState, StateTracker};
use super::{InstallError, InstallRequest};
use crate::build_systems::{BaseBuilder, BuildError, BuildSystemRegistry, Phase};
use crate::hooks::{InstallHook, InstallRecord, Provenance};
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::spec::PackageSpec;
use crate::test_status::TestStatus;
use crate::tool::{absolutize, ToolRunner};
use crate::util::render_chain;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Test part recorded when a builder registers no install-time tests.
pub const NO_TEST_CALLBACKS_PART: &str = "install_time_tests";

/// Spec snapshot written next to the test log.
pub const SPEC_FILE: &str = "spec.json";

/// Result of one successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub identity: String,
    pub prefix: PathBuf,
    pub state: InstallState,
    pub phases_run: Vec<Phase>,
    pub tests: TestResults,
    pub provenance: Provenance,
}

impl InstallOutcome {
    /// True when the install is done but at least one test part failed.
    pub fn tests_failed(&self) -> bool {
        self.tests.any_failed()
    }
}

pub struct Installer {
    registry: BuildSystemRegistry,
    runner: Arc<dyn ToolRunner>,
    hooks: Vec<Box<dyn InstallHook>>,
    progress_handler: Option<Box<dyn ProgressHandler>>,
    install_root: PathBuf,
    run_tests: bool,
}

impl Installer {
    pub fn new(
        registry: BuildSystemRegistry,
        runner: Arc<dyn ToolRunner>,
        install_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            runner,
            hooks: Vec::new(),
            progress_handler: None,
            install_root: absolutize(&install_root.into()),
            run_tests: true,
        }
    }

    pub fn with_hook(mut self, hook: Box<dyn InstallHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_progress(mut self, handler: Box<dyn ProgressHandler>) -> Self {
        self.progress_handler = Some(handler);
        self
    }

    /// When false every install-time test callback is recorded `Skipped`.
    pub fn with_run_tests(mut self, run_tests: bool) -> Self {
        self.run_tests = run_tests;
        self
    }

    pub fn registry(&self) -> &BuildSystemRegistry {
        &self.registry
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn prefix_for(&self, spec: &PackageSpec) -> PathBuf {
        self.install_root.join(spec.prefix_dir_name())
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(handler) = &self.progress_handler {
            handler.on_progress(&event);
        }
    }

    /// Builds and installs one package, runs its install-time tests, then
    /// hands the result to every hook.
    ///
    /// A failed phase aborts the install with no tests run and no hooks
    /// called. Failed tests do not: the outcome is still `Done`.
    pub fn install(
        &self,
        request: &InstallRequest,
        session: &mut InstallSession,
    ) -> Result<InstallOutcome, InstallError> {
        let start = Instant::now();
        let spec = &request.spec;
        let identity = spec.identity();
        let prefix = self.prefix_for(spec);
        let mut tracker = StateTracker::new();

        let builder = match self.prepare(request, &prefix) {
            Ok(builder) => builder,
            Err(e) => {
                tracker.transition(InstallState::Failed);
                let message = render_chain(&e);
                error!(package = %identity, error = %message, "no usable builder");
                self.emit(ProgressEvent::Failed {
                    package: identity,
                    phase: None,
                    error: message,
                });
                return Err(e.into());
            }
        };

        info!(
            package = %identity,
            build_system = %spec.build_system,
            prefix = %prefix.display(),
            "Installing from source"
        );
        self.emit(ProgressEvent::Started {
            package: identity.clone(),
            build_system: spec.build_system.to_string(),
        });

        let mut phases_run = Vec::new();
        for phase in builder.phases() {
            tracker.transition(InstallState::Phase(phase));
            self.emit(ProgressEvent::PhaseStarted {
                package: identity.clone(),
                phase: phase.to_string(),
            });

            let phase_start = Instant::now();
            if let Err(e) = builder.run_phase(phase, self.runner.as_ref()) {
                tracker.transition(InstallState::Failed);
                let message = render_chain(&e);
                error!(package = %identity, phase = %phase, error = %message, "phase failed");
                self.emit(ProgressEvent::Failed {
                    package: identity,
                    phase: Some(phase.to_string()),
                    error: message,
                });
                return Err(e.into());
            }

            self.emit(ProgressEvent::PhaseComplete {
                package: identity.clone(),
                phase: phase.to_string(),
                duration: phase_start.elapsed(),
            });
            phases_run.push(phase);
        }
        tracker.transition(InstallState::PhasesComplete);

        let tests = self.run_install_time_tests(&builder, &identity);
        if let Err(e) = write_test_log(&prefix, &tests) {
            warn!(package = %identity, error = %e, "could not write test log");
        }
        if let Err(e) = write_spec_snapshot(&prefix, spec) {
            warn!(package = %identity, error = %e, "could not write spec snapshot");
        }
        tracker.transition(InstallState::TestsRun);
        tracker.transition(InstallState::Done);
        session.record_install(identity.clone());

        let record = InstallRecord {
            spec,
            prefix: &prefix,
            explicit: request.explicit,
            provenance: Provenance::Source,
        };
        self.dispatch_post_install(&record, session)?;

        info!(
            package = %identity,
            phases = phases_run.len(),
            tests_failed = tests.failed(),
            "Install complete"
        );
        self.emit(ProgressEvent::Completed {
            package: identity.clone(),
            phases: phases_run.len(),
            tests_failed: tests.failed(),
            total_time: start.elapsed(),
        });

        Ok(InstallOutcome {
            identity,
            prefix,
            state: tracker.current(),
            phases_run,
            tests,
            provenance: Provenance::Source,
        })
    }

    /// Registers a package extracted from a binary cache. No phases run;
    /// hooks see `Provenance::BinaryCache`.
    pub fn record_cached(
        &self,
        spec: &PackageSpec,
        prefix: &Path,
        explicit: bool,
        session: &mut InstallSession,
    ) -> Result<(), InstallError> {
        let identity = spec.identity();
        info!(package = %identity, prefix = %prefix.display(), "Installed from binary cache");
        session.record_install(identity);

        let record = InstallRecord {
            spec,
            prefix,
            explicit,
            provenance: Provenance::BinaryCache,
        };
        self.dispatch_post_install(&record, session)
    }

    /// Ends a batch. Each hook sees the session once; it is dropped after.
    pub fn finish(&self, session: InstallSession, update_index: bool) -> Result<(), InstallError> {
        info!(
            session = %session.id(),
            installed = session.installed().len(),
            mirrors = session.updated_mirrors().len(),
            update_index,
            "Install batch done"
        );
        for hook in &self.hooks {
            hook.on_install_done(&session, update_index)
                .map_err(|source| InstallError::Hook {
                    hook: hook.name(),
                    source,
                })?;
        }
        Ok(())
    }

    fn prepare<'a>(
        &'a self,
        request: &'a InstallRequest,
        prefix: &Path,
    ) -> Result<BaseBuilder<'a>, BuildError> {
        let system = self.registry.select(&request.spec)?;
        let mut builder = BaseBuilder::new(
            system,
            &request.spec,
            &request.source,
            prefix,
            request.args.clone(),
        )?;
        for (phase, handler) in &request.overrides {
            debug!(package = %request.spec.name, phase = %phase, "phase overridden by package");
            builder = builder.with_override(*phase, *handler)?;
        }
        std::fs::create_dir_all(prefix)?;
        Ok(builder)
    }

    fn run_install_time_tests(&self, builder: &BaseBuilder<'_>, identity: &str) -> TestResults {
        let mut results = TestResults::new();
        let callbacks = builder.test_callbacks();
        if callbacks.is_empty() {
            results.record(identity, NO_TEST_CALLBACKS_PART, TestStatus::NoTests);
            return results;
        }

        for callback in callbacks {
            let started = Instant::now();
            let status = if self.run_tests {
                builder.run_test_callback(callback, self.runner.as_ref())
            } else {
                TestStatus::Skipped
            };
            self.emit(ProgressEvent::TestCallbackComplete {
                package: identity.to_string(),
                callback: callback.name.to_string(),
                status,
                duration: started.elapsed(),
            });
            results.record(identity, callback.name, status);
        }
        results
    }

    fn dispatch_post_install(
        &self,
        record: &InstallRecord<'_>,
        session: &mut InstallSession,
    ) -> Result<(), InstallError> {
        for hook in &self.hooks {
            debug!(hook = hook.name(), package = %record.spec.name, "post-install hook");
            hook.post_install(record, session)
                .map_err(|source| InstallError::Hook {
                    hook: hook.name(),
                    source,
                })?;
        }
        Ok(())
    }
}

fn write_spec_snapshot(prefix: &Path, spec: &PackageSpec) -> std::io::Result<()> {
    let dir = prefix.join(METADATA_DIR);
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(spec)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(dir.join(SPEC_FILE), json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_systems::{PhaseContext, BuildArgs};
    use crate::hooks::HookError;
    use crate::mirror::PushError;
    use crate::pipeline::results::test_log_path;
    use crate::spec::{BuildSystemKind, Version};
    use crate::tool::{MockToolRunner, ToolInvocation, ToolOutput};
    use serial_test::serial;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Calls {
        post_install: Vec<(String, Provenance, bool)>,
        done: Vec<bool>,
    }

    struct RecordingHook {
        calls: Arc<Mutex<Calls>>,
        fail: bool,
    }

    impl InstallHook for RecordingHook {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn post_install(
            &self,
            record: &InstallRecord<'_>,
            session: &mut InstallSession,
        ) -> Result<(), HookError> {
            if self.fail {
                return Err(HookError::Mirrors(PushError::UnsupportedUrl(
                    "s3://nowhere".to_string(),
                )));
            }
            session.record_mirror("recorded");
            self.calls.lock().unwrap().post_install.push((
                record.spec.name.clone(),
                record.provenance,
                record.explicit,
            ));
            Ok(())
        }

        fn on_install_done(&self, session: &InstallSession, update_index: bool) -> Result<(), HookError> {
            assert!(session.updated_mirrors().contains("recorded"));
            self.calls.lock().unwrap().done.push(update_index);
            Ok(())
        }
    }

    struct Fixture {
        _source: TempDir,
        _root: TempDir,
        installer: Installer,
        request: InstallRequest,
        calls: Arc<Mutex<Calls>>,
    }

    fn ripgrep() -> PackageSpec {
        PackageSpec::new("ripgrep", Version::parse("14.1.0").unwrap(), BuildSystemKind::Cargo)
    }

    /// `cargo install` exits with `install_code`, `cargo test` with `test_code`.
    fn cargo_runner(install_code: i32, test_code: i32) -> MockToolRunner {
        let mut runner = MockToolRunner::new();
        runner
            .expect_resolve()
            .returning(|tool, _| Some(PathBuf::from(format!("/usr/bin/{}", tool))));
        runner.expect_run().returning(move |inv: &ToolInvocation| {
            let code = match inv.args.first().map(String::as_str) {
                Some("install") => install_code,
                Some("test") => test_code,
                other => panic!("unexpected cargo subcommand {:?}", other),
            };
            Ok(ToolOutput {
                code: Some(code),
                stdout: "running 3 tests\ntest result: ok\n".to_string(),
                stderr: String::new(),
            })
        });
        runner
    }

    fn fixture(runner: MockToolRunner, fail_hook: bool) -> Fixture {
        let source = TempDir::new().unwrap();
        std::fs::write(source.path().join("Cargo.toml"), "[package]\nname = \"ripgrep\"\n").unwrap();
        let root = TempDir::new().unwrap();
        let calls = Arc::new(Mutex::new(Calls::default()));

        let installer = Installer::new(
            BuildSystemRegistry::with_defaults(),
            Arc::new(runner),
            root.path(),
        )
        .with_hook(Box::new(RecordingHook {
            calls: calls.clone(),
            fail: fail_hook,
        }));
        let request = InstallRequest::new(ripgrep(), source.path());

        Fixture {
            _source: source,
            _root: root,
            installer,
            request,
            calls,
        }
    }

    #[test]
    #[serial]
    fn test_install_runs_phases_tests_and_hooks() {
        let fx = fixture(cargo_runner(0, 0), false);
        let mut session = InstallSession::new();

        let outcome = fx.installer.install(&fx.request, &mut session).unwrap();

        assert_eq!(outcome.state, InstallState::Done);
        assert_eq!(outcome.phases_run, vec![Phase::Edit, Phase::Install]);
        assert_eq!(outcome.provenance, Provenance::Source);
        assert_eq!(outcome.tests.get(&outcome.identity, "check"), Some(TestStatus::Passed));
        assert!(!outcome.tests_failed());
        assert_eq!(outcome.prefix, fx.installer.prefix_for(&fx.request.spec));
        assert!(test_log_path(&outcome.prefix).is_file());
        assert!(outcome.prefix.join(METADATA_DIR).join(SPEC_FILE).is_file());
        assert_eq!(session.installed(), &[outcome.identity.clone()]);

        let calls = fx.calls.lock().unwrap();
        assert_eq!(
            calls.post_install,
            vec![("ripgrep".to_string(), Provenance::Source, true)]
        );
    }

    #[test]
    #[serial]
    fn test_failed_phase_skips_tests_and_hooks() {
        let mut runner = MockToolRunner::new();
        runner
            .expect_resolve()
            .returning(|tool, _| Some(PathBuf::from(format!("/usr/bin/{}", tool))));
        runner
            .expect_run()
            .withf(|inv| inv.args.first().map(String::as_str) == Some("install"))
            .times(1)
            .returning(|_| {
                Ok(ToolOutput {
                    code: Some(101),
                    stdout: String::new(),
                    stderr: "error: could not compile `ripgrep`".to_string(),
                })
            });
        let fx = fixture(runner, false);
        let mut session = InstallSession::new();

        let err = fx.installer.install(&fx.request, &mut session).unwrap_err();

        match err {
            InstallError::Build(ref e) => {
                assert_eq!(e.failed_phase(), Some(Phase::Install));
                assert!(e.to_string().contains("install"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(session.installed().is_empty());
        assert!(fx.calls.lock().unwrap().post_install.is_empty());
    }

    #[test]
    #[serial]
    fn test_failed_tests_leave_install_done() {
        let fx = fixture(cargo_runner(0, 101), false);
        let mut session = InstallSession::new();

        let outcome = fx.installer.install(&fx.request, &mut session).unwrap();

        assert_eq!(outcome.state, InstallState::Done);
        assert!(outcome.tests_failed());
        assert_eq!(outcome.tests.get(&outcome.identity, "check"), Some(TestStatus::Failed));
        assert_eq!(fx.calls.lock().unwrap().post_install.len(), 1);
    }

    #[test]
    #[serial]
    fn test_disabled_tests_are_skipped() {
        let mut runner = MockToolRunner::new();
        runner
            .expect_resolve()
            .returning(|tool, _| Some(PathBuf::from(format!("/usr/bin/{}", tool))));
        runner
            .expect_run()
            .withf(|inv| inv.args.first().map(String::as_str) == Some("install"))
            .times(1)
            .returning(|_| Ok(ToolOutput { code: Some(0), ..ToolOutput::default() }));
        let mut fx = fixture(runner, false);
        fx.installer = fx.installer.with_run_tests(false);

        let outcome = fx
            .installer
            .install(&fx.request, &mut InstallSession::new())
            .unwrap();
        assert_eq!(outcome.tests.get(&outcome.identity, "check"), Some(TestStatus::Skipped));
    }

    #[test]
    #[serial]
    fn test_missing_builder_is_configuration_error() {
        let source = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let installer = Installer::new(
            BuildSystemRegistry::new(),
            Arc::new(MockToolRunner::new()),
            root.path(),
        );
        let request = InstallRequest::new(ripgrep(), source.path());

        let err = installer
            .install(&request, &mut InstallSession::new())
            .unwrap_err();
        assert!(matches!(
            err,
            InstallError::Build(BuildError::Configuration(_))
        ));
    }

    fn write_patch_marker(ctx: &PhaseContext<'_>) -> Result<(), BuildError> {
        std::fs::write(ctx.build_directory.join("PATCHED"), "edited")?;
        Ok(())
    }

    #[test]
    #[serial]
    fn test_package_override_replaces_edit() {
        let mut fx = fixture(cargo_runner(0, 0), false);
        fx.request = fx
            .request
            .with_override(Phase::Edit, write_patch_marker)
            .with_args(BuildArgs {
                install_args: vec!["--locked".to_string()],
                ..BuildArgs::default()
            });

        fx.installer
            .install(&fx.request, &mut InstallSession::new())
            .unwrap();
        assert!(fx.request.source.join("PATCHED").is_file());
    }

    #[test]
    #[serial]
    fn test_override_of_undeclared_phase_is_rejected() {
        let mut fx = fixture(MockToolRunner::new(), false);
        fx.request = fx.request.with_override(Phase::Configure, write_patch_marker);

        let err = fx
            .installer
            .install(&fx.request, &mut InstallSession::new())
            .unwrap_err();
        assert!(matches!(
            err,
            InstallError::Build(BuildError::Configuration(_))
        ));
    }

    #[test]
    #[serial]
    fn test_hook_failure_propagates() {
        let fx = fixture(cargo_runner(0, 0), true);
        let err = fx
            .installer
            .install(&fx.request, &mut InstallSession::new())
            .unwrap_err();
        assert!(matches!(err, InstallError::Hook { hook: "recording", .. }));
    }

    #[test]
    fn test_record_cached_reports_binary_provenance() {
        let fx = fixture(MockToolRunner::new(), false);
        let mut session = InstallSession::new();
        let spec = ripgrep();

        fx.installer
            .record_cached(&spec, Path::new("/opt/ripgrep"), false, &mut session)
            .unwrap();

        assert_eq!(session.installed(), &[spec.identity()]);
        assert_eq!(
            fx.calls.lock().unwrap().post_install,
            vec![("ripgrep".to_string(), Provenance::BinaryCache, false)]
        );
    }

    #[test]
    fn test_finish_passes_update_index_to_hooks() {
        let fx = fixture(MockToolRunner::new(), false);
        let mut session = InstallSession::new();
        session.record_mirror("recorded");

        fx.installer.finish(session, true).unwrap();
        assert_eq!(fx.calls.lock().unwrap().done, vec![true]);
    }

    #[test]
    fn test_prefix_layout() {
        let installer = Installer::new(
            BuildSystemRegistry::new(),
            Arc::new(MockToolRunner::new()),
            "/opt/phasekit",
        );
        let spec = ripgrep();
        assert_eq!(
            installer.prefix_for(&spec),
            PathBuf::from(format!("/opt/phasekit/ripgrep-14.1.0-{}", spec.short_hash()))
        );
    }
}
