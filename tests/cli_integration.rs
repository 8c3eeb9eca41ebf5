//! CLI integration tests
//!
//! These drive the built binary against a Makefile package whose `make` is a
//! shell script shipped in the `gmake` dependency prefix, so no real
//! toolchain is needed.

#![cfg(unix)]

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const FAKE_MAKE: &str = r#"#!/bin/sh
if [ "$1" = "-n" ]; then
  if [ "$2" = "check" ]; then exit 0; fi
  echo "make: *** No rule to make target '$2'.  Stop." >&2
  exit 2
fi
case "$1" in
  PREFIX=*)
    if [ -n "$FAKE_INSTALL_EXIT" ]; then
      echo "install: cannot create directory" >&2
      exit "$FAKE_INSTALL_EXIT"
    fi
    dest="${1#PREFIX=}"
    mkdir -p "$dest/bin"
    cp hello "$dest/bin/hello"
    ;;
  check)
    echo "1 of 1 tests passed"
    exit "${FAKE_CHECK_EXIT:-0}"
    ;;
esac
exit 0
"#;

/// Helper to get the path to the phasekit binary
fn phasekit_bin() -> PathBuf {
    let mut path = env::current_exe()
        .expect("Failed to get current executable path")
        .parent()
        .expect("No parent")
        .to_path_buf();

    // If we're in deps/, go up one more level
    if path.ends_with("deps") {
        path = path.parent().expect("No parent").to_path_buf();
    }

    path.join("phasekit")
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        };

        let bin = ws.path().join("gmake/bin");
        fs::create_dir_all(&bin).unwrap();
        let make = bin.join("make");
        fs::write(&make, FAKE_MAKE).unwrap();
        fs::set_permissions(&make, fs::Permissions::from_mode(0o755)).unwrap();

        let src = ws.path().join("src/hello");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("Makefile"), "install:\n\tcp hello $(PREFIX)/bin\n").unwrap();
        fs::write(src.join("hello"), "#!/bin/sh\necho hello\n").unwrap();

        fs::write(
            ws.path().join("hello.yaml"),
            format!(
                r#"spec:
  name: hello
  version: "1.0"
  build_system: makefile
  dependencies:
    - name: gmake
      version: "4.4"
      prefix: {}
source: src/hello
"#,
                ws.path().join("gmake").display()
            ),
        )
        .unwrap();
        ws
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn request(&self) -> PathBuf {
        self.path().join("hello.yaml")
    }

    fn install_root(&self) -> PathBuf {
        self.path().join("opt")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(phasekit_bin());
        cmd.env_remove("PHASEKIT_MIRRORS_FILE")
            .env_remove("PHASEKIT_RUN_TESTS")
            .env_remove("PHASEKIT_UPDATE_INDEX")
            .env_remove("PHASEKIT_LOG_LEVEL")
            .env_remove("RUST_LOG")
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("XDG_DATA_HOME", self.path().join("data"))
            .env("PHASEKIT_INSTALL_ROOT", self.install_root());
        cmd
    }

    fn install(&self, extra: &[&str]) -> Output {
        self.command()
            .arg("install")
            .arg(self.request())
            .args(["--format", "json"])
            .args(extra)
            .output()
            .expect("Failed to execute phasekit")
    }
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({}): {}\nstderr: {}",
            e,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

#[test]
fn test_cli_help() {
    let output = Command::new(phasekit_bin())
        .arg("--help")
        .output()
        .expect("Failed to execute phasekit");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("install"));
    assert!(stdout.contains("build-systems"));
    assert!(stdout.contains("show"));
}

#[test]
fn test_cli_version() {
    let output = Command::new(phasekit_bin())
        .arg("--version")
        .output()
        .expect("Failed to execute phasekit");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_build_systems_json() {
    let output = Command::new(phasekit_bin())
        .args(["build-systems", "--format", "json"])
        .output()
        .expect("Failed to execute phasekit");

    assert!(output.status.success());
    let value = stdout_json(&output);
    let kinds: Vec<&str> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["cargo", "go", "cmake", "autotools", "makefile"]);
    assert_eq!(value[1]["phases"], serde_json::json!(["edit", "install"]));
}

#[test]
fn test_install_success() {
    let ws = Workspace::new();
    let output = ws.install(&[]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value = stdout_json(&output);
    let outcome = &value[0];
    assert_eq!(outcome["state"]["state"], "done");
    assert_eq!(outcome["phases_run"], serde_json::json!(["edit", "build", "install"]));
    assert_eq!(outcome["tests"][0]["part"], "check");
    assert_eq!(outcome["tests"][0]["status"], "passed");

    let prefix = PathBuf::from(outcome["prefix"].as_str().unwrap());
    assert!(prefix.starts_with(ws.install_root()));
    assert!(prefix.join("bin/hello").is_file());

    let log = fs::read_to_string(prefix.join(".phasekit/install-time-tests.json")).unwrap();
    assert!(log.contains("\"passed\""));
}

#[test]
fn test_install_relative_request_and_install_root() {
    let ws = Workspace::new();
    let output = ws
        .command()
        .current_dir(ws.path())
        .env("PHASEKIT_INSTALL_ROOT", "opt")
        .args(["install", "hello.yaml", "--format", "json"])
        .output()
        .expect("Failed to execute phasekit");

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value = stdout_json(&output);
    let prefix = PathBuf::from(value[0]["prefix"].as_str().unwrap());
    assert!(prefix.is_absolute());
    assert_eq!(
        prefix.parent().unwrap().canonicalize().unwrap(),
        ws.install_root().canonicalize().unwrap()
    );
    assert!(prefix.join("bin/hello").is_file());
}

#[test]
fn test_install_failing_tests_exit_code() {
    let ws = Workspace::new();
    let output = ws
        .command()
        .env("FAKE_CHECK_EXIT", "1")
        .arg("install")
        .arg(ws.request())
        .args(["--format", "json"])
        .output()
        .expect("Failed to execute phasekit");

    assert_eq!(output.status.code(), Some(2));
    let value = stdout_json(&output);
    assert_eq!(value[0]["state"]["state"], "done");
    assert_eq!(value[0]["tests"][0]["status"], "failed");
}

#[test]
fn test_install_no_tests_records_skipped() {
    let ws = Workspace::new();
    let output = ws.install(&["--no-tests"]);

    assert_eq!(output.status.code(), Some(0));
    let value = stdout_json(&output);
    assert_eq!(value[0]["tests"][0]["status"], "skipped");
}

#[test]
fn test_install_phase_failure_reports_phase_and_output() {
    let ws = Workspace::new();
    let output = ws
        .command()
        .env("FAKE_INSTALL_EXIT", "3")
        .arg("install")
        .arg(ws.request())
        .output()
        .expect("Failed to execute phasekit");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("install"), "stderr: {}", stderr);
    assert!(stderr.contains("exit code 3"), "stderr: {}", stderr);
    assert!(stderr.contains("cannot create directory"), "stderr: {}", stderr);
}

#[test]
fn test_install_missing_request() {
    let ws = Workspace::new();
    let output = ws
        .command()
        .args(["install", "does-not-exist.yaml"])
        .output()
        .expect("Failed to execute phasekit");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does-not-exist.yaml"));
}

#[test]
fn test_install_autopush_and_index_update() {
    let ws = Workspace::new();
    let mirror_root = ws.path().join("mirror");
    let mirrors = ws.path().join("mirrors.yaml");
    fs::write(
        &mirrors,
        format!(
            "mirrors:\n  - name: local\n    url: file://{}\n    signed: false\n    autopush: true\n  - name: manual\n    url: {}\n    signed: false\n",
            mirror_root.display(),
            ws.path().join("manual").display()
        ),
    )
    .unwrap();

    let output = ws.install(&["--mirrors", mirrors.to_str().unwrap(), "--update-index"]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let cache = mirror_root.join("build_cache");
    let tarballs: Vec<_> = fs::read_dir(&cache)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tar.gz"))
        .collect();
    assert_eq!(tarballs.len(), 1);
    assert!(tarballs[0].starts_with("hello-1.0-"));

    let index: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(cache.join("index.json")).unwrap()).unwrap();
    assert_eq!(index["entries"].as_array().unwrap().len(), 1);
    assert!(!ws.path().join("manual").exists());
}

#[test]
fn test_install_autopush_without_index_update() {
    let ws = Workspace::new();
    let mirror_root = ws.path().join("mirror");
    let mirrors = ws.path().join("mirrors.yaml");
    fs::write(
        &mirrors,
        format!(
            "mirrors:\n  - name: local\n    url: {}\n    signed: false\n    autopush: true\n",
            mirror_root.display()
        ),
    )
    .unwrap();

    let output = ws.install(&["--mirrors", mirrors.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    assert!(mirror_root.join("build_cache").is_dir());
    assert!(!mirror_root.join("build_cache/index.json").exists());
}

#[test]
fn test_show_json() {
    let ws = Workspace::new();
    let output = ws
        .command()
        .arg("show")
        .arg(ws.request())
        .args(["--format", "json"])
        .output()
        .expect("Failed to execute phasekit");

    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["build_system"]["kind"], "makefile");
    assert_eq!(value["toolchain"][0]["requirement"], "gmake");
    assert_eq!(value["toolchain"][0]["active"], true);
    assert_eq!(value["toolchain"][0]["satisfied"], true);
    assert!(value["identity"].as_str().unwrap().starts_with("hello@1.0/"));
    assert!(!ws.install_root().exists());
}

#[test]
fn test_config_json() {
    let ws = Workspace::new();
    let output = ws
        .command()
        .env("PHASEKIT_UPDATE_INDEX", "true")
        .args(["config", "--format", "json"])
        .output()
        .expect("Failed to execute phasekit");

    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["install_root"], ws.install_root().display().to_string());
    assert_eq!(value["update_index"], "true");
    assert_eq!(value["run_tests"], "true");
}

#[test]
fn test_config_rejects_malformed_boolean() {
    let ws = Workspace::new();
    let output = ws
        .command()
        .env("PHASEKIT_RUN_TESTS", "maybe")
        .arg("config")
        .output()
        .expect("Failed to execute phasekit");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("PHASEKIT_RUN_TESTS"));
}
