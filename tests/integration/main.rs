//! Integration tests for Preflight

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Command isolated from the user's global config
    fn preflight(home: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("preflight");
        cmd.arg("-c").arg(home.join("config.toml"));
        cmd
    }

    /// A project whose toolchain and tasks are plain shell commands
    fn project(tasks: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
        fs::write(dir.path().join("Cargo.lock"), "version = 3\n").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn demo() {}\n").unwrap();

        let cache_dir = dir.path().join(".preflight").join("cache");
        let config = format!(
            r#"[general]
history = false

[cache]
dir = '{}'

[toolchain]
name = "sh"
program = "sh"
build_args = ["-c", "touch \"$PREFLIGHT_ARTIFACT_DIR/deps.rlib\""]

[tasks]
builtin = false
{}"#,
            cache_dir.display(),
            tasks
        );
        fs::write(dir.path().join(".preflight.toml"), config).unwrap();
        dir
    }

    const PASSING_TASKS: &str = r#"
[[tasks.custom]]
name = "check"
command = ["sh", "-c", "test -f src/lib.rs"]
sources = "ext:rs"

[[tasks.custom]]
name = "deps"
command = ["sh", "-c", "test -f \"$CARGO_TARGET_DIR/deps.rlib\""]
uses_dependency_cache = true
"#;

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        preflight(home.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build-and-verification pipeline"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        preflight(home.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("preflight"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        preflight(home.path())
            .args(["--no-local", "config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let home = TempDir::new().unwrap();
        preflight(home.path())
            .args(["--no-local", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[toolchain]"));
    }

    #[test]
    fn config_init_refuses_overwrite() {
        let home = TempDir::new().unwrap();
        preflight(home.path())
            .args(["--no-local", "config", "init"])
            .assert()
            .success();
        preflight(home.path())
            .args(["--no-local", "config", "init"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn tasks_lists_builtin_catalog() {
        let home = TempDir::new().unwrap();
        preflight(home.path())
            .args(["--no-local", "tasks", "--all", "--platform", "aarch64-darwin"])
            .assert()
            .success()
            .stdout(predicate::str::contains("clippy"))
            .stdout(predicate::str::contains("coverage"));
    }

    #[test]
    fn tasks_hides_platform_restricted() {
        let home = TempDir::new().unwrap();
        preflight(home.path())
            .args(["--no-local", "tasks", "--platform", "aarch64-darwin"])
            .assert()
            .success()
            .stdout(predicate::str::contains("nextest"))
            .stdout(predicate::str::contains("llvm-cov").not());
    }

    #[test]
    fn malformed_filter_is_fatal() {
        let home = TempDir::new().unwrap();
        let dir = project(
            r#"
[[tasks.custom]]
name = "bad"
command = ["true"]
sources = "ext:"
"#,
        );
        preflight(home.path())
            .args(["run", "--project"])
            .arg(dir.path())
            .current_dir(dir.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("invalid source filter"));
    }

    #[test]
    fn run_succeeds_when_every_task_passes() {
        let home = TempDir::new().unwrap();
        let dir = project(PASSING_TASKS);
        preflight(home.path())
            .arg("run")
            .current_dir(dir.path())
            .assert()
            .code(0)
            .stdout(predicate::str::contains("2 passed"));
    }

    #[test]
    fn run_fails_when_any_task_fails() {
        let home = TempDir::new().unwrap();
        let dir = project(
            r#"
[[tasks.custom]]
name = "broken"
command = ["sh", "-c", "echo boom >&2; exit 1"]

[[tasks.custom]]
name = "fine"
command = ["true"]
"#,
        );
        preflight(home.path())
            .arg("run")
            .current_dir(dir.path())
            .assert()
            .code(1)
            .stdout(predicate::str::contains("boom"));
    }

    #[test]
    fn run_json_report() {
        let home = TempDir::new().unwrap();
        let dir = project(PASSING_TASKS);
        let report = dir.path().join("report.json");
        preflight(home.path())
            .args(["run", "--format", "json", "--report"])
            .arg(&report)
            .current_dir(dir.path())
            .assert()
            .code(0)
            .stdout(predicate::str::contains("\"overall\": \"success\""));

        let written = fs::read_to_string(&report).unwrap();
        assert!(written.contains("\"dependency_fingerprint\""));
    }

    #[test]
    fn run_populates_cache_for_list_and_env() {
        let home = TempDir::new().unwrap();
        let dir = project(PASSING_TASKS);
        preflight(home.path())
            .arg("run")
            .current_dir(dir.path())
            .assert()
            .code(0);

        preflight(home.path())
            .args(["cache", "list", "--format", "plain"])
            .current_dir(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("cache"));

        preflight(home.path())
            .args(["cache", "info"])
            .current_dir(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("complete"));

        preflight(home.path())
            .args(["env", "--format", "json"])
            .current_dir(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("\"present\": true"))
            .stdout(predicate::str::contains("CARGO_TARGET_DIR"));
    }

    #[test]
    fn env_without_cache_entry() {
        let home = TempDir::new().unwrap();
        let dir = project(PASSING_TASKS);
        preflight(home.path())
            .args(["env", "--format", "shell"])
            .current_dir(dir.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("export PREFLIGHT_PLATFORM="))
            .stdout(predicate::str::contains("CARGO_TARGET_DIR").not());
    }

    #[test]
    fn missing_project_dir() {
        let home = TempDir::new().unwrap();
        preflight(home.path())
            .args(["--no-local", "run", "--project", "/nonexistent/preflight-project"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }
}
