use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Runs the `trecur` binary against a throwaway SQLite store.
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("tasks.db");

        Self { temp_dir, db_path }
    }

    /// A command isolated from the user's config file and environment.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("trecur").expect("Failed to find trecur binary");
        self.isolate(&mut cmd);
        cmd
    }

    /// Same as [`command`](Self::command) for a copy of the binary under
    /// another file name, as Taskwarrior would start it from its hooks directory.
    #[allow(dead_code)]
    pub fn command_at(&self, program: &Path) -> Command {
        let mut cmd = Command::new(program);
        self.isolate(&mut cmd);
        cmd
    }

    fn isolate(&self, cmd: &mut Command) {
        cmd.env_remove("TRECUR_LOG")
            .env("TRECUR_CONFIG", self.temp_dir.path().join("missing.toml"))
            .env("TRECUR_STORE__BACKEND", "sqlite")
            .env("TRECUR_STORE__DATABASE", &self.db_path)
            .env("TRECUR_RECURRENCE__TIMEZONE", "UTC");
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    #[allow(dead_code)]
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Feeds one added task to the on-add hook and returns its stdout.
    pub fn on_add(&self, line: &str) -> String {
        let output = self
            .command()
            .args(["on-add", "api:2", "command:add"])
            .write_stdin(format!("{}\n", line))
            .output()
            .expect("Failed to run on-add");
        assert!(
            output.status.success(),
            "on-add failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).expect("on-add printed invalid UTF-8")
    }

    /// Stores records as Taskwarrior would after a hook returned them.
    pub fn import(&self, lines: &str) -> assert_cmd::assert::Assert {
        self.command()
            .arg("import")
            .write_stdin(lines.to_string())
            .assert()
            .success()
    }

    pub fn on_exit(&self, command: &str, lines: &str) -> assert_cmd::assert::Assert {
        self.command()
            .args(["on-exit", "api:2"])
            .arg(format!("command:{}", command))
            .write_stdin(lines.to_string())
            .assert()
    }
}

pub mod fixtures {
    pub const PARENT_UUID: &str = "3f0a43d0-a713-4ebe-9e5c-b1facf49f078";

    pub fn chained_parent() -> String {
        format!(
            r#"{{"uuid":"{}","description":"Water the plants","due":"20370708T010000Z","entry":"20370702T194712Z","r":"3d","rtype":"chained","status":"pending","tags":["garden"]}}"#,
            PARENT_UUID
        )
    }
}
