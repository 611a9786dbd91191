//! Synchronous invocation of the `act` workflow emulator
//!
//! Builds the fixed command line for one workflow job, runs it with piped
//! output and a bounded wait, and hands the captured outcome to the
//! validation layer as a plain value.

use actest_report::{HarnessError, RunResult};
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Name of the emulator binary looked up on PATH.
pub const EMULATOR_BINARY: &str = "act";

/// Job the workflow self-test runs by default.
pub const DEFAULT_JOB: &str = "selftest";

/// Repository-relative path of the default event fixture.
pub const DEFAULT_EVENT: &str = "tests/fixtures/pull_request.event.json";

/// Platform-image binding for the job's `ubuntu-latest` runner label.
pub const DEFAULT_PLATFORM: &str = "ubuntu-latest=catthehacker/ubuntu:act-latest";

/// Bounded wait applied to the emulator process.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Distinguished exit code reported when the bounded wait expires.
///
/// Deliberately outside the emulator's own exit codes so a timeout is
/// never mistaken for a process result.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Locate the emulator binary on PATH.
///
/// `None` means the environment lacks the tool; callers treat that as a
/// skip condition, never as a failure.
#[must_use]
pub fn emulator_path() -> Option<PathBuf> {
    search_path(EMULATOR_BINARY, &env::var_os("PATH")?)
}

fn search_path(binary: &str, path_var: &OsStr) -> Option<PathBuf> {
    let name = binary_name(binary);
    env::split_paths(path_var)
        .map(|dir| dir.join(&name))
        .find(|candidate| is_executable(candidate))
}

fn binary_name(binary: &str) -> String {
    if cfg!(windows) {
        format!("{binary}.exe")
    } else {
        binary.to_string()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// One emulator invocation: which job to run, against which event payload,
/// collecting artifacts where.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub job: String,
    pub event_path: PathBuf,
    pub artifact_dir: PathBuf,
    pub platform: String,
    pub timeout: Duration,
    /// Extra environment passed to the emulator process, on top of the
    /// inherited environment.
    pub extra_env: Vec<(String, String)>,
}

impl RunRequest {
    /// Request for the canonical workflow self-test, collecting artifacts
    /// under `artifact_dir`.
    #[must_use]
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            job: DEFAULT_JOB.to_string(),
            event_path: PathBuf::from(DEFAULT_EVENT),
            artifact_dir: artifact_dir.into(),
            platform: DEFAULT_PLATFORM.to_string(),
            timeout: DEFAULT_TIMEOUT,
            extra_env: Vec::new(),
        }
    }

    /// Run the emulator and capture its outcome.
    ///
    /// Blocks until the process exits or the timeout expires. A timed-out
    /// process is killed and reported with [`TIMEOUT_EXIT_CODE`] and its
    /// partial output preserved. A non-zero exit code is a normal result,
    /// not an error of this function.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::ArtifactDir` if the artifact directory cannot
    /// be created, `HarnessError::Spawn` if the process fails to start, and
    /// `HarnessError::Wait` if the process cannot be waited on or reaped.
    pub fn run(&self, binary: &Path) -> Result<RunResult, HarnessError> {
        fs::create_dir_all(&self.artifact_dir).map_err(|source| HarnessError::ArtifactDir {
            path: self.artifact_dir.clone(),
            source,
        })?;

        let mut child = self
            .command(binary)
            .spawn()
            .map_err(|source| HarnessError::Spawn { source })?;

        let timed_out = match child.wait_timeout(self.timeout) {
            Ok(status) => status.is_none(),
            Err(source) => {
                let _ = child.kill();
                return Err(HarnessError::Wait { source });
            }
        };
        if timed_out {
            kill_timed_out(&mut child)?;
        }

        let output = child
            .wait_with_output()
            .map_err(|source| HarnessError::Wait { source })?;
        let logs = combine_logs(&output);

        if timed_out {
            return Ok(RunResult {
                code: TIMEOUT_EXIT_CODE,
                artifact_dir: self.artifact_dir.clone(),
                logs: format!("act timed out after {}s\n{logs}", self.timeout.as_secs()),
            });
        }

        Ok(RunResult {
            code: output.status.code().unwrap_or(-1),
            artifact_dir: self.artifact_dir.clone(),
            logs,
        })
    }

    /// Build the fixed emulator command line:
    /// `act pull_request -j <job> -e <event> -P <platform>
    /// --artifact-server-path <dir> --json -b`.
    fn command(&self, binary: &Path) -> Command {
        let mut command = Command::new(binary);
        command
            .arg("pull_request")
            .arg("-j")
            .arg(&self.job)
            .arg("-e")
            .arg(&self.event_path)
            .arg("-P")
            .arg(&self.platform)
            .arg("--artifact-server-path")
            .arg(&self.artifact_dir)
            .arg("--json")
            .arg("-b")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.extra_env {
            command.env(key, value);
        }
        command
    }
}

fn kill_timed_out(child: &mut Child) -> Result<(), HarnessError> {
    match child.kill() {
        Ok(()) => Ok(()),
        // `InvalidInput` means the child already exited; nothing to do.
        Err(err) if err.kind() == ErrorKind::InvalidInput => Ok(()),
        Err(source) => Err(HarnessError::Wait { source }),
    }
}

/// Combined log stream: stdout, then a newline, then stderr.
fn combine_logs(output: &Output) -> String {
    format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}
