//! Result model and validation for the workflow self-test harness
//!
//! The emulated job writes a JSON result artifact and emits structured log
//! lines; this crate defines those records and the checks applied to them.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Status value a passing job writes into the artifact.
pub const EXPECTED_STATUS: &str = "ok";

/// Major-version prefix the job's runtime must report.
pub const EXPECTED_PYTHON_PREFIX: &str = "3.";

/// Workflow identifier the job must see in its environment.
pub const EXPECTED_WORKFLOW: &str = "workflow-selftest";

/// Environment key checked against [`EXPECTED_WORKFLOW`].
pub const WORKFLOW_ENV_KEY: &str = "GITHUB_WORKFLOW";

/// Substring that must appear in at least one structured log line.
pub const GREETING: &str = "Hello from workflow";

/// File name the emulated job writes its result under.
pub const RESULT_FILE: &str = "result.json";

/// Prefix of the directory holding [`RESULT_FILE`] (the `result*/` pattern).
pub const RESULT_DIR_PREFIX: &str = "result";

/// Structured result record written by the emulated job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactReport {
    /// Job outcome; `"ok"` on success.
    pub status: String,
    /// Version of the runtime the job executed under.
    pub python: String,
    /// Environment the job observed, as captured by the workflow.
    pub env: BTreeMap<String, String>,
}

/// Outcome of one emulator invocation.
///
/// A non-zero `code` is a normal, inspectable result; nothing about
/// constructing this value can fail once the process has been reaped.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Exit code of the emulator, or the timeout sentinel.
    pub code: i32,
    /// Directory the job's artifacts were collected under.
    pub artifact_dir: PathBuf,
    /// Combined stdout and stderr of the emulator.
    pub logs: String,
}

/// Error types for the harness; validation failures carry the full captured
/// log text so the emulator's behaviour can be diagnosed from the message.
#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("failed to create artifact directory {}: {source}", .path.display())]
    ArtifactDir { path: PathBuf, source: io::Error },

    #[error("failed to spawn emulator: {source}")]
    Spawn { source: io::Error },

    #[error("failed to wait for emulator: {source}")]
    Wait { source: io::Error },

    #[error("act failed with exit code {code}:\n{logs}")]
    RunFailed { code: i32, logs: String },

    #[error("artefact missing under {}. Logs:\n{logs}", .dir.display())]
    ArtifactMissing { dir: PathBuf, logs: String },

    #[error("failed to read artefact {}: {source}", .path.display())]
    ArtifactUnreadable { path: PathBuf, source: io::Error },

    #[error("artefact {} is not valid JSON: {source}", .path.display())]
    ArtifactInvalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("artefact field {field}: expected {expected}, got {actual}. Logs:\n{logs}")]
    FieldMismatch {
        field: String,
        expected: String,
        actual: String,
        logs: String,
    },

    #[error("expected greeting in structured logs. Logs:\n{logs}")]
    GreetingMissing { logs: String },
}

impl HarnessError {
    #[must_use]
    pub fn field_mismatch(field: &str, expected: &str, actual: &str, logs: &str) -> Self {
        Self::FieldMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            logs: logs.to_string(),
        }
    }
}

/// Find every `result*/result.json` under `dir`, searching recursively.
///
/// Unreadable entries are skipped. Results are sorted so validation is
/// deterministic when a job writes more than one result directory.
#[must_use]
pub fn find_result_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    collect_result_files(dir, &mut found);
    found.sort();
    found
}

fn collect_result_files(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_result_files(&path, found);
        } else if path.file_name() == Some(OsStr::new(RESULT_FILE))
            && parent_matches_result(&path)
        {
            found.push(path);
        }
    }
}

fn parent_matches_result(path: &Path) -> bool {
    path.parent()
        .and_then(Path::file_name)
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.starts_with(RESULT_DIR_PREFIX))
}

/// Parse the result artifact at `path`.
///
/// # Errors
///
/// Returns `HarnessError::ArtifactUnreadable` if the file cannot be read and
/// `HarnessError::ArtifactInvalid` if its contents fail to parse; an invalid
/// artifact is a hard failure, unlike unparseable log lines.
pub fn parse_artifact(path: &Path) -> Result<ArtifactReport, HarnessError> {
    let text = fs::read_to_string(path).map_err(|source| HarnessError::ArtifactUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| HarnessError::ArtifactInvalid {
        path: path.to_path_buf(),
        source,
    })
}

/// Scan combined log text line by line for `needle` in a structured line.
///
/// A line counts when, after trimming leading whitespace, it parses as a
/// JSON object whose `Output` field (or, when that is absent or empty, its
/// `message` field) contains `needle`. Lines that are not valid JSON are
/// silently skipped.
#[must_use]
pub fn logs_contain(logs: &str, needle: &str) -> bool {
    for line in logs.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('{') {
            continue;
        }
        let Ok(record) = serde_json::from_str::<Value>(trimmed) else {
            continue;
        };
        let text = record
            .get("Output")
            .and_then(Value::as_str)
            .filter(|output| !output.is_empty())
            .or_else(|| record.get("message").and_then(Value::as_str))
            .unwrap_or("");
        if text.contains(needle) {
            return true;
        }
    }
    false
}

/// Validate one emulator run end to end.
///
/// Applies the assertions in order: exit code, artifact presence, artifact
/// fields, then the structured-log greeting. The first failure is returned
/// with the full log text attached.
///
/// # Errors
///
/// Returns the `HarnessError` matching the first failed assertion.
pub fn validate(run: &RunResult) -> Result<ArtifactReport, HarnessError> {
    if run.code != 0 {
        return Err(HarnessError::RunFailed {
            code: run.code,
            logs: run.logs.clone(),
        });
    }

    let files = find_result_files(&run.artifact_dir);
    let Some(first) = files.first() else {
        return Err(HarnessError::ArtifactMissing {
            dir: run.artifact_dir.clone(),
            logs: run.logs.clone(),
        });
    };

    let report = parse_artifact(first)?;
    check_fields(&report, &run.logs)?;

    if !logs_contain(&run.logs, GREETING) {
        return Err(HarnessError::GreetingMissing {
            logs: run.logs.clone(),
        });
    }

    Ok(report)
}

fn check_fields(report: &ArtifactReport, logs: &str) -> Result<(), HarnessError> {
    if report.status != EXPECTED_STATUS {
        return Err(HarnessError::field_mismatch(
            "status",
            EXPECTED_STATUS,
            &report.status,
            logs,
        ));
    }
    if !report.python.starts_with(EXPECTED_PYTHON_PREFIX) {
        return Err(HarnessError::field_mismatch(
            "python",
            "3.*",
            &report.python,
            logs,
        ));
    }
    let workflow = report.env.get(WORKFLOW_ENV_KEY).map_or("<unset>", String::as_str);
    if workflow != EXPECTED_WORKFLOW {
        return Err(HarnessError::field_mismatch(
            "env.GITHUB_WORKFLOW",
            EXPECTED_WORKFLOW,
            workflow,
            logs,
        ));
    }
    Ok(())
}
