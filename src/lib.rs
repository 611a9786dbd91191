//! Black-box validation of GitHub Actions workflows via act
//!
//! Re-exports the invocation and validation layers so tests drive the whole
//! procedure through one crate: build a [`RunRequest`], run it against the
//! emulator binary, and [`validate`] the captured [`RunResult`].

pub use actest_report::{
    ArtifactReport, HarnessError, RunResult, EXPECTED_PYTHON_PREFIX, EXPECTED_STATUS,
    EXPECTED_WORKFLOW, GREETING, RESULT_DIR_PREFIX, RESULT_FILE, WORKFLOW_ENV_KEY,
    find_result_files, logs_contain, parse_artifact, validate,
};
pub use actest_runner::{
    RunRequest, DEFAULT_EVENT, DEFAULT_JOB, DEFAULT_PLATFORM, DEFAULT_TIMEOUT, EMULATOR_BINARY,
    TIMEOUT_EXIT_CODE, emulator_path,
};
