//! Integration tests driving the harness against the stub emulator
//! Covers the full invoke-then-validate procedure for every failure mode

use actest::{validate, HarnessError, RunRequest, TIMEOUT_EXIT_CODE};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const STUB_BINARY: &str = env!("CARGO_BIN_EXE_stub-act");

fn stub_request(tmp: &TempDir) -> RunRequest {
    RunRequest::new(tmp.path().join("act-artifacts"))
}

fn run_stub(request: &RunRequest) -> actest::RunResult {
    request
        .run(Path::new(STUB_BINARY))
        .expect("stub emulator should be invocable")
}

#[test]
fn test_workflow_produces_expected_artifact_and_logs() {
    let tmp = TempDir::new().unwrap();
    let run = run_stub(&stub_request(&tmp));

    assert_eq!(run.code, 0, "stub failed:\n{}", run.logs);
    let report = validate(&run).unwrap_or_else(|err| panic!("{err}"));
    assert_eq!(report.status, "ok");
    assert!(report.python.starts_with("3."), "{}", report.python);
    assert_eq!(
        report.env.get("GITHUB_WORKFLOW").map(String::as_str),
        Some("workflow-selftest")
    );
}

#[test]
fn test_failed_run_surfaces_exit_code_and_logs() {
    let tmp = TempDir::new().unwrap();
    let mut request = stub_request(&tmp);
    request
        .extra_env
        .push(("STUB_ACT_EXIT".to_string(), "3".to_string()));

    let run = run_stub(&request);
    assert_eq!(run.code, 3);
    match validate(&run).unwrap_err() {
        HarnessError::RunFailed { code, logs } => {
            assert_eq!(code, 3);
            assert!(logs.contains("starting job selftest"), "{logs}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_artifact_is_reported_with_logs() {
    let tmp = TempDir::new().unwrap();
    let mut request = stub_request(&tmp);
    request
        .extra_env
        .push(("STUB_ACT_SKIP_ARTIFACT".to_string(), "1".to_string()));

    let err = validate(&run_stub(&request)).unwrap_err();
    match err {
        HarnessError::ArtifactMissing { logs, .. } => {
            assert!(logs.contains("job selftest finished"), "{logs}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_malformed_artifact_is_a_hard_failure() {
    let tmp = TempDir::new().unwrap();
    let mut request = stub_request(&tmp);
    request
        .extra_env
        .push(("STUB_ACT_ARTIFACT_JSON".to_string(), "{status: ok".to_string()));

    let err = validate(&run_stub(&request)).unwrap_err();
    assert!(matches!(err, HarnessError::ArtifactInvalid { .. }), "{err}");
}

#[test]
fn test_status_mismatch_names_expected_and_actual() {
    let tmp = TempDir::new().unwrap();
    let mut request = stub_request(&tmp);
    request.extra_env.push((
        "STUB_ACT_ARTIFACT_JSON".to_string(),
        r#"{"status":"failed","python":"3.12.1","env":{"GITHUB_WORKFLOW":"workflow-selftest"}}"#
            .to_string(),
    ));

    match validate(&run_stub(&request)).unwrap_err() {
        HarnessError::FieldMismatch {
            field,
            expected,
            actual,
            ..
        } => {
            assert_eq!(field, "status");
            assert_eq!(expected, "ok");
            assert_eq!(actual, "failed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_wrong_workflow_identifier_fails_validation() {
    let tmp = TempDir::new().unwrap();
    let mut request = stub_request(&tmp);
    request.extra_env.push((
        "STUB_ACT_ARTIFACT_JSON".to_string(),
        r#"{"status":"ok","python":"3.12.1","env":{"GITHUB_WORKFLOW":"other"}}"#.to_string(),
    ));

    let err = validate(&run_stub(&request)).unwrap_err();
    assert!(
        matches!(err, HarnessError::FieldMismatch { ref field, .. } if field == "env.GITHUB_WORKFLOW"),
        "{err}"
    );
}

#[test]
fn test_omitted_greeting_fails_validation() {
    let tmp = TempDir::new().unwrap();
    let mut request = stub_request(&tmp);
    request
        .extra_env
        .push(("STUB_ACT_OMIT_GREETING".to_string(), "1".to_string()));

    let err = validate(&run_stub(&request)).unwrap_err();
    assert!(matches!(err, HarnessError::GreetingMissing { .. }), "{err}");
}

#[test]
fn test_timeout_returns_distinguished_sentinel() {
    let tmp = TempDir::new().unwrap();
    let mut request = stub_request(&tmp);
    request.timeout = Duration::from_secs(1);
    request
        .extra_env
        .push(("STUB_ACT_SLEEP_SECS".to_string(), "30".to_string()));

    let run = run_stub(&request);
    assert_eq!(run.code, TIMEOUT_EXIT_CODE);
    assert!(run.logs.starts_with("act timed out after 1s"), "{}", run.logs);

    let err = validate(&run).unwrap_err();
    assert!(
        matches!(err, HarnessError::RunFailed { code, .. } if code == TIMEOUT_EXIT_CODE),
        "{err}"
    );
}

#[test]
fn test_reruns_with_fresh_artifact_dirs_are_equivalent() {
    let first_tmp = TempDir::new().unwrap();
    let second_tmp = TempDir::new().unwrap();

    let first = validate(&run_stub(&stub_request(&first_tmp))).unwrap();
    let second = validate(&run_stub(&stub_request(&second_tmp))).unwrap();
    assert_eq!(first, second);
}
