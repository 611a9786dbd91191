//! Deterministic stand-in for the act workflow emulator
//!
//! Accepts the slice of act's CLI surface the harness drives and replays a
//! canned selftest job: a result artifact plus structured log lines.
//! Behaviour is steered through `STUB_ACT_*` environment variables so the
//! integration suite can provoke each failure mode without the real tool.

use clap::{Arg, ArgAction, Command};
use serde_json::json;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

fn main() {
    match run() {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("stub-act: {e}");
            process::exit(2);
        }
    }
}

fn run() -> Result<i32, anyhow::Error> {
    let matches = Command::new("stub-act")
        .version("0.1.0")
        .about("Deterministic stand-in for the act workflow emulator")
        .arg(
            Arg::new("event")
                .value_name("EVENT")
                .help("Event type that triggers the workflow")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("job")
                .short('j')
                .long("job")
                .value_name("JOB")
                .help("Workflow job to run")
                .num_args(1),
        )
        .arg(
            Arg::new("eventpath")
                .short('e')
                .long("eventpath")
                .value_name("FILE")
                .help("Path to the event payload fixture")
                .num_args(1),
        )
        .arg(
            Arg::new("platform")
                .short('P')
                .long("platform")
                .value_name("MAPPING")
                .help("Runner-label to container-image binding")
                .num_args(1),
        )
        .arg(
            Arg::new("artifact-server-path")
                .long("artifact-server-path")
                .value_name("DIR")
                .help("Directory artifacts are collected under")
                .num_args(1),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit structured JSON logs")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .help("Bind the working directory instead of copying")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    if let Ok(secs) = env::var("STUB_ACT_SLEEP_SECS") {
        thread::sleep(Duration::from_secs(secs.parse()?));
    }

    let event = matches.get_one::<String>("event").expect("required arg");
    let job = matches
        .get_one::<String>("job")
        .map_or("selftest", String::as_str);

    if let Some(event_path) = matches.get_one::<String>("eventpath") {
        if !PathBuf::from(event_path).is_file() {
            anyhow::bail!("event payload {event_path} not found");
        }
    }

    emit_logs(event, job);

    if env::var_os("STUB_ACT_SKIP_ARTIFACT").is_none() {
        if let Some(artifact_root) = matches.get_one::<String>("artifact-server-path") {
            write_artifact(artifact_root, event)?;
        }
    }

    match env::var("STUB_ACT_EXIT") {
        Ok(code) => Ok(code.parse()?),
        Err(_) => Ok(0),
    }
}

/// Replays the log shape act produces with `--json`: structured lines mixed
/// with plain runner chatter on both streams.
fn emit_logs(event: &str, job: &str) {
    println!("[{job}] using event {event}");
    println!(
        "{}",
        json!({ "level": "info", "message": format!("starting job {job}") })
    );
    eprintln!(
        "{}",
        json!({ "level": "debug", "message": "artifact server listening" })
    );
    if env::var_os("STUB_ACT_OMIT_GREETING").is_none() {
        println!("{}", json!({ "Output": "Hello from workflow selftest" }));
    }
    println!("{}", json!({ "level": "info", "message": format!("job {job} finished") }));
}

fn write_artifact(artifact_root: &str, event: &str) -> Result<(), anyhow::Error> {
    let result_dir = PathBuf::from(artifact_root).join("result0");
    fs::create_dir_all(&result_dir)?;
    let body = match env::var("STUB_ACT_ARTIFACT_JSON") {
        Ok(raw) => raw,
        Err(_) => json!({
            "status": "ok",
            "python": "3.12.1",
            "env": {
                "GITHUB_WORKFLOW": "workflow-selftest",
                "GITHUB_EVENT_NAME": event,
            },
        })
        .to_string(),
    };
    fs::write(result_dir.join("result.json"), body)?;
    Ok(())
}
