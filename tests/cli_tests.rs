mod common;

use common::Fixture;
use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn cli(fixture: &Fixture) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_churn-scoring"));
    command
        .current_dir(fixture.path(""))
        .arg("--config")
        .arg(fixture.config())
        .env_remove("RUST_LOG");
    command
}

fn run_with_arg(fixture: &Fixture, input: &str) -> Output {
    cli(fixture)
        .arg(input)
        .stdin(Stdio::null())
        .output()
        .expect("Failed to run binary")
}

fn run_with_stdin(mut command: Command, stdin: &[u8]) -> Output {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn binary");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin)
        .expect("Failed to write stdin");
    child.wait_with_output().expect("Failed to wait for binary")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn test_no_input_is_usage_error() {
    let fixture = Fixture::with_standard_artifacts();
    let output = cli(&fixture)
        .stdin(Stdio::null())
        .output()
        .expect("Failed to run binary");

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_invalid_json_prints_error_envelope() {
    let fixture = Fixture::with_standard_artifacts();
    let output = run_with_arg(&fixture, "{bad");

    assert_eq!(output.status.code(), Some(1));
    let body = stdout_json(&output);
    let error = body["error"].as_str().expect("error is a string");
    assert!(error.starts_with("Invalid JSON input"), "{error}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: Invalid JSON input"));
}

#[test]
fn test_missing_artifacts_exit_with_error() {
    let fixture = Fixture::new();
    let output = run_with_arg(&fixture, r#"{"Age": 40}"#);

    assert_eq!(output.status.code(), Some(1));
    let error = stdout_json(&output)["error"].as_str().unwrap().to_string();
    assert!(error.contains("Scaler file not found"), "{error}");
}

#[test]
fn test_single_record_from_argument() {
    let fixture = Fixture::with_standard_artifacts();
    let output = run_with_arg(
        &fixture,
        r#"{"customer_data": {"Days_Since_Last_Transaction": 200, "Complaint_History": 3}, "include_shap": true}"#,
    );

    assert_eq!(output.status.code(), Some(0));
    let body = stdout_json(&output);
    assert!((body["churn_probability"].as_f64().unwrap() - 0.775).abs() < 1e-9);
    assert_eq!(body["risk_level"], "high");
    assert_eq!(body["shap_values"].as_array().map(Vec::len), Some(10));
}

#[test]
fn test_piped_stdin_takes_precedence_over_argument() {
    let fixture = Fixture::with_standard_artifacts();
    let mut command = cli(&fixture);
    command.arg("{bad");

    let record = json!({"Days_Since_Last_Transaction": 5, "Complaint_History": 0});
    let output = run_with_stdin(command, record.to_string().as_bytes());

    assert_eq!(output.status.code(), Some(0));
    let body = stdout_json(&output);
    assert!((body["churn_probability"].as_f64().unwrap() - 0.15).abs() < 1e-9);
    assert_eq!(body["risk_level"], "low");
}

#[test]
fn test_blank_stdin_falls_back_to_argument() {
    let fixture = Fixture::with_standard_artifacts();
    let mut command = cli(&fixture);
    command.arg(r#"{"Account_Type": "Savings"}"#);

    let output = run_with_stdin(command, b"  \n");

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["churn_score"], 0.0);
}

#[test]
fn test_non_utf8_stdin_is_input_error() {
    let fixture = Fixture::with_standard_artifacts();
    let output = run_with_stdin(cli(&fixture), &[0xff, 0xfe, b'{', b'}']);

    assert_eq!(output.status.code(), Some(1));
    let error = stdout_json(&output)["error"].as_str().unwrap().to_string();
    assert!(error.contains("UTF-8"), "{error}");
}

#[test]
fn test_batch_envelope() {
    let fixture = Fixture::with_standard_artifacts();
    let output = run_with_arg(
        &fixture,
        r#"[
            {"customer_id": "A", "Days_Since_Last_Transaction": 200, "Complaint_History": 2},
            {"customer_id": "B", "Account_Type": "Savings"}
        ]"#,
    );

    assert_eq!(output.status.code(), Some(0));
    let body = stdout_json(&output);
    let predictions = body["predictions"].as_array().expect("predictions array");
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0]["customer_id"], "A");
    assert_eq!(predictions[1]["customer_id"], "B");
    assert_eq!(body["summary"]["total"], 2);
    assert_eq!(body["summary"]["successful"], 2);
    assert_eq!(body["summary"]["by_risk_level"]["high"], 1);
}
