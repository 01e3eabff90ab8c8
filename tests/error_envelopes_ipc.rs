use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradingd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradingd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    assert!(
        value["error"]["message"].as_str().is_some(),
        "missing message: {}",
        value
    );
    value["error"]["code"]
        .as_str()
        .expect("error code")
        .to_string()
}

#[test]
fn configuration_and_input_errors_use_distinct_codes() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let activities = json!([{ "activityId": "a", "totalPoints": 10, "componentType": "writtenWork" }]);

    let code = request_err(
        &mut stdin,
        &mut reader,
        "unconfigured",
        "grades.calculate",
        json!({ "config": { "system": "unconfigured" }, "activities": activities, "scores": {} }),
    );
    assert_eq!(code, "configuration_error");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "no-config",
        "grades.calculate",
        json!({ "activities": activities }),
    );
    assert_eq!(code, "configuration_error");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "bad-scale",
        "grades.calculate",
        json!({
            "config": { "system": "collegeGwa", "collegeNumericScale": "tenPoint" },
            "activities": activities,
        }),
    );
    assert_eq!(code, "configuration_error");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "bad-weight",
        "grades.shsInitial",
        json!({
            "weights": { "writtenWork": -0.1, "performanceTask": 0.5, "quarterlyAssessment": 0.6 },
            "activities": activities,
        }),
    );
    assert_eq!(code, "configuration_error");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "zero-points",
        "grades.calculate",
        json!({
            "config": { "system": "collegeGwa", "collegeNumericScale": "fivePoint" },
            "activities": [{ "activityId": "z", "totalPoints": 0, "creditUnits": 3 }],
            "scores": { "z": 1 },
        }),
    );
    assert_eq!(code, "invalid_input");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "out-of-range",
        "scales.formatCollege",
        json!({ "raw": 101.0, "scale": "fivePoint" }),
    );
    assert_eq!(code, "invalid_input");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_params_are_bad_params() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let config = json!({ "system": "collegeGwa", "collegeNumericScale": "fivePoint" });

    let code = request_err(
        &mut stdin,
        &mut reader,
        "no-activities",
        "grades.calculate",
        json!({ "config": config }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "string-score",
        "grades.calculate",
        json!({
            "config": config,
            "activities": [{ "activityId": "a", "totalPoints": 10, "creditUnits": 1 }],
            "scores": { "a": "ninety" },
        }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "no-weights",
        "grades.collegeTerm",
        json!({ "scale": "fivePoint", "activities": [] }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "no-raw",
        "scales.transmute",
        json!({}),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "no-students",
        "grades.teamReport",
        json!({ "config": config, "activities": [] }),
    );
    assert_eq!(code, "bad_params");

    drop(stdin);
    let _ = child.wait();
}
