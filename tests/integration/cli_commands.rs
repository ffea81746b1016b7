#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const AGE_LOG: &str = r#"# two writes to the same property slot
{"element":{"kind":"vertex","id":"v1"},"slot":{"slot":"existence"},"timestamp":1,"payload":{"type":"create_element"}}
{"element":{"kind":"vertex","id":"v1"},"slot":{"slot":"property","key":"k1","name":"age"},"timestamp":100,"payload":{"type":"add_property_value","value":{"int":30}}}

{"element":{"kind":"vertex","id":"v1"},"slot":{"slot":"property","key":"k1","name":"age"},"timestamp":200,"payload":{"type":"add_property_value","value":{"int":31}}}
{"element":{"kind":"vertex","id":"v1"},"slot":{"slot":"property","key":"k2","name":"ssn"},"timestamp":150,"visibility":"pii","payload":{"type":"add_property_value","value":{"str":"123"}}}
"#;

struct Workspace {
    _dir: TempDir,
    log: PathBuf,
    config: PathBuf,
}

fn workspace(contents: &str) -> Workspace {
    let dir = TempDir::new().expect("tempdir");
    let log = dir.path().join("records.jsonl");
    fs::write(&log, contents).expect("write records");
    let config = dir.path().join("cli.toml");
    Workspace {
        _dir: dir,
        log,
        config,
    }
}

fn run_json(config: &Path, args: &[&str]) -> Value {
    let output = cargo_bin_cmd!("strata")
        .env_remove("STRATA_LOG")
        .arg("--config")
        .arg(config)
        .args(["--format", "json", "--theme", "plain"])
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("json output")
}

fn run_text(config: &Path, args: &[&str]) -> String {
    let output = cargo_bin_cmd!("strata")
        .env_remove("STRATA_LOG")
        .arg("--config")
        .arg(config)
        .args(["--theme", "plain"])
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(output).expect("utf8")
}

#[test]
fn parse_prints_canonical_form() {
    let ws = workspace("");
    let json = run_json(&ws.config, &["parse", "(a&b)|\"c d\""]);
    assert_eq!(json["canonical"], "(a&b)|\"c d\"");
    assert_eq!(json["tokens"], serde_json::json!(["a", "b", "c d"]));
}

#[test]
fn parse_failure_exits_nonzero() {
    let ws = workspace("");
    let output = cargo_bin_cmd!("strata")
        .arg("--config")
        .arg(&ws.config)
        .args(["parse", "a&b|c"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).unwrap();
    assert!(stderr.contains("position 3"), "stderr: {stderr}");
}

#[test]
fn eval_uses_flag_then_config_auths() {
    let ws = workspace("");
    assert_eq!(run_text(&ws.config, &["eval", "a&b", "--auths", "a,b"]).trim(), "visible");
    assert_eq!(run_text(&ws.config, &["eval", "a&b", "--auths", "a"]).trim(), "not visible");

    fs::write(&ws.config, "default_auths = [\"a\", \"b\"]\n").unwrap();
    let json = run_json(&ws.config, &["eval", "a&b"]);
    assert_eq!(json["visible"], true);
    assert_eq!(json["auths"], serde_json::json!(["a", "b"]));
}

#[test]
fn fold_reports_latest_visible_state() {
    let ws = workspace(AGE_LOG);
    let log = ws.log.to_str().unwrap();
    let json = run_json(&ws.config, &["fold", log]);
    let state = &json[0];
    assert_eq!(state["status"], "live");
    let props = state["properties"].as_array().unwrap();
    assert_eq!(props.len(), 1);
    assert_eq!(props[0]["value"], serde_json::json!({"int": 31}));

    let json = run_json(&ws.config, &["fold", log, "--auths", "pii", "--as-of", "150"]);
    let names: Vec<_> = json[0]["properties"]
        .as_array()
        .unwrap()
        .iter()
        .map(|prop| prop["name"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, ["age", "ssn"]);
    assert_eq!(json[0]["properties"][0]["value"], serde_json::json!({"int": 30}));
}

#[test]
fn fold_text_output_lists_properties() {
    let ws = workspace(AGE_LOG);
    let text = run_text(&ws.config, &["fold", ws.log.to_str().unwrap()]);
    assert!(text.contains("vertex:v1 (live)"), "output: {text}");
    assert!(text.contains("k1:age: 31"), "output: {text}");
}

#[test]
fn history_filters_and_annotates() {
    let ws = workspace(AGE_LOG);
    let log = ws.log.to_str().unwrap();
    let json = run_json(&ws.config, &["history", log]);
    let stamps: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|event| event["timestamp"].as_i64().unwrap())
        .collect();
    assert_eq!(stamps, [1, 100, 200]);

    let json = run_json(&ws.config, &["history", log, "--all", "--desc", "--limit", "3"]);
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["event"]["timestamp"], 200);
    assert_eq!(entries[1]["event"]["timestamp"], 150);
    assert_eq!(entries[1]["visible"], false);
}

#[test]
fn unsequenced_lines_number_after_explicit_sequences() {
    let ws = workspace(
        r#"{"element":{"kind":"vertex","id":"v1"},"slot":{"slot":"existence"},"timestamp":1,"payload":{"type":"create_element"}}
{"element":{"kind":"vertex","id":"v1"},"slot":{"slot":"property","key":"k1","name":"age"},"timestamp":5,"sequence":2,"payload":{"type":"add_property_value","value":{"int":1}}}
{"element":{"kind":"vertex","id":"v1"},"slot":{"slot":"property","key":"k1","name":"age"},"timestamp":5,"payload":{"type":"add_property_value","value":{"int":2}}}
"#,
    );
    let log = ws.log.to_str().unwrap();
    let json = run_json(&ws.config, &["history", log]);
    let sequences: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .filter(|event| event["timestamp"] == 5)
        .map(|event| event["sequence"].as_u64().unwrap())
        .collect();
    assert_eq!(sequences.len(), 2);
    assert_eq!(sequences[0], 2);
    assert!(sequences[1] > 2, "sequences: {sequences:?}");

    let json = run_json(&ws.config, &["fold", log]);
    assert_eq!(json[0]["properties"][0]["value"], serde_json::json!({"int": 2}));
}

#[test]
fn encode_then_decode_round_trips_through_hex() {
    let ws = workspace(AGE_LOG);
    let json = run_json(&ws.config, &["encode", ws.log.to_str().unwrap()]);
    let frames = json.as_array().unwrap();
    assert_eq!(frames.len(), 4);
    let second = frames[1].as_str().unwrap();
    assert!(second.starts_with("014d"), "record frame: {second}");

    let decoded = run_json(&ws.config, &["decode", second]);
    assert_eq!(decoded["frame"], "record");
    assert_eq!(decoded["value"]["timestamp"], 100);
    assert_eq!(decoded["value"]["sequence"], 2);

    let payload = run_json(&ws.config, &["decode", "0102"]);
    assert_eq!(payload["frame"], "payload");
    assert_eq!(payload["value"]["type"], "delete_property");
}

#[test]
fn malformed_record_line_names_the_line() {
    let ws = workspace("{\"element\":{\"kind\":\"vertex\",\"id\":\"v1\"}}\n");
    let output = cargo_bin_cmd!("strata")
        .arg("--config")
        .arg(&ws.config)
        .args(["fold", ws.log.to_str().unwrap()])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).unwrap();
    assert!(stderr.contains("records.jsonl:1"), "stderr: {stderr}");
}
