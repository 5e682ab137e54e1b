use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use serde_json::Value;
use std::path::PathBuf;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

fn run_json(args: &[&str]) -> (Value, i32) {
    let output = cargo_bin_cmd!("kerngen")
        .current_dir(repo_root())
        .args(args)
        .output()
        .expect("run kerngen");
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    let code = output.status.code().expect("exit code");
    (serde_json::from_str(&stdout).expect("parse json"), code)
}

#[test]
fn view_lists_every_invoke() {
    let (json, code) = run_json(&["view", "tests/cases/three_loops.ir.json"]);
    assert_eq!(code, 0);
    assert_eq!(json["status"], "pass");
    assert_eq!(json["invocation"]["command"], "view");
    let invokes = json["invokes"].as_array().expect("invokes");
    assert_eq!(invokes.len(), 2);
    assert_eq!(invokes[0]["invoke"], "invoke_setup");
    assert_eq!(invokes[1]["invoke"], "invoke_norm");

    let view = invokes[0]["view"].as_str().expect("view");
    assert!(view.starts_with("Schedule[invoke='invoke_setup']\n"));
    assert!(view.contains(
        "    Loop[type='outer', variable='cell', start='1', stop='ncells', step='1']\n"
    ));
    assert!(view.contains("        KernelCall[name='combine', args=[h:write, f:read, g:read]]\n"));

    let norm = invokes[1]["view"].as_str().expect("view");
    assert!(norm.contains("reductions=[total]"));
    assert!(norm.contains("    CodeBlock[fragment='print *, total']\n"));
}

#[test]
fn view_snapshot_carries_paths() {
    let (json, _) = run_json(&["view", "tests/cases/three_loops.ir.json"]);
    let snapshot = &json["invokes"][0]["snapshot"];
    assert_eq!(snapshot["node"], "schedule");
    assert_eq!(snapshot["path"], "");
    let loops = snapshot["children"].as_array().expect("children");
    assert_eq!(loops.len(), 3);
    assert_eq!(loops[2]["path"], "2");
    assert_eq!(loops[2]["node"], "loop");
    assert_eq!(loops[2]["children"][0]["path"], "2.0");
    assert_eq!(loops[2]["children"][0]["node"], "kernel_call");
}

#[test]
fn view_records_input_digest() {
    let (json, _) = run_json(&["view", "tests/cases/three_loops.ir.json"]);
    let inputs = json["inputs"].as_array().expect("inputs");
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0]["path"], "tests/cases/three_loops.ir.json");
    assert_eq!(inputs[0]["sha256"].as_str().expect("sha").len(), 64);
}

#[test]
fn unterminated_schedule_is_malformed() {
    let (json, code) = run_json(&["view", "tests/cases/unterminated.ir.json"]);
    assert_eq!(code, 2);
    assert_eq!(json["status"], "error");
    assert!(json.get("error").is_none());
    let broken = &json["invokes"][0];
    assert_eq!(broken["invoke"], "invoke_broken");
    assert_eq!(broken["status"], "error");
    assert_eq!(broken["error"]["kind"], "malformed_input");
    assert!(broken["error"]["message"]
        .as_str()
        .expect("message")
        .contains("end_scope"));
    assert!(broken.get("view").is_none());
}

#[test]
fn malformed_invoke_is_reported_next_to_the_others() {
    let (json, code) = run_json(&["view", "tests/cases/one_bad_invoke.ir.json"]);
    assert_eq!(code, 2);
    assert_eq!(json["status"], "error");
    let invokes = json["invokes"].as_array().expect("invokes");
    let summary: Vec<(&str, &str)> = invokes
        .iter()
        .map(|entry| {
            (
                entry["invoke"].as_str().expect("name"),
                entry["status"].as_str().expect("status"),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("invoke_setup", "pass"),
            ("invoke_bad", "error"),
            ("invoke_norm", "pass"),
        ]
    );
    assert_eq!(invokes[1]["error"]["kind"], "malformed_input");
    assert!(invokes[1]["error"]["message"]
        .as_str()
        .expect("message")
        .contains("empty body"));
    assert_eq!(invokes[0]["snapshot"]["children"].as_array().map(Vec::len), Some(2));
    assert!(invokes[2]["view"].as_str().expect("view").contains("sum_h"));
}

#[test]
fn missing_input_is_an_error() {
    let (json, code) = run_json(&["view", "tests/cases/missing.ir.json"]);
    assert_eq!(code, 2);
    assert_eq!(json["error"]["kind"], "invalid_input");
    assert_eq!(json["inputs"][0]["sha256"], "UNKNOWN");
}

#[test]
fn text_view_ends_with_summary() {
    cargo_bin_cmd!("kerngen")
        .current_dir(repo_root())
        .args(["view", "tests/cases/three_loops.ir.json", "--format", "text"])
        .assert()
        .success()
        .stdout(contains("Schedule[invoke='invoke_norm']"))
        .stdout(contains("status=pass exit_code=0"));
}

#[test]
fn broken_config_is_a_tool_error() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let config = dir.path().join("engine.json");
    std::fs::write(&config, "{ \"unknown_key\": true }").expect("write config");
    cargo_bin_cmd!("kerngen")
        .current_dir(repo_root())
        .args(["view", "tests/cases/three_loops.ir.json", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(contains("tool error: parse config"));
}
