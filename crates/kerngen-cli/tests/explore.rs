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

fn explore(workers: &str) -> Value {
    let (json, code) = run_json(&[
        "explore",
        "tests/cases/three_loops.ir.json",
        "--candidates",
        "tests/cases/setup.candidates.json",
        "--workers",
        workers,
    ]);
    assert_eq!(code, 0);
    json
}

#[test]
fn candidates_are_reported_in_order() {
    let json = explore("4");
    assert_eq!(json["status"], "pass");
    let entries = json["candidates"].as_array().expect("candidates");
    assert_eq!(entries.len(), 2);

    let setup = &entries[0];
    assert_eq!(setup["invoke"], "invoke_setup");
    assert_eq!(setup["applied"], 4);
    assert_eq!(setup["distinct"], 4);
    let outcomes = setup["outcomes"].as_array().expect("outcomes");
    let labels: Vec<&str> = outcomes
        .iter()
        .map(|o| o["label"].as_str().expect("label"))
        .collect();
    assert_eq!(
        labels,
        vec!["fuse_01", "fuse_12", "par_0", "move_back", "missing", "region"]
    );

    assert_eq!(outcomes[0]["statements"], 2);
    assert_eq!(outcomes[2]["statements"], 3);
    assert_eq!(outcomes[3]["status"], "refused");
    assert_eq!(outcomes[3]["refusal"]["kind"], "conflict");
    assert_eq!(outcomes[4]["refusal"]["kind"], "invalid_target");
    assert!(outcomes[4].get("fingerprint").is_none());
    assert_eq!(outcomes[5]["status"], "applied");

    let norm = &entries[1];
    assert_eq!(norm["invoke"], "invoke_norm");
    assert!(norm["outcomes"].as_array().expect("outcomes").is_empty());
}

#[test]
fn worker_count_does_not_change_results() {
    let strip = |json: &Value| {
        json["candidates"][0]["outcomes"]
            .as_array()
            .expect("outcomes")
            .iter()
            .map(|o| (o["label"].clone(), o["fingerprint"].clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&explore("1")), strip(&explore("3")));
}

#[test]
fn text_output_lists_candidates() {
    cargo_bin_cmd!("kerngen")
        .current_dir(repo_root())
        .args([
            "explore",
            "tests/cases/three_loops.ir.json",
            "--candidates",
            "tests/cases/setup.candidates.json",
            "--format",
            "text",
        ])
        .assert()
        .success()
        .stdout(contains("invoke invoke_setup: 4 applied, 4 distinct"))
        .stdout(contains("  move_back: refused [conflict]"))
        .stdout(contains("  fuse_01: applied statements=2"));
}

#[test]
fn catalog_lists_transformations() {
    let (json, code) = run_json(&["catalog"]);
    assert_eq!(code, 0);
    assert!(json["inputs"].as_array().expect("inputs").is_empty());
    let names: Vec<&str> = json["transformations"]
        .as_array()
        .expect("transformations")
        .iter()
        .map(|t| t["name"].as_str().expect("name"))
        .collect();
    assert_eq!(
        names,
        vec![
            "fuse",
            "move",
            "offload_data_region",
            "offload_region",
            "parallelize",
            "tile"
        ]
    );
    assert_eq!(json["transformations"][5]["options"][0], "tile_size");
}
