#![allow(deprecated)]

use assert_cmd::Command;
use predicates::str::contains;

const QUERY: &str = "0.18,0.45,0.08,0.58,0.27,0.50,0.08,0.15";

fn demo_corpus() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos/corpus.json").to_string()
}

fn hybrid_search(cwd: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("hybrid-search").expect("binary");
    cmd.current_dir(cwd)
        .env_remove("HYBRID_BACKEND")
        .env_remove("HYBRID_LOG_JSON")
        .env_remove("HYBRID_VECTOR_DIM")
        .env("HYBRID_CORPUS_PATH", demo_corpus());
    cmd
}

#[test]
fn multi_path_prints_fused_scores() {
    let tmp = tempfile::tempdir().expect("tempdir");

    hybrid_search(tmp.path())
        .args(["multi-path", "--vector", QUERY, "--keywords", "checklist security"])
        .assert()
        .success()
        .stdout(contains("doc_id=3"))
        .stdout(contains("title=\"Security review checklist\""))
        .stdout(contains("fused="));
}

#[test]
fn fusion_returns_three_results_by_default() {
    let tmp = tempfile::tempdir().expect("tempdir");

    let output = hybrid_search(tmp.path())
        .args(["fusion", "--vector", QUERY, "--keywords", "latency tuning"])
        .output()
        .expect("run");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(stdout.lines().filter(|l| l.starts_with("- doc_id=")).count(), 3);
}

#[test]
fn filtered_json_output_respects_metadata() {
    let tmp = tempfile::tempdir().expect("tempdir");

    let output = hybrid_search(tmp.path())
        .args([
            "--json",
            "filtered",
            "--vector",
            QUERY,
            "--topic",
            "infrastructure",
            "--audience",
            "engineers",
        ])
        .output()
        .expect("run");

    assert!(output.status.success());
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let results = results.as_array().expect("array");
    assert_eq!(results.len(), 3);
    for r in results {
        assert_eq!(r["topic"], "infrastructure");
        assert_eq!(r["audience"], "engineers");
    }
}

#[test]
fn config_file_overrides_defaults() {
    let tmp = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        tmp.path().join("hybrid-search.toml"),
        "[single_query]\nshortlist = 4\nfinal_size = 1\n",
    )
    .expect("write config");

    let output = hybrid_search(tmp.path())
        .args(["fusion", "--vector", QUERY, "--keywords", "latency"])
        .output()
        .expect("run");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(stdout.lines().filter(|l| l.starts_with("- doc_id=")).count(), 1);
}

#[test]
fn wrong_dimension_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");

    hybrid_search(tmp.path())
        .args(["multi-path", "--vector", "0.1,0.2", "--keywords", "latency"])
        .assert()
        .failure()
        .stderr(contains("invalid query"));
}

#[test]
fn missing_corpus_is_a_configuration_error() {
    let tmp = tempfile::tempdir().expect("tempdir");

    Command::cargo_bin("hybrid-search")
        .expect("binary")
        .current_dir(tmp.path())
        .env_remove("HYBRID_CORPUS_PATH")
        .env_remove("HYBRID_BACKEND")
        .args(["fusion", "--vector", QUERY])
        .assert()
        .failure()
        .stderr(contains("corpus_path"));
}

#[test]
fn load_checks_memory_corpus() {
    let tmp = tempfile::tempdir().expect("tempdir");

    hybrid_search(tmp.path())
        .args(["load"])
        .assert()
        .success()
        .stdout(contains("corpus ok: 10 documents, dimension 8"));
}

#[test]
fn load_accepts_corpus_flag_without_configured_path() {
    let tmp = tempfile::tempdir().expect("tempdir");

    Command::cargo_bin("hybrid-search")
        .expect("binary")
        .current_dir(tmp.path())
        .env_remove("HYBRID_CORPUS_PATH")
        .env_remove("HYBRID_BACKEND")
        .args(["load", "--corpus", &demo_corpus()])
        .assert()
        .success()
        .stdout(contains("corpus ok: 10 documents"));
}

#[test]
fn vector_with_empty_component_is_a_parse_error() {
    let tmp = tempfile::tempdir().expect("tempdir");

    hybrid_search(tmp.path())
        .args(["filtered", "--vector", "0.1,,0.2"])
        .assert()
        .failure()
        .stderr(contains("component 2 is empty"));
}
