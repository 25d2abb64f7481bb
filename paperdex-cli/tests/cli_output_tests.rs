//! stdout of the binary must stay machine-readable: logs and banners go to
//! stderr.

use paperdex_core::{PipelineConfig, SearchHit};
use std::process::{Command, Output};

fn paperdex(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_paperdex"))
        .args(args)
        .env("RUST_LOG", "info")
        .env_remove("GROBID_URL")
        .output()
        .expect("failed to run paperdex")
}

#[test]
fn show_config_stdout_is_loadable_yaml() {
    let output = paperdex(&["show-config"]);
    assert!(output.status.success());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, &output.stdout).unwrap();
    let config = PipelineConfig::load_from_file(&path).unwrap();
    assert_eq!(config.index.default_top_k, 3);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Using default config"));
}

#[test]
fn query_json_stdout_is_only_json() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("none.json");
    let output = paperdex(&[
        "query",
        "anything",
        "--json",
        "--index",
        index.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let hits: Vec<SearchHit> = serde_json::from_slice(&output.stdout).unwrap();
    assert!(hits.is_empty());

    // the "no index found" log line is still emitted, on stderr
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no index found"));
}
