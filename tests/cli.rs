use std::fs;

use assert_cmd::Command;
use tempfile::tempdir;

const TWO_TRIANGLES: &str = "# two triangles\n0 1\n1 2\n2 0\n3 4\n4 5\n5 3\n";

fn communities(json: &serde_json::Value) -> Vec<Vec<u64>> {
    json["communities"].as_array().unwrap()
        .iter()
        .map(|c| c.as_array().unwrap().iter().map(|v| v.as_u64().unwrap()).collect())
        .collect()
}

#[test]
fn test_cnm_to_stdout() {
    let dir = tempdir().unwrap();
    let edges = dir.path().join("edges.txt");
    fs::write(&edges, TWO_TRIANGLES).unwrap();

    let output = Command::cargo_bin("fast_community").unwrap()
        .arg(&edges)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(communities(&json), vec![vec![0, 1, 2], vec![3, 4, 5]]);
    assert!((json["modularity"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert_eq!(json["merges"], 4);
    assert!((json["partition_modularity"].as_f64().unwrap() - 0.5).abs() < 1e-9);
}

#[test]
fn test_cnm2_with_config_and_cache() {
    let dir = tempdir().unwrap();
    let edges = dir.path().join("edges.txt");
    let cache = dir.path().join("edges.fcdg");
    let config = dir.path().join("run.yaml");
    let out = dir.path().join("partition.json");
    fs::write(&edges, TWO_TRIANGLES).unwrap();
    fs::write(&config, "algorithm: cnm2\ninitial_scope: 4\n").unwrap();

    for _ in 0..2 {
        Command::cargo_bin("fast_community").unwrap()
            .arg(&edges)
            .arg("--config").arg(&config)
            .arg("--cache").arg(&cache)
            .arg("--output").arg(&out)
            .arg("--log-file").arg(dir.path().join("logs/run.log"))
            .assert()
            .success();
    }
    assert!(cache.exists());
    assert!(dir.path().join("logs/run.log").exists());

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(communities(&json), vec![vec![0, 1, 2], vec![3, 4, 5]]);
    assert!((json["modularity"].as_f64().unwrap() - 0.5).abs() < 1e-9);
}

#[test]
fn test_bad_input_fails() {
    let dir = tempdir().unwrap();
    let edges = dir.path().join("edges.txt");
    fs::write(&edges, "0 1\n1 x\n").unwrap();
    Command::cargo_bin("fast_community").unwrap()
        .arg(&edges)
        .assert()
        .failure();

    // No edges at all.
    fs::write(&edges, "# empty\n").unwrap();
    Command::cargo_bin("fast_community").unwrap()
        .arg(&edges)
        .assert()
        .failure();

    Command::cargo_bin("fast_community").unwrap()
        .arg(dir.path().join("missing.txt"))
        .assert()
        .failure();
}
