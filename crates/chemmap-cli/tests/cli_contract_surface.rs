// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn chemmap() -> Command {
    let mut cmd = Command::cargo_bin("chemmap").expect("chemmap binary");
    cmd.env_remove("CHEMMAP_LOG_LEVEL");
    cmd.env_remove("CHEMMAP_CACHE_DIR");
    cmd
}

fn parse_commands_from_help(text: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut in_commands = false;
    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed == "Commands:" {
            in_commands = true;
            continue;
        }
        if in_commands {
            if trimmed.is_empty() {
                break;
            }
            let name = trimmed.split_whitespace().next().unwrap_or("");
            if !name.is_empty() && name != "help" {
                commands.push(name.to_string());
            }
        }
    }
    commands.sort();
    commands
}

#[test]
fn help_lists_the_command_surface() {
    let output = chemmap().arg("--help").output().expect("run help");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8 help");
    assert_eq!(
        parse_commands_from_help(&text),
        vec!["completion", "convert-log", "map"]
    );
    assert!(text.contains("CHEMMAP_LOG_LEVEL"));
}

#[test]
fn unknown_flag_returns_usage_exit_code_with_machine_error() {
    let output = chemmap()
        .args(["--json", "--unknown-flag"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    let payload: serde_json::Value = serde_json::from_str(stderr.trim()).expect("json error");
    assert_eq!(payload["code"], "usage_error");
}

#[test]
fn mismatched_lists_fail_before_any_output() {
    let root = tempfile::tempdir().expect("tempdir");
    let output = chemmap()
        .args(["--json", "map", "--datasets"])
        .arg(fixture("alcohols.csv"))
        .arg(fixture("aromatics.csv"))
        .args(["--legends", "Alcohols", "--colors", "red", "blue"])
        .arg("--output-root")
        .arg(root.path())
        .output()
        .expect("run map");
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    let payload: serde_json::Value = serde_json::from_str(stderr.trim()).expect("json error");
    assert_eq!(payload["code"], "validation_error");
    assert!(payload["message"]
        .as_str()
        .is_some_and(|m| m.contains("Mismatch")));
    assert_eq!(fs::read_dir(root.path()).expect("read root").count(), 0);
}

#[test]
fn map_writes_images_cache_and_log() {
    let root = tempfile::tempdir().expect("tempdir");
    let output = chemmap()
        .args(["--json", "map", "--datasets"])
        .arg(fixture("alcohols.csv"))
        .arg(fixture("aromatics.csv"))
        .args(["--legends", "Alcohols", "Aromatics"])
        .args(["--colors", "red", "#1f77b4"])
        .args(["--deterministic", "--n-neighbors", "4", "--n-epochs", "20"])
        .args(["--image-size", "200", "--workers", "2"])
        .arg("--output-root")
        .arg(root.path())
        .output()
        .expect("run map");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["report"]["images"].as_array().map(Vec::len), Some(8));

    let out_dir = PathBuf::from(payload["output_dir"].as_str().expect("output dir"));
    assert!(out_dir
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("output_")));
    for name in [
        "umap_alcohols.png",
        "umap_aromatics.tiff",
        "umap_overlay_alcohols_aromatics.png",
        "umap_overlay_aromatics_alcohols.tiff",
        "fp_alcohols.bin",
        "fp_aromatics.bin",
        "umap_combined.csv",
        "log.txt",
    ] {
        assert!(out_dir.join(name).exists(), "missing {name}");
    }
    let log = fs::read_to_string(out_dir.join("log.txt")).expect("log");
    assert!(log.contains("generating fingerprints"));
    let csv = fs::read_to_string(out_dir.join("umap_combined.csv")).expect("csv");
    assert_eq!(csv.lines().next(), Some("Component1,Component2"));
    assert_eq!(csv.lines().count(), 1 + 13);
}

#[test]
fn convert_log_writes_solved_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("scores.csv");
    let output = chemmap()
        .args(["--json", "convert-log", "--input"])
        .arg(fixture("aizynth.log"))
        .arg("--output")
        .arg(&out)
        .output()
        .expect("run convert-log");
    assert!(output.status.success());
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("json summary");
    assert_eq!(payload["parsed"], 4);
    assert_eq!(payload["empty_smiles"], 1);
    assert_eq!(
        fs::read_to_string(&out).expect("csv"),
        "SMILES,Solved_with_AiZynthFinder\n\
         CC(=O)Oc1ccccc1C(=O)O,True\n\
         CN1C=NC2=C1C(=O)N(C(=O)N2C)C,False\n\
         ,True\n\
         c1ccncc1,True\n"
    );
}

#[test]
fn missing_log_is_a_dependency_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = chemmap()
        .args(["convert-log", "--input"])
        .arg(dir.path().join("absent.log"))
        .arg("--output")
        .arg(dir.path().join("out.csv"))
        .output()
        .expect("run convert-log");
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn bash_completion_names_the_binary() {
    let output = chemmap().args(["completion", "bash"]).output().expect("run");
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).expect("utf8 completion");
    assert!(text.contains("chemmap"));
    assert!(text.contains("convert-log"));
}
