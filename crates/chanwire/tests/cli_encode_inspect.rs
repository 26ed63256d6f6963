#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "chanwire-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn chanwire(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chanwire"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("chanwire should run")
}

fn json_lines(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("stdout line should be json"))
        .collect()
}

#[test]
fn encode_then_inspect_round_trips_fields() {
    let dir = unique_temp_dir("roundtrip");
    let encoded = chanwire(&[
        "--format", "json", "encode", "--service", "castle", "--arg1", "door", "--arg2", "key",
        "--arg3", "turn", "-H", "cn=mario", "-H", "as=plumber", "--id", "9", "--timeout",
        "250ms",
    ]);
    assert!(
        encoded.status.success(),
        "encode failed: {}",
        String::from_utf8_lossy(&encoded.stderr)
    );
    let summary = &json_lines(&encoded)[0];
    assert_eq!(summary["frames"], 1);
    assert_eq!(summary["endpoint"], "door");
    let hex = summary["hex"].as_str().expect("hex output");

    let hex_path = dir.join("frames.hex");
    std::fs::write(&hex_path, hex).expect("hex file should be writable");
    let inspected = chanwire(&[
        "--format",
        "json",
        "inspect",
        hex_path.to_str().expect("utf-8 path"),
        "--hex",
    ]);
    assert!(inspected.status.success());

    let frames = json_lines(&inspected);
    assert_eq!(frames.len(), 1);
    let frame = &frames[0];
    assert_eq!(frame["id"], 9);
    assert_eq!(frame["frame_type"], "call-request");
    assert_eq!(frame["ttl"], 250);
    assert_eq!(frame["service"], "castle");
    assert_eq!(frame["arg1"], "door");
    assert_eq!(frame["terminal"], true);
    assert_eq!(frame["headers"]["cn"], "mario");
    assert_eq!(frame["headers"]["as"], "plumber");
    assert!(frame["checksum"]
        .as_str()
        .is_some_and(|c| c.starts_with("crc32:")));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn small_frames_split_into_continuations() {
    let dir = unique_temp_dir("fragment");
    let out = dir.join("frames.bin");
    let body = "x".repeat(300);
    let encoded = chanwire(&[
        "--format",
        "json",
        "encode",
        "--service",
        "castle",
        "--arg1",
        "door",
        "--arg3",
        &body,
        "--max-frame-size",
        "128",
        "--out",
        out.to_str().expect("utf-8 path"),
    ]);
    assert!(encoded.status.success());
    let summary = &json_lines(&encoded)[0];
    assert!(summary.get("hex").is_none());
    let count = summary["frames"].as_u64().expect("frame count");
    assert!(count > 2, "expected several frames, got {count}");

    let inspected = chanwire(&[
        "--format",
        "json",
        "inspect",
        out.to_str().expect("utf-8 path"),
    ]);
    assert!(inspected.status.success());
    let frames = json_lines(&inspected);
    assert_eq!(frames.len() as u64, count);
    assert_eq!(frames[0]["frame_type"], "call-request");
    assert_eq!(frames[0]["terminal"], false);
    for frame in &frames[1..] {
        assert_eq!(frame["frame_type"], "call-request-cont");
        assert!(frame["size"].as_u64().expect("size") <= 128);
    }
    assert_eq!(frames[frames.len() - 1]["terminal"], true);

    let limited = chanwire(&[
        "--format",
        "json",
        "inspect",
        out.to_str().expect("utf-8 path"),
        "--count",
        "1",
    ]);
    assert_eq!(json_lines(&limited).len(), 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn inspect_rejects_unknown_frame_type() {
    let dir = unique_temp_dir("badtype");
    let path = dir.join("bad.hex");
    // 16-byte header, type 0x99
    std::fs::write(&path, "0010990000000001 0000000000000000").expect("writable");
    let output = chanwire(&["inspect", path.to_str().expect("utf-8 path"), "--hex"]);
    assert_eq!(output.status.code(), Some(60));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn inspect_reports_truncated_input() {
    let dir = unique_temp_dir("truncated");
    let path = dir.join("short.hex");
    std::fs::write(&path, "0020030000000001").expect("writable");
    let output = chanwire(&["inspect", path.to_str().expect("utf-8 path"), "--hex"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connection closed"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn encode_rejects_malformed_header() {
    let output = chanwire(&["encode", "--service", "castle", "-H", "nope"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = chanwire(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("chanwire "));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
