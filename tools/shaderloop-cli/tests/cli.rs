use std::path::Path;
use std::process::{Command, Output};

fn shaderloop(args: &[&str]) -> Output {
    let home = tempfile::tempdir().unwrap();
    shaderloop_in(home.path(), args)
}

fn shaderloop_in(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shaderloop"))
        .args(args)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("RUST_LOG")
        .current_dir(home)
        .output()
        .unwrap()
}

#[test]
fn presets_lists_every_builtin_resolution() {
    let out = shaderloop(&["presets"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    for dims in ["2560x1440", "1920x1080", "3440x1440", "1080x1920", "900x1600"] {
        assert!(stdout.contains(dims), "missing {dims} in {stdout}");
    }
}

#[test]
fn render_without_resolution_is_usage_error() {
    let out = shaderloop(&["render"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("No resolution selected"));
}

#[test]
fn still_frame_out_of_range_is_usage_error() {
    let out = shaderloop(&["still", "--frame", "300", "-r", "900x1600"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn malformed_resolution_is_rejected_by_parser() {
    let out = shaderloop(&["render", "-r", "wide-ish"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn zero_frame_count_is_config_error() {
    let out = shaderloop(&["--frames", "0", "presets"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn config_prints_effective_values() {
    let out = shaderloop(&["--fps", "24", "config"]);
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["render"]["fps"], 24);
    assert_eq!(value["render"]["frame_count"], 300);
    assert_eq!(value["encoder"]["codec"], "libvpx-vp9");
}

#[test]
fn broken_config_file_is_reported_before_falling_back() {
    let home = tempfile::tempdir().unwrap();
    let config_dir = home.path().join("shaderloop");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.json"), "{ \"render\": ").unwrap();

    let out = shaderloop_in(home.path(), &["config"]);
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Using defaults"), "stderr: {stderr}");
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["render"]["frame_count"], 300);
}
