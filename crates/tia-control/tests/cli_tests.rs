//! End-to-end tests of the binary against a fake software server.

mod common;

use std::fs;

use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

use common::{FakeServer, offline_cmd};

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_open_then_tree_shows_windows() {
    let server = FakeServer::start();
    server
        .cmd()
        .args(["open", "W", "-n", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Opened window W1"));

    server
        .cmd()
        .args(["display", "add", "W", "D"])
        .assert()
        .success();

    server
        .cmd()
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("Session\n\tW\n\t\tD\n\tW1"));
    assert_eq!(server.fake().window_names(), ["W", "W1"]);
}

#[test]
fn test_windows_json_reports_active() {
    let server = FakeServer::start();
    server.cmd().args(["open", "W"]).assert().success();

    let output = server.cmd().args(["--json", "windows"]).output().unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["windows"], serde_json::json!(["W"]));
    assert_eq!(json["active"], "W");
}

#[test]
fn test_image_pixel_value_and_position() {
    let server = FakeServer::start();
    server.cmd().args(["open", "W"]).assert().success();
    server.cmd().args(["display", "add", "W", "D"]).assert().success();
    server
        .cmd()
        .args(["var", "calibration", "cal", "0", "0", "1", "1"])
        .assert()
        .success();
    server
        .cmd()
        .args([
            "image", "add", "W", "img", "--display", "D", "--size-x", "4", "--size-y", "2",
            "--calibration", "cal",
        ])
        .assert()
        .success();

    let output = server
        .cmd()
        .args(["--json", "image", "show", "W", "D", "img", "--pixel", "1", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["value"], 7.0);
    assert_eq!(json["position"]["x"], 3.0);
    assert_eq!(json["position"]["y"], 1.0);
}

#[test]
fn test_close_unknown_window_is_lenient() {
    let server = FakeServer::start();
    server.cmd().args(["close", "ghost"]).assert().success();
    assert_eq!(server.fake().call_count("CloseDisplayWindow"), 0);
}

#[test]
fn test_setup_select_unknown_exits_unavailable() {
    let server = FakeServer::start();
    server
        .cmd()
        .args(["setup", "select", "Nope"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("Setup not found: Nope"));
    assert_eq!(server.fake().call_count("SelectSetup"), 0);
}

#[test]
fn test_acquire_set_outside_spot_mode_exits_usage() {
    let server = FakeServer::start();
    server
        .cmd()
        .args(["var", "collection", "create", "pts"])
        .assert()
        .success();
    server
        .cmd()
        .args(["acquire", "set", "pts", "0.01"])
        .assert()
        .code(64);

    server.cmd().args(["setup", "select", "Spot"]).assert().success();
    server
        .cmd()
        .args(["acquire", "set", "pts", "0.01"])
        .assert()
        .success();
}

#[test]
fn test_beam_move_out_of_range_exits_usage() {
    let server = FakeServer::start();
    server
        .cmd()
        .args(["beam", "move", "1.5", "0"])
        .assert()
        .code(64)
        .stderr(predicate::str::contains("x = 1.5 is outside [-1, 1]"));
    assert_eq!(server.fake().call_count("MoveBeam"), 0);

    server
        .cmd()
        .args(["beam", "move", "-0.5", "0.5"])
        .assert()
        .success();
}

#[test]
fn test_signal_link_routes_to_image() {
    let server = FakeServer::start();
    server.cmd().args(["open", "W"]).assert().success();
    server.cmd().args(["display", "add", "W", "D"]).assert().success();
    server
        .cmd()
        .args(["var", "calibration", "cal", "0", "0", "1", "1"])
        .assert()
        .success();
    server
        .cmd()
        .args([
            "image", "add", "W", "img", "--size-x", "2", "--size-y", "2", "--calibration", "cal",
        ])
        .assert()
        .success();

    server
        .cmd()
        .args(["signal", "link", "HAADF", "W", "D", "img"])
        .assert()
        .success();
    assert_eq!(
        server.fake().linked_image("HAADF"),
        Some(("W".to_string(), "D".to_string(), "img".to_string()))
    );
}

#[test]
fn test_ccd_set_then_show() {
    let server = FakeServer::start();
    server
        .cmd()
        .args(["ccd", "set", "integration-time", "0.25"])
        .assert()
        .success();

    let output = server.cmd().args(["--json", "ccd", "show"]).output().unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["integration_time"], 0.25);
    assert_eq!(json["camera"], "BM-Ceta");
}

#[test]
fn test_connection_refused_exits_ioerr() {
    offline_cmd()
        .arg("tree")
        .assert()
        .code(74)
        .stderr(predicate::str::contains("Failed to reach software server"));
}

#[test]
fn test_sed_prints_record_without_server() {
    let output = offline_cmd()
        .args(["--json", "sed", "--scan-radius", "50"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["task"], "sed");
    assert_eq!(json["params"]["scan_radius"], 50.0);
    assert_eq!(json["params"]["image_exposure"], 0.5);
    assert_eq!(json["triggered"], true);
}

#[test]
fn test_calib_show_direct_beam_axis() {
    let dir = TempDir::new().unwrap();
    let axis = serde_json::json!({
        "transform": [[1.0, 0.0], [0.0, 1.0]],
        "reference_shift": [0.0, 0.0],
        "reference_pixel": [0.0, 0.0],
        "shifts": [[1.0, 1.0]],
        "pixels": [[1.0, 1.0]]
    });
    let file = serde_json::json!({ "axes": { "BeamShift": axis, "DiffShift": axis } });
    fs::write(dir.path().join("calib_directbeam.json"), file.to_string()).unwrap();

    let output = offline_cmd()
        .args(["--json", "calib", "show", "direct-beam", "--axis", "DiffShift", "--dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    let names: Vec<&str> = json["series"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["DiffShift/observed", "DiffShift/fitted"]);
}

#[test]
fn test_calib_missing_file_exits_noinput() {
    let dir = TempDir::new().unwrap();
    offline_cmd()
        .args(["calib", "show", "beam-shift", "--dir"])
        .arg(dir.path())
        .assert()
        .code(66)
        .stderr(predicate::str::contains("calib_beamshift.json"));
}

#[test]
fn test_invalid_addr_exits_config() {
    offline_cmd()
        .args(["--addr", "nowhere", "tree"])
        .assert()
        .code(78);
}

#[test]
fn test_completions_bash() {
    offline_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tia-control"));
}
