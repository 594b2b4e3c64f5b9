// The binary needs the desktop hooks, so this only runs with
// `cargo test --features desktop`.
#![cfg(feature = "desktop")]

use assert_cmd::Command;

#[test]
fn help_lists_recording_flags() {
    let output = Command::cargo_bin("steprec")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for flag in ["--outfile", "--cursor", "--png", "--quality", "--save-config"] {
        assert!(help.contains(flag), "missing {flag} in help output");
    }
}

#[test]
fn rejects_out_of_range_quality() {
    Command::cargo_bin("steprec")
        .unwrap()
        .args(["--quality", "0"])
        .assert()
        .failure();
}
