// tests/test_cli.rs

use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_sdc-schur")
}

#[test]
fn test_generate_then_decompose() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("a.csv");
    let out_dir = dir.path().join("out");

    let status = Command::new(binary())
        .args(["generate", "-n", "12", "--seed", "3", "--output"])
        .arg(&input)
        .status()
        .expect("failed to run generate");
    assert!(status.success());

    let output = Command::new(binary())
        .args(["schur", "--cutoff", "4", "--quiet", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&out_dir)
        .output()
        .expect("failed to run schur");
    assert!(
        output.status.success(),
        "schur failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("reconstruction residual"));
    assert!(stdout.contains("eigenvalues:"));

    let eigenvalues = fs::read_to_string(out_dir.join("eigenvalues.csv")).expect("eigenvalues.csv");
    assert_eq!(eigenvalues.lines().count(), 12);
    assert!(out_dir.join("schur_t.csv").exists());
    assert!(out_dir.join("schur_q.csv").exists());
}

#[test]
fn test_random_complex_on_threads() {
    let output = Command::new(binary())
        .args([
            "schur", "--random", "10", "--complex", "--ranks", "2", "--cutoff", "2", "--quiet",
        ])
        .output()
        .expect("failed to run schur");
    assert!(
        output.status.success(),
        "schur failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("unitarity residual"));
}

#[test]
fn test_values_only_skips_vectors() {
    let output = Command::new(binary())
        .args(["schur", "--random", "9", "--values-only", "--cutoff", "3", "--quiet", "--show", "20"])
        .output()
        .expect("failed to run schur");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("unitarity residual"));
    assert!(!stdout.contains("more"));
}

#[test]
fn test_sign_scaling_flag() {
    for scaling in ["none", "determinant", "frobenius"] {
        let output = Command::new(binary())
            .args(["schur", "--random", "12", "--cutoff", "3", "--quiet", "--sign-scaling", scaling])
            .output()
            .expect("failed to run schur");
        assert!(
            output.status.success(),
            "--sign-scaling {} failed: {}",
            scaling,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let status = Command::new(binary())
        .args(["schur", "--random", "4", "--quiet", "--sign-scaling", "newton"])
        .output()
        .expect("failed to run schur")
        .status;
    assert!(!status.success());
}

#[test]
fn test_missing_source_fails() {
    let status = Command::new(binary())
        .args(["schur", "--cutoff", "4"])
        .output()
        .expect("failed to run schur")
        .status;
    assert!(!status.success());
}

#[test]
fn test_non_square_input_fails() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("rect.csv");
    fs::write(&input, "1,2,3\n4,5,6\n").expect("write");
    let output = Command::new(binary())
        .args(["schur", "--quiet", "--input"])
        .arg(&input)
        .output()
        .expect("failed to run schur");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("square"));
}
