// tests/test_io.rs

use nalgebra::{dmatrix, Complex};
use sdc_schur::io::{load_matrix_csv, save_eigenvalues_to_csv, save_matrix_to_csv};
use sdc_schur::SdcError;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_matrix_survives_a_save_and_load() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("a.csv");
    let a = dmatrix![1.5, -2.0, 0.0;
                     3.25, 1e-17, -7.0];
    save_matrix_to_csv(&a, &path).expect("save");
    let loaded = load_matrix_csv(&path).expect("load");
    assert_eq!(loaded, a);
}

#[test]
fn test_load_tolerates_whitespace() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("spaced.csv");
    fs::write(&path, "1, 2\n 3 ,4\n").expect("write");
    let loaded = load_matrix_csv(&path).expect("load");
    assert_eq!(loaded, dmatrix![1.0, 2.0; 3.0, 4.0]);
}

#[test]
fn test_ragged_rows_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("ragged.csv");
    fs::write(&path, "1,2,3\n4,5\n").expect("write");
    let err = load_matrix_csv(&path).expect_err("ragged input must fail");
    assert!(matches!(
        err,
        SdcError::DimensionMismatch {
            expected: (1, 3),
            got: (1, 2),
            ..
        }
    ));
}

#[test]
fn test_parse_error_reports_position() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("bad.csv");
    fs::write(&path, "1,2\n3,abc\n").expect("write");
    match load_matrix_csv(&path) {
        Err(SdcError::Parse { row, col, value }) => {
            assert_eq!((row, col), (1, 1));
            assert_eq!(value, "abc");
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_empty_file_is_an_empty_matrix() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("empty.csv");
    fs::write(&path, "").expect("write");
    let loaded = load_matrix_csv(&path).expect("load");
    assert_eq!(loaded.shape(), (0, 0));
}

#[test]
fn test_eigenvalues_written_as_pairs() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("eigs.csv");
    let eigs = [Complex::new(1.0, -2.0), Complex::new(0.5, 0.0)];
    save_eigenvalues_to_csv(&eigs, &path).expect("save");

    let text = fs::read_to_string(&path).expect("read");
    let rows: Vec<(f64, f64)> = text
        .lines()
        .map(|line| {
            let mut parts = line.split(',').map(|p| p.parse::<f64>().expect("number"));
            (parts.next().expect("re"), parts.next().expect("im"))
        })
        .collect();
    assert_eq!(rows, vec![(1.0, -2.0), (0.5, 0.0)]);
}

#[test]
fn test_complex_matrix_entries() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("z.csv");
    let z = dmatrix![Complex::new(1.0, 2.0), Complex::new(0.0, -1.5)];
    save_matrix_to_csv(&z, &path).expect("save");
    let text = fs::read_to_string(&path).expect("read");
    assert_eq!(text.trim_end(), "1+2i,0-1.5i");
}
