// src/io.rs

//! CSV input and output for matrices and eigenvalues.
//!
//! Matrices are stored one row per line without a header. Complex entries are
//! written as `re+imi`; only real matrices are read back.

use crate::error::{Result, SdcError};
use crate::field::SdcField;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use nalgebra::{Complex, DMatrix};
use std::path::Path;

/// Reads a dense real matrix. Every row must have the same number of fields.
pub fn load_matrix_csv<P: AsRef<Path>>(csv_path: P) -> Result<DMatrix<f64>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(csv_path)?;

    let mut data = Vec::new();
    let mut rows = 0;
    let mut cols = None;
    for record in rdr.records() {
        let record = record?;
        let width = record.len();
        match cols {
            None => cols = Some(width),
            Some(expected) if expected != width => {
                return Err(SdcError::DimensionMismatch {
                    context: "csv row",
                    expected: (1, expected),
                    got: (1, width),
                });
            }
            Some(_) => {}
        }
        for (col, field) in record.iter().enumerate() {
            let value = field.parse::<f64>().map_err(|_| SdcError::Parse {
                row: rows,
                col,
                value: field.to_string(),
            })?;
            data.push(value);
        }
        rows += 1;
    }

    Ok(DMatrix::from_row_slice(rows, cols.unwrap_or(0), &data))
}

/// Saves a dense matrix to a CSV file.
pub fn save_matrix_to_csv<F: SdcField, P: AsRef<Path>>(matrix: &DMatrix<F>, csv_path: P) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(csv_path)?;

    for i in 0..matrix.nrows() {
        let row: Vec<String> = (0..matrix.ncols())
            .map(|j| format_entry::<F>(matrix[(i, j)].to_complex()))
            .collect();
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Saves eigenvalues as `re,im` rows, in the order given.
pub fn save_eigenvalues_to_csv<P: AsRef<Path>>(eigenvalues: &[Complex<f64>], csv_path: P) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(csv_path)?;
    for lambda in eigenvalues {
        wtr.serialize((lambda.re, lambda.im))?;
    }
    wtr.flush()?;
    Ok(())
}

fn format_entry<F: SdcField>(z: Complex<f64>) -> String {
    if !F::IS_COMPLEX {
        return z.re.to_string();
    }
    if z.im.is_sign_negative() {
        format!("{}-{}i", z.re, -z.im)
    } else {
        format!("{}+{}i", z.re, z.im)
    }
}
