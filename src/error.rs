// src/error.rs

//! Error types for the spectral divide-and-conquer Schur solver.

use thiserror::Error;

/// Result type alias using the crate's [`SdcError`].
pub type Result<T> = std::result::Result<T, SdcError>;

/// Errors raised by the solver and its helpers.
#[derive(Error, Debug)]
pub enum SdcError {
    /// A matrix that must be square is not.
    #[error("Matrix must be square, got {rows}x{cols}")]
    NotSquare {
        /// Number of rows
        rows: usize,
        /// Number of columns
        cols: usize,
    },

    /// Two operands that must agree in shape do not.
    #[error("Dimension mismatch in {context}: expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        /// Which operands disagree
        context: &'static str,
        /// Expected shape
        expected: (usize, usize),
        /// Actual shape
        got: (usize, usize),
    },

    /// The base-case cutoff must be at least one.
    #[error("Cutoff must be at least 1, got {0}")]
    InvalidCutoff(usize),

    /// Invalid argument provided to an operation.
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The sign-function iteration hit a singular iterate.
    #[error("Generator of order {0} became singular during the sign iteration")]
    SingularGenerator(usize),

    /// A randomized split exhausted its attempts and the policy forbids accepting it.
    #[error(
        "Spectral split of a {size}x{size} block did not converge: achieved {achieved:e}, tolerance {tolerance:e}"
    )]
    SplitNotConverged {
        /// Order of the block being split
        size: usize,
        /// Best value reached by the last attempt
        achieved: f64,
        /// Requested tolerance
        tolerance: f64,
    },

    /// The base-case dense Schur solver did not converge.
    #[error("Dense Schur solver failed on a {0}x{0} block")]
    BaseSolverFailed(usize),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A value in an input file could not be parsed.
    #[error("Parse error at row {row}, column {col}: {value:?}")]
    Parse {
        /// Zero-based row
        row: usize,
        /// Zero-based column
        col: usize,
        /// Offending text
        value: String,
    },
}

/// Fails with [`SdcError::NotSquare`] unless `rows == cols`.
pub(crate) fn ensure_square(rows: usize, cols: usize) -> Result<()> {
    if rows != cols {
        return Err(SdcError::NotSquare { rows, cols });
    }
    Ok(())
}
