// src/dense_schur.rs

//! Base-case solver used below the cutoff: conventional Hessenberg reduction
//! plus shifted QR, provided by nalgebra.

use crate::error::{ensure_square, Result, SdcError};
use crate::field::SdcField;
use nalgebra::linalg::Schur;
use nalgebra::{Complex, DMatrix};

/// A dense Schur solver: returns `(T, Q)` with `A = Q T Qᴴ`.
pub trait DenseSchur<F: SdcField> {
    fn schur(&self, a: DMatrix<F>) -> Result<(DMatrix<F>, DMatrix<F>)>;
}

#[derive(Clone, Copy, Debug)]
pub struct NalgebraSchur {
    /// Deflation threshold for subdiagonal entries.
    pub eps: f64,
    /// Iteration cap; zero iterates until convergence.
    pub max_niter: usize,
}

impl Default for NalgebraSchur {
    fn default() -> Self {
        NalgebraSchur {
            eps: f64::EPSILON,
            max_niter: 0,
        }
    }
}

impl<F: SdcField> DenseSchur<F> for NalgebraSchur {
    fn schur(&self, a: DMatrix<F>) -> Result<(DMatrix<F>, DMatrix<F>)> {
        ensure_square(a.nrows(), a.ncols())?;
        let n = a.nrows();
        if n <= 1 {
            return Ok((a, DMatrix::identity(n, n)));
        }

        let decomposition =
            Schur::try_new(a, self.eps, self.max_niter).ok_or(SdcError::BaseSolverFailed(n))?;
        let (q, t) = decomposition.unpack();
        Ok((t, q))
    }
}

/// Eigenvalues of a (quasi-)triangular Schur factor in diagonal order; a
/// nonzero subdiagonal entry in a real factor marks a 2x2 block holding a
/// complex-conjugate pair.
pub fn quasi_triangular_eigenvalues<F: SdcField>(t: &DMatrix<F>) -> Vec<Complex<f64>> {
    let n = t.nrows();
    let mut eigenvalues = Vec::with_capacity(n);
    let mut i = 0;
    while i < n {
        if !F::IS_COMPLEX && i + 1 < n && !negligible_subdiagonal(t, i) {
            let a = t[(i, i)].to_complex();
            let b = t[(i, i + 1)].to_complex();
            let c = t[(i + 1, i)].to_complex();
            let d = t[(i + 1, i + 1)].to_complex();
            let mean = (a + d) * 0.5;
            let half_diff = (a - d) * 0.5;
            let root = (half_diff * half_diff + b * c).sqrt();
            eigenvalues.push(mean + root);
            eigenvalues.push(mean - root);
            i += 2;
        } else {
            eigenvalues.push(t[(i, i)].to_complex());
            i += 1;
        }
    }
    eigenvalues
}

fn negligible_subdiagonal<F: SdcField>(t: &DMatrix<F>, i: usize) -> bool {
    let sub = t[(i + 1, i)].modulus();
    sub == 0.0 || sub <= f64::EPSILON * (t[(i, i)].modulus() + t[(i + 1, i + 1)].modulus())
}
