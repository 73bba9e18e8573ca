// src/sign.rs

//! Matrix sign function via the scaled Newton iteration
//! `X ← ½ (μ X + (μ X)⁻¹)`.
//!
//! Eigenvalues with positive real part are driven to +1 and those with
//! negative real part to −1. A generator with an eigenvalue on the imaginary
//! axis has no sign; in practice the iteration then meets a singular iterate.

use crate::error::{ensure_square, Result, SdcError};
use crate::field::SdcField;
use crate::kernels::one_norm;
use log::{debug, trace};
use nalgebra::DMatrix;

/// How each Newton step rescales its iterate before inverting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignScaling {
    None,
    /// `μ = |det X|^{-1/n}`
    Determinant,
    /// `μ = sqrt(‖X⁻¹‖_F / ‖X‖_F)`
    Frobenius,
}

/// Controls for [`matrix_sign`].
#[derive(Clone, Copy, Debug)]
pub struct SignControl {
    pub max_its: usize,
    /// Relative 1-norm change between iterates at which to stop; zero selects `n·ε`.
    pub tol: f64,
    pub scaling: SignScaling,
}

impl Default for SignControl {
    fn default() -> Self {
        SignControl {
            max_its: 100,
            tol: 0.0,
            scaling: SignScaling::Frobenius,
        }
    }
}

/// Overwrites `x` with `sign(x)` and returns the number of Newton steps taken.
pub fn matrix_sign<F: SdcField>(x: &mut DMatrix<F>, control: &SignControl) -> Result<usize> {
    ensure_square(x.nrows(), x.ncols())?;
    let n = x.nrows();
    if n == 0 {
        return Ok(0);
    }

    let tol = if control.tol > 0.0 {
        control.tol
    } else {
        n as f64 * f64::EPSILON
    };
    let mut prev_change = f64::INFINITY;

    for it in 0..control.max_its {
        let inverse = x
            .clone()
            .try_inverse()
            .ok_or(SdcError::SingularGenerator(n))?;

        let mu = match control.scaling {
            SignScaling::None => 1.0,
            SignScaling::Determinant => {
                let det = x.determinant().modulus();
                let mu = det.powf(-1.0 / n as f64);
                if mu.is_finite() && mu > 0.0 {
                    mu
                } else {
                    1.0
                }
            }
            SignScaling::Frobenius => {
                let norm_x = x.norm();
                let norm_inv = inverse.norm();
                if norm_x > 0.0 && norm_inv.is_finite() {
                    (norm_inv / norm_x).sqrt()
                } else {
                    1.0
                }
            }
        };

        let next = &*x * F::from_real(0.5 * mu) + inverse * F::from_real(0.5 / mu);
        let change = one_norm(&(&next - &*x));
        let size = one_norm(&next);
        *x = next;

        let rel_change = if size > 0.0 { change / size } else { change };
        trace!("sign iteration {}: relative change {:e}", it, rel_change);

        if rel_change <= tol {
            return Ok(it + 1);
        }
        // Rounding floor reached: the change stopped shrinking quadratically.
        if rel_change <= tol.sqrt() && rel_change >= 0.5 * prev_change {
            return Ok(it + 1);
        }
        prev_change = rel_change;
    }

    debug!(
        "sign iteration on a {}x{} generator stopped at max_its = {}",
        n, n, control.max_its
    );
    Ok(control.max_its)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, Complex};

    #[test]
    fn test_sign_of_diagonal() {
        let mut x = dmatrix![2.0, 0.0; 0.0, -3.0];
        matrix_sign(&mut x, &SignControl::default()).expect("sign iteration failed");
        assert!((x[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((x[(1, 1)] + 1.0).abs() < 1e-12);
        assert!(x[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn test_involutory_matrix_is_its_own_sign() {
        let a = dmatrix![1.0, 5.0; 0.0, -1.0];
        let mut x = a.clone();
        let its = matrix_sign(&mut x, &SignControl::default()).expect("sign iteration failed");
        assert!(its <= 2);
        assert!((x - a).norm() < 1e-12);
    }

    #[test]
    fn test_sign_squares_to_identity() {
        let mut x = dmatrix![Complex::new(1.0, 2.0), Complex::new(0.1, 0.0), Complex::new(0.0, 0.1);
                             Complex::new(0.0, 0.0), Complex::new(-2.0, 1.0), Complex::new(0.1, 0.1);
                             Complex::new(0.1, 0.0), Complex::new(0.0, -0.1), Complex::new(3.0, 0.0)];
        for scaling in [SignScaling::None, SignScaling::Determinant, SignScaling::Frobenius] {
            let control = SignControl {
                scaling,
                ..SignControl::default()
            };
            let mut s = x.clone();
            matrix_sign(&mut s, &control).expect("sign iteration failed");
            let residual = &s * &s - DMatrix::identity(3, 3);
            assert!(residual.norm() < 1e-10, "{:?}: {:e}", scaling, residual.norm());
        }
        x.fill(Complex::new(0.0, 0.0));
        assert!(matches!(
            matrix_sign(&mut x, &SignControl::default()),
            Err(SdcError::SingularGenerator(3))
        ));
    }
}
