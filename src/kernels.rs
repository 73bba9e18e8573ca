// src/kernels.rs

//! Small dense helpers (norms, trace, diagonal updates) that nalgebra does not
//! expose in the operator-norm flavour the splitter needs.

use crate::field::SdcField;
use nalgebra::storage::{Storage, StorageMut};
use nalgebra::{DMatrix, Dyn, Matrix};

/// Maximum absolute column sum.
pub fn one_norm<F, S>(a: &Matrix<F, Dyn, Dyn, S>) -> f64
where
    F: SdcField,
    S: Storage<F, Dyn, Dyn>,
{
    let mut value: f64 = 0.0;
    for j in 0..a.ncols() {
        let mut sum = 0.0;
        for i in 0..a.nrows() {
            sum += a[(i, j)].modulus();
        }
        value = value.max(sum);
    }
    value
}

/// Infinity norm of `a` with its diagonal treated as zero.
pub fn off_diagonal_inf_norm<F, S>(a: &Matrix<F, Dyn, Dyn, S>) -> f64
where
    F: SdcField,
    S: Storage<F, Dyn, Dyn>,
{
    let mut row_sums = vec![0.0f64; a.nrows()];
    for j in 0..a.ncols() {
        for (i, sum) in row_sums.iter_mut().enumerate() {
            if i != j {
                *sum += a[(i, j)].modulus();
            }
        }
    }
    row_sums.into_iter().fold(0.0, f64::max)
}

pub fn trace<F, S>(a: &Matrix<F, Dyn, Dyn, S>) -> F
where
    F: SdcField,
    S: Storage<F, Dyn, Dyn>,
{
    let n = a.nrows().min(a.ncols());
    let mut sum = F::zero();
    for i in 0..n {
        sum += a[(i, i)];
    }
    sum
}

/// True when every entry strictly below the diagonal is exactly zero.
pub fn is_upper_triangular<F, S>(a: &Matrix<F, Dyn, Dyn, S>) -> bool
where
    F: SdcField,
    S: Storage<F, Dyn, Dyn>,
{
    for j in 0..a.ncols() {
        for i in (j + 1)..a.nrows() {
            if a[(i, j)] != F::zero() {
                return false;
            }
        }
    }
    true
}

/// `a += shift * I`
pub fn update_diagonal<F: SdcField>(a: &mut DMatrix<F>, shift: F) {
    let n = a.nrows().min(a.ncols());
    for i in 0..n {
        a[(i, i)] += shift;
    }
}

/// Sets every entry of `a` to zero.
pub fn fill_zero<F, S>(a: &mut Matrix<F, Dyn, Dyn, S>)
where
    F: SdcField,
    S: StorageMut<F, Dyn, Dyn>,
{
    a.fill(F::zero());
}

/// `‖Qᴴ Q − I‖_F`
pub fn unitarity_residual<F: SdcField>(q: &DMatrix<F>) -> f64 {
    let n = q.ncols();
    let mut gram = q.ad_mul(q);
    for i in 0..n {
        gram[(i, i)] -= F::one();
    }
    gram.norm()
}

/// `‖Qᴴ A Q − T‖_F / ‖A‖_F`, or the absolute residual when `A` is zero.
pub fn reconstruction_residual<F: SdcField>(a: &DMatrix<F>, q: &DMatrix<F>, t: &DMatrix<F>) -> f64 {
    let diff = q.ad_mul(a) * q - t;
    let scale = a.norm();
    if scale > 0.0 {
        diff.norm() / scale
    } else {
        diff.norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, Complex};

    #[test]
    fn test_operator_norms() {
        let a = dmatrix![1.0, -2.0; 3.0, 4.0];
        assert_eq!(one_norm(&a), 6.0);
        assert_eq!(off_diagonal_inf_norm(&a), 3.0);
    }

    #[test]
    fn test_norms_on_views() {
        let a = dmatrix![1.0, 2.0, 3.0; 4.0, 5.0, 6.0; 7.0, 8.0, 9.0];
        let view = a.view((1, 1), (2, 2));
        assert_eq!(one_norm(&view), 15.0);
        assert_eq!(trace(&view), 14.0);
    }

    #[test]
    fn test_complex_trace_and_shift() {
        let mut a = dmatrix![Complex::new(1.0, 1.0), Complex::new(0.0, 0.0);
                             Complex::new(2.0, 0.0), Complex::new(3.0, -1.0)];
        assert_eq!(trace(&a), Complex::new(4.0, 0.0));
        update_diagonal(&mut a, Complex::new(-1.0, 0.0));
        assert_eq!(a[(0, 0)], Complex::new(0.0, 1.0));
        assert_eq!(a[(1, 0)], Complex::new(2.0, 0.0));
        assert!(!is_upper_triangular(&a));
    }

    #[test]
    fn test_identity_residuals_vanish() {
        let a = dmatrix![2.0, 1.0; 0.0, 3.0];
        let q = DMatrix::<f64>::identity(2, 2);
        assert_eq!(unitarity_residual(&q), 0.0);
        assert_eq!(reconstruction_residual(&a, &q, &a), 0.0);
        assert!(is_upper_triangular(&a));
    }
}
