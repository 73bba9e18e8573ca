// src/householder.rs

//! Householder QR with packed reflectors, in the layout LAPACK's `xGEQRF` /
//! `xGEQPF` use: R in the upper triangle, reflector tails strictly below the
//! diagonal, and the scalar factors in `tau`.
//!
//! Q is never formed unless asked for; [`HouseholderQr::apply_adjoint_left`]
//! and [`HouseholderQr::apply_right`] apply it implicitly.

use crate::field::SdcField;
use nalgebra::storage::StorageMut;
use nalgebra::{DMatrix, Dyn, Matrix};
use rand::Rng;

/// QR factorization `A P = Q R` held as packed Householder reflectors.
#[derive(Clone, Debug)]
pub struct HouseholderQr<F: SdcField> {
    packed: DMatrix<F>,
    tau: Vec<F>,
    perm: Option<Vec<usize>>,
}

impl<F: SdcField> HouseholderQr<F> {
    /// Unpivoted factorization; consumes `a` as workspace.
    pub fn new(a: DMatrix<F>) -> Self {
        Self::factor(a, false)
    }

    /// Factorization with greedy column pivoting on the largest remaining column norm.
    pub fn new_pivoted(a: DMatrix<F>) -> Self {
        Self::factor(a, true)
    }

    fn factor(mut a: DMatrix<F>, pivot: bool) -> Self {
        let (m, n) = a.shape();
        let k = m.min(n);
        let mut tau = Vec::with_capacity(k);
        let mut perm: Option<Vec<usize>> = if pivot { Some((0..n).collect()) } else { None };

        for j in 0..k {
            if let Some(perm) = perm.as_mut() {
                let best = pivot_column(&a, j);
                if best != j {
                    a.swap_columns(j, best);
                    perm.swap(j, best);
                }
            }

            let t = make_reflector(&mut a, j);

            // Trailing update: A[j.., j+1..] := Hᴴ A[j.., j+1..]
            if t != F::zero() {
                let tc = t.conjugate();
                for c in (j + 1)..n {
                    let mut w = a[(j, c)];
                    for i in (j + 1)..m {
                        let vi = a[(i, j)];
                        w += vi.conjugate() * a[(i, c)];
                    }
                    let s = tc * w;
                    a[(j, c)] -= s;
                    for i in (j + 1)..m {
                        let vi = a[(i, j)];
                        a[(i, c)] -= s * vi;
                    }
                }
            }
            tau.push(t);
        }

        HouseholderQr {
            packed: a,
            tau,
            perm,
        }
    }

    pub fn nrows(&self) -> usize {
        self.packed.nrows()
    }

    /// Column permutation: entry `j` is the original column now in position `j`.
    pub fn permutation(&self) -> Option<&[usize]> {
        self.perm.as_deref()
    }

    /// The upper-trapezoidal factor R.
    pub fn r(&self) -> DMatrix<F> {
        let (m, n) = self.packed.shape();
        let k = m.min(n);
        DMatrix::from_fn(k, n, |i, j| if i <= j { self.packed[(i, j)] } else { F::zero() })
    }

    /// Diagonal of R (real-valued for every reflector this module builds).
    pub(crate) fn r_diagonal(&self) -> Vec<F> {
        (0..self.tau.len()).map(|j| self.packed[(j, j)]).collect()
    }

    /// `C := Qᴴ C`
    pub fn apply_adjoint_left<S>(&self, c: &mut Matrix<F, Dyn, Dyn, S>)
    where
        S: StorageMut<F, Dyn, Dyn>,
    {
        let m = self.packed.nrows();
        debug_assert_eq!(c.nrows(), m, "Qᴴ C needs C with {} rows", m);

        for (j, &t) in self.tau.iter().enumerate() {
            if t == F::zero() {
                continue;
            }
            let tc = t.conjugate();
            for col in 0..c.ncols() {
                let mut w = c[(j, col)];
                for i in (j + 1)..m {
                    w += self.packed[(i, j)].conjugate() * c[(i, col)];
                }
                let s = tc * w;
                c[(j, col)] -= s;
                for i in (j + 1)..m {
                    c[(i, col)] -= s * self.packed[(i, j)];
                }
            }
        }
    }

    /// `C := C Q`
    pub fn apply_right<S>(&self, c: &mut Matrix<F, Dyn, Dyn, S>)
    where
        S: StorageMut<F, Dyn, Dyn>,
    {
        let m = self.packed.nrows();
        debug_assert_eq!(c.ncols(), m, "C Q needs C with {} columns", m);

        for (j, &t) in self.tau.iter().enumerate() {
            if t == F::zero() {
                continue;
            }
            for r in 0..c.nrows() {
                let mut w = c[(r, j)];
                for i in (j + 1)..m {
                    w += c[(r, i)] * self.packed[(i, j)];
                }
                let s = t * w;
                c[(r, j)] -= s;
                for i in (j + 1)..m {
                    c[(r, i)] -= s * self.packed[(i, j)].conjugate();
                }
            }
        }
    }

    /// Expands the packed reflectors into the square unitary factor Q.
    pub fn form_q(&self) -> DMatrix<F> {
        let m = self.packed.nrows();
        let mut q = DMatrix::<F>::identity(m, m);
        self.apply_right(&mut q);
        q
    }
}

/// Index of the column in `j..` whose trailing part `a[j.., c]` has the largest norm.
fn pivot_column<F: SdcField>(a: &DMatrix<F>, j: usize) -> usize {
    let (m, n) = a.shape();
    let mut best = j;
    let mut best_norm = -1.0f64;
    for c in j..n {
        let mut norm_sq = 0.0;
        for i in j..m {
            norm_sq += a[(i, c)].modulus_squared();
        }
        if norm_sq > best_norm {
            best = c;
            best_norm = norm_sq;
        }
    }
    best
}

/// Generates an elementary reflector `H = I − τ v vᴴ` with `Hᴴ a[j.., j] = β e₁`
/// (LAPACK `xLARFG`). Stores β on the diagonal, the tail of `v` below it, and
/// returns τ. A zero τ means `H = I`.
fn make_reflector<F: SdcField>(a: &mut DMatrix<F>, j: usize) -> F {
    let m = a.nrows();
    let alpha = a[(j, j)];
    let mut xnorm_sq = 0.0;
    for i in (j + 1)..m {
        xnorm_sq += a[(i, j)].modulus_squared();
    }

    let alphr = alpha.real();
    let alphi = alpha.imaginary();
    if xnorm_sq == 0.0 && alphi == 0.0 {
        return F::zero();
    }

    let norm = (alphr * alphr + alphi * alphi + xnorm_sq).sqrt();
    let beta = if alphr >= 0.0 { -norm } else { norm };
    let beta_f = F::from_real(beta);
    let tau = (beta_f - alpha) / beta_f;
    let scale = F::one() / (alpha - beta_f);
    for i in (j + 1)..m {
        let x = a[(i, j)];
        a[(i, j)] = x * scale;
    }
    a[(j, j)] = beta_f;
    tau
}

/// A Haar-distributed random unitary `Q·D`, kept as the packed QR of a Gaussian
/// matrix plus the sign correction `D = diag(sign(R_jj))`.
#[derive(Clone, Debug)]
pub struct ImplicitHaar<F: SdcField> {
    qr: HouseholderQr<F>,
    signs: Vec<f64>,
}

impl<F: SdcField> ImplicitHaar<F> {
    pub fn sample<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let gaussian = DMatrix::from_fn(n, n, |_, _| F::sample_gaussian(&mut *rng));
        let qr = HouseholderQr::new(gaussian);
        let signs = qr
            .r_diagonal()
            .into_iter()
            .map(|d| if d.real() < 0.0 { -1.0 } else { 1.0 })
            .collect();
        ImplicitHaar { qr, signs }
    }

    /// `C := C (Q D)`
    pub fn apply_right<S>(&self, c: &mut Matrix<F, Dyn, Dyn, S>)
    where
        S: StorageMut<F, Dyn, Dyn>,
    {
        self.qr.apply_right(c);
        for (j, &sign) in self.signs.iter().enumerate() {
            if sign < 0.0 {
                for r in 0..c.nrows() {
                    let x = c[(r, j)];
                    c[(r, j)] = -x;
                }
            }
        }
    }

    pub fn to_dense(&self) -> DMatrix<F> {
        let n = self.qr.nrows();
        let mut q = DMatrix::<F>::identity(n, n);
        self.apply_right(&mut q);
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::unitarity_residual;
    use nalgebra::{dmatrix, Complex};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_reflector_annihilates_column() {
        let a = dmatrix![3.0, 1.0; 4.0, 2.0];
        let qr = HouseholderQr::new(a.clone());
        let r = qr.r();
        assert!((r[(0, 0)].abs() - 5.0).abs() < 1e-14);
        assert_eq!(r[(1, 0)], 0.0);

        let mut qta = a.clone();
        qr.apply_adjoint_left(&mut qta);
        assert!(qta[(1, 0)].abs() < 1e-14);
    }

    #[test]
    fn test_unpivoted_qr_reconstructs() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let a = DMatrix::<f64>::from_fn(6, 6, |_, _| rng.gen_range(-1.0..1.0));
        let qr = HouseholderQr::new(a.clone());
        let q = qr.form_q();
        assert!((&q * qr.r() - &a).norm() < 1e-13);
        assert!(unitarity_residual(&q) < 1e-13);
    }

    #[test]
    fn test_pivoted_qr_reconstructs_permuted_columns() {
        let a = dmatrix![1.0, 10.0, 0.0;
                         2.0, 20.0, 1.0;
                         3.0,  5.0, 0.5];
        let qr = HouseholderQr::new_pivoted(a.clone());
        let perm = qr.permutation().expect("pivoted factorization keeps a permutation");
        assert_eq!(perm[0], 1, "largest column must be chosen first");

        let qr_product = qr.form_q() * qr.r();
        for (j, &orig) in perm.iter().enumerate() {
            for i in 0..3 {
                assert!((qr_product[(i, j)] - a[(i, orig)]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_implicit_application_matches_explicit_q() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let a = DMatrix::<Complex<f64>>::from_fn(5, 5, |_, _| {
            Complex::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
        });
        let c = DMatrix::<Complex<f64>>::from_fn(5, 5, |i, j| Complex::new(i as f64, j as f64));
        let qr = HouseholderQr::new(a);
        let q = qr.form_q();

        let mut left = c.clone();
        qr.apply_adjoint_left(&mut left);
        assert!((left - q.ad_mul(&c)).norm() < 1e-12);

        let mut right = c.clone();
        qr.apply_right(&mut right);
        assert!((right - &c * &q).norm() < 1e-12);
    }

    #[test]
    fn test_haar_sample_is_unitary() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let haar = ImplicitHaar::<Complex<f64>>::sample(8, &mut rng);
        assert!(unitarity_residual(&haar.to_dense()) < 1e-12);

        let real = ImplicitHaar::<f64>::sample(8, &mut rng);
        assert!(unitarity_residual(&real.to_dense()) < 1e-12);
    }

    #[test]
    fn test_zero_column_gives_identity_reflector() {
        let a = DMatrix::<f64>::zeros(3, 3);
        let qr = HouseholderQr::new(a);
        let q = qr.form_q();
        assert_eq!(q, DMatrix::identity(3, 3));
    }
}
