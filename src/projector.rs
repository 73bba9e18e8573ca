// src/projector.rs

//! Sign-function spectral projection and the randomized rank-revealing split.
//!
//! Given a generator `G` whose eigenvalues are shifted so that the imaginary
//! axis separates two groups, `P = (sign(G) + I) / 2` projects onto the
//! invariant subspace of the group right of the axis. A QR factorization of
//! `P` (or of `P V` for a Haar-random `V`) yields a unitary `Q` whose leading
//! columns span that subspace, so `Qᴴ A Q` is block upper-triangular up to
//! rounding. The bottom-left block measures how well the split worked.

use crate::comm::Communicator;
use crate::config::split_tolerance;
use crate::context::SdcContext;
use crate::error::{ensure_square, Result, SdcError};
use crate::field::SdcField;
use crate::householder::{HouseholderQr, ImplicitHaar};
use crate::kernels::{one_norm, update_diagonal};
use crate::partition::{compute_partition, compute_partition_on_grid, Partition};
use crate::sign::{matrix_sign, SignControl};
use log::{debug, trace};
use nalgebra::storage::{Storage, StorageMut};
use nalgebra::{DMatrix, Dyn, Matrix};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// How `A := Qᴴ A Q` is carried out once the unitary factor is known.
pub trait SimilarityTransform<F: SdcField> {
    fn apply<S>(&mut self, qr: &HouseholderQr<F>, a: &mut Matrix<F, Dyn, Dyn, S>)
    where
        S: StorageMut<F, Dyn, Dyn>;
}

/// Applies the packed reflectors from both sides without forming Q.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImplicitSimilarity;

impl<F: SdcField> SimilarityTransform<F> for ImplicitSimilarity {
    fn apply<S>(&mut self, qr: &HouseholderQr<F>, a: &mut Matrix<F, Dyn, Dyn, S>)
    where
        S: StorageMut<F, Dyn, Dyn>,
    {
        qr.apply_adjoint_left(a);
        qr.apply_right(a);
    }
}

/// Forms Q explicitly, applies it with two products and keeps the most recent
/// one for the caller.
#[derive(Clone, Debug)]
pub struct ExplicitSimilarity<F: SdcField> {
    q: Option<DMatrix<F>>,
}

impl<F: SdcField> ExplicitSimilarity<F> {
    pub fn new() -> Self {
        ExplicitSimilarity { q: None }
    }

    pub fn q(&self) -> Option<&DMatrix<F>> {
        self.q.as_ref()
    }

    pub fn take_q(&mut self) -> Option<DMatrix<F>> {
        self.q.take()
    }
}

impl<F: SdcField> Default for ExplicitSimilarity<F> {
    fn default() -> Self {
        ExplicitSimilarity::new()
    }
}

impl<F: SdcField> SimilarityTransform<F> for ExplicitSimilarity<F> {
    fn apply<S>(&mut self, qr: &HouseholderQr<F>, a: &mut Matrix<F, Dyn, Dyn, S>)
    where
        S: StorageMut<F, Dyn, Dyn>,
    {
        let q = qr.form_q();
        let transformed = q.ad_mul(&*a) * &q;
        a.copy_from(&transformed);
        self.q = Some(q);
    }
}

/// Result of a randomized split: the chosen cut, how many attempts it took,
/// and whether it met tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SplitOutcome {
    Converged { partition: Partition, attempts: usize },
    /// Every attempt missed tolerance; `partition` is the last attempt's.
    Exhausted { partition: Partition, attempts: usize },
}

impl SplitOutcome {
    pub fn partition(&self) -> Partition {
        match *self {
            SplitOutcome::Converged { partition, .. } | SplitOutcome::Exhausted { partition, .. } => {
                partition
            }
        }
    }

    pub fn attempts(&self) -> usize {
        match *self {
            SplitOutcome::Converged { attempts, .. } | SplitOutcome::Exhausted { attempts, .. } => {
                attempts
            }
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, SplitOutcome::Converged { .. })
    }
}

/// Overwrites `g` with the spectral projector `(sign(G) + I) / 2`.
pub fn spectral_projector<F: SdcField>(g: &mut DMatrix<F>, control: &SignControl) -> Result<()> {
    let steps = matrix_sign(g, control)?;
    trace!("sign iteration converged in {} steps", steps);
    update_diagonal(g, F::one());
    *g *= F::from_real(0.5);
    Ok(())
}

/// Deterministic split: projector, column-pivoted QR, then `A := Qᴴ A Q`.
///
/// The returned value is the bottom-left block norm relative to `‖A‖₁` as it
/// was before the transform.
pub fn sign_divide<F, S, T>(
    a: &mut Matrix<F, Dyn, Dyn, S>,
    g: DMatrix<F>,
    transform: &mut T,
    control: &SignControl,
) -> Result<Partition>
where
    F: SdcField,
    S: StorageMut<F, Dyn, Dyn>,
    T: SimilarityTransform<F>,
{
    check_pair(&*a, &g)?;
    let one_a = one_norm(&*a);

    let mut projector = g;
    spectral_projector(&mut projector, control)?;
    let qr = HouseholderQr::new_pivoted(projector);
    transform.apply(&qr, a);

    let partition = compute_partition(&*a).ok_or_else(too_small)?;
    Ok(relative_to(partition, one_a))
}

/// Randomized split: the projector is computed once, then each attempt
/// multiplies it by a fresh Haar matrix, takes an unpivoted QR and checks the
/// resulting cut.
///
/// On success `a` holds `Qᴴ A Q` for the successful attempt. A failed attempt
/// restores `a` before the next one. If every attempt fails, `a` keeps the last
/// attempt's transform, which is still a unitary similarity of the input.
pub fn randomized_sign_divide<F, S, T, C>(
    a: &mut Matrix<F, Dyn, Dyn, S>,
    g: DMatrix<F>,
    transform: &mut T,
    ctx: &mut SdcContext<'_, C>,
    max_its: usize,
    rel_tol: Option<f64>,
    control: &SignControl,
) -> Result<SplitOutcome>
where
    F: SdcField,
    S: StorageMut<F, Dyn, Dyn>,
    T: SimilarityTransform<F>,
    C: Communicator,
{
    check_pair(&*a, &g)?;
    if max_its < 1 {
        return Err(SdcError::InvalidArgument {
            arg: "max_its",
            reason: "at least one randomized attempt is required".to_string(),
        });
    }
    let n = a.nrows();
    let one_a = one_norm(&*a);
    let tol = split_tolerance(rel_tol, n);

    let mut projector = g;
    spectral_projector(&mut projector, control)?;
    let backup = a.clone_owned();

    let mut attempts = 0;
    loop {
        attempts += 1;

        let seed = ctx.random.shared_seed(&ctx.grid);
        let haar = ImplicitHaar::<F>::sample(n, &mut ChaCha8Rng::seed_from_u64(seed));
        let mut sketch = projector.clone();
        haar.apply_right(&mut sketch);
        let qr = HouseholderQr::new(sketch);
        transform.apply(&qr, a);

        let partition = compute_partition_on_grid(&*a, &ctx.grid).ok_or_else(too_small)?;
        let partition = relative_to(partition, one_a);
        if partition.value <= tol {
            debug!(
                "split of order {} at {} converged after {} attempt(s), value {:.3e}",
                n, partition.index, attempts, partition.value
            );
            return Ok(SplitOutcome::Converged { partition, attempts });
        }
        trace!(
            "attempt {}/{} on order {}: value {:.3e} above tolerance {:.3e}",
            attempts,
            max_its,
            n,
            partition.value,
            tol
        );
        if attempts >= max_its {
            return Ok(SplitOutcome::Exhausted { partition, attempts });
        }
        a.copy_from(&backup);
    }
}

fn check_pair<F, S>(a: &Matrix<F, Dyn, Dyn, S>, g: &DMatrix<F>) -> Result<()>
where
    F: SdcField,
    S: Storage<F, Dyn, Dyn>,
{
    ensure_square(a.nrows(), a.ncols())?;
    if g.shape() != a.shape() {
        return Err(SdcError::DimensionMismatch {
            context: "spectral generator",
            expected: a.shape(),
            got: g.shape(),
        });
    }
    if a.nrows() < 2 {
        return Err(too_small());
    }
    Ok(())
}

fn too_small() -> SdcError {
    SdcError::InvalidArgument {
        arg: "a",
        reason: "a split needs a matrix of order at least 2".to_string(),
    }
}

fn relative_to(partition: Partition, one_a: f64) -> Partition {
    let value = if one_a > 0.0 {
        partition.value / one_a
    } else {
        0.0
    };
    Partition { value, ..partition }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::is_upper_triangular;
    use nalgebra::dmatrix;

    #[test]
    fn test_projector_of_diagonal() {
        let mut g = DMatrix::from_diagonal(&nalgebra::dvector![2.0, -1.0, 0.5]);
        spectral_projector(&mut g, &SignControl::default()).expect("nonsingular generator");
        let expected = DMatrix::from_diagonal(&nalgebra::dvector![1.0, 0.0, 1.0]);
        assert!((g - expected).norm() < 1e-14);
    }

    #[test]
    fn test_projector_is_idempotent() {
        let mut g = dmatrix![3.0, 1.0, 0.0;
                             0.5, -2.0, 1.0;
                             0.0, 0.3, 1.5];
        spectral_projector(&mut g, &SignControl::default()).expect("nonsingular generator");
        let squared = &g * &g;
        assert!((squared - &g).norm() < 1e-12);
    }

    #[test]
    fn test_implicit_and_explicit_agree() {
        let a = dmatrix![4.0, 1.0, 2.0;
                         1.0, -3.0, 0.5;
                         0.2, 0.1, 1.0];
        let qr = HouseholderQr::new(a.clone());

        let mut implicit = a.clone();
        ImplicitSimilarity.apply(&qr, &mut implicit);

        let mut strategy = ExplicitSimilarity::new();
        let mut explicit = a.clone();
        strategy.apply(&qr, &mut explicit);

        assert!((implicit - explicit).norm() < 1e-12);
        assert!(strategy.q().is_some());
    }

    #[test]
    fn test_sign_divide_on_upper_triangular() {
        let mut a = dmatrix![2.0, 1.0;
                             0.0, -1.0];
        let g = a.clone();
        let partition = sign_divide(&mut a, g, &mut ImplicitSimilarity, &SignControl::default())
            .expect("separable spectrum");
        assert_eq!(partition.index, 1);
        assert!(partition.value < 1e-14);
        assert!(is_upper_triangular(&a) || a[(1, 0)].abs() < 1e-14);
    }

    #[test]
    fn test_rejects_mismatched_generator() {
        let mut a = DMatrix::<f64>::identity(3, 3);
        let g = DMatrix::<f64>::identity(2, 2);
        let err = sign_divide(&mut a, g, &mut ImplicitSimilarity, &SignControl::default());
        assert!(matches!(err, Err(SdcError::DimensionMismatch { .. })));
    }
}
