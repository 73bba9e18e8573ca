// src/splitter.rs

//! Picks a random dividing line through the spectrum and hands the shifted
//! matrix to the randomized projector split.
//!
//! The line passes near the eigenvalue centroid `trace(A)/n`. The shift is
//! drawn from a small ball around it, sized by the largest off-diagonal row
//! sum, so that no eigenvalue sits on the line with any real probability. For
//! complex matrices the line is also rotated by a random `e^{iθ}`, which lets
//! a split separate eigenvalues along any direction in the plane.

use crate::comm::Communicator;
use crate::config::SdcConfig;
use crate::context::SdcContext;
use crate::error::{ensure_square, Result, SdcError};
use crate::field::SdcField;
use crate::kernels::{off_diagonal_inf_norm, trace, update_diagonal};
use crate::partition::compute_partition;
use crate::projector::{
    randomized_sign_divide, ExplicitSimilarity, ImplicitSimilarity, SimilarityTransform, SplitOutcome,
};
use nalgebra::storage::{Storage, StorageMut};
use nalgebra::{DMatrix, Dyn, Matrix};

/// Radius of the shift ball as a fraction of the off-diagonal norm.
const SHIFT_RADIUS: f64 = 0.001;

/// Splits `a` in place, applying the transform implicitly.
pub fn spectral_divide<F, S, C>(
    a: &mut Matrix<F, Dyn, Dyn, S>,
    ctx: &mut SdcContext<'_, C>,
    config: &SdcConfig,
) -> Result<SplitOutcome>
where
    F: SdcField,
    S: StorageMut<F, Dyn, Dyn>,
    C: Communicator,
{
    divide_with(a, &mut ImplicitSimilarity, ctx, config)
}

/// Splits `a` in place and also returns the unitary `Q` with `A_in = Q A_out Qᴴ`.
pub fn spectral_divide_with_vectors<F, S, C>(
    a: &mut Matrix<F, Dyn, Dyn, S>,
    ctx: &mut SdcContext<'_, C>,
    config: &SdcConfig,
) -> Result<(SplitOutcome, DMatrix<F>)>
where
    F: SdcField,
    S: StorageMut<F, Dyn, Dyn>,
    C: Communicator,
{
    let n = a.nrows();
    let mut transform = ExplicitSimilarity::new();
    let outcome = divide_with(a, &mut transform, ctx, config)?;
    let q = transform
        .take_q()
        .unwrap_or_else(|| DMatrix::identity(n, n));
    Ok((outcome, q))
}

fn divide_with<F, S, T, C>(
    a: &mut Matrix<F, Dyn, Dyn, S>,
    transform: &mut T,
    ctx: &mut SdcContext<'_, C>,
    config: &SdcConfig,
) -> Result<SplitOutcome>
where
    F: SdcField,
    S: StorageMut<F, Dyn, Dyn>,
    T: SimilarityTransform<F>,
    C: Communicator,
{
    ensure_square(a.nrows(), a.ncols())?;
    let n = a.nrows();
    if n < 2 {
        return Err(SdcError::InvalidArgument {
            arg: "a",
            reason: format!("cannot split a matrix of order {}", n),
        });
    }

    let Some(g) = shifted_generator(&*a, ctx) else {
        // Diagonal: every cut is exact and the transform is the identity.
        let partition = compute_partition(&*a).ok_or_else(|| SdcError::InvalidArgument {
            arg: "a",
            reason: "no cut available".to_string(),
        })?;
        return Ok(SplitOutcome::Converged {
            partition,
            attempts: 0,
        });
    };

    randomized_sign_divide(a, g, transform, ctx, config.max_its, config.rel_tol, &config.sign)
}

/// `γ (A + σ I)` with `σ` drawn around `−trace(A)/n` and `γ` a random rotation
/// for complex fields. `None` when `A` is diagonal.
fn shifted_generator<F, S, C>(a: &Matrix<F, Dyn, Dyn, S>, ctx: &mut SdcContext<'_, C>) -> Option<DMatrix<F>>
where
    F: SdcField,
    S: Storage<F, Dyn, Dyn>,
    C: Communicator,
{
    let n = a.nrows();
    let center = trace(a) / F::from_real(n as f64);
    let radius = off_diagonal_inf_norm(a);
    if radius == 0.0 {
        return None;
    }

    let shift = ctx
        .random
        .shared_draw(&ctx.grid, |rng| F::sample_ball(-center, SHIFT_RADIUS * radius, rng));
    let rotation = ctx.random.shared_draw(&ctx.grid, |rng| F::sample_rotation(rng));
    log::trace!("order {} shift {:?} rotation {:?}", n, shift, rotation);

    let mut g = a.clone_owned();
    update_diagonal(&mut g, shift);
    if let Some(gamma) = rotation {
        g *= gamma;
    }
    Some(g)
}
