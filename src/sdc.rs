// src/sdc.rs

//! The recursive divide-and-conquer driver.
//!
//! All blocks live in one owned matrix and are addressed by [`Block`] range
//! descriptors, so a recursion level never copies its subproblem out. A split
//! leaves the block as
//!
//! ```text
//! [ ATL  ATR ]
//! [  0   ABR ]
//! ```
//!
//! after which `ATL` and `ABR` are solved independently. In vector mode the
//! level's transform `Q = [QL QR]` is then stitched with the sub-results as
//! `[QL·Z_TL  QR·Z_BR]`, and `ATR` becomes `Z_TLᴴ·ATR·Z_BR`.

use crate::comm::Communicator;
use crate::config::{ExhaustionPolicy, SdcConfig};
use crate::context::SdcContext;
use crate::dense_schur::{quasi_triangular_eigenvalues, DenseSchur, NalgebraSchur};
use crate::error::{ensure_square, Result, SdcError};
use crate::field::SdcField;
use crate::kernels::{fill_zero, is_upper_triangular};
use crate::partition::Partition;
use crate::projector::SplitOutcome;
use crate::splitter::{spectral_divide, spectral_divide_with_vectors};
use log::{debug, info, warn};
use nalgebra::{Complex, DMatrix, DMatrixView, DMatrixViewMut};

static NALGEBRA_SCHUR: NalgebraSchur = NalgebraSchur {
    eps: f64::EPSILON,
    max_niter: 0,
};

/// A diagonal block `A[offset..offset+size, offset..offset+size]` of the
/// working matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub offset: usize,
    pub size: usize,
}

impl Block {
    pub fn whole(n: usize) -> Self {
        Block { offset: 0, size: n }
    }

    /// Leading block of order `k` and the trailing remainder.
    pub fn split(self, k: usize) -> (Block, Block) {
        debug_assert!(k >= 1 && k < self.size, "cut {} outside 1..{}", k, self.size);
        (
            Block {
                offset: self.offset,
                size: k,
            },
            Block {
                offset: self.offset + k,
                size: self.size - k,
            },
        )
    }

    pub fn view<'a, F: SdcField>(&self, a: &'a DMatrix<F>) -> DMatrixView<'a, F> {
        a.view((self.offset, self.offset), (self.size, self.size))
    }

    pub fn view_mut<'a, F: SdcField>(&self, a: &'a mut DMatrix<F>) -> DMatrixViewMut<'a, F> {
        a.view_mut((self.offset, self.offset), (self.size, self.size))
    }
}

/// What a run produced besides the Schur form itself.
#[derive(Clone, Debug, Default)]
pub struct SdcReport {
    /// Eigenvalues in the order they appear along the diagonal of T.
    pub eigenvalues: Vec<Complex<f64>>,
    /// Accepted spectral splits.
    pub splits: usize,
    /// Splits that used every attempt without reaching tolerance.
    pub exhausted_splits: usize,
    /// Exhausted splits handed to the dense solver instead.
    pub dense_fallbacks: usize,
    /// Blocks solved by the dense solver, fallbacks included.
    pub dense_blocks: usize,
    /// Largest relative coupling left behind by an accepted split.
    pub max_split_value: f64,
    /// Terminal diagonal blocks of T in diagonal order: dense solves and
    /// blocks that were already triangular.
    pub leaves: Vec<Block>,
}

/// Configured driver. The dense base-case solver is pluggable.
pub struct SdcDriver<'s, F: SdcField> {
    config: SdcConfig,
    base: &'s dyn DenseSchur<F>,
}

impl<F: SdcField> SdcDriver<'static, F> {
    pub fn new(config: SdcConfig) -> Self {
        SdcDriver {
            config,
            base: &NALGEBRA_SCHUR,
        }
    }
}

impl<'s, F: SdcField> SdcDriver<'s, F> {
    pub fn with_base_solver<'b>(self, base: &'b dyn DenseSchur<F>) -> SdcDriver<'b, F> {
        SdcDriver {
            config: self.config,
            base,
        }
    }

    pub fn config(&self) -> &SdcConfig {
        &self.config
    }

    /// Reduces `a` far enough to read off its eigenvalues. Only the diagonal
    /// blocks of the result are meaningful.
    pub fn eigenvalues<C: Communicator>(
        &self,
        a: &mut DMatrix<F>,
        ctx: &mut SdcContext<'_, C>,
    ) -> Result<SdcReport> {
        self.prepare(a, ctx)?;
        let n = a.nrows();
        let mut run = Run::new(self, ctx);
        run.values(a, Block::whole(n))?;
        Ok(run.finish(n))
    }

    /// Overwrites `a` with the quasi-triangular Schur factor T and returns the
    /// unitary Q with `A = Q T Qᴴ`.
    pub fn schur<C: Communicator>(
        &self,
        a: &mut DMatrix<F>,
        ctx: &mut SdcContext<'_, C>,
    ) -> Result<(DMatrix<F>, SdcReport)> {
        self.prepare(a, ctx)?;
        let n = a.nrows();
        let mut run = Run::new(self, ctx);
        let q = run.vectors(a, Block::whole(n))?;
        Ok((q, run.finish(n)))
    }

    fn prepare<C: Communicator>(&self, a: &DMatrix<F>, ctx: &SdcContext<'_, C>) -> Result<()> {
        ensure_square(a.nrows(), a.ncols())?;
        self.config.validate()?;
        info!(
            "SDC on order {} (cutoff {}, {} rank(s) as {}x{})",
            a.nrows(),
            self.config.cutoff,
            ctx.grid.comm().size(),
            ctx.grid.height(),
            ctx.grid.width()
        );
        Ok(())
    }
}

/// Eigenvalues only; see [`SdcDriver::eigenvalues`].
pub fn sdc<F: SdcField, C: Communicator>(
    a: &mut DMatrix<F>,
    ctx: &mut SdcContext<'_, C>,
    config: &SdcConfig,
) -> Result<SdcReport> {
    SdcDriver::new(config.clone()).eigenvalues(a, ctx)
}

/// Full Schur decomposition; see [`SdcDriver::schur`].
pub fn sdc_with_vectors<F: SdcField, C: Communicator>(
    a: &mut DMatrix<F>,
    ctx: &mut SdcContext<'_, C>,
    config: &SdcConfig,
) -> Result<(DMatrix<F>, SdcReport)> {
    SdcDriver::new(config.clone()).schur(a, ctx)
}

struct Run<'r, 'c, F: SdcField, C: Communicator> {
    config: &'r SdcConfig,
    base: &'r dyn DenseSchur<F>,
    ctx: &'r mut SdcContext<'c, C>,
    report: SdcReport,
}

impl<'r, 'c, F: SdcField, C: Communicator> Run<'r, 'c, F, C> {
    fn new(driver: &'r SdcDriver<'_, F>, ctx: &'r mut SdcContext<'c, C>) -> Self {
        Run {
            config: &driver.config,
            base: driver.base,
            ctx,
            report: SdcReport::default(),
        }
    }

    fn finish(self, n: usize) -> SdcReport {
        let report = self.report;
        info!(
            "SDC on order {} done: {} split(s), {} dense block(s), {} exhausted, worst split {:.3e}",
            n, report.splits, report.dense_blocks, report.exhausted_splits, report.max_split_value
        );
        report
    }

    fn values(&mut self, a: &mut DMatrix<F>, block: Block) -> Result<()> {
        let n = block.size;
        if n == 0 || self.already_triangular(a, block) {
            return Ok(());
        }
        if n <= self.config.cutoff {
            self.dense(a, block)?;
            return Ok(());
        }

        let divided = spectral_divide(&mut block.view_mut(a), &mut *self.ctx, self.config);
        let outcome = match divided {
            Ok(outcome) => outcome,
            Err(err) => {
                self.degenerate(err, block)?;
                self.dense(a, block)?;
                return Ok(());
            }
        };
        let Some(k) = self.settle(outcome, block)? else {
            self.dense(a, block)?;
            return Ok(());
        };

        let (top, bottom) = block.split(k);
        zero_coupling(a, top, bottom);
        self.values(a, top)?;
        self.values(a, bottom)
    }

    fn vectors(&mut self, a: &mut DMatrix<F>, block: Block) -> Result<DMatrix<F>> {
        let n = block.size;
        if n == 0 {
            return Ok(DMatrix::zeros(0, 0));
        }
        if self.already_triangular(a, block) {
            return Ok(DMatrix::identity(n, n));
        }
        if n <= self.config.cutoff {
            return self.dense(a, block);
        }

        let divided = spectral_divide_with_vectors(&mut block.view_mut(a), &mut *self.ctx, self.config);
        let (outcome, mut q) = match divided {
            Ok(split) => split,
            Err(err) => {
                // the block is untouched, so the dense vectors are the block's vectors
                self.degenerate(err, block)?;
                return self.dense(a, block);
            }
        };
        let Some(k) = self.settle(outcome, block)? else {
            let z = self.dense(a, block)?;
            return Ok(q * z);
        };

        let (top, bottom) = block.split(k);
        zero_coupling(a, top, bottom);
        let z_top = self.vectors(a, top)?;
        let z_bottom = self.vectors(a, bottom)?;

        if self.config.form_atr {
            let mut atr = a.view_mut((top.offset, bottom.offset), (top.size, bottom.size));
            let updated = z_top.ad_mul(&atr) * &z_bottom;
            atr.copy_from(&updated);
        }

        let (left, right) = {
            let q = &q;
            rayon::join(
                || q.columns(0, k) * &z_top,
                || q.columns(k, n - k) * &z_bottom,
            )
        };
        q.columns_mut(0, k).copy_from(&left);
        q.columns_mut(k, n - k).copy_from(&right);
        Ok(q)
    }

    /// A block with nothing below its diagonal is already in Schur form.
    fn already_triangular(&mut self, a: &DMatrix<F>, block: Block) -> bool {
        let view = block.view(a);
        if !is_upper_triangular(&view) {
            return false;
        }
        self.report
            .eigenvalues
            .extend(view.diagonal().iter().map(|d| d.to_complex()));
        self.report.leaves.push(block);
        true
    }

    /// Solves `block` with the dense solver on the grid root and broadcasts
    /// the factors.
    fn dense(&mut self, a: &mut DMatrix<F>, block: Block) -> Result<DMatrix<F>> {
        let n = block.size;
        let mut solved = None;
        if self.ctx.grid.is_root() {
            match self.base.schur(block.view(a).clone_owned()) {
                Ok(factors) => solved = Some(factors),
                Err(err) => warn!("dense Schur on order {} failed: {}", n, err),
            }
        }
        self.ctx.grid.comm().broadcast(0, &mut solved);
        let (t, z) = solved.ok_or(SdcError::BaseSolverFailed(n))?;

        block.view_mut(a).copy_from(&t);
        self.report.eigenvalues.extend(quasi_triangular_eigenvalues(&t));
        self.report.dense_blocks += 1;
        self.report.leaves.push(block);
        Ok(z)
    }

    /// Applies the exhaustion policy; `None` sends the block to the dense solver.
    fn settle(&mut self, outcome: SplitOutcome, block: Block) -> Result<Option<usize>> {
        match outcome {
            SplitOutcome::Converged { partition, attempts } => {
                debug!(
                    "block at {} of order {}: cut at {} after {} attempt(s)",
                    block.offset, block.size, partition.index, attempts
                );
                self.accept(partition);
                Ok(Some(partition.index))
            }
            SplitOutcome::Exhausted { partition, attempts } => {
                self.report.exhausted_splits += 1;
                let tolerance = self.config.tolerance_for(block.size);
                match self.config.on_exhaustion {
                    ExhaustionPolicy::FallBackToDense => {
                        info!(
                            "block at {} of order {}: no split within {:.3e} after {} attempts, using dense solver",
                            block.offset, block.size, tolerance, attempts
                        );
                        self.report.dense_fallbacks += 1;
                        Ok(None)
                    }
                    ExhaustionPolicy::Accept => {
                        warn!(
                            "block at {} of order {}: accepting cut at {} with coupling {:.3e} > {:.3e}",
                            block.offset, block.size, partition.index, partition.value, tolerance
                        );
                        self.accept(partition);
                        Ok(Some(partition.index))
                    }
                    ExhaustionPolicy::Fail => Err(SdcError::SplitNotConverged {
                        size: block.size,
                        achieved: partition.value,
                        tolerance,
                    }),
                }
            }
        }
    }

    /// A generator that turned singular (an eigenvalue on the dividing line,
    /// typically a near-scalar block) is an unsplittable block rather than a
    /// failed run. Only the `Fail` policy passes the error on.
    fn degenerate(&mut self, err: SdcError, block: Block) -> Result<()> {
        match err {
            SdcError::SingularGenerator(_) if self.config.on_exhaustion != ExhaustionPolicy::Fail => {
                info!(
                    "block at {} of order {}: singular generator, using dense solver",
                    block.offset, block.size
                );
                self.report.dense_fallbacks += 1;
                Ok(())
            }
            err => Err(err),
        }
    }

    fn accept(&mut self, partition: Partition) {
        self.report.splits += 1;
        self.report.max_split_value = self.report.max_split_value.max(partition.value);
    }
}

/// Drops the bottom-left coupling of an accepted split.
fn zero_coupling<F: SdcField>(a: &mut DMatrix<F>, top: Block, bottom: Block) {
    fill_zero(&mut a.view_mut((bottom.offset, top.offset), (bottom.size, top.size)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{reconstruction_residual, unitarity_residual};
    use nalgebra::dmatrix;

    #[test]
    fn test_block_split() {
        let (top, bottom) = Block { offset: 3, size: 5 }.split(2);
        assert_eq!(top, Block { offset: 3, size: 2 });
        assert_eq!(bottom, Block { offset: 5, size: 3 });
    }

    #[test]
    fn test_empty_matrix() {
        let mut a = DMatrix::<f64>::zeros(0, 0);
        let mut ctx = SdcContext::local(1);
        let (q, report) = sdc_with_vectors(&mut a, &mut ctx, &SdcConfig::default()).expect("empty input");
        assert_eq!(q.shape(), (0, 0));
        assert!(report.eigenvalues.is_empty());
    }

    #[test]
    fn test_rejects_rectangular() {
        let mut a = DMatrix::<f64>::zeros(2, 3);
        let mut ctx = SdcContext::local(1);
        let err = sdc(&mut a, &mut ctx, &SdcConfig::default());
        assert!(matches!(err, Err(SdcError::NotSquare { rows: 2, cols: 3 })));
    }

    #[test]
    fn test_rejects_zero_cutoff() {
        let mut a = DMatrix::<f64>::identity(2, 2);
        let mut ctx = SdcContext::local(1);
        let err = sdc(&mut a, &mut ctx, &SdcConfig::default().with_cutoff(0));
        assert!(matches!(err, Err(SdcError::InvalidCutoff(0))));
    }

    #[test]
    fn test_small_matrix_goes_dense() {
        let a = dmatrix![1.0, 2.0, 0.0;
                         0.5, -1.0, 1.0;
                         0.0, 0.3, 2.0];
        let mut t = a.clone();
        let mut ctx = SdcContext::local(1);
        let (q, report) = sdc_with_vectors(&mut t, &mut ctx, &SdcConfig::default()).expect("dense path");
        assert_eq!(report.splits, 0);
        assert_eq!(report.dense_blocks, 1);
        assert!(unitarity_residual(&q) < 1e-12);
        assert!(reconstruction_residual(&a, &q, &t) < 1e-12);
    }
}
