// src/config.rs

//! Run-time knobs for the divide-and-conquer driver.

use crate::error::{Result, SdcError};
use crate::sign::SignControl;

/// What the driver does with a randomized split that used up every attempt
/// without reaching tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Hand the block to the dense base-case solver instead of splitting it.
    #[default]
    FallBackToDense,
    /// Keep the last attempt's split and log a warning.
    Accept,
    /// Abort with [`SdcError::SplitNotConverged`].
    Fail,
}

/// Configuration for [`crate::sdc::SdcDriver`].
#[derive(Clone, Debug)]
pub struct SdcConfig {
    /// Blocks of this order or smaller go straight to the dense solver.
    pub cutoff: usize,
    /// Randomized attempts per split.
    pub max_its: usize,
    /// Relative split tolerance; `None` (or zero) selects `50·n·ε` per block.
    pub rel_tol: Option<f64>,
    /// Keep the off-diagonal block of T consistent with the returned Schur vectors.
    pub form_atr: bool,
    pub sign: SignControl,
    pub on_exhaustion: ExhaustionPolicy,
}

impl Default for SdcConfig {
    fn default() -> Self {
        SdcConfig {
            cutoff: 256,
            max_its: 10,
            rel_tol: None,
            form_atr: true,
            sign: SignControl::default(),
            on_exhaustion: ExhaustionPolicy::default(),
        }
    }
}

impl SdcConfig {
    pub fn with_cutoff(mut self, cutoff: usize) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn with_max_its(mut self, max_its: usize) -> Self {
        self.max_its = max_its;
        self
    }

    pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
        self.rel_tol = Some(rel_tol);
        self
    }

    pub fn with_form_atr(mut self, form_atr: bool) -> Self {
        self.form_atr = form_atr;
        self
    }

    pub fn with_sign_control(mut self, sign: SignControl) -> Self {
        self.sign = sign;
        self
    }

    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.on_exhaustion = policy;
        self
    }

    /// Split tolerance for a block of order `n`.
    pub fn tolerance_for(&self, n: usize) -> f64 {
        split_tolerance(self.rel_tol, n)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cutoff < 1 {
            return Err(SdcError::InvalidCutoff(self.cutoff));
        }
        if self.max_its < 1 {
            return Err(SdcError::InvalidArgument {
                arg: "max_its",
                reason: "at least one randomized attempt is required".to_string(),
            });
        }
        if let Some(tol) = self.rel_tol {
            if !tol.is_finite() || tol < 0.0 {
                return Err(SdcError::InvalidArgument {
                    arg: "rel_tol",
                    reason: format!("expected a finite non-negative tolerance, got {}", tol),
                });
            }
        }
        if self.sign.max_its < 1 {
            return Err(SdcError::InvalidArgument {
                arg: "sign.max_its",
                reason: "the sign iteration needs at least one step".to_string(),
            });
        }
        Ok(())
    }
}

/// `rel_tol` when positive, else `50·n·ε`.
pub(crate) fn split_tolerance(rel_tol: Option<f64>, n: usize) -> f64 {
    match rel_tol {
        Some(tol) if tol > 0.0 => tol,
        _ => 50.0 * n as f64 * f64::EPSILON,
    }
}
