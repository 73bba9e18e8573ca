// src/field.rs

//! Scalar fields the solver runs over.
//!
//! Real matrices end in a quasi-triangular form with 2x2 blocks for
//! complex-conjugate eigenvalue pairs; complex matrices end triangular.

use nalgebra::{Complex, ComplexField};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal, UnitDisc};
use std::f64::consts::{FRAC_1_SQRT_2, TAU};

/// A real or complex field with the random draws the spectral splitter needs.
pub trait SdcField: ComplexField<RealField = f64> + Copy + Send + Sync + 'static {
    /// Whether eigenvalues can be split along any direction of the complex plane.
    const IS_COMPLEX: bool;

    /// Uniform draw from the ball of `radius` around `center`: an interval for
    /// real fields, a disk for complex ones.
    fn sample_ball<R: Rng + ?Sized>(center: Self, radius: f64, rng: &mut R) -> Self;

    /// Uniform unit-modulus rotation `e^{iθ}`, or `None` when the field is real.
    fn sample_rotation<R: Rng + ?Sized>(rng: &mut R) -> Option<Self>;

    /// Standard Gaussian entry (unit variance in the complex case).
    fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R) -> Self;

    fn to_complex(self) -> Complex<f64>;
}

impl SdcField for f64 {
    const IS_COMPLEX: bool = false;

    fn sample_ball<R: Rng + ?Sized>(center: Self, radius: f64, rng: &mut R) -> Self {
        if radius <= 0.0 {
            return center;
        }
        center + radius * rng.gen_range(-1.0..=1.0)
    }

    fn sample_rotation<R: Rng + ?Sized>(_rng: &mut R) -> Option<Self> {
        None
    }

    fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R) -> Self {
        StandardNormal.sample(rng)
    }

    fn to_complex(self) -> Complex<f64> {
        Complex::new(self, 0.0)
    }
}

impl SdcField for Complex<f64> {
    const IS_COMPLEX: bool = true;

    fn sample_ball<R: Rng + ?Sized>(center: Self, radius: f64, rng: &mut R) -> Self {
        if radius <= 0.0 {
            return center;
        }
        let [x, y]: [f64; 2] = UnitDisc.sample(rng);
        center + Complex::new(radius * x, radius * y)
    }

    fn sample_rotation<R: Rng + ?Sized>(rng: &mut R) -> Option<Self> {
        let angle: f64 = rng.gen_range(0.0..TAU);
        Some(Complex::new(angle.cos(), angle.sin()))
    }

    fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let re: f64 = StandardNormal.sample(rng);
        let im: f64 = StandardNormal.sample(rng);
        Complex::new(re * FRAC_1_SQRT_2, im * FRAC_1_SQRT_2)
    }

    fn to_complex(self) -> Complex<f64> {
        self
    }
}
