// tests/common/mod.rs

#![allow(dead_code)]

use nalgebra::{Complex, DMatrix};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sdc_schur::householder::ImplicitHaar;
use sdc_schur::SdcField;

/// Haar-distributed orthogonal/unitary matrix of order `n`.
pub fn random_unitary<F: SdcField>(n: usize, seed: u64) -> DMatrix<F> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    ImplicitHaar::<F>::sample(n, &mut rng).to_dense()
}

/// `U T Uᴴ` for a random unitary `U`: same spectrum as `t`, no visible structure.
pub fn hide_structure<F: SdcField>(t: &DMatrix<F>, seed: u64) -> DMatrix<F> {
    let u = random_unitary::<F>(t.nrows(), seed);
    &u * t * u.adjoint()
}

pub fn gaussian<F: SdcField>(n: usize, seed: u64) -> DMatrix<F> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    DMatrix::from_fn(n, n, |_, _| F::sample_gaussian(&mut rng))
}

/// Upper-triangular matrix with the given diagonal and small fixed couplings.
pub fn upper_triangular(diagonal: &[f64], coupling: f64) -> DMatrix<f64> {
    let n = diagonal.len();
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            diagonal[i]
        } else if j > i {
            coupling / (j - i) as f64
        } else {
            0.0
        }
    })
}

/// Greedy nearest-neighbour matching of two spectra; returns the worst distance.
pub fn spectrum_distance(found: &[Complex<f64>], expected: &[Complex<f64>]) -> f64 {
    assert_eq!(found.len(), expected.len(), "spectra differ in size");
    let mut unused: Vec<Complex<f64>> = expected.to_vec();
    let mut worst = 0.0f64;
    for lambda in found {
        let (pos, dist) = unused
            .iter()
            .enumerate()
            .map(|(k, mu)| (k, (lambda - mu).norm()))
            .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });
        worst = worst.max(dist);
        unused.swap_remove(pos);
    }
    worst
}

/// Largest entry below the first subdiagonal.
pub fn below_subdiagonal<F: SdcField>(t: &DMatrix<F>) -> f64 {
    let n = t.nrows();
    let mut worst = 0.0f64;
    for j in 0..n {
        for i in (j + 2)..n {
            worst = worst.max(t[(i, j)].modulus());
        }
    }
    worst
}

/// Largest entry strictly below the diagonal.
pub fn below_diagonal<F: SdcField>(t: &DMatrix<F>) -> f64 {
    let n = t.nrows();
    let mut worst = 0.0f64;
    for j in 0..n {
        for i in (j + 1)..n {
            worst = worst.max(t[(i, j)].modulus());
        }
    }
    worst
}
