// src/partition.rs

//! Chooses where to cut a matrix that a spectral transform has left nearly
//! block upper-triangular.
//!
//! For a cut after column `j`, the coupling left behind is the bottom-left
//! block `A[j+1.., ..=j]`. Its entry-wise 1-norm is tracked for every `j` in a
//! single scan. Moving the cut one column right adds the strictly-lower part of
//! the next column and drops the strictly-left part of the next row.

use crate::comm::{Communicator, Grid};
use crate::field::SdcField;
use nalgebra::storage::Storage;
use nalgebra::{Dyn, Matrix};

/// Where to cut, and how much coupling the cut leaves behind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Partition {
    /// Size of the leading diagonal block, in `1..n`.
    pub index: usize,
    /// Entry-wise 1-norm of the bottom-left block at `index`; never negative.
    pub value: f64,
}

/// Picks the cut minimizing the bottom-left block norm.
///
/// Returns `None` when `n < 2`, as there is no cut to make.
pub fn compute_partition<F, S>(a: &Matrix<F, Dyn, Dyn, S>) -> Option<Partition>
where
    F: SdcField,
    S: Storage<F, Dyn, Dyn>,
{
    let n = a.nrows();
    if n < 2 {
        return None;
    }

    let mut col_sums = vec![0.0f64; n - 1];
    let mut row_sums = vec![0.0f64; n - 1];
    for j in 0..n - 1 {
        for i in (j + 1)..n {
            let v = a[(i, j)].modulus();
            col_sums[j] += v;
            row_sums[i - 1] += v;
        }
    }

    Some(scan_partition(&col_sums, &row_sums))
}

/// Grid-wide version of [`compute_partition`]: each rank sums the entries it
/// owns, the sums are all-reduced, and every rank then runs the same scan.
pub fn compute_partition_on_grid<F, S, C>(
    a: &Matrix<F, Dyn, Dyn, S>,
    grid: &Grid<'_, C>,
) -> Option<Partition>
where
    F: SdcField,
    S: Storage<F, Dyn, Dyn>,
    C: Communicator,
{
    let n = a.nrows();
    if n < 2 {
        return None;
    }

    // [column sums | row sums], reduced in one collective
    let mut sums = vec![0.0f64; 2 * (n - 1)];
    for j in 0..n - 1 {
        for i in (j + 1)..n {
            if grid.owns(i, j) {
                let v = a[(i, j)].modulus();
                sums[j] += v;
                sums[n - 1 + i - 1] += v;
            }
        }
    }
    grid.comm().all_reduce_sum(&mut sums);

    let (col_sums, row_sums) = sums.split_at(n - 1);
    Some(scan_partition(col_sums, row_sums))
}

fn scan_partition(col_sums: &[f64], row_sums: &[f64]) -> Partition {
    let mut norm = col_sums[0];
    let mut best = Partition {
        index: 1,
        value: norm,
    };
    for j in 1..col_sums.len() {
        norm = norm + col_sums[j] - row_sums[j - 1];
        if norm < best.value {
            best = Partition {
                index: j + 1,
                value: norm,
            };
        }
    }
    // The running update can dip below zero by rounding.
    best.value = best.value.max(0.0);
    best
}
