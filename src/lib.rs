//! Spectral divide-and-conquer Schur decomposition.
//!
//! A square matrix is reduced to quasi-triangular Schur form by recursively
//! splitting its spectrum with the matrix sign function. Each split is a
//! unitary similarity built from a QR factorization of a randomized spectral
//! projector, so the work is dominated by products, inversions and QR
//! factorizations rather than the sequential sweeps of classical QR iteration.
//! Blocks below a cutoff are finished by a conventional dense Schur solver.

pub mod comm;
pub mod config;
pub mod context;
pub mod dense_schur;
pub mod error;
pub mod field;
pub mod householder;
pub mod io;
pub mod kernels;
pub mod partition;
pub mod progress;
pub mod projector;
pub mod random;
pub mod sdc;
pub mod sign;
pub mod splitter;

pub use comm::{Communicator, Grid, SelfComm, ThreadComm};
pub use config::{ExhaustionPolicy, SdcConfig};
pub use context::SdcContext;
pub use dense_schur::{quasi_triangular_eigenvalues, DenseSchur, NalgebraSchur};
pub use error::{Result, SdcError};
pub use field::SdcField;
pub use partition::{compute_partition, compute_partition_on_grid, Partition};
pub use projector::{
    randomized_sign_divide, sign_divide, spectral_projector, ExplicitSimilarity, ImplicitSimilarity,
    SimilarityTransform, SplitOutcome,
};
pub use random::{RandomContext, DEFAULT_SEED};
pub use sdc::{sdc, sdc_with_vectors, Block, SdcDriver, SdcReport};
pub use sign::{matrix_sign, SignControl, SignScaling};
pub use splitter::{spectral_divide, spectral_divide_with_vectors};
