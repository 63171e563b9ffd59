//! Least-squares cascade solver.
//!
//! ## Purpose
//!
//! This module accumulates regression rows into a hierarchy of packed
//! upper-triangular factors and solves the normal equations by back
//! substitution. The polyfit pass feeds it rows `[1, x, …, x^deg, y]` and
//! reads back polynomial coefficients and a residual deviation.
//!
//! ## Design notes
//!
//! * **Block structure**: each level holds a row-major packed
//!   upper-triangular matrix `R = [Rx S; 0 Rz]`, where `Rx` spans the
//!   `len_x` regressors, `Rz` the `len_z` observations, and `S` couples
//!   them. A new row updates level 0 through Givens rotations.
//! * **Cascading**: once a level has absorbed its row quota it is rotated
//!   into the next level and cleared. Each level's quota doubles, so deep
//!   levels summarize ever larger spans. This bounds rounding-error growth
//!   against naive accumulation over large datasets.
//! * **Precision**: arithmetic is `f64` regardless of the dataset's sample
//!   type.
//! * **Single shot**: solving consumes the accumulator; the type system
//!   enforces the collapse-once contract.
//!
//! ## Invariants
//!
//! * `len_x + len_z <= FULL_MAX`; storage is fixed, no allocation per row.
//! * Diagonals stay non-negative (rotation convention).
//! * `total` equals the number of inserted rows across all levels.

// Feature-gated imports
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

// External dependencies
use num_traits::Float;

// Internal dependencies
use crate::primitives::errors::PlotError;

/// Widest supported row vector (`len_x + len_z`).
pub const FULL_MAX: usize = 10;

/// Number of cascade levels.
pub const CASCADE_MAX: usize = 4;

/// Packed triangle capacity for the widest row.
const TRI_CAP: usize = FULL_MAX * (FULL_MAX + 1) / 2;

// ============================================================================
// Cascade Accumulator
// ============================================================================

/// Incremental least-squares accumulator.
#[derive(Debug, Clone)]
pub struct Lse {
    cascades: usize,
    len_x: usize,
    len_z: usize,
    /// Row quota of level 0; level `i` collapses at `threshold << i`.
    threshold: u64,
    total: u64,
    keep: [u64; CASCADE_MAX],
    m: [f64; TRI_CAP * CASCADE_MAX],
}

/// Solution extracted by [`Lse::solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct LseSolution {
    len_x: usize,
    len_z: usize,
    /// Column-major `len_x × len_z` coefficient matrix `B = Rx \ S`.
    beta: Vec<f64>,
    /// Standard deviation per observation column.
    deviation: Vec<f64>,
    /// Rows absorbed over the accumulator's lifetime.
    pub total: u64,
}

impl Lse {
    /// Configure an accumulator for `len_x` regressors and `len_z`
    /// observation columns over `cascades` levels.
    pub fn new(cascades: usize, len_x: usize, len_z: usize) -> Result<Self, PlotError> {
        let n_full = len_x + len_z;
        if len_x == 0 || len_z == 0 || n_full > FULL_MAX {
            return Err(PlotError::SolverShape {
                len_x,
                len_z,
                max: FULL_MAX,
            });
        }
        let cascades = cascades.clamp(1, CASCADE_MAX);
        Ok(Self {
            cascades,
            len_x,
            len_z,
            threshold: 4 * n_full as u64,
            total: 0,
            keep: [0; CASCADE_MAX],
            m: [0.0; TRI_CAP * CASCADE_MAX],
        })
    }

    /// Combined row width.
    #[inline]
    pub fn n_full(&self) -> usize {
        self.len_x + self.len_z
    }

    /// Rows absorbed so far.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Absorb one row `[x .. z ..]` into level 0.
    pub fn insert(&mut self, row: &[f64]) {
        let n = self.n_full();
        debug_assert_eq!(row.len(), n);

        let mut v = [0.0f64; FULL_MAX];
        v[..n].copy_from_slice(&row[..n]);

        rotate_row(self.level_mut(0), n, &mut v);
        self.keep[0] += 1;
        self.total += 1;

        // Ripple collapses while lower levels are over quota.
        let mut i = 0;
        while i + 1 < self.cascades && self.keep[i] >= (self.threshold << i) {
            self.collapse(i);
            i += 1;
        }
    }

    /// Collapse all levels and solve.
    pub fn solve(mut self) -> LseSolution {
        for i in 0..self.cascades.saturating_sub(1) {
            self.collapse(i);
        }

        let n = self.n_full();
        let (len_x, len_z) = (self.len_x, self.len_z);
        let top = self.level(self.cascades - 1);

        // Back-substitute B = Rx \ S, one observation column at a time.
        let mut beta = vec![0.0f64; len_x * len_z];
        for j in 0..len_z {
            for i in (0..len_x).rev() {
                let mut acc = top[tri_index(n, i, len_x + j)];
                for k in (i + 1)..len_x {
                    acc = acc - top[tri_index(n, i, k)] * beta[j * len_x + k];
                }
                let diag = top[tri_index(n, i, i)];
                beta[j * len_x + i] = if diag != 0.0 { acc / diag } else { 0.0 };
            }
        }

        // Deviation per observation column: norm(Rz[:, j]) / sqrt(total - 1).
        let mut deviation = vec![0.0f64; len_z];
        if self.total > 1 {
            let norm_scale = Float::sqrt((self.total - 1) as f64);
            for j in 0..len_z {
                let mut sq = 0.0f64;
                for i in 0..=j {
                    let rij = top[tri_index(n, len_x + i, len_x + j)];
                    sq += rij * rij;
                }
                deviation[j] = Float::sqrt(sq) / norm_scale;
            }
        }

        LseSolution {
            len_x,
            len_z,
            beta,
            deviation,
            total: self.total,
        }
    }

    fn level(&self, i: usize) -> &[f64] {
        &self.m[i * TRI_CAP..(i + 1) * TRI_CAP]
    }

    fn level_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.m[i * TRI_CAP..(i + 1) * TRI_CAP]
    }

    /// Rotate level `i`'s rows into level `i + 1` and clear level `i`.
    fn collapse(&mut self, i: usize) {
        let n = self.n_full();
        let mut v = [0.0f64; FULL_MAX];

        for row in 0..n {
            v[..row].iter_mut().for_each(|c| *c = 0.0);
            let base = tri_index(n, row, row);
            let src = self.level(i);
            v[row..n].copy_from_slice(&src[base..base + (n - row)]);
            rotate_row(self.level_mut(i + 1), n, &mut v);
        }

        self.keep[i + 1] += self.keep[i];
        self.keep[i] = 0;
        self.level_mut(i).iter_mut().for_each(|c| *c = 0.0);
    }
}

impl LseSolution {
    /// Coefficient `B[i, j]` for regressor `i` of observation column `j`.
    #[inline]
    pub fn beta(&self, i: usize, j: usize) -> f64 {
        self.beta[j * self.len_x + i]
    }

    /// Coefficients of observation column `j`, lowest regressor first.
    #[inline]
    pub fn coefficients(&self, j: usize) -> &[f64] {
        &self.beta[j * self.len_x..(j + 1) * self.len_x]
    }

    /// Standard deviation of observation column `j`.
    #[inline]
    pub fn deviation(&self, j: usize) -> f64 {
        self.deviation[j]
    }
}

// ============================================================================
// Packed Triangle Rotations
// ============================================================================

/// Index of element `(i, j)`, `j >= i`, in a row-major packed triangle.
#[inline]
fn tri_index(n: usize, i: usize, j: usize) -> usize {
    i * (2 * n - i + 1) / 2 + (j - i)
}

/// Givens-rotate row vector `v` into the packed triangle `m` of width `n`.
///
/// On return `v` is annihilated and the triangle's diagonal stays
/// non-negative.
fn rotate_row(m: &mut [f64], n: usize, v: &mut [f64]) {
    let mut base = 0;
    for i in 0..n {
        let vi = v[i];
        if vi != 0.0 {
            let rii = m[base];
            let rho = Float::hypot(rii, vi);
            let c = rii / rho;
            let s = vi / rho;
            m[base] = rho;

            for j in 1..(n - i) {
                let rij = m[base + j];
                let vj = v[i + j];
                m[base + j] = c * rij + s * vj;
                v[i + j] = c * vj - s * rij;
            }
        }
        base += n - i;
    }
}
