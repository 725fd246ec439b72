//! Basis factorization with product-form updates.
//!
//! Wraps an [`LuFactors`] of the basis matrix B and an eta file recording
//! column replacements since the last factorization. After `k` updates
//!
//! ```text
//! B_k^{-1} = E_k^{-1} ... E_1^{-1} B_0^{-1}
//! ```
//!
//! where `E_i` replaces column `r_i` of the identity with the ftran'd
//! entering column. The update counter forces a refactorization at the
//! configured limit.

use thiserror::Error;

use super::lu::LuFactors;
use super::sparse::SparseVec;
use crate::settings::SolverSettings;
use crate::util::numerics::inf_norm;

/// Pivots below this (relative to the entering column) are always rejected.
const RELATIVE_PIVOT_TOLERANCE: f64 = 1e-11;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactorError {
    /// Rank-deficient basis. `deficient_slots` could not be pivoted; the
    /// logicals of `free_rows` are natural replacements.
    #[error("singular basis: rank {rank} of {dim}")]
    Singular {
        rank: usize,
        dim: usize,
        deficient_slots: Vec<usize>,
        free_rows: Vec<usize>,
    },

    /// Update rejected: the pivot is too small for a stable update.
    #[error("update pivot {pivot:e} too small")]
    PivotTooSmall { pivot: f64 },
}

/// Outcome of a successful update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Success,
    /// The update was applied but the limit has been reached; refactorize
    /// before the next update.
    NeedsRefactorization,
}

#[derive(Debug, Clone)]
struct Eta {
    slot: usize,
    pivot: f64,
    /// Entering column entries other than `slot`
    entries: SparseVec,
}

/// Factorized basis.
#[derive(Debug, Clone)]
pub struct BasisFactor {
    m: usize,
    lu: LuFactors,
    etas: Vec<Eta>,
    update_limit: usize,
    pivot_threshold: f64,
    pivot_tolerance: f64,
    /// ‖B‖₁ at the last factorization
    basis_norm1: f64,
    factorized: bool,
}

impl BasisFactor {
    pub fn new(m: usize, settings: &SolverSettings) -> Self {
        Self {
            m,
            lu: LuFactors::default(),
            etas: Vec::new(),
            update_limit: settings.simplex_update_limit,
            pivot_threshold: settings.factor_pivot_threshold,
            pivot_tolerance: settings.factor_pivot_tolerance,
            basis_norm1: 0.0,
            factorized: false,
        }
    }

    pub fn dim(&self) -> usize {
        self.m
    }

    pub fn is_factorized(&self) -> bool {
        self.factorized
    }

    pub fn num_updates(&self) -> usize {
        self.etas.len()
    }

    /// Factorize the basis whose slot-th column is `columns[slot]`.
    pub fn factorize(&mut self, columns: &[SparseVec]) -> Result<(), FactorError> {
        debug_assert_eq!(columns.len(), self.m);
        let abs_tol = self.pivot_tolerance.max(1e-13);
        let (lu, deficiency) = LuFactors::factorize(self.m, columns, self.pivot_threshold, abs_tol);
        self.etas.clear();
        self.basis_norm1 = columns
            .iter()
            .map(|c| c.iter().map(|&(_, v)| v.abs()).sum::<f64>())
            .fold(0.0, f64::max);
        match deficiency {
            None => {
                self.lu = lu;
                self.factorized = true;
                Ok(())
            }
            Some(def) => {
                self.factorized = false;
                log::debug!(
                    "basis factorization rank deficient: rank {} of {}",
                    lu.rank(),
                    self.m
                );
                Err(FactorError::Singular {
                    rank: lu.rank(),
                    dim: self.m,
                    deficient_slots: def.slots,
                    free_rows: def.rows,
                })
            }
        }
    }

    /// Solve B z = x (row-indexed in, slot-indexed out).
    pub fn ftran(&self, rhs: &[f64]) -> Vec<f64> {
        let mut z = self.lu.solve(rhs);
        for eta in &self.etas {
            let zr = z[eta.slot] / eta.pivot;
            z[eta.slot] = zr;
            if zr != 0.0 {
                for &(i, a) in &eta.entries {
                    z[i] -= a * zr;
                }
            }
        }
        z
    }

    /// Solve Bᵀ y = c (slot-indexed in, row-indexed out).
    pub fn btran(&self, rhs: &[f64]) -> Vec<f64> {
        let mut c = rhs.to_vec();
        for eta in self.etas.iter().rev() {
            let s: f64 = eta.entries.iter().map(|&(i, a)| a * c[i]).sum();
            c[eta.slot] = (c[eta.slot] - s) / eta.pivot;
        }
        self.lu.solve_transpose(&c)
    }

    /// Whether [`BasisFactor::update`] would accept `alpha[slot]` as pivot.
    pub fn accepts_pivot(&self, alpha: &[f64], slot: usize) -> bool {
        let pivot = alpha[slot].abs();
        pivot > self.pivot_tolerance && pivot >= RELATIVE_PIVOT_TOLERANCE * inf_norm(alpha)
    }

    /// Replace the column in `slot` by the entering column whose ftran is
    /// `alpha`.
    pub fn update(&mut self, alpha: &[f64], slot: usize) -> Result<UpdateStatus, FactorError> {
        let pivot = alpha[slot];
        if !self.accepts_pivot(alpha, slot) {
            return Err(FactorError::PivotTooSmall { pivot });
        }
        let entries = alpha
            .iter()
            .enumerate()
            .filter(|&(i, &a)| i != slot && a != 0.0)
            .map(|(i, &a)| (i, a))
            .collect();
        self.etas.push(Eta { slot, pivot, entries });
        if self.etas.len() >= self.update_limit {
            Ok(UpdateStatus::NeedsRefactorization)
        } else {
            Ok(UpdateStatus::Success)
        }
    }

    /// Estimate of the 1-norm condition number ‖B‖₁‖B⁻¹‖₁ (Hager/Higham).
    pub fn condition_estimate(&self) -> f64 {
        let m = self.m;
        if m == 0 {
            return 1.0;
        }
        let mut x = vec![1.0 / m as f64; m];
        let mut estimate = 0.0_f64;
        for iter in 0..5 {
            let y = self.ftran(&x);
            let norm: f64 = y.iter().map(|v| v.abs()).sum();
            let xi: Vec<f64> = y.iter().map(|&v| if v >= 0.0 { 1.0 } else { -1.0 }).collect();
            let z = self.btran(&xi);
            let (j, zj) = z
                .iter()
                .enumerate()
                .fold((0, 0.0_f64), |acc, (i, &v)| if v.abs() > acc.1 { (i, v.abs()) } else { acc });
            let ztx: f64 = z.iter().zip(&x).map(|(a, b)| a * b).sum();
            if iter > 0 && (zj <= ztx || norm <= estimate) {
                estimate = estimate.max(norm);
                break;
            }
            estimate = norm;
            x = vec![0.0; m];
            x[j] = 1.0;
        }
        estimate * self.basis_norm1
    }
}
