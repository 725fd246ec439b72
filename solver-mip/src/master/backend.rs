//! Master problem backend trait and types.

use solver_core::linalg::factor::BasisFactor;
use solver_core::linalg::sparse::SparseVec;
use solver_core::util::numerics::{inf_norm, sparse_dot};
use solver_core::{Basis, BasisStatus, Model, SolveContext};

use crate::search::BoundChange;

/// Status of master problem solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterStatus {
    /// Optimal solution found.
    Optimal,

    /// Master LP/QP is infeasible (node can be pruned).
    Infeasible,

    /// Relaxation unbounded.
    Unbounded,

    /// Dual objective reached the objective bound (node can be pruned).
    Cutoff,

    /// Iteration or time limit before optimality.
    Limit,

    /// Numerical difficulties.
    NumericalError,
}

/// Result from solving the master problem.
#[derive(Debug, Clone)]
pub struct MasterResult {
    /// Solve status.
    pub status: MasterStatus,

    /// Primal solution x.
    pub x: Vec<f64>,

    /// Primal objective value (minimization form, offset included).
    pub obj_val: f64,

    /// Final basis of the node LP (invalid for QP relaxations).
    pub basis: Basis,

    /// Factorization of `basis` when available.
    pub factor: Option<BasisFactor>,

    /// Simplex or IPM iterations spent.
    pub iterations: usize,

    /// Pool ids of the cut rows, in row order after the base rows.
    pub cut_ids: Vec<usize>,
}

impl MasterResult {
    /// Create an infeasible result.
    pub fn infeasible() -> Self {
        Self {
            status: MasterStatus::Infeasible,
            x: Vec::new(),
            obj_val: f64::INFINITY,
            basis: Basis::default(),
            factor: None,
            iterations: 0,
            cut_ids: Vec::new(),
        }
    }

    /// A solve that failed without producing anything usable.
    pub fn numerical_error() -> Self {
        Self {
            status: MasterStatus::NumericalError,
            ..Self::infeasible()
        }
    }

    /// Warm start for children of this node.
    pub fn warm_start(&self) -> Option<WarmStart> {
        self.basis.valid.then(|| WarmStart {
            basis: self.basis.clone(),
            cut_ids: self.cut_ids.clone(),
        })
    }
}

/// A basis together with the cut rows it was built for.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmStart {
    pub basis: Basis,
    pub cut_ids: Vec<usize>,
}

impl WarmStart {
    /// Re-shape the basis for an LP with `base_rows` rows followed by the
    /// rows of `cut_ids`. New cut rows start basic; the simplex repairs the
    /// basic count if dropped rows were nonbasic.
    pub fn fit(&self, base_rows: usize, cut_ids: &[usize]) -> Basis {
        let mut row_status: Vec<BasisStatus> = self.basis.row_status[..base_rows].to_vec();
        for id in cut_ids {
            let status = self
                .cut_ids
                .iter()
                .position(|c| c == id)
                .map_or(BasisStatus::Basic, |k| self.basis.row_status[base_rows + k]);
            row_status.push(status);
        }
        let mut basis = Basis {
            valid: true,
            col_status: self.basis.col_status.clone(),
            row_status,
            basic_index: Vec::new(),
        };
        basis.rebuild_index();
        basis
    }
}

/// Source of a cut (for tracking and debugging).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutSource {
    /// Gomory mixed-integer cut from a tableau row.
    Gomory {
        /// Column whose tableau row generated the cut.
        basic_var: usize,
    },

    /// User-provided cut.
    User,
}

/// A linear cut: a^T x <= rhs.
#[derive(Debug, Clone)]
pub struct LinearCut {
    /// Coefficients as (column, value) pairs.
    pub coefs: SparseVec,

    /// Right-hand side.
    pub rhs: f64,

    /// Source of this cut.
    pub source: CutSource,
}

impl LinearCut {
    /// Create a new cut.
    pub fn new(coefs: SparseVec, rhs: f64, source: CutSource) -> Self {
        Self { coefs, rhs, source }
    }

    /// Compute violation: a^T x - rhs (positive means violated).
    pub fn violation(&self, x: &[f64]) -> f64 {
        sparse_dot(&self.coefs, x) - self.rhs
    }

    /// Check if cut is violated by more than tolerance.
    pub fn is_violated(&self, x: &[f64], tol: f64) -> bool {
        self.violation(x) > tol
    }

    /// Violation divided by the Euclidean norm of the coefficients.
    pub fn efficacy(&self, x: &[f64]) -> f64 {
        let norm = self.coefs.iter().map(|&(_, a)| a * a).sum::<f64>().sqrt();
        if norm > 0.0 {
            self.violation(x) / norm
        } else {
            0.0
        }
    }

    /// Normalize the cut so that ||a||_inf = 1.
    pub fn normalize(&mut self) {
        let values: Vec<f64> = self.coefs.iter().map(|&(_, a)| a).collect();
        let max_coef = inf_norm(&values);
        if max_coef > 1e-12 {
            for (_, c) in &mut self.coefs {
                *c /= max_coef;
            }
            self.rhs /= max_coef;
        }
    }

    /// Check if cut has valid coefficients (not all zeros, finite).
    pub fn is_valid(&self) -> bool {
        let has_nonzero = self.coefs.iter().any(|&(_, c)| c.abs() > 1e-12);
        let all_finite = self.coefs.iter().all(|&(_, c)| c.is_finite()) && self.rhs.is_finite();
        has_nonzero && all_finite
    }
}

/// One relaxation solve: node bounds, cut rows and an optional warm start.
#[derive(Debug, Clone, Copy)]
pub struct MasterRequest<'a> {
    pub changes: &'a [BoundChange],
    pub cuts: &'a [(usize, LinearCut)],
    pub warm: Option<&'a WarmStart>,
    /// Simplex iteration cap (strong branching, diving)
    pub iteration_limit: Option<usize>,
}

impl<'a> MasterRequest<'a> {
    pub fn new(changes: &'a [BoundChange], cuts: &'a [(usize, LinearCut)]) -> Self {
        Self {
            changes,
            cuts,
            warm: None,
            iteration_limit: None,
        }
    }

    pub fn with_warm(mut self, warm: Option<&'a WarmStart>) -> Self {
        self.warm = warm;
        self
    }

    pub fn with_iteration_limit(mut self, limit: usize) -> Self {
        self.iteration_limit = Some(limit);
        self
    }
}

/// Trait for master problem backends (LP/QP solvers).
///
/// The master holds the continuous relaxation of the MIP. A node LP is the
/// relaxation with the node's bound changes applied and the given cuts
/// appended as rows. Solving takes `&self` so sibling nodes can be solved
/// from several threads.
pub trait MasterBackend: Sync {
    /// Build the node LP of a request.
    fn node_model(&self, changes: &[BoundChange], cuts: &[(usize, LinearCut)]) -> Model;

    /// Solve the node LP of a request.
    fn solve(&self, request: &MasterRequest<'_>, ctx: &SolveContext) -> MasterResult;

    /// Get the number of variables.
    fn num_vars(&self) -> usize;

    /// Get the number of constraints (excluding cuts).
    fn num_base_constraints(&self) -> usize;
}
