//! Solution, basis and status types handed back to callers.
//!
//! All of them derive `serde` traits so snapshots can be serialized by the
//! caller; nothing in the engine performs I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Termination status of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelStatus {
    /// No solve has run since the model last changed
    #[default]
    NotSet,
    /// The model has no rows and no columns
    ModelEmpty,
    Optimal,
    Infeasible,
    /// Dual infeasible; primal feasibility not established
    UnboundedOrInfeasible,
    Unbounded,
    /// Dual objective exceeded the configured objective bound
    ObjectiveBound,
    TimeLimit,
    IterationLimit,
    NodeLimit,
    LeafLimit,
    StallLimit,
    /// Numerical trouble that survived every recovery attempt
    SolveError,
}

impl ModelStatus {
    /// Definitive outcome: the solve proved something about the model.
    pub fn is_definitive(self) -> bool {
        matches!(
            self,
            ModelStatus::ModelEmpty
                | ModelStatus::Optimal
                | ModelStatus::Infeasible
                | ModelStatus::Unbounded
                | ModelStatus::UnboundedOrInfeasible
        )
    }

    /// A resource or search limit stopped the solve.
    pub fn is_limit(self) -> bool {
        matches!(
            self,
            ModelStatus::ObjectiveBound
                | ModelStatus::TimeLimit
                | ModelStatus::IterationLimit
                | ModelStatus::NodeLimit
                | ModelStatus::LeafLimit
                | ModelStatus::StallLimit
        )
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelStatus::NotSet => "Not Set",
            ModelStatus::ModelEmpty => "Empty",
            ModelStatus::Optimal => "Optimal",
            ModelStatus::Infeasible => "Infeasible",
            ModelStatus::UnboundedOrInfeasible => "Primal infeasible or unbounded",
            ModelStatus::Unbounded => "Unbounded",
            ModelStatus::ObjectiveBound => "Bound on objective reached",
            ModelStatus::TimeLimit => "Time limit reached",
            ModelStatus::IterationLimit => "Iteration limit reached",
            ModelStatus::NodeLimit => "Node limit reached",
            ModelStatus::LeafLimit => "Leaf limit reached",
            ModelStatus::StallLimit => "Stall node limit reached",
            ModelStatus::SolveError => "Solve error",
        };
        write!(f, "{}", s)
    }
}

/// Status of one column or row in a basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasisStatus {
    Basic,
    AtLower,
    AtUpper,
    /// Nonbasic free variable held at zero
    Free,
    /// Nonbasic with equal lower and upper bounds
    Fixed,
}

impl BasisStatus {
    pub fn is_basic(self) -> bool {
        self == BasisStatus::Basic
    }

    /// Nonbasic status natural for the given bounds (lower preferred).
    pub fn nonbasic_for(lower: f64, upper: f64) -> Self {
        if lower == upper {
            BasisStatus::Fixed
        } else if lower.is_finite() {
            BasisStatus::AtLower
        } else if upper.is_finite() {
            BasisStatus::AtUpper
        } else {
            BasisStatus::Free
        }
    }

    /// Value a nonbasic variable with this status takes.
    pub fn nonbasic_value(self, lower: f64, upper: f64) -> f64 {
        match self {
            BasisStatus::AtLower | BasisStatus::Fixed if lower.is_finite() => lower,
            BasisStatus::AtUpper if upper.is_finite() => upper,
            _ => {
                if lower.is_finite() {
                    lower
                } else if upper.is_finite() {
                    upper
                } else {
                    0.0
                }
            }
        }
    }

    /// Whether this status can be held with the given bounds.
    pub fn consistent_with(self, lower: f64, upper: f64) -> bool {
        match self {
            BasisStatus::Basic => true,
            BasisStatus::AtLower => lower.is_finite(),
            BasisStatus::AtUpper => upper.is_finite(),
            BasisStatus::Free => !lower.is_finite() && !upper.is_finite(),
            BasisStatus::Fixed => lower == upper && lower.is_finite(),
        }
    }
}

/// A simplex basis over columns and rows.
///
/// Variables are indexed in computational form: column `j` is `j`, the
/// logical of row `i` is `num_col + i`. `basic_index[k]` is the variable in
/// basic slot `k`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Basis {
    /// False for an interior (non-vertex) solution or an unset basis
    pub valid: bool,
    pub col_status: Vec<BasisStatus>,
    pub row_status: Vec<BasisStatus>,
    pub basic_index: Vec<usize>,
}

impl Default for Basis {
    fn default() -> Self {
        Self::invalid(0, 0)
    }
}

impl Basis {
    /// Placeholder marking "no vertex basis available".
    pub fn invalid(num_col: usize, num_row: usize) -> Self {
        Self {
            valid: false,
            col_status: vec![BasisStatus::Free; num_col],
            row_status: vec![BasisStatus::Basic; num_row],
            basic_index: Vec::new(),
        }
    }

    /// Slack basis: every row logical basic, columns at their natural bound.
    pub fn slack(col_lower: &[f64], col_upper: &[f64], num_row: usize) -> Self {
        let n = col_lower.len();
        Self {
            valid: true,
            col_status: (0..n)
                .map(|j| BasisStatus::nonbasic_for(col_lower[j], col_upper[j]))
                .collect(),
            row_status: vec![BasisStatus::Basic; num_row],
            basic_index: (n..n + num_row).collect(),
        }
    }

    pub fn num_col(&self) -> usize {
        self.col_status.len()
    }

    pub fn num_row(&self) -> usize {
        self.row_status.len()
    }

    /// Status of variable `var` in computational indexing.
    pub fn status(&self, var: usize) -> BasisStatus {
        let n = self.num_col();
        if var < n {
            self.col_status[var]
        } else {
            self.row_status[var - n]
        }
    }

    pub fn set_status(&mut self, var: usize, status: BasisStatus) {
        let n = self.num_col();
        if var < n {
            self.col_status[var] = status;
        } else {
            self.row_status[var - n] = status;
        }
    }

    pub fn num_basic(&self) -> usize {
        self.col_status
            .iter()
            .chain(&self.row_status)
            .filter(|s| s.is_basic())
            .count()
    }

    /// Rebuild `basic_index` from statuses (ascending variable order).
    pub fn rebuild_index(&mut self) {
        let n = self.num_col();
        self.basic_index = (0..n + self.num_row())
            .filter(|&v| self.status(v).is_basic())
            .collect();
    }

    /// Exactly one basic variable per row and an index agreeing with the
    /// statuses.
    pub fn is_consistent(&self) -> bool {
        let m = self.num_row();
        if self.basic_index.len() != m || self.num_basic() != m {
            return false;
        }
        let total = self.num_col() + m;
        let mut seen = vec![false; total];
        for &v in &self.basic_index {
            if v >= total || seen[v] || !self.status(v).is_basic() {
                return false;
            }
            seen[v] = true;
        }
        true
    }
}

/// Primal and dual values for every column and row.
///
/// Duals follow the convention `col_dual = c + Qx - Aᵀ row_dual` in the
/// model's own objective sense.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Solution {
    pub value_valid: bool,
    pub dual_valid: bool,
    pub col_value: Vec<f64>,
    pub col_dual: Vec<f64>,
    pub row_value: Vec<f64>,
    pub row_dual: Vec<f64>,
    pub objective_value: f64,
    pub status: ModelStatus,
}

impl Solution {
    /// Sized but not yet valid.
    pub fn empty(num_col: usize, num_row: usize) -> Self {
        Self {
            value_valid: false,
            dual_valid: false,
            col_value: vec![0.0; num_col],
            col_dual: vec![0.0; num_col],
            row_value: vec![0.0; num_row],
            row_dual: vec![0.0; num_row],
            objective_value: 0.0,
            status: ModelStatus::NotSet,
        }
    }
}

/// Counters and quality measures of the last solve.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SolveInfo {
    pub simplex_iterations: usize,
    pub ipm_iterations: usize,
    pub crossover_iterations: usize,
    pub mip_nodes: usize,
    pub objective_value: f64,
    pub mip_dual_bound: f64,
    pub mip_gap: f64,
    pub num_primal_infeasibilities: usize,
    pub max_primal_infeasibility: f64,
    pub num_dual_infeasibilities: usize,
    pub max_dual_infeasibility: f64,
    pub presolve_rows_removed: usize,
    pub presolve_cols_removed: usize,
}

impl SolveInfo {
    /// Simplex, IPM and crossover iterations together.
    pub fn total_iterations(&self) -> usize {
        self.simplex_iterations + self.ipm_iterations + self.crossover_iterations
    }
}
