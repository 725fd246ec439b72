//! Reduction records and solution recovery.
//!
//! Presolve pushes one [`Reduction`] per elementary transformation. Postsolve
//! expands the reduced solution into the original index space and undoes the
//! records in strict reverse order, restoring primal values, basis statuses
//! and row duals. Column duals and row activities are recomputed from the
//! original model at the end.
//!
//! Statuses that cannot be restored exactly (a column left nonbasic at a
//! bound the original model does not have) are repaired to a valid nonbasic
//! status and reported through [`Recovered::repaired`]; a simplex cleanup on
//! the original model then restores optimality.

use crate::linalg::sparse::{self, SparseVec};
use crate::problem::Model;
use crate::solution::{Basis, BasisStatus};
use crate::util::numerics::sparse_dot;

/// One elementary presolve transformation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// Row without entries dropped.
    EmptyRow { row: usize },
    /// Column without entries fixed at `value`.
    EmptyCol { col: usize, value: f64 },
    /// Column with equal bounds substituted out.
    FixedCol { col: usize, value: f64 },
    /// Row `a x_col ∈ [lower, upper]` turned into column bounds.
    /// `implied_*` holds the column bound the row imposed when it was
    /// tighter than the existing one.
    SingletonRow {
        row: usize,
        col: usize,
        coef: f64,
        lower: f64,
        upper: f64,
        implied_lower: Option<f64>,
        implied_upper: Option<f64>,
    },
    /// Free, costless column alone in `row`; both removed. `rest` holds the
    /// row's other entries at removal time.
    FreeColumnSingleton {
        row: usize,
        col: usize,
        coef: f64,
        lower: f64,
        upper: f64,
        rest: SparseVec,
    },
    /// Row implied by the column bounds.
    RedundantRow { row: usize },
    /// Column bound tightened from the activity bounds of `row`.
    BoundTightening {
        col: usize,
        row: usize,
        coef: f64,
        old_lower: f64,
        old_upper: f64,
        new_lower: f64,
        new_upper: f64,
    },
    /// Column fixed at the bound its cost and locks prefer.
    DominatedCol { col: usize, value: f64 },
    /// Row `removed` equal to `ratio` times row `kept`; bounds intersected
    /// into `kept`.
    DuplicateRow {
        kept: usize,
        removed: usize,
        ratio: f64,
        kept_lower: f64,
        kept_upper: f64,
        removed_lower: f64,
        removed_upper: f64,
    },
    /// Column `removed` equal to `ratio` times column `kept` (cost
    /// included); `kept` now carries `x_kept + ratio * x_removed`.
    DuplicateCol {
        kept: usize,
        removed: usize,
        ratio: f64,
        kept_lower: f64,
        kept_upper: f64,
        removed_lower: f64,
        removed_upper: f64,
    },
}

impl Reduction {
    /// Number of rows the record removes.
    pub fn rows_removed(&self) -> usize {
        match self {
            Reduction::EmptyRow { .. }
            | Reduction::SingletonRow { .. }
            | Reduction::FreeColumnSingleton { .. }
            | Reduction::RedundantRow { .. }
            | Reduction::DuplicateRow { .. } => 1,
            _ => 0,
        }
    }

    /// Number of columns the record removes.
    pub fn cols_removed(&self) -> usize {
        match self {
            Reduction::EmptyCol { .. }
            | Reduction::FixedCol { .. }
            | Reduction::FreeColumnSingleton { .. }
            | Reduction::DominatedCol { .. }
            | Reduction::DuplicateCol { .. } => 1,
            _ => 0,
        }
    }
}

/// Solution of the reduced model handed to postsolve.
#[derive(Debug, Clone, Copy)]
pub struct ReducedSolution<'a> {
    pub col_value: &'a [f64],
    pub row_dual: &'a [f64],
    /// Reduced basis; an invalid basis means statuses are inferred from values.
    pub basis: &'a Basis,
}

/// Solution recovered in the original index space.
#[derive(Debug, Clone)]
pub struct Recovered {
    pub col_value: Vec<f64>,
    pub row_value: Vec<f64>,
    pub col_dual: Vec<f64>,
    pub row_dual: Vec<f64>,
    pub basis: Basis,
    /// Some status had to be repaired; the basis is valid but may not be
    /// optimal for the original model.
    pub repaired: bool,
}

/// Ordered reductions plus the index maps of the reduced model.
#[derive(Debug, Clone, Default)]
pub struct ReductionStack {
    num_col: usize,
    num_row: usize,
    reductions: Vec<Reduction>,
    /// Reduced column index → original column index
    col_map: Vec<usize>,
    /// Reduced row index → original row index
    row_map: Vec<usize>,
}

impl ReductionStack {
    pub fn new(num_col: usize, num_row: usize) -> Self {
        Self {
            num_col,
            num_row,
            reductions: Vec::new(),
            col_map: (0..num_col).collect(),
            row_map: (0..num_row).collect(),
        }
    }

    pub fn push(&mut self, reduction: Reduction) {
        self.reductions.push(reduction);
    }

    pub fn len(&self) -> usize {
        self.reductions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reductions.is_empty()
    }

    pub fn reductions(&self) -> &[Reduction] {
        &self.reductions
    }

    pub fn set_maps(&mut self, col_map: Vec<usize>, row_map: Vec<usize>) {
        self.col_map = col_map;
        self.row_map = row_map;
    }

    pub fn col_map(&self) -> &[usize] {
        &self.col_map
    }

    pub fn row_map(&self) -> &[usize] {
        &self.row_map
    }

    pub fn rows_removed(&self) -> usize {
        self.reductions.iter().map(Reduction::rows_removed).sum()
    }

    pub fn cols_removed(&self) -> usize {
        self.reductions.iter().map(Reduction::cols_removed).sum()
    }

    /// Undo every reduction against `original` (the minimization model
    /// presolve started from).
    pub fn postsolve(&self, original: &Model, reduced: ReducedSolution<'_>, tol: f64) -> Recovered {
        debug_assert_eq!(original.num_col(), self.num_col);
        debug_assert_eq!(original.num_row(), self.num_row);
        let mut rec = Recovery::new(original, tol);
        let infer = !reduced.basis.valid;
        for (k, &j) in self.col_map.iter().enumerate() {
            rec.x[j] = reduced.col_value[k];
            rec.col_status[j] = if infer {
                rec.status_from_value(rec.x[j], original.col_lower[j], original.col_upper[j])
            } else {
                reduced.basis.col_status[k]
            };
        }
        for (k, &i) in self.row_map.iter().enumerate() {
            rec.y[i] = reduced.row_dual[k];
            if !infer {
                rec.row_status[i] = reduced.basis.row_status[k];
            }
        }

        for reduction in self.reductions.iter().rev() {
            rec.undo(reduction);
        }
        rec.finish(infer)
    }
}

/// Working state of one postsolve.
struct Recovery<'a> {
    model: &'a Model,
    columns: Vec<SparseVec>,
    x: Vec<f64>,
    y: Vec<f64>,
    col_status: Vec<BasisStatus>,
    row_status: Vec<BasisStatus>,
    tol: f64,
}

impl<'a> Recovery<'a> {
    fn new(model: &'a Model, tol: f64) -> Self {
        let (n, m) = (model.num_col(), model.num_row());
        Self {
            model,
            columns: sparse::to_columns(&model.a_matrix),
            x: vec![0.0; n],
            y: vec![0.0; m],
            col_status: vec![BasisStatus::Basic; n],
            row_status: vec![BasisStatus::Basic; m],
            tol,
        }
    }

    fn near(&self, a: f64, b: f64) -> bool {
        a.is_finite() && b.is_finite() && (a - b).abs() <= self.tol * (1.0 + b.abs())
    }

    /// Nonbasic status of a variable sitting at `value`, or basic when it is
    /// strictly between its bounds.
    fn status_from_value(&self, value: f64, lower: f64, upper: f64) -> BasisStatus {
        if lower == upper && lower.is_finite() {
            BasisStatus::Fixed
        } else if self.near(value, lower) {
            BasisStatus::AtLower
        } else if self.near(value, upper) {
            BasisStatus::AtUpper
        } else {
            BasisStatus::Basic
        }
    }

    /// Reduced cost of column `j` from the duals restored so far.
    fn reduced_cost(&self, j: usize) -> f64 {
        let qx = self
            .model
            .hessian
            .as_ref()
            .map_or(0.0, |q| sparse_dot(&sparse::column(q, j), &self.x));
        self.model.col_cost[j] + qx - sparse_dot(&self.columns[j], &self.y)
    }

    /// Row status when the row is tight on its lower (`lower_side`) or
    /// upper bound.
    fn row_bound_status(&self, row: usize, lower_side: bool) -> BasisStatus {
        if self.model.row_lower[row] == self.model.row_upper[row] {
            BasisStatus::Fixed
        } else if lower_side {
            BasisStatus::AtLower
        } else {
            BasisStatus::AtUpper
        }
    }

    fn undo(&mut self, reduction: &Reduction) {
        match *reduction {
            Reduction::EmptyRow { row } | Reduction::RedundantRow { row } => {
                self.y[row] = 0.0;
                self.row_status[row] = BasisStatus::Basic;
            }
            Reduction::EmptyCol { col, value }
            | Reduction::FixedCol { col, value }
            | Reduction::DominatedCol { col, value } => {
                self.x[col] = value;
                let (l, u) = (self.model.col_lower[col], self.model.col_upper[col]);
                self.col_status[col] = match self.status_from_value(value, l, u) {
                    BasisStatus::Basic => BasisStatus::nonbasic_for(l, u),
                    status => status,
                };
            }
            Reduction::SingletonRow {
                row,
                col,
                coef,
                lower,
                upper,
                implied_lower,
                implied_upper,
            } => self.undo_singleton_row(row, col, coef, lower, upper, implied_lower, implied_upper),
            Reduction::FreeColumnSingleton {
                row,
                col,
                coef,
                lower,
                upper,
                ref rest,
            } => {
                let s = sparse_dot(rest, &self.x);
                let target = s.max(lower).min(upper);
                self.x[col] = (target - s) / coef;
                self.y[row] = 0.0;
                if target == s {
                    self.col_status[col] = BasisStatus::Free;
                    self.row_status[row] = BasisStatus::Basic;
                } else {
                    self.col_status[col] = BasisStatus::Basic;
                    self.row_status[row] = self.row_bound_status(row, target == lower);
                }
            }
            Reduction::BoundTightening {
                col,
                row,
                coef,
                old_lower,
                old_upper,
                new_lower,
                new_upper,
            } => {
                let status = self.col_status[col];
                let xj = self.x[col];
                let at_new_lower = !status.is_basic()
                    && new_lower > old_lower
                    && self.near(xj, new_lower);
                let at_new_upper = !status.is_basic()
                    && new_upper < old_upper
                    && self.near(xj, new_upper);
                if !(at_new_lower || at_new_upper) || !self.row_status[row].is_basic() {
                    return;
                }
                // The implying row is tight: it takes over the nonbasic slot.
                let d = self.reduced_cost(col);
                self.y[row] += d / coef;
                self.col_status[col] = BasisStatus::Basic;
                let col_lower_side = if at_new_lower && at_new_upper { d >= 0.0 } else { at_new_lower };
                let lower_side = (coef > 0.0) == col_lower_side;
                self.row_status[row] = self.row_bound_status(row, lower_side);
            }
            Reduction::DuplicateRow {
                kept,
                removed,
                ratio,
                kept_lower,
                kept_upper,
                removed_lower,
                removed_upper,
            } => {
                let lower_side = match self.row_status[kept] {
                    BasisStatus::AtLower => true,
                    BasisStatus::AtUpper => false,
                    BasisStatus::Fixed => self.y[kept] >= 0.0,
                    _ => {
                        self.y[removed] = 0.0;
                        self.row_status[removed] = BasisStatus::Basic;
                        return;
                    }
                };
                // Bound of `kept` in terms of the removed row.
                let from_removed = if (ratio > 0.0) == lower_side {
                    removed_lower
                } else {
                    removed_upper
                } / ratio;
                let own = if lower_side { kept_lower } else { kept_upper };
                let tighter = if lower_side { from_removed > own } else { from_removed < own };
                if tighter {
                    self.y[removed] = self.y[kept] / ratio;
                    self.y[kept] = 0.0;
                    self.row_status[kept] = BasisStatus::Basic;
                    self.row_status[removed] = self.row_bound_status(removed, (ratio > 0.0) == lower_side);
                } else {
                    self.y[removed] = 0.0;
                    self.row_status[removed] = BasisStatus::Basic;
                }
            }
            Reduction::DuplicateCol {
                kept,
                removed,
                ratio,
                kept_lower,
                kept_upper,
                removed_lower,
                removed_upper,
            } => self.undo_duplicate_col(
                kept,
                removed,
                ratio,
                (kept_lower, kept_upper),
                (removed_lower, removed_upper),
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn undo_singleton_row(
        &mut self,
        row: usize,
        col: usize,
        coef: f64,
        lower: f64,
        upper: f64,
        implied_lower: Option<f64>,
        implied_upper: Option<f64>,
    ) {
        let xj = self.x[col];
        let status = self.col_status[col];
        let at_lower = implied_lower.map_or(false, |b| self.near(xj, b))
            && !status.is_basic();
        let at_upper = implied_upper.map_or(false, |b| self.near(xj, b))
            && !status.is_basic();
        if !(at_lower || at_upper) {
            self.y[row] = 0.0;
            self.row_status[row] = BasisStatus::Basic;
            return;
        }
        // For a fixed column the sign of its reduced cost decides the side.
        let d = self.reduced_cost(col);
        let col_lower_side = if at_lower && at_upper { d >= 0.0 } else { at_lower };
        self.y[row] = d / coef;
        self.col_status[col] = BasisStatus::Basic;
        self.row_status[row] = if lower == upper {
            BasisStatus::Fixed
        } else if (coef > 0.0) == col_lower_side {
            BasisStatus::AtLower
        } else {
            BasisStatus::AtUpper
        };
    }

    fn undo_duplicate_col(
        &mut self,
        kept: usize,
        removed: usize,
        ratio: f64,
        (lj, uj): (f64, f64),
        (lk, uk): (f64, f64),
    ) {
        let z = self.x[kept];
        let status = self.col_status[kept];
        let (merged_l, merged_u) = if ratio > 0.0 {
            (lj + ratio * lk, uj + ratio * uk)
        } else {
            (lj + ratio * uk, uj + ratio * lk)
        };
        let side = if status.is_basic() {
            None
        } else if self.near(z, merged_l) {
            Some(true)
        } else if self.near(z, merged_u) {
            Some(false)
        } else {
            None
        };
        if let Some(lower_side) = side {
            let (xj, xk) = match (lower_side, ratio > 0.0) {
                (true, true) => (lj, lk),
                (false, true) => (uj, uk),
                (true, false) => (lj, uk),
                (false, false) => (uj, lk),
            };
            self.x[kept] = xj;
            self.x[removed] = xk;
            self.col_status[kept] = self.status_from_value(xj, lj, uj);
            self.col_status[removed] = self.status_from_value(xk, lk, uk);
            return;
        }

        // Basic (or free) merged column: one part sits at a bound.
        let within = |v: f64, l: f64, u: f64| v >= l - self.tol && v <= u + self.tol;
        for bound in [lk, uk] {
            if bound.is_finite() && within(z - ratio * bound, lj, uj) {
                self.x[removed] = bound;
                self.x[kept] = z - ratio * bound;
                self.col_status[removed] = self.status_from_value(bound, lk, uk);
                self.col_status[kept] = status;
                return;
            }
        }
        for bound in [lj, uj] {
            if bound.is_finite() && within((z - bound) / ratio, lk, uk) {
                self.x[kept] = bound;
                self.x[removed] = (z - bound) / ratio;
                self.col_status[kept] = self.status_from_value(bound, lj, uj);
                self.col_status[removed] = status;
                return;
            }
        }
        let xk = 0.0_f64.max(lk).min(uk);
        self.x[removed] = xk;
        self.x[kept] = z - ratio * xk;
        self.col_status[removed] = BasisStatus::nonbasic_for(lk, uk);
        self.col_status[kept] = status;
    }

    /// Recompute activities and column duals, then validate the statuses
    /// against the original bounds.
    fn finish(mut self, inferred: bool) -> Recovered {
        let model = self.model;
        let (n, m) = (model.num_col(), model.num_row());
        let row_value = model.row_activity(&self.x);
        let qx = model.hessian_product(&self.x);
        let aty = sparse::spmv_transpose(&model.a_matrix, &self.y);
        let col_dual: Vec<f64> = (0..n).map(|j| model.col_cost[j] + qx[j] - aty[j]).collect();

        let mut repaired = false;
        for j in 0..n {
            let (l, u) = (model.col_lower[j], model.col_upper[j]);
            let status = self.col_status[j];
            if !status.is_basic() && !self.nonbasic_holds(status, self.x[j], l, u) {
                self.col_status[j] = self.repair(self.x[j], l, u);
                repaired = true;
            }
        }
        for i in 0..m {
            let (l, u) = (model.row_lower[i], model.row_upper[i]);
            if inferred {
                self.row_status[i] = self.status_from_value(row_value[i], l, u);
                continue;
            }
            let status = self.row_status[i];
            if !status.is_basic() && !self.nonbasic_holds(status, row_value[i], l, u) {
                self.row_status[i] = self.repair(row_value[i], l, u);
                repaired = true;
            }
        }

        let mut basis = Basis {
            valid: true,
            col_status: self.col_status,
            row_status: self.row_status,
            basic_index: Vec::new(),
        };
        basis.rebuild_index();
        basis.valid = !inferred && basis.is_consistent();
        if !inferred && !basis.valid {
            log::debug!(
                "postsolve: recovered basis has {} basic variables for {} rows",
                basis.num_basic(),
                m
            );
        }
        Recovered {
            col_value: self.x,
            row_value,
            col_dual,
            row_dual: self.y,
            basis,
            repaired,
        }
    }

    fn nonbasic_holds(&self, status: BasisStatus, value: f64, l: f64, u: f64) -> bool {
        status.consistent_with(l, u)
            && match status {
                BasisStatus::AtLower => self.near(value, l),
                BasisStatus::AtUpper => self.near(value, u),
                BasisStatus::Fixed => self.near(value, l),
                BasisStatus::Free => value.abs() <= self.tol,
                BasisStatus::Basic => true,
            }
    }

    fn repair(&self, value: f64, l: f64, u: f64) -> BasisStatus {
        match self.status_from_value(value, l, u) {
            BasisStatus::Basic => BasisStatus::nonbasic_for(l, u),
            status => status,
        }
    }
}
