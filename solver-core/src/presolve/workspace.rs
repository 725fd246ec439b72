//! Mutable row/column view of the model being reduced.
//!
//! Entries are kept both column-wise and row-wise so that rules can walk
//! either direction; removing a row or column drops its entries from both
//! views. Indices always refer to the original model.

use crate::linalg::sparse::{self, SparseVec};
use crate::problem::Model;

/// Bounds of integer columns are rounded inward by this tolerance.
const INTEGER_ROUNDING: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct PresolveWorkspace {
    pub col_cost: Vec<f64>,
    pub col_lower: Vec<f64>,
    pub col_upper: Vec<f64>,
    pub row_lower: Vec<f64>,
    pub row_upper: Vec<f64>,
    pub offset: f64,
    /// Active entries per column as `(row, value)`
    pub cols: Vec<SparseVec>,
    /// Active entries per row as `(col, value)`, columns ascending
    pub rows: Vec<SparseVec>,
    pub col_active: Vec<bool>,
    pub row_active: Vec<bool>,
    pub integer: Vec<bool>,
    /// Column has Hessian entries
    pub quadratic: Vec<bool>,
    /// Primal feasibility tolerance
    pub tol: f64,
}

impl PresolveWorkspace {
    pub fn new(model: &Model, tol: f64) -> Self {
        let n = model.num_col();
        let mut quadratic = vec![false; n];
        if let Some(q) = &model.hessian {
            for (_, (i, j)) in q.iter() {
                quadratic[i] = true;
                quadratic[j] = true;
            }
        }
        let integer: Vec<bool> = (0..n).map(|j| model.is_integer(j)).collect();
        let mut col_lower = model.col_lower.clone();
        let mut col_upper = model.col_upper.clone();
        for j in (0..n).filter(|&j| integer[j]) {
            col_lower[j] = (col_lower[j] - INTEGER_ROUNDING).ceil();
            col_upper[j] = (col_upper[j] + INTEGER_ROUNDING).floor();
        }
        Self {
            col_cost: model.col_cost.clone(),
            col_lower,
            col_upper,
            row_lower: model.row_lower.clone(),
            row_upper: model.row_upper.clone(),
            offset: model.offset,
            cols: sparse::to_columns(&model.a_matrix),
            rows: sparse::to_rows(&model.a_matrix),
            col_active: vec![true; n],
            row_active: vec![true; model.num_row()],
            integer,
            quadratic,
            tol,
        }
    }

    pub fn num_col(&self) -> usize {
        self.col_cost.len()
    }

    pub fn num_row(&self) -> usize {
        self.row_lower.len()
    }

    pub fn active_cols(&self) -> usize {
        self.col_active.iter().filter(|&&a| a).count()
    }

    pub fn active_rows(&self) -> usize {
        self.row_active.iter().filter(|&&a| a).count()
    }

    /// First column or row whose lower bound exceeds its upper bound.
    pub fn bound_conflict(&self) -> Option<String> {
        let crossed = |l: f64, u: f64| l > u + self.tol * (1.0 + u.abs().min(l.abs()));
        if let Some(j) = (0..self.num_col()).find(|&j| crossed(self.col_lower[j], self.col_upper[j])) {
            return Some(format!(
                "column {} bounds [{}, {}]",
                j, self.col_lower[j], self.col_upper[j]
            ));
        }
        (0..self.num_row())
            .find(|&i| self.row_active[i] && crossed(self.row_lower[i], self.row_upper[i]))
            .map(|i| format!("row {} bounds [{}, {}]", i, self.row_lower[i], self.row_upper[i]))
    }

    pub fn remove_row(&mut self, i: usize) {
        for (j, _) in std::mem::take(&mut self.rows[i]) {
            self.cols[j].retain(|&(r, _)| r != i);
        }
        self.row_active[i] = false;
    }

    pub fn remove_col(&mut self, j: usize) {
        for (i, _) in std::mem::take(&mut self.cols[j]) {
            self.rows[i].retain(|&(c, _)| c != j);
        }
        self.col_active[j] = false;
    }

    /// Substitute `x_j = value` into the row bounds and objective, then drop
    /// the column.
    pub fn fix_col(&mut self, j: usize, value: f64) {
        for &(i, a) in &self.cols[j] {
            let shift = a * value;
            if self.row_lower[i].is_finite() {
                self.row_lower[i] -= shift;
            }
            if self.row_upper[i].is_finite() {
                self.row_upper[i] -= shift;
            }
        }
        self.offset += self.col_cost[j] * value;
        self.remove_col(j);
    }

    /// Column bounds with inward rounding for integer columns.
    pub fn rounded(&self, j: usize, lower: f64, upper: f64) -> (f64, f64) {
        if self.integer[j] {
            ((lower - INTEGER_ROUNDING).ceil(), (upper + INTEGER_ROUNDING).floor())
        } else {
            (lower, upper)
        }
    }

    /// Minimum and maximum activity of row `i` over the column bounds.
    pub fn activity(&self, i: usize) -> Activity {
        let mut act = Activity::default();
        for &(j, a) in &self.rows[i] {
            let (lo, hi) = if a > 0.0 {
                (a * self.col_lower[j], a * self.col_upper[j])
            } else {
                (a * self.col_upper[j], a * self.col_lower[j])
            };
            if lo.is_finite() {
                act.min_finite += lo;
            } else {
                act.min_infinite += 1;
            }
            if hi.is_finite() {
                act.max_finite += hi;
            } else {
                act.max_infinite += 1;
            }
        }
        act
    }

    /// The reduced model over active rows and columns, with the maps from
    /// reduced to original indices.
    pub fn reduced_model(&self, original: &Model) -> (Model, Vec<usize>, Vec<usize>) {
        let col_map: Vec<usize> = (0..self.num_col()).filter(|&j| self.col_active[j]).collect();
        let row_map: Vec<usize> = (0..self.num_row()).filter(|&i| self.row_active[i]).collect();
        let mut new_row = vec![usize::MAX; self.num_row()];
        for (k, &i) in row_map.iter().enumerate() {
            new_row[i] = k;
        }
        let columns: Vec<SparseVec> = col_map
            .iter()
            .map(|&j| self.cols[j].iter().map(|&(i, a)| (new_row[i], a)).collect())
            .collect();

        let pick = |v: &[f64], map: &[usize]| map.iter().map(|&k| v[k]).collect::<Vec<f64>>();
        let mut model = Model::new(
            pick(&self.col_cost, &col_map),
            pick(&self.col_lower, &col_map),
            pick(&self.col_upper, &col_map),
            pick(&self.row_lower, &row_map),
            pick(&self.row_upper, &row_map),
            sparse::from_columns(row_map.len(), &columns),
        )
        .with_offset(self.offset);
        if let Some(q) = &original.hessian {
            model.hessian = Some(sparse::submatrix(q, &col_map, &col_map));
        }
        if let Some(types) = &original.integrality {
            model.integrality = Some(col_map.iter().map(|&j| types[j]).collect());
        }
        (model, col_map, row_map)
    }
}

/// Finite parts and infinite-contribution counts of a row's activity range.
#[derive(Debug, Clone, Copy, Default)]
pub struct Activity {
    pub min_finite: f64,
    pub min_infinite: usize,
    pub max_finite: f64,
    pub max_infinite: usize,
}

impl Activity {
    pub fn min(&self) -> f64 {
        if self.min_infinite > 0 {
            f64::NEG_INFINITY
        } else {
            self.min_finite
        }
    }

    pub fn max(&self) -> f64 {
        if self.max_infinite > 0 {
            f64::INFINITY
        } else {
            self.max_finite
        }
    }

    /// Minimum activity without the contribution `lo` of one entry.
    pub fn min_without(&self, lo: f64) -> f64 {
        match (self.min_infinite, lo.is_finite()) {
            (0, _) => self.min_finite - lo,
            (1, false) => self.min_finite,
            _ => f64::NEG_INFINITY,
        }
    }

    /// Maximum activity without the contribution `hi` of one entry.
    pub fn max_without(&self, hi: f64) -> f64 {
        match (self.max_infinite, hi.is_finite()) {
            (0, _) => self.max_finite - hi,
            (1, false) => self.max_finite,
            _ => f64::INFINITY,
        }
    }
}
