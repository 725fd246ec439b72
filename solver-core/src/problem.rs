//! Model data structures, validation and editing.
//!
//! The engine works with the bounded form
//!
//! ```text
//! minimize / maximize   offset + c^T x + (1/2) x^T Q x
//! subject to            row_lower <= A x <= row_upper
//!                       col_lower <=   x <= col_upper
//! ```
//!
//! with optional integrality on a subset of columns. Q is stored as a full
//! symmetric matrix. Infinite bounds are `±f64::INFINITY`; values beyond the
//! configured `infinite_bound` are normalized to infinity before solving.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::linalg::sparse::{self, SparseCsc, SparseVec};

/// Variable type for mixed-integer problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarType {
    /// Continuous variable
    Continuous,
    /// Integer variable
    Integer,
}

/// Objective sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ObjSense {
    #[default]
    Minimize,
    Maximize,
}

impl ObjSense {
    /// +1 for minimize, -1 for maximize.
    pub fn sign(self) -> f64 {
        match self {
            ObjSense::Minimize => 1.0,
            ObjSense::Maximize => -1.0,
        }
    }
}

/// Problems with model data. Raised before any mutation or solve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("{what} has length {found}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{what} index {index} out of range (size {size})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        size: usize,
    },

    #[error("malformed column starts: {0}")]
    MalformedStarts(String),

    #[error("{what} {index} is NaN")]
    NotANumber { what: &'static str, index: usize },

    #[error("cost of column {index} is infinite ({value})")]
    InfiniteCost { index: usize, value: f64 },

    #[error("matrix entry ({row}, {col}) = {value} is not finite or exceeds the large value limit")]
    BadMatrixValue { row: usize, col: usize, value: f64 },

    #[error("Hessian entry ({row}, {col}) has no symmetric counterpart")]
    HessianNotSymmetric { row: usize, col: usize },

    #[error("Hessian diagonal entry {index} = {value} is negative")]
    HessianNotConvex { index: usize, value: f64 },

    #[error("duplicate index {index} in {what}")]
    DuplicateIndex { what: &'static str, index: usize },
}

/// An LP / QP / MIP model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Linear cost vector c (length n)
    pub col_cost: Vec<f64>,

    /// Column lower bounds (length n)
    pub col_lower: Vec<f64>,

    /// Column upper bounds (length n)
    pub col_upper: Vec<f64>,

    /// Row lower bounds (length m)
    pub row_lower: Vec<f64>,

    /// Row upper bounds (length m)
    pub row_upper: Vec<f64>,

    /// Constraint matrix A (m × n, CSC)
    pub a_matrix: SparseCsc,

    pub sense: ObjSense,

    /// Constant objective term
    pub offset: f64,

    /// Quadratic term Q (n × n, full symmetric). None for LP/MIP.
    pub hessian: Option<SparseCsc>,

    /// Per-column integrality. None means all continuous.
    pub integrality: Option<Vec<VarType>>,
}

impl Default for Model {
    fn default() -> Self {
        Self::empty()
    }
}

/// Validation limits, taken from the solver settings.
#[derive(Debug, Clone, Copy)]
pub struct ModelLimits {
    pub infinite_cost: f64,
    pub infinite_bound: f64,
    pub small_matrix_value: f64,
    pub large_matrix_value: f64,
}

impl Default for ModelLimits {
    fn default() -> Self {
        Self {
            infinite_cost: 1e20,
            infinite_bound: 1e20,
            small_matrix_value: 1e-9,
            large_matrix_value: 1e15,
        }
    }
}

impl From<&crate::SolverSettings> for ModelLimits {
    fn from(s: &crate::SolverSettings) -> Self {
        Self {
            infinite_cost: s.infinite_cost,
            infinite_bound: s.infinite_bound,
            small_matrix_value: s.small_matrix_value,
            large_matrix_value: s.large_matrix_value,
        }
    }
}

/// Build a CSC matrix from raw column-start arrays, validating the structure.
pub fn matrix_from_csc_arrays(
    num_row: usize,
    num_col: usize,
    start: &[usize],
    index: &[usize],
    value: &[f64],
) -> Result<SparseCsc, ModelError> {
    if start.len() != num_col + 1 {
        return Err(ModelError::DimensionMismatch {
            what: "column starts",
            expected: num_col + 1,
            found: start.len(),
        });
    }
    if index.len() != value.len() {
        return Err(ModelError::DimensionMismatch {
            what: "matrix values",
            expected: index.len(),
            found: value.len(),
        });
    }
    if start[0] != 0 || start[num_col] != index.len() {
        return Err(ModelError::MalformedStarts(format!(
            "starts must run from 0 to {}, got {}..{}",
            index.len(),
            start[0],
            start[num_col]
        )));
    }
    let mut triplets = Vec::with_capacity(index.len());
    for j in 0..num_col {
        if start[j] > start[j + 1] {
            return Err(ModelError::MalformedStarts(format!(
                "start of column {} exceeds start of column {}",
                j,
                j + 1
            )));
        }
        let mut seen = Vec::with_capacity(start[j + 1] - start[j]);
        for k in start[j]..start[j + 1] {
            let i = index[k];
            if i >= num_row {
                return Err(ModelError::IndexOutOfRange {
                    what: "row",
                    index: i,
                    size: num_row,
                });
            }
            if seen.contains(&i) {
                return Err(ModelError::DuplicateIndex { what: "matrix column", index: i });
            }
            seen.push(i);
            triplets.push((i, j, value[k]));
        }
    }
    Ok(sparse::from_triplets(num_row, num_col, triplets))
}

impl Model {
    /// A model with no rows and no columns.
    pub fn empty() -> Self {
        Self {
            col_cost: Vec::new(),
            col_lower: Vec::new(),
            col_upper: Vec::new(),
            row_lower: Vec::new(),
            row_upper: Vec::new(),
            a_matrix: sparse::zeros(0, 0),
            sense: ObjSense::Minimize,
            offset: 0.0,
            hessian: None,
            integrality: None,
        }
    }

    /// Linear model from its parts. Call [`Model::validate`] before solving.
    pub fn new(
        col_cost: Vec<f64>,
        col_lower: Vec<f64>,
        col_upper: Vec<f64>,
        row_lower: Vec<f64>,
        row_upper: Vec<f64>,
        a_matrix: SparseCsc,
    ) -> Self {
        Self {
            col_cost,
            col_lower,
            col_upper,
            row_lower,
            row_upper,
            a_matrix,
            ..Self::empty()
        }
    }

    pub fn with_hessian(mut self, q: SparseCsc) -> Self {
        self.hessian = Some(q);
        self
    }

    pub fn with_integrality(mut self, integrality: Vec<VarType>) -> Self {
        self.integrality = Some(integrality);
        self
    }

    pub fn with_sense(mut self, sense: ObjSense) -> Self {
        self.sense = sense;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn num_col(&self) -> usize {
        self.col_cost.len()
    }

    pub fn num_row(&self) -> usize {
        self.row_lower.len()
    }

    pub fn num_nz(&self) -> usize {
        self.a_matrix.nnz()
    }

    pub fn is_qp(&self) -> bool {
        self.hessian.as_ref().map_or(false, |q| q.nnz() > 0)
    }

    pub fn is_mip(&self) -> bool {
        self.integrality
            .as_ref()
            .map_or(false, |v| v.iter().any(|&t| t == VarType::Integer))
    }

    pub fn is_integer(&self, j: usize) -> bool {
        self.integrality
            .as_ref()
            .map_or(false, |v| v[j] == VarType::Integer)
    }

    /// Column `j` of A as `(row, value)` pairs.
    pub fn column(&self, j: usize) -> SparseVec {
        sparse::column(&self.a_matrix, j)
    }

    /// Row activities A x.
    pub fn row_activity(&self, x: &[f64]) -> Vec<f64> {
        sparse::spmv(&self.a_matrix, x)
    }

    /// Q x, or zeros for an LP.
    pub fn hessian_product(&self, x: &[f64]) -> Vec<f64> {
        match &self.hessian {
            Some(q) => sparse::spmv(q, x),
            None => vec![0.0; self.num_col()],
        }
    }

    /// offset + c^T x + (1/2) x^T Q x, in the model's own sense.
    pub fn objective_value(&self, x: &[f64]) -> f64 {
        let linear: f64 = self.col_cost.iter().zip(x).map(|(c, v)| c * v).sum();
        let quad = self
            .hessian
            .as_ref()
            .map_or(0.0, |q| 0.5 * sparse::quad_form(q, x));
        self.offset + linear + quad
    }

    /// Maximum violation of row and column bounds at `x`.
    pub fn max_primal_violation(&self, x: &[f64]) -> f64 {
        let mut worst = 0.0_f64;
        for j in 0..self.num_col() {
            worst = worst
                .max(self.col_lower[j] - x[j])
                .max(x[j] - self.col_upper[j]);
        }
        for (i, r) in self.row_activity(x).into_iter().enumerate() {
            worst = worst.max(self.row_lower[i] - r).max(r - self.row_upper[i]);
        }
        worst
    }

    /// Equivalent minimization model (costs, Hessian and offset negated for
    /// maximization).
    pub fn to_minimization(&self) -> Model {
        let mut m = self.clone();
        if self.sense == ObjSense::Maximize {
            for c in &mut m.col_cost {
                *c = -*c;
            }
            m.offset = -m.offset;
            if let Some(q) = &self.hessian {
                let negated = q.iter().map(|(v, (i, j))| (i, j, -*v));
                m.hessian = Some(sparse::from_triplets(q.rows(), q.cols(), negated));
            }
            m.sense = ObjSense::Minimize;
        }
        m
    }

    /// Validate dimensions and numerical content.
    pub fn validate(&self, limits: &ModelLimits) -> Result<(), ModelError> {
        let n = self.num_col();
        let m = self.num_row();

        check_len("col_lower", n, self.col_lower.len())?;
        check_len("col_upper", n, self.col_upper.len())?;
        check_len("row_upper", m, self.row_upper.len())?;
        check_len("matrix rows", m, self.a_matrix.rows())?;
        check_len("matrix columns", n, self.a_matrix.cols())?;

        for (j, &c) in self.col_cost.iter().enumerate() {
            if c.is_nan() {
                return Err(ModelError::NotANumber { what: "cost", index: j });
            }
            if c.abs() >= limits.infinite_cost {
                return Err(ModelError::InfiniteCost { index: j, value: c });
            }
        }
        check_not_nan("column lower bound", &self.col_lower)?;
        check_not_nan("column upper bound", &self.col_upper)?;
        check_not_nan("row lower bound", &self.row_lower)?;
        check_not_nan("row upper bound", &self.row_upper)?;
        if self.offset.is_nan() {
            return Err(ModelError::NotANumber { what: "offset", index: 0 });
        }

        for (val, (row, col)) in self.a_matrix.iter() {
            if !val.is_finite() || val.abs() > limits.large_matrix_value {
                return Err(ModelError::BadMatrixValue { row, col, value: *val });
            }
        }

        if let Some(q) = &self.hessian {
            check_len("Hessian rows", n, q.rows())?;
            check_len("Hessian columns", n, q.cols())?;
            for (val, (row, col)) in q.iter() {
                if !val.is_finite() {
                    return Err(ModelError::BadMatrixValue { row, col, value: *val });
                }
                if row == col && *val < 0.0 {
                    return Err(ModelError::HessianNotConvex { index: row, value: *val });
                }
            }
            if let Some((row, col, _)) = sparse::asymmetry(q) {
                return Err(ModelError::HessianNotSymmetric { row, col });
            }
        }

        if let Some(int) = &self.integrality {
            check_len("integrality", n, int.len())?;
        }
        Ok(())
    }

    /// Map bounds beyond `infinite_bound` to ±∞ and drop matrix entries
    /// smaller than `small_matrix_value`. Returns the number of dropped entries.
    pub fn normalize(&mut self, limits: &ModelLimits) -> usize {
        let inf = limits.infinite_bound;
        for v in self.col_lower.iter_mut().chain(self.row_lower.iter_mut()) {
            if *v <= -inf {
                *v = f64::NEG_INFINITY;
            } else if *v >= inf {
                *v = f64::INFINITY;
            }
        }
        for v in self.col_upper.iter_mut().chain(self.row_upper.iter_mut()) {
            if *v >= inf {
                *v = f64::INFINITY;
            } else if *v <= -inf {
                *v = f64::NEG_INFINITY;
            }
        }
        let before = self.a_matrix.nnz();
        let small = limits.small_matrix_value;
        let kept: Vec<_> = self
            .a_matrix
            .iter()
            .filter(|(v, _)| v.abs() >= small)
            .map(|(v, (i, j))| (i, j, *v))
            .collect();
        if kept.len() != before {
            self.a_matrix = sparse::from_triplets(self.num_row(), self.num_col(), kept);
        }
        before - self.a_matrix.nnz()
    }

    // ---- editing ----------------------------------------------------------

    /// Append columns. `columns[k]` lists the `(row, value)` entries of the
    /// k-th new column.
    pub fn add_cols(
        &mut self,
        cost: &[f64],
        lower: &[f64],
        upper: &[f64],
        columns: &[SparseVec],
    ) -> Result<(), ModelError> {
        let k = cost.len();
        check_len("new column lower bounds", k, lower.len())?;
        check_len("new column upper bounds", k, upper.len())?;
        check_len("new column entries", k, columns.len())?;
        check_not_nan("new column lower bound", lower)?;
        check_not_nan("new column upper bound", upper)?;
        check_not_nan("new column cost", cost)?;
        let m = self.num_row();
        for col in columns {
            check_entries("row", col, m)?;
        }

        let n = self.num_col();
        let mut triplets: Vec<_> = self.a_matrix.iter().map(|(v, (i, j))| (i, j, *v)).collect();
        for (k, col) in columns.iter().enumerate() {
            triplets.extend(col.iter().map(|&(i, v)| (i, n + k, v)));
        }
        self.a_matrix = sparse::from_triplets(m, n + k, triplets);
        self.col_cost.extend_from_slice(cost);
        self.col_lower.extend_from_slice(lower);
        self.col_upper.extend_from_slice(upper);
        if let Some(int) = &mut self.integrality {
            int.extend(std::iter::repeat(VarType::Continuous).take(k));
        }
        if let Some(q) = &self.hessian {
            let entries: Vec<_> = q.iter().map(|(v, (i, j))| (i, j, *v)).collect();
            self.hessian = Some(sparse::from_triplets(n + k, n + k, entries));
        }
        Ok(())
    }

    /// Append rows. `rows[k]` lists the `(col, value)` entries of the k-th
    /// new row.
    pub fn add_rows(&mut self, lower: &[f64], upper: &[f64], rows: &[SparseVec]) -> Result<(), ModelError> {
        let k = lower.len();
        check_len("new row upper bounds", k, upper.len())?;
        check_len("new row entries", k, rows.len())?;
        check_not_nan("new row lower bound", lower)?;
        check_not_nan("new row upper bound", upper)?;
        let n = self.num_col();
        for row in rows {
            check_entries("column", row, n)?;
        }

        let m = self.num_row();
        let mut triplets: Vec<_> = self.a_matrix.iter().map(|(v, (i, j))| (i, j, *v)).collect();
        for (k, row) in rows.iter().enumerate() {
            triplets.extend(row.iter().map(|&(j, v)| (m + k, j, v)));
        }
        self.a_matrix = sparse::from_triplets(m + k, n, triplets);
        self.row_lower.extend_from_slice(lower);
        self.row_upper.extend_from_slice(upper);
        Ok(())
    }

    /// Delete a set of columns; the remaining columns keep their order.
    pub fn delete_cols(&mut self, cols: &[usize]) -> Result<(), ModelError> {
        let n = self.num_col();
        let remove = index_mask("column", cols, n)?;
        let keep: Vec<usize> = (0..n).filter(|&j| !remove[j]).collect();
        let rows: Vec<usize> = (0..self.num_row()).collect();
        self.a_matrix = sparse::submatrix(&self.a_matrix, &rows, &keep);
        self.col_cost = keep.iter().map(|&j| self.col_cost[j]).collect();
        self.col_lower = keep.iter().map(|&j| self.col_lower[j]).collect();
        self.col_upper = keep.iter().map(|&j| self.col_upper[j]).collect();
        if let Some(int) = &self.integrality {
            self.integrality = Some(keep.iter().map(|&j| int[j]).collect());
        }
        if let Some(q) = &self.hessian {
            self.hessian = Some(sparse::submatrix(q, &keep, &keep));
        }
        Ok(())
    }

    /// Delete a set of rows; the remaining rows keep their order.
    pub fn delete_rows(&mut self, rows: &[usize]) -> Result<(), ModelError> {
        let m = self.num_row();
        let remove = index_mask("row", rows, m)?;
        let keep: Vec<usize> = (0..m).filter(|&i| !remove[i]).collect();
        let cols: Vec<usize> = (0..self.num_col()).collect();
        self.a_matrix = sparse::submatrix(&self.a_matrix, &keep, &cols);
        self.row_lower = keep.iter().map(|&i| self.row_lower[i]).collect();
        self.row_upper = keep.iter().map(|&i| self.row_upper[i]).collect();
        Ok(())
    }

    pub fn change_col_bounds(&mut self, col: usize, lower: f64, upper: f64) -> Result<(), ModelError> {
        check_index("column", col, self.num_col())?;
        check_not_nan("column bound", &[lower, upper])?;
        self.col_lower[col] = lower;
        self.col_upper[col] = upper;
        Ok(())
    }

    pub fn change_row_bounds(&mut self, row: usize, lower: f64, upper: f64) -> Result<(), ModelError> {
        check_index("row", row, self.num_row())?;
        check_not_nan("row bound", &[lower, upper])?;
        self.row_lower[row] = lower;
        self.row_upper[row] = upper;
        Ok(())
    }

    pub fn change_col_cost(&mut self, col: usize, cost: f64) -> Result<(), ModelError> {
        check_index("column", col, self.num_col())?;
        if cost.is_nan() {
            return Err(ModelError::NotANumber { what: "cost", index: col });
        }
        self.col_cost[col] = cost;
        Ok(())
    }

    pub fn change_col_integrality(&mut self, col: usize, var_type: VarType) -> Result<(), ModelError> {
        let n = self.num_col();
        check_index("column", col, n)?;
        self.integrality
            .get_or_insert_with(|| vec![VarType::Continuous; n])[col] = var_type;
        Ok(())
    }
}

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), ModelError> {
    if expected != found {
        return Err(ModelError::DimensionMismatch { what, expected, found });
    }
    Ok(())
}

fn check_index(what: &'static str, index: usize, size: usize) -> Result<(), ModelError> {
    if index >= size {
        return Err(ModelError::IndexOutOfRange { what, index, size });
    }
    Ok(())
}

fn check_not_nan(what: &'static str, values: &[f64]) -> Result<(), ModelError> {
    match values.iter().position(|v| v.is_nan()) {
        Some(index) => Err(ModelError::NotANumber { what, index }),
        None => Ok(()),
    }
}

fn check_entries(what: &'static str, entries: &[(usize, f64)], size: usize) -> Result<(), ModelError> {
    let mut seen = Vec::with_capacity(entries.len());
    for &(idx, v) in entries {
        check_index(what, idx, size)?;
        if !v.is_finite() {
            return Err(ModelError::NotANumber { what: "matrix entry", index: idx });
        }
        if seen.contains(&idx) {
            return Err(ModelError::DuplicateIndex { what, index: idx });
        }
        seen.push(idx);
    }
    Ok(())
}

fn index_mask(what: &'static str, indices: &[usize], size: usize) -> Result<Vec<bool>, ModelError> {
    let mut mask = vec![false; size];
    for &i in indices {
        check_index(what, i, size)?;
        if mask[i] {
            return Err(ModelError::DuplicateIndex { what, index: i });
        }
        mask[i] = true;
    }
    Ok(mask)
}
