//! Sparse matrix types and operations.
//!
//! Models keep their constraint matrix and Hessian as `sprs` CSC matrices.
//! The simplex and presolve work on plain column/row lists extracted here.

use sprs::{CsMatI, TriMat};

/// Sparse matrix in CSC format (general, not necessarily symmetric).
pub type SparseCsc = CsMatI<f64, usize>;

/// Column (or row) as `(index, value)` pairs.
pub type SparseVec = Vec<(usize, f64)>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate triplets are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Build a CSC matrix from per-column entry lists.
pub fn from_columns(nrows: usize, columns: &[SparseVec]) -> SparseCsc {
    from_triplets(
        nrows,
        columns.len(),
        columns
            .iter()
            .enumerate()
            .flat_map(|(j, col)| col.iter().map(move |&(i, v)| (i, j, v))),
    )
}

/// Empty `nrows × ncols` matrix.
pub fn zeros(nrows: usize, ncols: usize) -> SparseCsc {
    from_triplets(nrows, ncols, std::iter::empty())
}

/// Entries of column `j`.
pub fn column(a: &SparseCsc, j: usize) -> SparseVec {
    match a.outer_view(j) {
        Some(col) => col.iter().map(|(i, &v)| (i, v)).collect(),
        None => Vec::new(),
    }
}

/// All columns as entry lists.
pub fn to_columns(a: &SparseCsc) -> Vec<SparseVec> {
    (0..a.cols()).map(|j| column(a, j)).collect()
}

/// All rows as `(col, value)` lists, columns ascending.
pub fn to_rows(a: &SparseCsc) -> Vec<SparseVec> {
    let mut rows = vec![Vec::new(); a.rows()];
    for j in 0..a.cols() {
        if let Some(col) = a.outer_view(j) {
            for (i, &v) in col.iter() {
                rows[i].push((j, v));
            }
        }
    }
    rows
}

/// y = A x
pub fn spmv(a: &SparseCsc, x: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.cols(), x.len());
    let mut y = vec![0.0; a.rows()];
    for (val, (row, col)) in a.iter() {
        y[row] += *val * x[col];
    }
    y
}

/// y = Aᵀ x
pub fn spmv_transpose(a: &SparseCsc, x: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.rows(), x.len());
    let mut y = vec![0.0; a.cols()];
    for (val, (row, col)) in a.iter() {
        y[col] += *val * x[row];
    }
    y
}

/// Worst asymmetry `|Q_ij - Q_ji|` above a relative threshold, with its
/// position.
pub fn asymmetry(q: &SparseCsc) -> Option<(usize, usize, f64)> {
    let lookup = |i: usize, j: usize| -> f64 {
        q.outer_view(j)
            .and_then(|col| col.iter().find(|&(r, _)| r == i).map(|(_, &v)| v))
            .unwrap_or(0.0)
    };
    let mut worst: Option<(usize, usize, f64)> = None;
    for (val, (i, j)) in q.iter() {
        if i == j {
            continue;
        }
        let diff = (*val - lookup(j, i)).abs();
        if diff > 1e-12 * (1.0 + val.abs()) && worst.map_or(true, |w| diff > w.2) {
            worst = Some((i, j, diff));
        }
    }
    worst
}

/// x' Q x for a full symmetric Q.
pub fn quad_form(q: &SparseCsc, x: &[f64]) -> f64 {
    q.iter().map(|(v, (i, j))| x[i] * *v * x[j]).sum()
}

/// Restrict a matrix to the given (ordered) rows and columns.
pub fn submatrix(a: &SparseCsc, rows: &[usize], cols: &[usize]) -> SparseCsc {
    let mut row_map = vec![usize::MAX; a.rows()];
    for (new, &old) in rows.iter().enumerate() {
        row_map[old] = new;
    }
    let mut triplets = Vec::new();
    for (new_j, &old_j) in cols.iter().enumerate() {
        for (i, v) in column(a, old_j) {
            if row_map[i] != usize::MAX {
                triplets.push((row_map[i], new_j, v));
            }
        }
    }
    from_triplets(rows.len(), cols.len(), triplets)
}
