//! Sparse LU factorization of a square basis matrix.
//!
//! Right-looking elimination with Markowitz pivot selection restricted by a
//! relative threshold: an entry is an acceptable pivot only if its magnitude
//! is at least `threshold` times the largest magnitude in its column. The
//! active submatrix is held row-wise with values; columns keep a row pattern
//! that may contain stale rows and is re-validated on access.
//!
//! Rows are indexed by constraint row, columns by basic slot. `solve` maps a
//! row-indexed right-hand side to a slot-indexed solution; `solve_transpose`
//! does the reverse.

use super::sparse::SparseVec;

/// Entries whose magnitude falls below this after an update are dropped.
const DROP_TOLERANCE: f64 = 1e-14;

/// Number of candidate columns examined per pivot search.
const SEARCH_COLUMNS: usize = 4;

/// Rows and slots left unpivoted by a rank-deficient factorization.
#[derive(Debug, Clone, PartialEq)]
pub struct Deficiency {
    pub slots: Vec<usize>,
    pub rows: Vec<usize>,
}

/// L and U factors in elimination order.
#[derive(Debug, Clone, Default)]
pub struct LuFactors {
    m: usize,
    rank: usize,
    pivot_row: Vec<usize>,
    pivot_col: Vec<usize>,
    pivot_val: Vec<f64>,
    /// Step k: `(row, multiplier)` eliminated by pivot row k
    l_cols: Vec<SparseVec>,
    /// Step k: U row of pivot k without the pivot, `(slot, value)`
    u_rows: Vec<SparseVec>,
}

struct ActiveMatrix {
    rows: Vec<SparseVec>,
    col_pattern: Vec<Vec<usize>>,
    col_count: Vec<usize>,
    row_done: Vec<bool>,
    col_done: Vec<bool>,
    mark: Vec<usize>,
    stamp: usize,
    work: Vec<f64>,
}

impl ActiveMatrix {
    fn new(m: usize, columns: &[SparseVec]) -> Self {
        let mut rows = vec![Vec::new(); m];
        let mut col_pattern = vec![Vec::new(); m];
        let mut col_count = vec![0; m];
        for (slot, col) in columns.iter().enumerate() {
            for &(i, v) in col {
                if v != 0.0 {
                    rows[i].push((slot, v));
                    col_pattern[slot].push(i);
                    col_count[slot] += 1;
                }
            }
        }
        Self {
            rows,
            col_pattern,
            col_count,
            row_done: vec![false; m],
            col_done: vec![false; m],
            mark: vec![0; m],
            stamp: 0,
            work: vec![0.0; m],
        }
    }

    fn next_stamp(&mut self) -> usize {
        self.stamp += 1;
        self.stamp
    }

    /// Live entries of column `c` among active rows. Prunes the pattern.
    fn column_entries(&mut self, c: usize) -> SparseVec {
        let stamp = self.next_stamp();
        let mut entries = Vec::new();
        let pattern = std::mem::take(&mut self.col_pattern[c]);
        let mut pruned = Vec::with_capacity(pattern.len());
        for i in pattern {
            if self.row_done[i] || self.mark[i] == stamp {
                continue;
            }
            self.mark[i] = stamp;
            if let Some(&(_, v)) = self.rows[i].iter().find(|&&(s, _)| s == c) {
                entries.push((i, v));
                pruned.push(i);
            }
        }
        self.col_pattern[c] = pruned;
        entries
    }

    /// Best pivot `(row, slot, value)` or None when the active part is
    /// numerically singular.
    fn choose_pivot(&mut self, threshold: f64, abs_tol: f64) -> Option<(usize, usize, f64)> {
        let m = self.rows.len();

        // Column singletons need no threshold test.
        for c in 0..m {
            if !self.col_done[c] && self.col_count[c] == 1 {
                let entries = self.column_entries(c);
                if let [(r, v)] = entries.as_slice() {
                    if v.abs() > abs_tol {
                        return Some((*r, c, *v));
                    }
                }
            }
        }

        let mut order: Vec<usize> = (0..m)
            .filter(|&c| !self.col_done[c] && self.col_count[c] > 0)
            .collect();
        order.sort_by_key(|&c| (self.col_count[c], c));

        // (cost, -|v|) ordering; lower is better.
        let mut best: Option<(usize, f64, usize, usize, f64)> = None;
        let mut examined = 0;
        for c in order {
            let entries = self.column_entries(c);
            let col_max = entries.iter().fold(0.0_f64, |acc, &(_, v)| acc.max(v.abs()));
            if col_max <= abs_tol {
                continue;
            }
            let count = entries.len();
            let mut found = false;
            for &(r, v) in &entries {
                if v.abs() <= abs_tol || v.abs() < threshold * col_max {
                    continue;
                }
                found = true;
                let cost = (self.rows[r].len() - 1) * (count - 1);
                let better = match best {
                    None => true,
                    Some((bc, bv, ..)) => cost < bc || (cost == bc && v.abs() > bv),
                };
                if better {
                    best = Some((cost, v.abs(), r, c, v));
                }
            }
            if found {
                examined += 1;
                if examined >= SEARCH_COLUMNS || best.map_or(false, |b| b.0 == 0) {
                    break;
                }
            }
        }
        best.map(|(_, _, r, c, v)| (r, c, v))
    }

    /// Eliminate column `c` using pivot row `r`. Returns (L column, U row).
    fn eliminate(&mut self, r: usize, c: usize, pivot: f64) -> (SparseVec, SparseVec) {
        let col_entries = self.column_entries(c);
        let pivot_row = std::mem::take(&mut self.rows[r]);
        self.row_done[r] = true;
        self.col_done[c] = true;
        for &(s, _) in &pivot_row {
            self.col_count[s] = self.col_count[s].saturating_sub(1);
        }
        let u_row: SparseVec = pivot_row.into_iter().filter(|&(s, _)| s != c).collect();

        let mut l_col = Vec::new();
        for (i, v_ic) in col_entries {
            if i == r {
                continue;
            }
            let l = v_ic / pivot;
            let stamp = self.next_stamp();
            let old = std::mem::take(&mut self.rows[i]);
            let mut touched = Vec::with_capacity(old.len() + u_row.len());
            for (s, v) in old {
                if s == c {
                    continue;
                }
                self.work[s] = v;
                self.mark[s] = stamp;
                touched.push(s);
            }
            for &(s, u) in &u_row {
                if self.mark[s] == stamp {
                    self.work[s] -= l * u;
                } else {
                    self.mark[s] = stamp;
                    self.work[s] = -l * u;
                    touched.push(s);
                    self.col_count[s] += 1;
                    self.col_pattern[s].push(i);
                }
            }
            let mut new_row = Vec::with_capacity(touched.len());
            for s in touched {
                let v = self.work[s];
                if v.abs() > DROP_TOLERANCE {
                    new_row.push((s, v));
                } else {
                    self.col_count[s] = self.col_count[s].saturating_sub(1);
                }
            }
            self.rows[i] = new_row;
            l_col.push((i, l));
        }
        (l_col, u_row)
    }
}

impl LuFactors {
    /// Factorize the `m × m` matrix whose slot-th column is `columns[slot]`.
    ///
    /// Always returns the factors of the pivoted part; a [`Deficiency`] is
    /// reported when fewer than `m` pivots could be found.
    pub fn factorize(
        m: usize,
        columns: &[SparseVec],
        threshold: f64,
        abs_tol: f64,
    ) -> (Self, Option<Deficiency>) {
        let mut active = ActiveMatrix::new(m, columns);
        let mut lu = LuFactors {
            m,
            ..Default::default()
        };
        while lu.rank < m {
            let Some((r, c, pivot)) = active.choose_pivot(threshold, abs_tol) else {
                break;
            };
            let (l_col, u_row) = active.eliminate(r, c, pivot);
            lu.pivot_row.push(r);
            lu.pivot_col.push(c);
            lu.pivot_val.push(pivot);
            lu.l_cols.push(l_col);
            lu.u_rows.push(u_row);
            lu.rank += 1;
        }
        let deficiency = if lu.rank < m {
            Some(Deficiency {
                slots: (0..m).filter(|&c| !active.col_done[c]).collect(),
                rows: (0..m).filter(|&r| !active.row_done[r]).collect(),
            })
        } else {
            None
        };
        (lu, deficiency)
    }

    pub fn dim(&self) -> usize {
        self.m
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Nonzeros in L and U, including pivots.
    pub fn fill(&self) -> usize {
        self.rank
            + self.l_cols.iter().map(Vec::len).sum::<usize>()
            + self.u_rows.iter().map(Vec::len).sum::<usize>()
    }

    /// Solve B z = x. `x` is row-indexed, the result slot-indexed.
    pub fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let mut y = rhs.to_vec();
        for k in 0..self.rank {
            let v = y[self.pivot_row[k]];
            if v != 0.0 {
                for &(i, l) in &self.l_cols[k] {
                    y[i] -= l * v;
                }
            }
        }
        let mut z = vec![0.0; self.m];
        for k in (0..self.rank).rev() {
            let mut s = y[self.pivot_row[k]];
            for &(c, u) in &self.u_rows[k] {
                s -= u * z[c];
            }
            z[self.pivot_col[k]] = s / self.pivot_val[k];
        }
        z
    }

    /// Solve Bᵀ y = c. `c` is slot-indexed, the result row-indexed.
    pub fn solve_transpose(&self, rhs: &[f64]) -> Vec<f64> {
        let mut c = rhs.to_vec();
        let mut y = vec![0.0; self.m];
        for k in 0..self.rank {
            let w = c[self.pivot_col[k]] / self.pivot_val[k];
            y[self.pivot_row[k]] = w;
            if w != 0.0 {
                for &(col, u) in &self.u_rows[k] {
                    c[col] -= u * w;
                }
            }
        }
        for k in (0..self.rank).rev() {
            let mut s = y[self.pivot_row[k]];
            for &(i, l) in &self.l_cols[k] {
                s -= l * y[i];
            }
            y[self.pivot_row[k]] = s;
        }
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn dense_mul(columns: &[SparseVec], z: &[f64], m: usize) -> Vec<f64> {
        let mut x = vec![0.0; m];
        for (slot, col) in columns.iter().enumerate() {
            for &(i, v) in col {
                x[i] += v * z[slot];
            }
        }
        x
    }

    fn dense_mul_t(columns: &[SparseVec], y: &[f64]) -> Vec<f64> {
        columns
            .iter()
            .map(|col| col.iter().map(|&(i, v)| v * y[i]).sum())
            .collect()
    }

    fn random_basis(rng: &mut ChaCha8Rng, m: usize) -> Vec<SparseVec> {
        // Diagonally dominant sparse matrix with a random permutation of rows.
        let mut perm: Vec<usize> = (0..m).collect();
        for i in (1..m).rev() {
            let j = rng.random_range(0..=i);
            perm.swap(i, j);
        }
        (0..m)
            .map(|slot| {
                let mut col = vec![(perm[slot], 4.0 + rng.random::<f64>())];
                for _ in 0..2 {
                    let i = rng.random_range(0..m);
                    if !col.iter().any(|&(r, _)| r == i) {
                        col.push((i, rng.random::<f64>() - 0.5));
                    }
                }
                col
            })
            .collect()
    }

    #[test]
    fn test_identity() {
        let cols: Vec<SparseVec> = (0..3).map(|i| vec![(i, 1.0)]).collect();
        let (lu, def) = LuFactors::factorize(3, &cols, 0.1, 1e-11);
        assert!(def.is_none());
        assert_eq!(lu.solve(&[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_small_dense() {
        // B = [[2, 1], [1, 3]] stored by columns, with the slots swapped.
        let cols = vec![vec![(0, 1.0), (1, 3.0)], vec![(0, 2.0), (1, 1.0)]];
        let (lu, def) = LuFactors::factorize(2, &cols, 0.1, 1e-11);
        assert!(def.is_none());
        let z = lu.solve(&[3.0, 4.0]);
        let back = dense_mul(&cols, &z, 2);
        assert!((back[0] - 3.0).abs() < 1e-12 && (back[1] - 4.0).abs() < 1e-12);
        let y = lu.solve_transpose(&[1.0, -1.0]);
        let back = dense_mul_t(&cols, &y);
        assert!((back[0] - 1.0).abs() < 1e-12 && (back[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_random_solves() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for m in [1, 5, 20, 60] {
            let cols = random_basis(&mut rng, m);
            let (lu, def) = LuFactors::factorize(m, &cols, 0.1, 1e-11);
            assert!(def.is_none(), "m = {}", m);
            let x: Vec<f64> = (0..m).map(|_| rng.random::<f64>() - 0.5).collect();
            let z = lu.solve(&x);
            let back = dense_mul(&cols, &z, m);
            for i in 0..m {
                assert!((back[i] - x[i]).abs() < 1e-9, "ftran residual at {}", i);
            }
            let y = lu.solve_transpose(&x);
            let back = dense_mul_t(&cols, &y);
            for i in 0..m {
                assert!((back[i] - x[i]).abs() < 1e-9, "btran residual at {}", i);
            }
        }
    }

    #[test]
    fn test_singular_reports_deficiency() {
        // Two identical columns.
        let cols = vec![
            vec![(0, 1.0), (1, 1.0)],
            vec![(0, 1.0), (1, 1.0)],
            vec![(2, 1.0)],
        ];
        let (lu, def) = LuFactors::factorize(3, &cols, 0.1, 1e-11);
        let def = def.expect("singular");
        assert_eq!(lu.rank(), 2);
        assert_eq!(def.slots.len(), 1);
        assert_eq!(def.rows.len(), 1);
    }

    #[test]
    fn test_empty_column_is_deficient() {
        let cols = vec![vec![(0, 1.0)], vec![]];
        let (_, def) = LuFactors::factorize(2, &cols, 0.1, 1e-11);
        let def = def.expect("singular");
        assert_eq!(def.slots, vec![1]);
        assert_eq!(def.rows, vec![1]);
    }
}
