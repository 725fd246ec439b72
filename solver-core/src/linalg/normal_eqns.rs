//! Normal equations for the bound-form interior point method.
//!
//! The Newton system over `z = (x, r)` with `Ax - r = 0` is
//!
//! ```text
//! (Q + D_x) dx - Aᵀ dy = g_x
//!  D_r dr    +     dy = g_r
//!  A dx      -     dr = r_p
//! ```
//!
//! Eliminating `dx` and `dr` gives
//!
//! ```text
//! M dy = r_p - A H_x⁻¹ g_x + D_r⁻¹ g_r,   M = A H_x⁻¹ Aᵀ + D_r⁻¹
//! dx = H_x⁻¹ (g_x + Aᵀ dy),   dr = D_r⁻¹ (g_r - dy)
//! ```
//!
//! with `H_x = Q + D_x`. Both `H_x` (when Q is present) and `M` are
//! factorized densely with a Cholesky decomposition; a zero entry of
//! `D_r⁻¹` pins `dr` to zero (equality rows).

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use thiserror::Error;

use super::sparse::SparseCsc;

/// Relative diagonal regularization of M.
const SCHUR_REGULARIZATION: f64 = 1e-10;
/// Regularization growth per failed Cholesky attempt.
const REGULARIZATION_GROWTH: f64 = 100.0;
const CHOLESKY_ATTEMPTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalEquationsError {
    #[error("{0} matrix is not positive definite")]
    NotPositiveDefinite(&'static str),
}

enum PrimalBlock {
    /// Q absent: H_x is diagonal, stored inverted.
    Diagonal(Vec<f64>),
    Dense(Cholesky<f64, Dyn>),
}

/// Factorized normal equations for one IPM iteration.
pub struct NormalEquations {
    n: usize,
    m: usize,
    a_dense: DMatrix<f64>,
    q_dense: Option<DMatrix<f64>>,
    primal: PrimalBlock,
    /// H_x⁻¹ Aᵀ (n × m)
    h_inv_at: DMatrix<f64>,
    dr_inv: Vec<f64>,
    schur: Option<Cholesky<f64, Dyn>>,
}

impl NormalEquations {
    pub fn new(a: &SparseCsc, q: Option<&SparseCsc>) -> Self {
        let (m, n) = (a.rows(), a.cols());
        let mut a_dense = DMatrix::zeros(m, n);
        for (&val, (row, col)) in a.iter() {
            a_dense[(row, col)] += val;
        }
        let q_dense = q.map(|q| {
            let mut d = DMatrix::zeros(n, n);
            for (&val, (row, col)) in q.iter() {
                d[(row, col)] += val;
            }
            d
        });
        Self {
            n,
            m,
            a_dense,
            q_dense,
            primal: PrimalBlock::Diagonal(vec![0.0; n]),
            h_inv_at: DMatrix::zeros(n, m),
            dr_inv: vec![0.0; m],
            schur: None,
        }
    }

    /// Factorize for diagonals `d_x` (positive) and `dr_inv` (nonnegative).
    pub fn factor(&mut self, d_x: &[f64], dr_inv: &[f64]) -> Result<(), NormalEquationsError> {
        debug_assert_eq!(d_x.len(), self.n);
        debug_assert_eq!(dr_inv.len(), self.m);
        let at = self.a_dense.transpose();

        self.primal = match &self.q_dense {
            None => {
                let inv: Vec<f64> = d_x.iter().map(|&d| 1.0 / d).collect();
                let mut h_inv_at = at;
                for (j, &s) in inv.iter().enumerate() {
                    h_inv_at.row_mut(j).scale_mut(s);
                }
                self.h_inv_at = h_inv_at;
                PrimalBlock::Diagonal(inv)
            }
            Some(q) => {
                let mut h = q.clone();
                for (j, &d) in d_x.iter().enumerate() {
                    h[(j, j)] += d;
                }
                let chol = cholesky_with_retry(h, "primal Hessian")?;
                self.h_inv_at = chol.solve(&at);
                PrimalBlock::Dense(chol)
            }
        };

        self.dr_inv.copy_from_slice(dr_inv);
        if self.m == 0 {
            self.schur = None;
            return Ok(());
        }
        let mut schur = &self.a_dense * &self.h_inv_at;
        for (i, &v) in dr_inv.iter().enumerate() {
            schur[(i, i)] += v;
        }
        self.schur = Some(cholesky_with_retry(schur, "normal equations")?);
        Ok(())
    }

    fn apply_h_inv(&self, v: &[f64]) -> DVector<f64> {
        match &self.primal {
            PrimalBlock::Diagonal(inv) => DVector::from_iterator(self.n, v.iter().zip(inv).map(|(a, b)| a * b)),
            PrimalBlock::Dense(chol) => chol.solve(&DVector::from_column_slice(v)),
        }
    }

    /// Solve for `(dx, dr, dy)`.
    pub fn solve(&self, g_x: &[f64], g_r: &[f64], r_p: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let h_inv_gx = self.apply_h_inv(g_x);
        let dy = match &self.schur {
            Some(chol) => {
                let a_h = &self.a_dense * &h_inv_gx;
                let rhs = DVector::from_iterator(
                    self.m,
                    (0..self.m).map(|i| r_p[i] - a_h[i] + self.dr_inv[i] * g_r[i]),
                );
                chol.solve(&rhs)
            }
            None => DVector::zeros(self.m),
        };
        let dx = h_inv_gx + &self.h_inv_at * &dy;
        let dr: Vec<f64> = (0..self.m).map(|i| self.dr_inv[i] * (g_r[i] - dy[i])).collect();
        (dx.iter().copied().collect(), dr, dy.iter().copied().collect())
    }
}

fn cholesky_with_retry(
    mut mat: DMatrix<f64>,
    what: &'static str,
) -> Result<Cholesky<f64, Dyn>, NormalEquationsError> {
    let dim = mat.nrows();
    let scale = (0..dim).fold(1.0_f64, |acc, i| acc.max(mat[(i, i)].abs()));
    let mut reg = SCHUR_REGULARIZATION * scale;
    for _ in 0..CHOLESKY_ATTEMPTS {
        for i in 0..dim {
            mat[(i, i)] += reg;
        }
        if let Some(chol) = Cholesky::new(mat.clone()) {
            return Ok(chol);
        }
        log::debug!("{} Cholesky failed, regularization {:e}", what, reg);
        reg *= REGULARIZATION_GROWTH;
    }
    Err(NormalEquationsError::NotPositiveDefinite(what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse;

    fn check_newton_system(q: Option<&SparseCsc>) {
        // A = [[1, 0], [0, 1], [1, 1], [1, -1]]
        let a = sparse::from_triplets(
            4,
            2,
            vec![(0, 0, 1.0), (1, 1, 1.0), (2, 0, 1.0), (2, 1, 1.0), (3, 0, 1.0), (3, 1, -1.0)],
        );
        let mut ne = NormalEquations::new(&a, q);
        let d_x = [1.0, 2.0];
        let dr_inv = [1.0, 0.5, 0.0, 2.0];
        ne.factor(&d_x, &dr_inv).unwrap();

        let g_x = [1.0, -1.0];
        let g_r = [0.5, 0.0, 0.0, 1.0];
        let r_p = [0.0, 1.0, 2.0, -1.0];
        let (dx, dr, dy) = ne.solve(&g_x, &g_r, &r_p);

        // A dx - dr = r_p
        let adx = sparse::spmv(&a, &dx);
        for i in 0..4 {
            assert!((adx[i] - dr[i] - r_p[i]).abs() < 1e-6);
        }
        // Equality row keeps dr = 0.
        assert_eq!(dr[2], 0.0);
        // (Q + D_x) dx - Aᵀ dy = g_x
        let qdx = q.map_or(vec![0.0; 2], |q| sparse::spmv(q, &dx));
        let aty = sparse::spmv_transpose(&a, &dy);
        for j in 0..2 {
            assert!((qdx[j] + d_x[j] * dx[j] - aty[j] - g_x[j]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_diagonal_primal_block() {
        check_newton_system(None);
    }

    #[test]
    fn test_dense_primal_block() {
        let q = sparse::from_triplets(2, 2, vec![(0, 0, 2.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 2.0)]);
        check_newton_system(Some(&q));
    }

    #[test]
    fn test_no_rows() {
        let a = sparse::zeros(0, 2);
        let q = sparse::from_triplets(2, 2, vec![(0, 0, 2.0), (1, 1, 4.0)]);
        let mut ne = NormalEquations::new(&a, Some(&q));
        ne.factor(&[0.0, 0.0], &[]).unwrap();
        let (dx, dr, dy) = ne.solve(&[2.0, 4.0], &[], &[]);
        assert!((dx[0] - 1.0).abs() < 1e-8 && (dx[1] - 1.0).abs() < 1e-8);
        assert!(dr.is_empty() && dy.is_empty());
    }
}
