//! Removal of empty rows, empty columns and fixed columns.

use crate::postsolve::{Reduction, ReductionStack};
use crate::solution::BasisStatus;

use super::workspace::PresolveWorkspace;
use super::RuleOutcome;

/// Relative width below which a column counts as fixed.
const FIXED_WIDTH: f64 = 1e-12;

pub fn remove_empty_rows(ws: &mut PresolveWorkspace, stack: &mut ReductionStack) -> RuleOutcome {
    let mut applied = false;
    for i in 0..ws.num_row() {
        if !ws.row_active[i] || !ws.rows[i].is_empty() {
            continue;
        }
        if ws.row_lower[i] > ws.tol || ws.row_upper[i] < -ws.tol {
            log::debug!(
                "presolve: empty row {} requires 0 in [{}, {}]",
                i,
                ws.row_lower[i],
                ws.row_upper[i]
            );
            return RuleOutcome::Infeasible;
        }
        ws.remove_row(i);
        stack.push(Reduction::EmptyRow { row: i });
        applied = true;
    }
    RuleOutcome::from_applied(applied)
}

pub fn remove_empty_columns(ws: &mut PresolveWorkspace, stack: &mut ReductionStack) -> RuleOutcome {
    let mut applied = false;
    for j in 0..ws.num_col() {
        if !ws.col_active[j] || !ws.cols[j].is_empty() || ws.quadratic[j] {
            continue;
        }
        let (l, u) = (ws.col_lower[j], ws.col_upper[j]);
        let c = ws.col_cost[j];
        let value = if c > 0.0 {
            l
        } else if c < 0.0 {
            u
        } else {
            BasisStatus::nonbasic_for(l, u).nonbasic_value(l, u)
        };
        if !value.is_finite() {
            log::debug!("presolve: empty column {} with cost {} is unbounded", j, c);
            return RuleOutcome::Unbounded;
        }
        ws.fix_col(j, value);
        stack.push(Reduction::EmptyCol { col: j, value });
        applied = true;
    }
    RuleOutcome::from_applied(applied)
}

pub fn remove_fixed_columns(ws: &mut PresolveWorkspace, stack: &mut ReductionStack) -> RuleOutcome {
    let mut applied = false;
    for j in 0..ws.num_col() {
        if !ws.col_active[j] || ws.quadratic[j] {
            continue;
        }
        let (l, u) = (ws.col_lower[j], ws.col_upper[j]);
        if !l.is_finite() || u - l > FIXED_WIDTH * (1.0 + l.abs()) {
            continue;
        }
        ws.fix_col(j, l);
        stack.push(Reduction::FixedCol { col: j, value: l });
        applied = true;
    }
    RuleOutcome::from_applied(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::{self, from_triplets};
    use crate::presolve::workspace::PresolveWorkspace;
    use crate::problem::Model;

    #[test]
    fn test_empty_row_outside_bounds_is_infeasible() {
        let model = Model::new(vec![1.0], vec![0.0], vec![1.0], vec![1.0], vec![f64::INFINITY], sparse::zeros(1, 1));
        let mut ws = PresolveWorkspace::new(&model, 1e-7);
        let mut stack = ReductionStack::new(1, 1);
        assert_eq!(remove_empty_rows(&mut ws, &mut stack), RuleOutcome::Infeasible);
    }

    #[test]
    fn test_empty_column_fixed_at_preferred_bound() {
        let a = from_triplets(1, 2, vec![(0, 0, 1.0)]);
        let model = Model::new(vec![1.0, -2.0], vec![0.0, -1.0], vec![1.0, 3.0], vec![0.0], vec![1.0], a);
        let mut ws = PresolveWorkspace::new(&model, 1e-7);
        let mut stack = ReductionStack::new(2, 1);
        assert_eq!(remove_empty_columns(&mut ws, &mut stack), RuleOutcome::Applied);
        assert_eq!(stack.reductions(), &[Reduction::EmptyCol { col: 1, value: 3.0 }]);
        assert_eq!(ws.offset, -6.0);
        assert_eq!(remove_empty_columns(&mut ws, &mut stack), RuleOutcome::NotApplicable);
    }

    #[test]
    fn test_empty_column_unbounded() {
        let model = Model::new(vec![-1.0], vec![0.0], vec![f64::INFINITY], vec![], vec![], sparse::zeros(0, 1));
        let mut ws = PresolveWorkspace::new(&model, 1e-7);
        let mut stack = ReductionStack::new(1, 0);
        assert_eq!(remove_empty_columns(&mut ws, &mut stack), RuleOutcome::Unbounded);
    }

    #[test]
    fn test_fixed_column_substituted() {
        let a = from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
        let model = Model::new(vec![1.0, 1.0], vec![0.0, 2.0], vec![5.0, 2.0], vec![3.0], vec![4.0], a);
        let mut ws = PresolveWorkspace::new(&model, 1e-7);
        let mut stack = ReductionStack::new(2, 1);
        assert_eq!(remove_fixed_columns(&mut ws, &mut stack), RuleOutcome::Applied);
        assert_eq!((ws.row_lower[0], ws.row_upper[0]), (1.0, 2.0));
        assert_eq!(ws.offset, 2.0);
        assert_eq!(ws.rows[0], vec![(0, 1.0)]);
    }
}
