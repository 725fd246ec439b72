//! Singleton rows and free column singletons.

use crate::postsolve::{Reduction, ReductionStack};

use super::workspace::PresolveWorkspace;
use super::RuleOutcome;

/// Costs below this magnitude count as zero.
const ZERO_COST: f64 = 1e-12;

/// Turn rows with one entry into bounds on that column.
pub fn remove_singleton_rows(ws: &mut PresolveWorkspace, stack: &mut ReductionStack) -> RuleOutcome {
    let mut applied = false;
    for i in 0..ws.num_row() {
        if !ws.row_active[i] || ws.rows[i].len() != 1 {
            continue;
        }
        let (j, a) = ws.rows[i][0];
        let (lower, upper) = (ws.row_lower[i], ws.row_upper[i]);
        let (lo, hi) = if a > 0.0 {
            (lower / a, upper / a)
        } else {
            (upper / a, lower / a)
        };
        let (lo, hi) = ws.rounded(j, lo, hi);
        let (old_l, old_u) = (ws.col_lower[j], ws.col_upper[j]);
        let implied_lower = (lo > old_l).then_some(lo);
        let implied_upper = (hi < old_u).then_some(hi);
        let new_l = old_l.max(lo);
        let mut new_u = old_u.min(hi);
        if new_l > new_u + ws.tol * (1.0 + new_u.abs()) {
            log::debug!(
                "presolve: singleton row {} leaves column {} with bounds [{}, {}]",
                i,
                j,
                new_l,
                new_u
            );
            return RuleOutcome::Infeasible;
        }
        if new_l > new_u {
            new_u = new_l;
        }
        ws.col_lower[j] = new_l;
        ws.col_upper[j] = new_u;
        ws.remove_row(i);
        stack.push(Reduction::SingletonRow {
            row: i,
            col: j,
            coef: a,
            lower,
            upper,
            implied_lower: implied_lower.map(|_| new_l),
            implied_upper: implied_upper.map(|_| new_u),
        });
        applied = true;
    }
    RuleOutcome::from_applied(applied)
}

/// A free, costless continuous column alone in its row can absorb any row
/// activity: drop both.
pub fn remove_free_column_singletons(ws: &mut PresolveWorkspace, stack: &mut ReductionStack) -> RuleOutcome {
    let mut applied = false;
    for j in 0..ws.num_col() {
        if !ws.col_active[j]
            || ws.cols[j].len() != 1
            || ws.integer[j]
            || ws.quadratic[j]
            || ws.col_cost[j].abs() > ZERO_COST
            || ws.col_lower[j].is_finite()
            || ws.col_upper[j].is_finite()
        {
            continue;
        }
        let (i, a) = ws.cols[j][0];
        let rest = ws.rows[i].iter().copied().filter(|&(c, _)| c != j).collect();
        stack.push(Reduction::FreeColumnSingleton {
            row: i,
            col: j,
            coef: a,
            lower: ws.row_lower[i],
            upper: ws.row_upper[i],
            rest,
        });
        ws.remove_row(i);
        ws.remove_col(j);
        applied = true;
    }
    RuleOutcome::from_applied(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::from_triplets;
    use crate::problem::{Model, VarType};

    #[test]
    fn test_singleton_row_becomes_bounds() {
        // -2 x0 in [-6, 2]  →  x0 in [-1, 3]
        let a = from_triplets(2, 2, vec![(0, 0, -2.0), (1, 0, 1.0), (1, 1, 1.0)]);
        let model = Model::new(
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![10.0, 10.0],
            vec![-6.0, 0.0],
            vec![2.0, 5.0],
            a,
        );
        let mut ws = PresolveWorkspace::new(&model, 1e-7);
        let mut stack = ReductionStack::new(2, 2);
        assert_eq!(remove_singleton_rows(&mut ws, &mut stack), RuleOutcome::Applied);
        assert_eq!((ws.col_lower[0], ws.col_upper[0]), (0.0, 3.0));
        assert!(!ws.row_active[0]);
        match &stack.reductions()[0] {
            Reduction::SingletonRow {
                implied_lower,
                implied_upper,
                ..
            } => {
                assert_eq!(*implied_lower, None);
                assert_eq!(*implied_upper, Some(3.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_singleton_row_on_integer_column() {
        let a = from_triplets(1, 1, vec![(0, 0, 2.0)]);
        let model = Model::new(vec![1.0], vec![0.0], vec![10.0], vec![1.0], vec![7.0], a)
            .with_integrality(vec![VarType::Integer]);
        let mut ws = PresolveWorkspace::new(&model, 1e-7);
        let mut stack = ReductionStack::new(1, 1);
        remove_singleton_rows(&mut ws, &mut stack);
        assert_eq!((ws.col_lower[0], ws.col_upper[0]), (1.0, 3.0));
    }

    #[test]
    fn test_conflicting_singleton_row() {
        let a = from_triplets(1, 1, vec![(0, 0, 1.0)]);
        let model = Model::new(vec![1.0], vec![0.0], vec![1.0], vec![2.0], vec![3.0], a);
        let mut ws = PresolveWorkspace::new(&model, 1e-7);
        let mut stack = ReductionStack::new(1, 1);
        assert_eq!(remove_singleton_rows(&mut ws, &mut stack), RuleOutcome::Infeasible);
    }

    #[test]
    fn test_free_column_singleton_drops_row() {
        let inf = f64::INFINITY;
        let a = from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
        let model = Model::new(vec![1.0, 0.0], vec![0.0, -inf], vec![5.0, inf], vec![1.0], vec![1.0], a);
        let mut ws = PresolveWorkspace::new(&model, 1e-7);
        let mut stack = ReductionStack::new(2, 1);
        assert_eq!(remove_free_column_singletons(&mut ws, &mut stack), RuleOutcome::Applied);
        assert!(!ws.row_active[0] && !ws.col_active[1]);
        assert!(ws.cols[0].is_empty());
    }
}
