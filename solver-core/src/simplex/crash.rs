//! Triangular crash basis.
//!
//! Starting from the slack basis, logicals are swapped for structural
//! columns so that the structurals form a triangular block: once a column is
//! chosen to pivot in row `i`, every row it touches is closed for later
//! pivots. Equality rows are crashed first and free rows never (their
//! logical is free and belongs in the basis). Free columns are preferred,
//! then one-sided, then boxed; fixed columns are never crashed.

use crate::solution::BasisStatus;

use super::workspace::{SimplexWorkspace, NONBASIC};

/// Minimum pivot magnitude relative to the column's largest entry.
const RELATIVE_PIVOT: f64 = 0.1;

fn row_priority(l: f64, u: f64) -> u8 {
    match (l.is_finite(), u.is_finite()) {
        (false, false) => 0,
        _ if l == u => 3,
        (true, true) => 1,
        _ => 2,
    }
}

fn col_priority(l: f64, u: f64) -> u8 {
    match (l.is_finite(), u.is_finite()) {
        _ if l == u => 0,
        (false, false) => 3,
        (true, true) => 1,
        _ => 2,
    }
}

/// Apply the crash to a workspace holding the slack basis. Returns the
/// number of structurals brought into the basis.
pub(crate) fn triangular(ws: &mut SimplexWorkspace<'_>) -> usize {
    let (n, m) = (ws.n, ws.m);
    let rows: Vec<Vec<(usize, f64)>> = {
        let mut rows = vec![Vec::new(); m];
        for j in 0..n {
            for &(i, a) in &ws.columns[j] {
                rows[i].push((j, a));
            }
        }
        rows
    };
    let col_max: Vec<f64> = (0..n)
        .map(|j| ws.columns[j].iter().fold(0.0_f64, |acc, &(_, a)| acc.max(a.abs())))
        .collect();

    let mut order: Vec<usize> = (0..m)
        .filter(|&i| row_priority(ws.lower[n + i], ws.upper[n + i]) > 0)
        .collect();
    order.sort_by_key(|&i| (std::cmp::Reverse(row_priority(ws.lower[n + i], ws.upper[n + i])), rows[i].len()));

    let mut closed = vec![false; m];
    let mut used = vec![false; n];
    let mut crashed = 0;
    for i in order {
        if closed[i] {
            continue;
        }
        let mut best: Option<(usize, u8, f64)> = None;
        for &(j, a) in &rows[i] {
            let pr = col_priority(ws.lower[j], ws.upper[j]);
            if used[j] || pr == 0 || a.abs() < RELATIVE_PIVOT * col_max[j] {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, bp, ba)) => pr > bp || (pr == bp && a.abs() > ba),
            };
            if better {
                best = Some((j, pr, a.abs()));
            }
        }
        let Some((j, _, _)) = best else { continue };

        let logical = n + i;
        let slot = ws.slot_of[logical];
        if slot == NONBASIC {
            continue;
        }
        ws.basic[slot] = j;
        ws.slot_of[j] = slot;
        ws.slot_of[logical] = NONBASIC;
        ws.status[j] = BasisStatus::Basic;
        ws.make_nonbasic_nearest(logical);
        used[j] = true;
        for &(r, _) in &ws.columns[j] {
            closed[r] = true;
        }
        crashed += 1;
    }
    log::debug!("triangular crash placed {} structurals in {} rows", crashed, m);
    crashed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SolveContext;
    use crate::linalg::sparse::from_triplets;
    use crate::problem::Model;
    use crate::simplex::workspace::FactorOutcome;

    #[test]
    fn test_crash_builds_nonsingular_basis() {
        let ctx = SolveContext::default();
        // Equality rows get structurals; the free row keeps its logical.
        let a = from_triplets(
            3,
            3,
            vec![(0, 0, 2.0), (1, 0, 1.0), (1, 1, 3.0), (2, 2, 1.0), (0, 2, 1.0)],
        );
        let lp = Model::new(
            vec![1.0, 1.0, 1.0],
            vec![0.0, f64::NEG_INFINITY, 0.0],
            vec![10.0, f64::INFINITY, 10.0],
            vec![1.0, 2.0, f64::NEG_INFINITY],
            vec![1.0, 2.0, f64::INFINITY],
            a,
        );
        let mut ws = SimplexWorkspace::new(&lp, &ctx);
        ws.reset_to_slack();
        let crashed = triangular(&mut ws);
        assert!(crashed >= 1);
        assert!(ws.status[3 + 2].is_basic());
        assert_eq!(ws.basic.len(), 3);
        assert_eq!(ws.factorize(), FactorOutcome::Ok);
    }
}
