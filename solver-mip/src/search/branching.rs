//! Branching variable selection.

use super::BoundChange;
use crate::model::MipProblem;
use crate::settings::BranchingRule;

/// Smallest objective change credited to a branch when scoring.
const MIN_GAIN: f64 = 1e-6;

/// A branching decision.
#[derive(Debug, Clone)]
pub struct BranchDecision {
    /// Variable to branch on.
    pub var: usize,

    /// Current (fractional) value.
    pub value: f64,

    /// Bound change for "down" branch (x <= floor(value)).
    pub down_branch: BoundChange,

    /// Bound change for "up" branch (x >= ceil(value)).
    pub up_branch: BoundChange,

    /// Score of this decision (for logging/debugging).
    pub score: f64,
}

/// Objective of a child relaxation probed by strong branching: `None` when
/// the child is infeasible.
pub type ProbeResult = Option<f64>;

/// Branching variable selector.
pub struct BranchingSelector {
    /// Branching rule to use.
    rule: BranchingRule,

    /// Pseudocost statistics.
    /// pseudocosts_down[i] = average objective change per unit decrease
    /// pseudocosts_up[i] = average objective change per unit increase
    pseudocosts_down: Vec<f64>,
    pseudocosts_up: Vec<f64>,

    /// Number of observations per variable (down direction).
    branch_count_down: Vec<usize>,

    /// Number of observations per variable (up direction).
    branch_count_up: Vec<usize>,

    /// Observations before a pseudocost is reliable.
    reliability_count: usize,

    /// Strong branching candidates per node.
    candidates: usize,
}

impl BranchingSelector {
    /// Create a new branching selector.
    pub fn new(rule: BranchingRule, num_vars: usize, reliability_count: usize, candidates: usize) -> Self {
        Self {
            rule,
            pseudocosts_down: vec![1.0; num_vars],
            pseudocosts_up: vec![1.0; num_vars],
            branch_count_down: vec![0; num_vars],
            branch_count_up: vec![0; num_vars],
            reliability_count,
            candidates,
        }
    }

    /// Get the total branch count for a variable.
    pub fn branch_count(&self, var: usize) -> usize {
        self.branch_count_down[var] + self.branch_count_up[var]
    }

    /// Check if pseudocosts for a variable are reliable.
    pub fn is_reliable(&self, var: usize) -> bool {
        self.branch_count_down[var] >= self.reliability_count
            && self.branch_count_up[var] >= self.reliability_count
    }

    /// Select a branching variable.
    ///
    /// `node_bounds` are the bounds at the node; `probe` solves the child
    /// relaxation of a bound change (used for unreliable candidates under
    /// reliability branching). Returns None if the solution is
    /// integer-feasible.
    pub fn select<F>(
        &mut self,
        x: &[f64],
        prob: &MipProblem,
        node_bounds: (&[f64], &[f64]),
        parent_obj: f64,
        tol: f64,
        probe: F,
    ) -> Option<BranchDecision>
    where
        F: FnMut(BoundChange) -> ProbeResult,
    {
        let fractional = prob.get_fractional_vars(x, tol);
        if fractional.is_empty() {
            return None;
        }
        let (var, value, score) = match self.rule {
            BranchingRule::MostFractional => self.select_most_fractional(&fractional)?,
            BranchingRule::Pseudocost => self.select_pseudocost(&fractional)?,
            BranchingRule::Reliability => {
                self.select_reliability(&fractional, node_bounds, parent_obj, probe)?
            }
        };
        Some(make_decision(var, value, score, node_bounds))
    }

    /// Select variable closest to 0.5 (most fractional).
    fn select_most_fractional(&self, fractional: &[(usize, f64, f64)]) -> Option<(usize, f64, f64)> {
        fractional
            .iter()
            .copied()
            .max_by(|(_, _, f1), (_, _, f2)| f1.total_cmp(f2))
    }

    /// Select variable with best pseudocost score.
    fn select_pseudocost(&self, fractional: &[(usize, f64, f64)]) -> Option<(usize, f64, f64)> {
        fractional
            .iter()
            .map(|&(v, val, _)| (v, val, self.pseudocost_score(v, val)))
            .max_by(|(_, _, s1), (_, _, s2)| s1.total_cmp(s2))
    }

    /// Reliability branching.
    ///
    /// The best candidates by pseudocost score are probed when their
    /// pseudocosts are not yet reliable; probing records observations.
    fn select_reliability<F>(
        &mut self,
        fractional: &[(usize, f64, f64)],
        node_bounds: (&[f64], &[f64]),
        parent_obj: f64,
        mut probe: F,
    ) -> Option<(usize, f64, f64)>
    where
        F: FnMut(BoundChange) -> ProbeResult,
    {
        let mut ranked: Vec<(usize, f64, f64)> = fractional
            .iter()
            .map(|&(v, val, _)| (v, val, self.pseudocost_score(v, val)))
            .collect();
        ranked.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut best: Option<(usize, f64, f64)> = None;
        for (rank, &(var, value, pc_score)) in ranked.iter().enumerate() {
            let score = if rank < self.candidates && !self.is_reliable(var) {
                let decision = make_decision(var, value, 0.0, node_bounds);
                let down = probe(decision.down_branch);
                let up = probe(decision.up_branch);
                let gain = |r: ProbeResult| r.map_or(f64::INFINITY, |obj| (obj - parent_obj).max(0.0));
                let (down_gain, up_gain) = (gain(down), gain(up));
                self.update_pseudocosts(
                    var,
                    value,
                    down_gain.is_finite().then_some(down_gain),
                    up_gain.is_finite().then_some(up_gain),
                );
                if down_gain.is_infinite() || up_gain.is_infinite() {
                    // One side infeasible: branching fixes the variable.
                    return Some((var, value, f64::INFINITY));
                }
                down_gain.max(MIN_GAIN) * up_gain.max(MIN_GAIN)
            } else {
                pc_score
            };
            if best.map_or(true, |(_, _, s)| score > s) {
                best = Some((var, value, score));
            }
        }
        best
    }

    /// Compute pseudocost score for a variable.
    fn pseudocost_score(&self, var: usize, value: f64) -> f64 {
        let down_frac = value - value.floor();
        let up_frac = 1.0 - down_frac;

        let down_cost = down_frac * self.pseudocosts_down[var];
        let up_cost = up_frac * self.pseudocosts_up[var];

        // Product score prefers balanced improvements in both directions
        down_cost.max(MIN_GAIN) * up_cost.max(MIN_GAIN)
    }

    /// Update pseudocosts with observed objective changes of the children.
    pub fn update_pseudocosts(
        &mut self,
        var: usize,
        value: f64,
        down_obj_change: Option<f64>,
        up_obj_change: Option<f64>,
    ) {
        let down_frac = value - value.floor();
        let up_frac = 1.0 - down_frac;

        if let Some(change) = down_obj_change {
            if down_frac > 1e-6 && change >= 0.0 {
                let count = self.branch_count_down[var] as f64;
                self.pseudocosts_down[var] =
                    (self.pseudocosts_down[var] * count + change / down_frac) / (count + 1.0);
                self.branch_count_down[var] += 1;
            }
        }

        if let Some(change) = up_obj_change {
            if up_frac > 1e-6 && change >= 0.0 {
                let count = self.branch_count_up[var] as f64;
                self.pseudocosts_up[var] =
                    (self.pseudocosts_up[var] * count + change / up_frac) / (count + 1.0);
                self.branch_count_up[var] += 1;
            }
        }
    }

    /// Get pseudocost statistics for a variable.
    pub fn get_pseudocosts(&self, var: usize) -> (f64, f64, usize, usize) {
        (
            self.pseudocosts_down[var],
            self.pseudocosts_up[var],
            self.branch_count_down[var],
            self.branch_count_up[var],
        )
    }

    /// Initialize pseudocosts from objective coefficients.
    pub fn init_from_objective(&mut self, cost: &[f64]) {
        for (i, &c) in cost.iter().enumerate().take(self.pseudocosts_down.len()) {
            let init_cost = c.abs().max(0.1);
            self.pseudocosts_down[i] = init_cost;
            self.pseudocosts_up[i] = init_cost;
        }
    }

    /// Estimated objective of the best integer point below a node.
    pub fn estimate(&self, x: &[f64], bound: f64, prob: &MipProblem, tol: f64) -> f64 {
        bound
            + prob
                .get_fractional_vars(x, tol)
                .iter()
                .map(|&(v, val, _)| {
                    let f = val - val.floor();
                    (f * self.pseudocosts_down[v]).min((1.0 - f) * self.pseudocosts_up[v])
                })
                .sum::<f64>()
    }
}

/// Create a branch decision for a variable at the node bounds.
fn make_decision(var: usize, value: f64, score: f64, (lb, ub): (&[f64], &[f64])) -> BranchDecision {
    BranchDecision {
        var,
        value,
        down_branch: BoundChange::down_branch(var, lb[var], ub[var], value),
        up_branch: BoundChange::up_branch(var, lb[var], ub[var], value),
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::integrality;
    use solver_core::linalg::sparse;
    use solver_core::Model;

    fn simple_mip() -> MipProblem {
        let a = sparse::from_triplets(1, 3, vec![(0, 0, 1.0), (0, 1, 1.0), (0, 2, 1.0)]);
        let model = Model::new(
            vec![1.0, 1.0, 1.0],
            vec![0.0; 3],
            vec![1.0, 1.0, f64::INFINITY],
            vec![2.0],
            vec![f64::INFINITY],
            a,
        )
        .with_integrality(integrality(3, &[0, 1]));
        MipProblem::new(&model).unwrap()
    }

    fn bounds(prob: &MipProblem) -> (&[f64], &[f64]) {
        (&prob.var_lb, &prob.var_ub)
    }

    #[test]
    fn test_most_fractional() {
        let prob = simple_mip();
        let mut selector = BranchingSelector::new(BranchingRule::MostFractional, 3, 8, 8);

        let x = vec![0.3, 0.6, 1.0];
        let d = selector.select(&x, &prob, bounds(&prob), 0.0, 1e-6, |_| None).unwrap();
        assert_eq!(d.var, 1);
    }

    #[test]
    fn test_integer_feasible() {
        let prob = simple_mip();
        let mut selector = BranchingSelector::new(BranchingRule::MostFractional, 3, 8, 8);

        let x = vec![1.0, 0.0, 1.0];
        assert!(selector.select(&x, &prob, bounds(&prob), 0.0, 1e-6, |_| None).is_none());
    }

    #[test]
    fn test_branch_decision() {
        let prob = simple_mip();
        let mut selector = BranchingSelector::new(BranchingRule::MostFractional, 3, 8, 8);

        let x = vec![0.5, 0.0, 1.0];
        let decision = selector.select(&x, &prob, bounds(&prob), 0.0, 1e-6, |_| None).unwrap();

        assert_eq!(decision.var, 0);
        assert_eq!(decision.value, 0.5);
        assert_eq!(decision.down_branch.new_ub, 0.0);
        assert_eq!(decision.up_branch.new_lb, 1.0);
    }

    #[test]
    fn test_reliability_probes_and_records() {
        let prob = simple_mip();
        let mut selector = BranchingSelector::new(BranchingRule::Reliability, 3, 1, 8);
        let x = vec![0.5, 0.5, 1.0];
        let mut probes = Vec::new();
        // Branching on x1 gains more in both directions.
        let d = selector
            .select(&x, &prob, bounds(&prob), 2.0, 1e-6, |bc| {
                probes.push(bc.var);
                Some(if bc.var == 1 { 3.0 } else { 2.1 })
            })
            .unwrap();
        assert_eq!(d.var, 1);
        assert_eq!(probes.len(), 4);
        assert!(selector.is_reliable(0) && selector.is_reliable(1));

        // Reliable now: no further probing.
        let mut probed = false;
        selector.select(&x, &prob, bounds(&prob), 2.0, 1e-6, |_| {
            probed = true;
            None
        });
        assert!(!probed);
    }

    #[test]
    fn test_strong_branching_stops_at_reliability_count() {
        let prob = simple_mip();
        let x = vec![0.5, 0.5, 1.0];
        let mut selector = BranchingSelector::new(BranchingRule::Reliability, 3, 3, 8);
        let mut strong_rounds = 0;
        for _ in 0..5 {
            let mut evaluated = false;
            selector.select(&x, &prob, bounds(&prob), 2.0, 1e-6, |_| {
                evaluated = true;
                Some(2.5)
            });
            if evaluated {
                strong_rounds += 1;
            }
        }
        assert_eq!(strong_rounds, 3);

        // Zero observations needed: pseudocosts from the start.
        let mut selector = BranchingSelector::new(BranchingRule::Reliability, 3, 0, 8);
        let mut evaluated = false;
        let d = selector.select(&x, &prob, bounds(&prob), 2.0, 1e-6, |_| {
            evaluated = true;
            None
        });
        assert!(d.is_some());
        assert!(!evaluated);
    }

    #[test]
    fn test_infeasible_probe_wins() {
        let prob = simple_mip();
        let mut selector = BranchingSelector::new(BranchingRule::Reliability, 3, 4, 8);
        let x = vec![0.5, 0.5, 1.0];
        let d = selector
            .select(&x, &prob, bounds(&prob), 0.0, 1e-6, |bc| {
                if bc.var == 0 && bc.new_lb == 1.0 {
                    None
                } else {
                    Some(0.5)
                }
            })
            .unwrap();
        assert_eq!(d.var, 0);
        assert_eq!(d.score, f64::INFINITY);
    }

    #[test]
    fn test_pseudocost_update_averages() {
        let mut selector = BranchingSelector::new(BranchingRule::Pseudocost, 1, 8, 8);
        selector.update_pseudocosts(0, 0.25, Some(0.5), Some(1.5));
        let (down, up, nd, nu) = selector.get_pseudocosts(0);
        assert!((down - 2.0).abs() < 1e-12);
        assert!((up - 2.0).abs() < 1e-12);
        assert_eq!((nd, nu), (1, 1));
    }
}
