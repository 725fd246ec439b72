//! Edge-weight pricing for both simplex variants.
//!
//! Primal pricing picks an entering variable by `d_j² / w_j`; dual pricing
//! picks a leaving slot by `infeasibility² / w_i`. Dantzig keeps unit
//! weights, Devex maintains reference-framework weights and steepest edge
//! maintains exact norms by the Goldfarb–Reid recurrences. Steepest-edge
//! weights are checked against the exact value whenever it is available for
//! free; once the running log-error exceeds the configured threshold the
//! pricing falls back to Devex.

use crate::settings::EdgeWeightStrategy;
use crate::solution::BasisStatus;

use super::workspace::{sparse_dot, SimplexWorkspace, NONBASIC};

/// Lower clamp for updated weights.
const MIN_WEIGHT: f64 = 1e-4;
/// Devex weights are reset once any grows past this.
const DEVEX_RESET: f64 = 1e8;
/// Smoothing factor of the running log-error.
const ERROR_SMOOTHING: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PricingRule {
    Dantzig,
    Devex,
    SteepestEdge,
}

fn resolve(strategy: EdgeWeightStrategy, default: PricingRule) -> PricingRule {
    match strategy {
        EdgeWeightStrategy::Choose => default,
        EdgeWeightStrategy::Dantzig => PricingRule::Dantzig,
        EdgeWeightStrategy::Devex => PricingRule::Devex,
        EdgeWeightStrategy::SteepestEdge => PricingRule::SteepestEdge,
    }
}

/// Running log-error monitor for steepest-edge weights.
#[derive(Debug, Clone)]
struct ErrorMonitor {
    mean: f64,
    limit: f64,
}

impl ErrorMonitor {
    fn new(threshold: f64) -> Self {
        Self {
            mean: 0.0,
            limit: threshold.max(1.0).ln(),
        }
    }

    /// Record a (stored, exact) pair; true once the limit is crossed.
    fn record(&mut self, stored: f64, exact: f64) -> bool {
        if stored <= 0.0 || exact <= 0.0 {
            return false;
        }
        let err = (stored / exact).ln().abs();
        self.mean = ERROR_SMOOTHING * self.mean + (1.0 - ERROR_SMOOTHING) * err;
        self.mean > self.limit
    }
}

/// Primal pricing state: one weight per variable.
pub(crate) struct PrimalPricing {
    pub rule: PricingRule,
    weights: Vec<f64>,
    monitor: ErrorMonitor,
}

impl PrimalPricing {
    pub fn new(ws: &SimplexWorkspace<'_>) -> Self {
        let s = ws.ctx.settings();
        let rule = resolve(s.primal_edge_weight, PricingRule::Devex);
        let mut p = Self {
            rule,
            weights: vec![1.0; ws.num_vars()],
            monitor: ErrorMonitor::new(s.dse_log_error_threshold),
        };
        p.reset(ws);
        p
    }

    /// Recompute weights from scratch for the current basis.
    pub fn reset(&mut self, ws: &SimplexWorkspace<'_>) {
        self.weights.iter_mut().for_each(|w| *w = 1.0);
        if self.rule == PricingRule::SteepestEdge {
            for v in 0..ws.num_vars() {
                if ws.slot_of[v] == NONBASIC {
                    let col = ws.ftran_column(v);
                    self.weights[v] = 1.0 + col.iter().map(|a| a * a).sum::<f64>();
                }
            }
        }
    }

    /// Direction in which nonbasic `v` would improve given reduced cost `d`,
    /// or None.
    pub fn improving_direction(ws: &SimplexWorkspace<'_>, v: usize, d: f64, tol: f64) -> Option<f64> {
        match ws.status[v] {
            BasisStatus::Basic | BasisStatus::Fixed => None,
            BasisStatus::AtLower if d < -tol => Some(1.0),
            BasisStatus::AtUpper if d > tol => Some(-1.0),
            BasisStatus::Free if d.abs() > tol => Some(if d < 0.0 { 1.0 } else { -1.0 }),
            _ => None,
        }
    }

    /// Entering variable and its direction.
    pub fn choose_entering(
        &self,
        ws: &SimplexWorkspace<'_>,
        dual: &[f64],
        rejected: &[bool],
    ) -> Option<(usize, f64)> {
        let tol = ws.dual_tol;
        let mut best: Option<(usize, f64, f64)> = None;
        for v in 0..ws.num_vars() {
            if rejected[v] {
                continue;
            }
            let d = dual[v];
            if let Some(dir) = Self::improving_direction(ws, v, d, tol) {
                let score = d * d / self.weights[v];
                if best.map_or(true, |b| score > b.2) {
                    best = Some((v, dir, score));
                }
            }
        }
        best.map(|(v, dir, _)| (v, dir))
    }

    /// Update weights after `entering` replaced `leaving` in `slot`.
    ///
    /// `alpha_q` is the ftran'd entering column, `alpha_row` the pivot row
    /// over nonbasic variables (before the basis change).
    pub fn update(
        &mut self,
        ws: &SimplexWorkspace<'_>,
        entering: usize,
        leaving: usize,
        slot: usize,
        alpha_q: &[f64],
        alpha_row: &[f64],
    ) {
        let pivot = alpha_q[slot];
        match self.rule {
            PricingRule::Dantzig => {}
            PricingRule::Devex => {
                let wq = self.weights[entering];
                let mut reset = false;
                for v in 0..ws.num_vars() {
                    if ws.slot_of[v] != NONBASIC || v == entering || alpha_row[v] == 0.0 {
                        continue;
                    }
                    let ratio = alpha_row[v] / pivot;
                    self.weights[v] = self.weights[v].max(ratio * ratio * wq);
                    reset |= self.weights[v] > DEVEX_RESET;
                }
                self.weights[leaving] = (wq / (pivot * pivot)).max(1.0);
                if reset {
                    self.weights.iter_mut().for_each(|w| *w = 1.0);
                }
            }
            PricingRule::SteepestEdge => {
                let exact_q = 1.0 + alpha_q.iter().map(|a| a * a).sum::<f64>();
                if self.monitor.record(self.weights[entering], exact_q) {
                    log::debug!("primal steepest-edge weights drifted, switching to Devex");
                    self.rule = PricingRule::Devex;
                    self.weights.iter_mut().for_each(|w| *w = 1.0);
                    return;
                }
                let tau = ws.factor.btran(alpha_q);
                for v in 0..ws.num_vars() {
                    if ws.slot_of[v] != NONBASIC || v == entering || alpha_row[v] == 0.0 {
                        continue;
                    }
                    let ratio = alpha_row[v] / pivot;
                    let cross = sparse_dot(&ws.columns[v], &tau);
                    let w = self.weights[v] - 2.0 * ratio * cross + ratio * ratio * exact_q;
                    self.weights[v] = w.max(1.0 + ratio * ratio);
                }
                self.weights[leaving] = (exact_q / (pivot * pivot)).max(1.0);
            }
        }
    }
}

/// Dual pricing state: one weight per basic slot.
pub(crate) struct DualPricing {
    pub rule: PricingRule,
    weights: Vec<f64>,
    monitor: ErrorMonitor,
}

impl DualPricing {
    pub fn new(ws: &SimplexWorkspace<'_>) -> Self {
        let s = ws.ctx.settings();
        let rule = resolve(s.dual_edge_weight, PricingRule::SteepestEdge);
        let mut p = Self {
            rule,
            weights: vec![1.0; ws.m],
            monitor: ErrorMonitor::new(s.dse_log_error_threshold),
        };
        p.reset(ws);
        p
    }

    /// Exact weights `‖e_iᵀB⁻¹‖²` for steepest edge, ones otherwise.
    pub fn reset(&mut self, ws: &SimplexWorkspace<'_>) {
        self.weights.iter_mut().for_each(|w| *w = 1.0);
        if self.rule == PricingRule::SteepestEdge {
            let mut e = vec![0.0; ws.m];
            for k in 0..ws.m {
                e[k] = 1.0;
                let rho = ws.factor.btran(&e);
                self.weights[k] = rho.iter().map(|a| a * a).sum::<f64>().max(MIN_WEIGHT);
                e[k] = 0.0;
            }
        }
    }

    /// Slot of the most attractive primal-infeasible basic variable, skipping
    /// slots marked in `skip`.
    pub fn choose_leaving(&self, ws: &SimplexWorkspace<'_>, skip: &[bool]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (k, &v) in ws.basic.iter().enumerate() {
            let inf = ws.infeasibility(v);
            if inf <= 0.0 || skip[k] {
                continue;
            }
            let score = inf * inf / self.weights[k];
            if best.map_or(true, |b| score > b.1) {
                best = Some((k, score));
            }
        }
        best.map(|(k, _)| k)
    }

    /// Feed the exact weight of `slot` (‖ρ_r‖²) to the monitor and store it.
    pub fn check_exact(&mut self, slot: usize, rho: &[f64]) {
        if self.rule != PricingRule::SteepestEdge {
            return;
        }
        let exact = rho.iter().map(|a| a * a).sum::<f64>().max(MIN_WEIGHT);
        if self.monitor.record(self.weights[slot], exact) {
            log::debug!("dual steepest-edge weights drifted, switching to Devex");
            self.rule = PricingRule::Devex;
            self.weights.iter_mut().for_each(|w| *w = 1.0);
            return;
        }
        self.weights[slot] = exact;
    }

    /// Update weights for a pivot in `slot` with entering column `alpha_q`.
    pub fn update(&mut self, ws: &SimplexWorkspace<'_>, slot: usize, alpha_q: &[f64], rho: &[f64]) {
        let pivot = alpha_q[slot];
        let wr = self.weights[slot];
        match self.rule {
            PricingRule::Dantzig => {}
            PricingRule::Devex => {
                for (k, &a) in alpha_q.iter().enumerate() {
                    if k != slot && a != 0.0 {
                        let ratio = a / pivot;
                        self.weights[k] = self.weights[k].max(ratio * ratio * wr);
                    }
                }
                self.weights[slot] = (wr / (pivot * pivot)).max(1.0);
                if self.weights.iter().any(|&w| w > DEVEX_RESET) {
                    self.weights.iter_mut().for_each(|w| *w = 1.0);
                }
            }
            PricingRule::SteepestEdge => {
                let tau = ws.factor.ftran(rho);
                for (k, &a) in alpha_q.iter().enumerate() {
                    if k != slot && a != 0.0 {
                        let ratio = a / pivot;
                        let w = self.weights[k] - 2.0 * ratio * tau[k] + ratio * ratio * wr;
                        self.weights[k] = w.max(MIN_WEIGHT);
                    }
                }
                self.weights[slot] = (wr / (pivot * pivot)).max(MIN_WEIGHT);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_monitor_trips_on_persistent_error() {
        let mut m = ErrorMonitor::new(10.0);
        assert!(!m.record(1.0, 1.0));
        let mut tripped = false;
        for _ in 0..100 {
            tripped |= m.record(1e6, 1.0);
        }
        assert!(tripped);
    }

    #[test]
    fn test_resolve_strategy() {
        assert_eq!(resolve(EdgeWeightStrategy::Choose, PricingRule::Devex), PricingRule::Devex);
        assert_eq!(
            resolve(EdgeWeightStrategy::Dantzig, PricingRule::SteepestEdge),
            PricingRule::Dantzig
        );
    }
}
