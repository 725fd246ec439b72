//! Revised simplex engine.
//!
//! Primal and dual revised simplex over a factorized basis of the
//! computational form `[A -I](x, r) = 0`. The driver picks the variant,
//! applies and removes perturbations, runs cleanup passes and verifies the
//! final basis by refactorizing and recomputing primal and dual values.
//!
//! The quadratic term of the model, if any, is ignored here.

pub mod crash;
pub mod dual;
pub mod perturb;
pub mod pricing;
pub mod primal;
pub mod ratio;
pub(crate) mod scale;
pub(crate) mod workspace;

use crate::context::SolveContext;
use crate::linalg::factor::BasisFactor;
use crate::problem::Model;
use crate::settings::{CrashStrategy, SimplexStrategy};
use crate::solution::{Basis, ModelStatus};

use scale::SimplexScaling;
use workspace::{FactorOutcome, SimplexWorkspace};

/// Passes (variant runs plus cleanups) before the driver gives up.
const MAX_PASSES: usize = 6;

/// Bound inconsistency beyond which a variable makes the model infeasible.
const BOUND_CONFLICT: f64 = 1e-9;

/// Terminal state of a single primal or dual run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopOutcome {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
    TimeLimit,
    ObjectiveBound,
    /// Every remaining candidate pivot was rejected as too small.
    Stalled,
    Failed,
}

impl LoopOutcome {
    fn status(self) -> ModelStatus {
        match self {
            LoopOutcome::Optimal => ModelStatus::Optimal,
            LoopOutcome::Infeasible => ModelStatus::Infeasible,
            LoopOutcome::Unbounded => ModelStatus::Unbounded,
            LoopOutcome::IterationLimit => ModelStatus::IterationLimit,
            LoopOutcome::TimeLimit => ModelStatus::TimeLimit,
            LoopOutcome::ObjectiveBound => ModelStatus::ObjectiveBound,
            LoopOutcome::Stalled | LoopOutcome::Failed => ModelStatus::SolveError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Primal,
    Dual,
}

impl Variant {
    fn other(self) -> Self {
        match self {
            Variant::Primal => Variant::Dual,
            Variant::Dual => Variant::Primal,
        }
    }
}

/// Result of a simplex solve.
#[derive(Debug, Clone)]
pub struct SimplexResult {
    pub status: ModelStatus,
    pub basis: Basis,
    pub col_value: Vec<f64>,
    pub row_value: Vec<f64>,
    /// Reduced costs `c - Aᵀy`
    pub col_dual: Vec<f64>,
    pub row_dual: Vec<f64>,
    /// Objective including the offset
    pub objective: f64,
    pub iterations: usize,
    pub num_primal_infeasibilities: usize,
    pub max_primal_infeasibility: f64,
    pub num_dual_infeasibilities: usize,
    pub max_dual_infeasibility: f64,
    /// Factorization of the final basis, if it is factorized
    pub factor: Option<BasisFactor>,
}

/// Solve the LP part of `model` (a minimization) with the simplex method,
/// starting from `warm` if it is a valid basis of matching shape.
///
/// Unless `simplex_scale_strategy` is off the LP is equilibrated first. An
/// optimal basis of the scaled LP is then verified on `model` itself,
/// continuing with the iterations left if unscaling exposed
/// infeasibilities.
pub fn solve(model: &Model, warm: Option<&Basis>, ctx: &SolveContext) -> SimplexResult {
    let settings = ctx.settings();
    let scaling = if settings.simplex_scale {
        SimplexScaling::compute(model, settings)
    } else {
        None
    };
    let Some(scaling) = scaling else {
        return solve_unscaled(model, warm, ctx);
    };

    let scaled = scaling.apply(model);
    let scaled_ctx = if scaling.cost != 1.0 {
        let mut s = settings.clone();
        s.objective_bound /= scaling.cost;
        ctx.with_settings(s)
    } else {
        ctx.clone()
    };
    let result = scaling.unscale(model, solve_unscaled(&scaled, warm, &scaled_ctx), settings);
    if result.status != ModelStatus::Optimal {
        return result;
    }
    if result.num_primal_infeasibilities > 0 || result.num_dual_infeasibilities > 0 {
        log::debug!(
            "{} primal and {} dual infeasibilities after unscaling",
            result.num_primal_infeasibilities,
            result.num_dual_infeasibilities
        );
    }
    let mut verified = solve_unscaled(
        model,
        Some(&result.basis),
        &ctx.with_simplex_iterations_spent(result.iterations),
    );
    verified.iterations += result.iterations;
    verified
}

fn solve_unscaled(model: &Model, warm: Option<&Basis>, ctx: &SolveContext) -> SimplexResult {
    let mut ws = SimplexWorkspace::new(model, ctx);

    if has_bound_conflict(&ws) {
        ws.reset_to_slack();
        let ok = ws.refresh() == FactorOutcome::Ok;
        return finish(ws, model, ModelStatus::Infeasible, ok);
    }

    let outcome = match start(&mut ws, warm) {
        FactorOutcome::Ok => drive(&mut ws),
        FactorOutcome::Failed => LoopOutcome::Failed,
    };
    let verified = outcome != LoopOutcome::Failed && ws.refresh() == FactorOutcome::Ok;
    let status = if verified || outcome != LoopOutcome::Optimal {
        outcome.status()
    } else {
        ModelStatus::SolveError
    };
    finish(ws, model, status, verified)
}

fn has_bound_conflict(ws: &SimplexWorkspace<'_>) -> bool {
    (0..ws.num_vars()).any(|v| ws.lower[v] > ws.upper[v] + BOUND_CONFLICT)
}

/// Install the starting basis and factorize it.
fn start(ws: &mut SimplexWorkspace<'_>, warm: Option<&Basis>) -> FactorOutcome {
    let ctx = ws.ctx;
    let settings = ctx.settings();
    let warm = warm.filter(|b| b.valid && b.num_col() == ws.n && b.num_row() == ws.m);
    match warm {
        Some(basis) => ws.install_basis(basis),
        None => {
            ws.reset_to_slack();
            if settings.crash_strategy == CrashStrategy::Triangular {
                crash::triangular(ws);
            }
        }
    }
    if ws.factorize() == FactorOutcome::Failed {
        log::debug!("starting basis could not be factorized, using the slack basis");
        ws.reset_to_slack();
        if ws.factorize() == FactorOutcome::Failed {
            return FactorOutcome::Failed;
        }
    }
    if settings.initial_condition_check {
        let estimate = ws.factor.condition_estimate();
        if estimate > settings.initial_condition_tolerance {
            log::debug!("starting basis condition estimate {:e}, using the slack basis", estimate);
            ws.reset_to_slack();
            if ws.factorize() == FactorOutcome::Failed {
                return FactorOutcome::Failed;
            }
        }
    }
    ws.reset_nonbasic_values();
    ws.compute_primal();
    ws.compute_dual();
    FactorOutcome::Ok
}

/// Prepare a dual run: optional cost perturbation, then dual feasibility by
/// flipping boxed variables. False if the basis cannot be made dual
/// feasible.
fn prepare_dual(ws: &mut SimplexWorkspace<'_>, perturb: bool) -> bool {
    if perturb {
        perturb::perturb_costs(ws);
    }
    ws.compute_dual();
    if dual::make_dual_feasible(ws) {
        return true;
    }
    if ws.costs_perturbed {
        perturb::remove_cost_perturbation(ws);
        ws.compute_dual();
    }
    false
}

/// Run variants and cleanups until a verified outcome is reached.
fn drive(ws: &mut SimplexWorkspace<'_>) -> LoopOutcome {
    let ctx = ws.ctx;
    let settings = ctx.settings();
    let mut variant = match settings.simplex_strategy {
        SimplexStrategy::Primal => Variant::Primal,
        SimplexStrategy::Dual | SimplexStrategy::Choose => Variant::Dual,
    };
    let mut perturb = true;
    let mut restarted = false;

    for pass in 0..MAX_PASSES {
        let outcome = if variant == Variant::Dual && prepare_dual(ws, perturb) {
            let outcome = dual::run(ws);
            if ws.costs_perturbed {
                perturb::remove_cost_perturbation(ws);
                ws.compute_dual();
            }
            outcome
        } else {
            if perturb {
                perturb::perturb_bounds(ws);
            }
            let outcome = primal::run(ws);
            if ws.bounds_perturbed {
                perturb::remove_bound_perturbation(ws);
                if outcome == LoopOutcome::Unbounded {
                    log::debug!("unbounded with perturbed bounds, verifying");
                    variant = Variant::Primal;
                    perturb = false;
                    continue;
                }
            }
            outcome
        };
        if outcome == LoopOutcome::Stalled && !restarted {
            // The other variant pivots on different elements.
            log::debug!("{:?} simplex stalled on rejected pivots, restarting from the slack basis", variant);
            restarted = true;
            ws.reset_to_slack();
            if ws.refresh() != FactorOutcome::Ok {
                return LoopOutcome::Failed;
            }
            variant = variant.other();
            perturb = true;
            continue;
        }
        if outcome != LoopOutcome::Optimal {
            return outcome;
        }

        if ws.refresh() != FactorOutcome::Ok {
            return LoopOutcome::Failed;
        }
        let (num_primal, _, _) = ws.primal_infeasibility();
        let (num_dual, _) = ws.dual_infeasibility(&ws.dual);
        if num_primal == 0 && num_dual == 0 {
            return LoopOutcome::Optimal;
        }
        log::debug!(
            "pass {}: {} primal and {} dual infeasibilities after removing perturbations",
            pass,
            num_primal,
            num_dual
        );
        variant = if num_dual == 0 && settings.dual_simplex_cleanup {
            Variant::Dual
        } else {
            Variant::Primal
        };
        perturb = false;
    }
    LoopOutcome::Failed
}

/// Extract values with original costs and bounds.
fn finish(ws: SimplexWorkspace<'_>, model: &Model, status: ModelStatus, factorized: bool) -> SimplexResult {
    let (n, m) = (ws.n, ws.m);
    let row_dual = if factorized {
        ws.row_duals(&ws.orig_cost)
    } else {
        vec![0.0; m]
    };
    let dual = if factorized {
        ws.reduced_costs(&ws.orig_cost)
    } else {
        vec![0.0; n + m]
    };
    let (num_primal, max_primal, _) = ws.primal_infeasibility();
    let (num_dual, max_dual) = ws.dual_infeasibility(&dual);
    let mut basis = ws.basis();
    basis.valid = factorized;

    let objective = model.offset + ws.objective();
    ws.ctx.message(
        log::Level::Debug,
        format!(
            "simplex finished: {} after {} iterations, objective {:.10e}",
            status, ws.iterations, objective
        ),
    );
    let SimplexWorkspace {
        x, factor, iterations, ..
    } = ws;
    SimplexResult {
        status,
        basis,
        col_value: x[..n].to_vec(),
        row_value: x[n..].to_vec(),
        col_dual: dual[..n].to_vec(),
        row_dual,
        objective,
        iterations,
        num_primal_infeasibilities: num_primal,
        max_primal_infeasibility: max_primal,
        num_dual_infeasibilities: num_dual,
        max_dual_infeasibility: max_dual,
        factor: factorized.then_some(factor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::{self, from_triplets};
    use crate::settings::SolverSettings;
    use crate::solution::BasisStatus;

    fn production() -> Model {
        // max x + y s.t. x + 2y <= 4, 3x + y <= 6, x, y >= 0, as minimization
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 1.0)]);
        Model::new(
            vec![-1.0, -1.0],
            vec![0.0, 0.0],
            vec![f64::INFINITY; 2],
            vec![f64::NEG_INFINITY; 2],
            vec![4.0, 6.0],
            a,
        )
    }

    fn ctx_with(f: impl FnOnce(&mut SolverSettings)) -> SolveContext {
        let mut s = SolverSettings::default();
        f(&mut s);
        SolveContext::new(s, None)
    }

    fn assert_optimal_production(r: &SimplexResult) {
        assert_eq!(r.status, ModelStatus::Optimal);
        assert!((r.objective + 2.8).abs() < 1e-8);
        assert!((r.col_value[0] - 1.6).abs() < 1e-8);
        assert!((r.col_value[1] - 1.2).abs() < 1e-8);
    }

    #[test]
    fn test_solve_each_strategy() {
        for strategy in [SimplexStrategy::Choose, SimplexStrategy::Dual, SimplexStrategy::Primal] {
            let ctx = ctx_with(|s| s.simplex_strategy = strategy);
            let r = solve(&production(), None, &ctx);
            assert_optimal_production(&r);
            assert!(r.basis.valid);
        }
    }

    #[test]
    fn test_each_pricing_rule() {
        use crate::settings::EdgeWeightStrategy::*;
        for rule in [Dantzig, Devex, SteepestEdge] {
            let ctx = ctx_with(|s| {
                s.primal_edge_weight = rule;
                s.dual_edge_weight = rule;
            });
            assert_optimal_production(&solve(&production(), None, &ctx));
        }
    }

    #[test]
    fn test_strong_duality_and_sign_consistency() {
        let ctx = SolveContext::default();
        let lp = production();
        let r = solve(&lp, None, &ctx);
        // bᵀy over active row bounds equals cᵀx.
        let dual_obj: f64 = r
            .row_dual
            .iter()
            .enumerate()
            .map(|(i, &y)| y * if y < 0.0 { lp.row_upper[i] } else { lp.row_lower[i] })
            .sum();
        assert!((dual_obj - r.objective).abs() < 1e-8);
        for j in 0..2 {
            if r.basis.col_status[j] == BasisStatus::AtLower {
                assert!(r.col_dual[j] >= -1e-9);
            }
        }
        assert_eq!(r.num_dual_infeasibilities, 0);
    }

    /// min x + 10y  s.t.  0.5x + 2y >= 3,  y >= 1.5,  x, y >= 0
    fn small_pivots() -> Model {
        let a = from_triplets(2, 2, vec![(0, 0, 0.5), (0, 1, 2.0), (1, 1, 1.0)]);
        Model::new(
            vec![1.0, 10.0],
            vec![0.0; 2],
            vec![f64::INFINITY; 2],
            vec![3.0, 1.5],
            vec![f64::INFINITY; 2],
            a,
        )
    }

    #[test]
    fn test_large_pivot_tolerance_still_reaches_optimum() {
        for strategy in [SimplexStrategy::Dual, SimplexStrategy::Primal] {
            for scale in [false, true] {
                let ctx = ctx_with(|s| {
                    s.simplex_strategy = strategy;
                    s.factor_pivot_tolerance = 0.9;
                    s.simplex_scale = scale;
                });
                let r = solve(&small_pivots(), None, &ctx);
                assert_eq!(r.status, ModelStatus::Optimal, "{:?}, scaled {}", strategy, scale);
                assert!((r.objective - 15.0).abs() < 1e-8);
                assert!(r.col_value[0].abs() < 1e-8);
                assert!((r.col_value[1] - 1.5).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_scaled_solve_reports_unscaled_values() {
        // The production LP with the second row multiplied by 1000 and y
        // measured in thousandths.
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 0.002), (1, 0, 3000.0), (1, 1, 1.0)]);
        let lp = Model::new(
            vec![-1.0, -0.001],
            vec![0.0, 0.0],
            vec![f64::INFINITY; 2],
            vec![f64::NEG_INFINITY; 2],
            vec![4.0, 6000.0],
            a,
        );
        let mut last_objective: Option<f64> = None;
        for scale in [false, true] {
            let ctx = ctx_with(|s| s.simplex_scale = scale);
            let r = solve(&lp, None, &ctx);
            assert_eq!(r.status, ModelStatus::Optimal);
            assert!((r.col_value[0] - 1.6).abs() < 1e-8);
            assert!((r.col_value[1] - 1200.0).abs() < 1e-5);
            assert!((r.row_value[1] - 6000.0).abs() < 1e-5);
            // Duals of the unscaled rows: 0.4 and 0.2 / 1000.
            assert!((r.row_dual[0] + 0.4).abs() < 1e-8);
            assert!((r.row_dual[1] + 0.0002).abs() < 1e-10);
            assert_eq!(r.num_dual_infeasibilities, 0);
            assert!(r.factor.is_some());
            if let Some(prev) = last_objective {
                assert!((r.objective - prev).abs() < 1e-8);
            }
            last_objective = Some(r.objective);
        }
    }

    #[test]
    fn test_ill_conditioned_warm_basis_falls_back_to_slack() {
        // Nearly parallel columns: cond(B) is about 4e6 with both basic.
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.000001)]);
        let lp = Model::new(
            vec![1.0, 1.0],
            vec![0.0; 2],
            vec![f64::INFINITY; 2],
            vec![1.0, 1.0],
            vec![f64::INFINITY; 2],
            a,
        );
        let warm = Basis {
            valid: true,
            col_status: vec![BasisStatus::Basic; 2],
            row_status: vec![BasisStatus::AtLower; 2],
            basic_index: vec![0, 1],
        };
        for (tolerance, slack) in [(1e14, false), (1e3, true)] {
            let ctx = ctx_with(|s| s.initial_condition_tolerance = tolerance);
            let mut ws = SimplexWorkspace::new(&lp, &ctx);
            assert_eq!(start(&mut ws, Some(&warm)), FactorOutcome::Ok);
            assert_eq!(ws.basic.iter().all(|&v| v >= ws.n), slack);

            let r = solve(&lp, Some(&warm), &ctx);
            assert_eq!(r.status, ModelStatus::Optimal);
            assert!((r.objective - 1.0).abs() < 1e-8);
        }
    }

    #[test]
    fn test_iteration_limit_zero() {
        let ctx = ctx_with(|s| s.simplex_iteration_limit = 0);
        let r = solve(&production(), None, &ctx);
        assert_eq!(r.status, ModelStatus::IterationLimit);
        assert_eq!(r.iterations, 0);
    }

    #[test]
    fn test_warm_start_takes_no_iterations() {
        let ctx = SolveContext::default();
        let lp = production();
        let first = solve(&lp, None, &ctx);
        let second = solve(&lp, Some(&first.basis), &ctx);
        assert_optimal_production(&second);
        assert_eq!(second.iterations, 0);
    }

    #[test]
    fn test_inconsistent_row_bounds_are_infeasible() {
        let ctx = SolveContext::default();
        let a = from_triplets(1, 1, vec![(0, 0, 1.0)]);
        let lp = Model::new(
            vec![1.0],
            vec![0.0],
            vec![10.0],
            vec![1.0],
            vec![f64::NEG_INFINITY],
            a,
        );
        assert_eq!(solve(&lp, None, &ctx).status, ModelStatus::Infeasible);
    }

    #[test]
    fn test_unbounded_and_free_variables() {
        let ctx = SolveContext::default();
        // min x - y s.t. x + y = 1, x free, y free
        let a = from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
        let lp = Model::new(
            vec![1.0, -1.0],
            vec![f64::NEG_INFINITY; 2],
            vec![f64::INFINITY; 2],
            vec![1.0],
            vec![1.0],
            a,
        );
        assert_eq!(solve(&lp, None, &ctx).status, ModelStatus::Unbounded);
    }

    #[test]
    fn test_crash_and_equalities() {
        let ctx = ctx_with(|s| s.crash_strategy = CrashStrategy::Triangular);
        // min x + y + z s.t. x + y = 2, y + z = 3, 0 <= x, y, z <= 10
        let a = from_triplets(2, 3, vec![(0, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0), (1, 2, 1.0)]);
        let lp = Model::new(
            vec![1.0, 1.0, 1.0],
            vec![0.0; 3],
            vec![10.0; 3],
            vec![2.0, 3.0],
            vec![2.0, 3.0],
            a,
        );
        let r = solve(&lp, None, &ctx);
        assert_eq!(r.status, ModelStatus::Optimal);
        assert!((r.objective - 3.0).abs() < 1e-8);
        let act = sparse::spmv(&lp.a_matrix, &r.col_value);
        assert!((act[0] - 2.0).abs() < 1e-8 && (act[1] - 3.0).abs() < 1e-8);
    }

    #[test]
    fn test_random_bounded_lps_satisfy_strong_duality() {
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let ctx = SolveContext::default();
        for _ in 0..10 {
            let (m, n) = (4, 6);
            let mut trip = Vec::new();
            for i in 0..m {
                for j in 0..n {
                    if rng.random::<f64>() < 0.6 {
                        trip.push((i, j, rng.random_range(-3.0..3.0)));
                    }
                }
            }
            let lp = Model::new(
                (0..n).map(|_| rng.random_range(-2.0..2.0)).collect(),
                vec![0.0; n],
                vec![5.0; n],
                vec![-4.0; m],
                vec![4.0; m],
                from_triplets(m, n, trip),
            );
            let r = solve(&lp, None, &ctx);
            assert_eq!(r.status, ModelStatus::Optimal);
            // Dual objective evaluated at the bounds the basis puts
            // nonbasic variables on.
            assert_eq!(r.num_dual_infeasibilities, 0);
            let at_bound = |st: BasisStatus, l: f64, u: f64| match st {
                BasisStatus::AtLower => l,
                BasisStatus::AtUpper => u,
                _ => 0.0,
            };
            let mut dual_obj = 0.0;
            for i in 0..m {
                dual_obj += r.row_dual[i] * at_bound(r.basis.row_status[i], lp.row_lower[i], lp.row_upper[i]);
            }
            for j in 0..n {
                dual_obj += r.col_dual[j] * at_bound(r.basis.col_status[j], lp.col_lower[j], lp.col_upper[j]);
            }
            assert!((dual_obj - r.objective).abs() < 1e-6, "{} vs {}", dual_obj, r.objective);
        }
    }
}
