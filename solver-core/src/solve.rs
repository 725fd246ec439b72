//! Continuous solve pipeline: presolve, simplex or interior point, postsolve
//! and cleanup.
//!
//! Everything below [`solve_lp`] works on the minimization form of the
//! model; values are mapped back to the caller's objective sense at the end.

use crate::context::SolveContext;
use crate::instance::{InstanceArena, InstanceId, ModelInstance};
use crate::ipm::{self, IpmResult};
use crate::linalg::factor::BasisFactor;
use crate::postsolve::{ReducedSolution, ReductionStack};
use crate::presolve::{self, PresolveStatus};
use crate::problem::Model;
use crate::settings::SolverChoice;
use crate::simplex::{self, SimplexResult};
use crate::solution::{Basis, ModelStatus, Solution, SolveInfo};

/// Outcome of a continuous solve in the caller's objective sense.
#[derive(Debug, Clone)]
pub struct LpResult {
    pub solution: Solution,
    pub basis: Basis,
    /// Factorization of `basis` when the simplex finished on it
    pub factor: Option<BasisFactor>,
    pub info: SolveInfo,
}

impl LpResult {
    pub fn status(&self) -> ModelStatus {
        self.solution.status
    }
}

/// Minimization-space result of one engine run.
#[derive(Debug, Clone)]
struct CoreResult {
    status: ModelStatus,
    has_values: bool,
    col_value: Vec<f64>,
    row_value: Vec<f64>,
    col_dual: Vec<f64>,
    row_dual: Vec<f64>,
    basis: Basis,
    factor: Option<BasisFactor>,
    info: SolveInfo,
}

impl CoreResult {
    fn status_only(status: ModelStatus, n: usize, m: usize) -> Self {
        Self {
            status,
            has_values: false,
            col_value: vec![0.0; n],
            row_value: vec![0.0; m],
            col_dual: vec![0.0; n],
            row_dual: vec![0.0; m],
            basis: Basis::invalid(n, m),
            factor: None,
            info: SolveInfo::default(),
        }
    }

    fn from_simplex(r: SimplexResult) -> Self {
        let info = SolveInfo {
            simplex_iterations: r.iterations,
            num_primal_infeasibilities: r.num_primal_infeasibilities,
            max_primal_infeasibility: r.max_primal_infeasibility,
            num_dual_infeasibilities: r.num_dual_infeasibilities,
            max_dual_infeasibility: r.max_dual_infeasibility,
            ..SolveInfo::default()
        };
        Self {
            status: r.status,
            has_values: true,
            col_value: r.col_value,
            row_value: r.row_value,
            col_dual: r.col_dual,
            row_dual: r.row_dual,
            basis: r.basis,
            factor: r.factor,
            info,
        }
    }

    fn from_ipm(model: &Model, r: IpmResult, tol: f64) -> Self {
        let (count, max) = primal_infeasibilities(model, &r.col_value, &r.row_value, tol);
        let info = SolveInfo {
            ipm_iterations: r.iterations,
            crossover_iterations: r.crossover_iterations,
            num_primal_infeasibilities: count,
            max_primal_infeasibility: max,
            max_dual_infeasibility: r.dual_residual,
            ..SolveInfo::default()
        };
        Self {
            status: r.status,
            has_values: true,
            col_value: r.col_value,
            row_value: r.row_value,
            col_dual: r.col_dual,
            row_dual: r.row_dual,
            basis: r.basis,
            factor: None,
            info,
        }
    }

    /// Add the iteration counts of an earlier run.
    fn absorb(&mut self, earlier: &SolveInfo) {
        self.info.simplex_iterations += earlier.simplex_iterations;
        self.info.ipm_iterations += earlier.ipm_iterations;
        self.info.crossover_iterations += earlier.crossover_iterations;
    }
}

/// Count and worst size of bound violations over columns and rows.
pub fn primal_infeasibilities(model: &Model, x: &[f64], row_value: &[f64], tol: f64) -> (usize, f64) {
    let mut count = 0;
    let mut worst = 0.0_f64;
    let pairs = x
        .iter()
        .zip(model.col_lower.iter().zip(&model.col_upper))
        .chain(row_value.iter().zip(model.row_lower.iter().zip(&model.row_upper)));
    for (&v, (&l, &u)) in pairs {
        let violation = (l - v).max(v - u).max(0.0);
        if violation > tol {
            count += 1;
        }
        worst = worst.max(violation);
    }
    (count, worst)
}

/// Solve the continuous relaxation of `model` (integrality is ignored).
///
/// A valid `warm` basis of matching shape skips presolve and starts the
/// simplex from it.
pub fn solve_lp(model: &Model, warm: Option<&Basis>, ctx: &SolveContext) -> LpResult {
    if model.num_col() == 0 {
        return empty_model(model, ctx);
    }
    let core = solve_minimization(&model.to_minimization(), warm, &mut InstanceArena::new(), ctx);
    into_user_sense(model, core, ctx)
}

/// Solve the continuous relaxation of instance `id` and store the solution,
/// basis, factorization and counters on it. Its basis is used as a warm
/// start when valid.
///
/// A presolved model is inserted into `arena` as an instance of its own for
/// the duration of its solve and removed once postsolve has recovered the
/// solution. `None` if `id` is not in the arena.
pub fn solve_instance(arena: &mut InstanceArena, id: InstanceId, ctx: &SolveContext) -> Option<ModelStatus> {
    let instance = arena.get(id)?;
    let result = if instance.model.num_col() == 0 {
        empty_model(&instance.model, ctx)
    } else {
        let min_model = instance.model.to_minimization();
        let warm = instance.basis.valid.then(|| instance.basis.clone());
        let core = solve_minimization(&min_model, warm.as_ref(), arena, ctx);
        into_user_sense(&arena.get(id)?.model, core, ctx)
    };
    let instance = arena.get_mut(id)?;
    let status = result.status();
    instance.solution = result.solution;
    instance.basis = result.basis;
    instance.factor = result.factor;
    instance.info = result.info;
    Some(status)
}

fn solve_minimization(
    model: &Model,
    warm: Option<&Basis>,
    arena: &mut InstanceArena,
    ctx: &SolveContext,
) -> CoreResult {
    let use_presolve = warm.is_none() && ctx.settings().presolve.enabled_or(true);
    let core = if use_presolve {
        solve_presolved(model, arena, ctx)
    } else {
        None
    };
    core.unwrap_or_else(|| solve_direct(model, warm, ctx))
}

/// A model without columns: every row must admit zero activity.
fn empty_model(model: &Model, ctx: &SolveContext) -> LpResult {
    let m = model.num_row();
    let tol = ctx.settings().primal_feasibility_tolerance;
    let feasible = (0..m).all(|i| model.row_lower[i] <= tol && model.row_upper[i] >= -tol);
    let status = if feasible {
        ModelStatus::ModelEmpty
    } else {
        ModelStatus::Infeasible
    };
    let mut solution = Solution::empty(0, m);
    solution.status = status;
    solution.value_valid = feasible;
    solution.dual_valid = feasible;
    solution.objective_value = model.offset;
    LpResult {
        solution,
        basis: Basis::slack(&[], &[], m),
        factor: None,
        info: SolveInfo {
            objective_value: model.offset,
            ..SolveInfo::default()
        },
    }
}

/// Simplex or IPM on `model` as given.
fn solve_direct(model: &Model, warm: Option<&Basis>, ctx: &SolveContext) -> CoreResult {
    let settings = ctx.settings();
    let tol = settings.primal_feasibility_tolerance;
    if model.is_qp() {
        return CoreResult::from_ipm(model, ipm::solve(model, ctx), tol);
    }
    match settings.solver {
        SolverChoice::Ipm => {
            let r = ipm::solve(model, ctx);
            if matches!(r.status, ModelStatus::SolveError | ModelStatus::UnboundedOrInfeasible) {
                ctx.message(
                    log::Level::Debug,
                    format!("ipm ended with {:?}, switching to simplex", r.status),
                );
                let earlier = CoreResult::from_ipm(model, r, tol).info;
                let mut core = CoreResult::from_simplex(simplex::solve(model, warm, ctx));
                core.absorb(&earlier);
                core
            } else {
                CoreResult::from_ipm(model, r, tol)
            }
        }
        SolverChoice::Simplex | SolverChoice::Choose => CoreResult::from_simplex(simplex::solve(model, warm, ctx)),
    }
}

/// Presolve, solve the reduced model and recover. `None` asks the caller to
/// solve the original model directly (nothing was reduced, or the reduced
/// outcome cannot be trusted to separate unbounded from infeasible).
fn solve_presolved(model: &Model, arena: &mut InstanceArena, ctx: &SolveContext) -> Option<CoreResult> {
    let (n, m) = (model.num_col(), model.num_row());
    let pre = presolve::presolve(model, ctx);
    let removed = (pre.stack.rows_removed(), pre.stack.cols_removed());
    let core = match pre.status {
        PresolveStatus::NotReduced | PresolveStatus::Unbounded => return None,
        PresolveStatus::Infeasible => Some(CoreResult::status_only(ModelStatus::Infeasible, n, m)),
        PresolveStatus::ReducedToEmpty => {
            let empty = CoreResult {
                status: ModelStatus::Optimal,
                has_values: true,
                basis: Basis {
                    valid: true,
                    ..Basis::invalid(0, 0)
                },
                ..CoreResult::status_only(ModelStatus::Optimal, 0, 0)
            };
            recover(model, &pre.stack, empty, ctx)
        }
        PresolveStatus::Reduced => {
            let id = arena.insert(ModelInstance::new(pre.model));
            let core = arena
                .get_mut(id)
                .map(|instance| solve_reduced(instance, ctx))
                .and_then(|reduced| recover(model, &pre.stack, reduced, ctx));
            arena.remove(id);
            core
        }
    };
    let mut core = core?;
    core.info.presolve_rows_removed = removed.0;
    core.info.presolve_cols_removed = removed.1;
    Some(core)
}

/// Solve a presolved instance in place, keeping a copy of the result.
fn solve_reduced(instance: &mut ModelInstance, ctx: &SolveContext) -> CoreResult {
    let mut core = solve_direct(&instance.model, None, ctx);
    instance.basis = core.basis.clone();
    instance.factor = core.factor.take();
    instance.info = core.info.clone();
    instance.solution.status = core.status;
    instance.solution.value_valid = core.has_values;
    instance.solution.col_value.clone_from(&core.col_value);
    instance.solution.row_value.clone_from(&core.row_value);
    core
}

/// Map the outcome on the reduced model back to `model`. `None` asks for a
/// solve of `model` without presolve.
fn recover(model: &Model, stack: &ReductionStack, reduced: CoreResult, ctx: &SolveContext) -> Option<CoreResult> {
    let (n, m) = (model.num_col(), model.num_row());
    let settings = ctx.settings();
    let core = match reduced.status {
        ModelStatus::Optimal => {
            let recovered = stack.postsolve(
                model,
                ReducedSolution {
                    col_value: &reduced.col_value,
                    row_dual: &reduced.row_dual,
                    basis: &reduced.basis,
                },
                settings.primal_feasibility_tolerance,
            );
            if recovered.repaired {
                ctx.message(log::Level::Debug, "postsolve repaired basis statuses");
            }
            if model.is_qp() || !reduced.basis.valid {
                // Interior solution: report the recovered values as they are.
                let (count, max) = primal_infeasibilities(
                    model,
                    &recovered.col_value,
                    &recovered.row_value,
                    settings.primal_feasibility_tolerance,
                );
                let mut core = CoreResult {
                    status: ModelStatus::Optimal,
                    has_values: true,
                    col_value: recovered.col_value,
                    row_value: recovered.row_value,
                    col_dual: recovered.col_dual,
                    row_dual: recovered.row_dual,
                    basis: Basis::invalid(n, m),
                    factor: None,
                    info: reduced.info.clone(),
                };
                core.info.num_primal_infeasibilities = count;
                core.info.max_primal_infeasibility = max;
                core
            } else {
                // Vertex solution: clean up on the original model.
                // Charged against the iterations the reduced solve left.
                let warm = recovered.basis.valid.then_some(&recovered.basis);
                let spent = reduced.info.simplex_iterations + reduced.info.crossover_iterations;
                let cleanup = simplex::solve(model, warm, &ctx.with_simplex_iterations_spent(spent));
                if cleanup.iterations > 0 {
                    ctx.message(
                        log::Level::Debug,
                        format!("postsolve cleanup took {} simplex iterations", cleanup.iterations),
                    );
                }
                let mut core = CoreResult::from_simplex(cleanup);
                core.absorb(&reduced.info);
                core
            }
        }
        ModelStatus::Unbounded | ModelStatus::UnboundedOrInfeasible => {
            ctx.message(log::Level::Debug, "reduced model unbounded, solving without presolve");
            return None;
        }
        status => {
            let mut core = CoreResult::status_only(status, n, m);
            core.absorb(&reduced.info);
            core
        }
    };
    Some(core)
}

/// Map a minimization-space result back to `model`'s sense.
fn into_user_sense(model: &Model, core: CoreResult, ctx: &SolveContext) -> LpResult {
    let sign = model.sense.sign();
    let status = core.status;
    let objective = if core.has_values {
        model.objective_value(&core.col_value)
    } else {
        0.0
    };
    let solution = Solution {
        value_valid: core.has_values && (status == ModelStatus::Optimal || status.is_limit()),
        dual_valid: core.has_values && status == ModelStatus::Optimal,
        col_value: core.col_value,
        col_dual: core.col_dual.iter().map(|d| sign * d).collect(),
        row_value: core.row_value,
        row_dual: core.row_dual.iter().map(|y| sign * y).collect(),
        objective_value: objective,
        status,
    };
    let info = SolveInfo {
        objective_value: objective,
        ..core.info
    };
    ctx.message(
        log::Level::Debug,
        format!(
            "solve finished: {:?}, objective {:.10e}, {} iterations",
            status,
            objective,
            info.total_iterations()
        ),
    );
    LpResult {
        solution,
        basis: core.basis,
        factor: core.factor,
        info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::{self, from_triplets};
    use crate::problem::ObjSense;
    use crate::settings::{SolverSettings, Switch};

    const INF: f64 = f64::INFINITY;

    fn ctx_with(f: impl FnOnce(&mut SolverSettings)) -> SolveContext {
        let mut settings = SolverSettings::default();
        f(&mut settings);
        SolveContext::new(settings, None)
    }

    /// max 3x + 2y s.t. x + y <= 4, x + 3y <= 6, x <= 3
    fn production() -> Model {
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
        Model::new(vec![3.0, 2.0], vec![0.0; 2], vec![3.0, INF], vec![-INF; 2], vec![4.0, 6.0], a)
            .with_sense(ObjSense::Maximize)
    }

    #[test]
    fn test_maximization_with_and_without_presolve() {
        for presolve in [Switch::On, Switch::Off] {
            let ctx = ctx_with(|s| s.presolve = presolve);
            let r = solve_lp(&production(), None, &ctx);
            assert_eq!(r.status(), ModelStatus::Optimal);
            assert!((r.solution.objective_value - 11.0).abs() < 1e-7);
            assert!(r.solution.dual_valid);
            // Maximization: row duals are nonnegative on binding <= rows.
            assert!(r.solution.row_dual.iter().all(|&y| y >= -1e-9));
        }
    }

    /// `production` with a fixed column `z` in the first row and a
    /// singleton row on `y`: presolve removes both.
    fn reducible() -> Model {
        let a = from_triplets(
            3,
            3,
            vec![(0, 0, 1.0), (0, 1, 1.0), (0, 2, 1.0), (1, 0, 1.0), (1, 1, 3.0), (2, 1, 1.0)],
        );
        Model::new(
            vec![3.0, 2.0, 1.0],
            vec![0.0, 0.0, 1.0],
            vec![3.0, INF, 1.0],
            vec![-INF; 3],
            vec![5.0, 6.0, 10.0],
            a,
        )
        .with_sense(ObjSense::Maximize)
    }

    #[test]
    fn test_presolved_model_is_held_in_the_arena() {
        let mut arena = InstanceArena::new();
        let id = arena.insert(ModelInstance::new(reducible()));
        let status = solve_instance(&mut arena, id, &SolveContext::default());
        assert_eq!(status, Some(ModelStatus::Optimal));
        // The reduced model took a second slot and gave it back.
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.capacity(), 2);

        let solved = arena.get(id).unwrap();
        assert!(solved.info.presolve_cols_removed >= 1);
        assert!((solved.solution.objective_value - 12.0).abs() < 1e-7);
        assert!(solved.basis.valid);
        assert_eq!(solved.basis.num_col(), 3);

        let mut arena = InstanceArena::new();
        let id = arena.insert(ModelInstance::new(reducible()));
        let ctx = ctx_with(|s| s.presolve = Switch::Off);
        assert_eq!(solve_instance(&mut arena, id, &ctx), Some(ModelStatus::Optimal));
        assert_eq!(arena.capacity(), 1);
    }

    #[test]
    fn test_solve_instance_warm_starts_from_stored_basis() {
        let mut arena = InstanceArena::new();
        let id = arena.insert(ModelInstance::new(reducible()));
        let ctx = SolveContext::default();
        solve_instance(&mut arena, id, &ctx);
        assert_eq!(solve_instance(&mut arena, id, &ctx), Some(ModelStatus::Optimal));
        let again = arena.get(id).unwrap();
        assert_eq!(again.info.simplex_iterations, 0);
        assert_eq!(again.info.presolve_cols_removed, 0);

        let gone = arena.insert(ModelInstance::new(reducible()));
        arena.remove(gone);
        assert_eq!(solve_instance(&mut arena, gone, &ctx), None);
    }

    #[test]
    fn test_postsolve_cleanup_shares_the_iteration_limit() {
        for limit in 0..6 {
            let ctx = ctx_with(|s| s.simplex_iteration_limit = limit);
            let r = solve_lp(&reducible(), None, &ctx);
            assert!(
                r.info.simplex_iterations <= limit,
                "{} iterations with limit {}",
                r.info.simplex_iterations,
                limit
            );
        }
    }

    #[test]
    fn test_ipm_route_matches_simplex() {
        let ctx = ctx_with(|s| {
            s.solver = SolverChoice::Ipm;
            s.presolve = Switch::Off;
        });
        let r = solve_lp(&production(), None, &ctx);
        assert_eq!(r.status(), ModelStatus::Optimal);
        assert!((r.solution.objective_value - 11.0).abs() < 1e-6);
        assert!(r.basis.valid);
        assert!(r.info.ipm_iterations > 0);
    }

    #[test]
    fn test_empty_model() {
        let model = Model::new(vec![], vec![], vec![], vec![-1.0], vec![1.0], sparse::zeros(1, 0)).with_offset(2.5);
        let r = solve_lp(&model, None, &SolveContext::default());
        assert_eq!(r.status(), ModelStatus::ModelEmpty);
        assert_eq!(r.solution.objective_value, 2.5);
    }

    #[test]
    fn test_presolve_infeasibility_is_reported() {
        let a = from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
        let model = Model::new(vec![1.0; 2], vec![0.0; 2], vec![1.0; 2], vec![3.0], vec![INF], a);
        let r = solve_lp(&model, None, &SolveContext::default());
        assert_eq!(r.status(), ModelStatus::Infeasible);
        assert!(!r.solution.value_valid);
    }

    #[test]
    fn test_unbounded_after_presolve_is_confirmed() {
        // min -x0, x0 - x1 <= 1: unbounded along x0 = x1
        let a = from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, -1.0)]);
        let model = Model::new(vec![-1.0, 0.0], vec![0.0; 2], vec![INF; 2], vec![-INF], vec![1.0], a);
        let r = solve_lp(&model, None, &SolveContext::default());
        assert!(matches!(
            r.status(),
            ModelStatus::Unbounded | ModelStatus::UnboundedOrInfeasible
        ));
        assert!(!r.solution.dual_valid);
    }
}
