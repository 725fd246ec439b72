//! Interior point method for LPs and convex QPs.
//!
//! Bound-form primal-dual method: the row activities `r = Ax` are variables
//! in their own right, every finite bound carries an implicit slack, and
//! Mehrotra predictor-corrector steps are taken on the normal equations.
//! For LPs a crossover to a vertex basis follows convergence.
//!
//! The model passed in must be in minimization form.

pub mod crossover;
pub mod predcorr;
pub mod termination;
pub mod workspace;

use crate::context::SolveContext;
use crate::linalg::normal_eqns::NormalEquations;
use crate::problem::Model;
use crate::solution::{Basis, ModelStatus};
use crate::util::logging::LogEvent;

use predcorr::predictor_corrector_step;
use termination::{check, reduced_costs, residuals, Termination};
use workspace::{BoundKind, IpmState};

/// Step length below which an iteration counts as stalled.
const STALL_STEP: f64 = 1e-8;
/// Consecutive stalled iterations before giving up.
const STALL_LIMIT: usize = 5;
/// Hard cap on iterations whatever the configured limit.
const ITERATION_CAP: usize = 1000;

/// Result of an interior point solve (with crossover if it ran).
#[derive(Debug, Clone)]
pub struct IpmResult {
    pub status: ModelStatus,
    pub col_value: Vec<f64>,
    pub row_value: Vec<f64>,
    pub col_dual: Vec<f64>,
    pub row_dual: Vec<f64>,
    /// Objective including the offset
    pub objective: f64,
    /// Vertex basis from crossover; invalid for an interior solution
    pub basis: Basis,
    pub iterations: usize,
    pub crossover_iterations: usize,
    pub primal_residual: f64,
    pub dual_residual: f64,
    pub gap: f64,
}

/// Solve `model` with the interior point method.
pub fn solve(model: &Model, ctx: &SolveContext) -> IpmResult {
    let settings = ctx.settings();
    let tol = settings.ipm_optimality_tolerance;
    let limit = settings.ipm_iteration_limit.min(ITERATION_CAP);
    let mut st = IpmState::initial(model);
    let mut ne = NormalEquations::new(&model.a_matrix, model.hessian.as_ref());

    let mut iterations = 0;
    let mut stalled = 0;
    let mut res = residuals(model, &st);
    let status = loop {
        match check(&res, &st, tol) {
            Some(Termination::Optimal) => break ModelStatus::Optimal,
            Some(Termination::Diverged) => {
                ctx.message(log::Level::Debug, "ipm: iterates diverged");
                break ModelStatus::UnboundedOrInfeasible;
            }
            None => {}
        }
        if iterations >= limit {
            break if limit < settings.ipm_iteration_limit {
                ModelStatus::SolveError
            } else {
                ModelStatus::IterationLimit
            };
        }
        if ctx.time_limit_reached() {
            break ModelStatus::TimeLimit;
        }

        let step = match predictor_corrector_step(&mut ne, &mut st, &res) {
            Ok(step) => step,
            Err(err) => {
                log::warn!("ipm: {}", err);
                break ModelStatus::SolveError;
            }
        };
        iterations += 1;
        res = residuals(model, &st);

        if ctx.report_iteration(iterations) {
            ctx.emit(LogEvent::IpmIteration {
                iteration: iterations,
                primal_residual: res.primal,
                dual_residual: res.dual,
                gap: res.gap,
                mu: st.mu(),
            });
        }
        stalled = if step.alpha < STALL_STEP { stalled + 1 } else { 0 };
        if stalled >= STALL_LIMIT {
            ctx.message(log::Level::Debug, format!("ipm: stalled at iteration {}", iterations));
            break ModelStatus::SolveError;
        }
    };

    // Fixed variables sit exactly on their value.
    for v in 0..st.z.len() {
        if st.kind[v] == BoundKind::Fixed {
            st.z[v] = st.lower[v];
        }
    }

    let mut result = IpmResult {
        status,
        col_value: st.x().to_vec(),
        row_value: model.row_activity(st.x()),
        col_dual: reduced_costs(model, &st),
        row_dual: st.y.clone(),
        objective: model.objective_value(st.x()),
        basis: Basis::invalid(st.n, st.m),
        iterations,
        crossover_iterations: 0,
        primal_residual: res.primal,
        dual_residual: res.dual,
        gap: res.gap,
    };
    ctx.message(
        log::Level::Debug,
        format!(
            "ipm: {:?} after {} iterations, objective {:.10e}",
            status, iterations, result.objective
        ),
    );

    let crossover_ready = res.primal.max(res.dual) <= settings.start_crossover_tolerance;
    if status == ModelStatus::Optimal && !model.is_qp() && settings.run_crossover && crossover_ready {
        let outcome = crossover::run(model, &st, ctx);
        result.crossover_iterations = outcome.simplex.iterations;
        if outcome.success {
            let sx = outcome.simplex;
            result.col_value = sx.col_value;
            result.row_value = sx.row_value;
            result.col_dual = sx.col_dual;
            result.row_dual = sx.row_dual;
            result.objective = sx.objective;
            result.basis = sx.basis;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::{self, from_triplets};
    use crate::settings::SolverSettings;

    fn production_lp() -> Model {
        // max 3x + 2y  s.t. x + y <= 4, x + 3y <= 6, x <= 3  (as min of negated)
        let a = from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
        Model::new(
            vec![-3.0, -2.0],
            vec![0.0, 0.0],
            vec![3.0, f64::INFINITY],
            vec![f64::NEG_INFINITY; 2],
            vec![4.0, 6.0],
            a,
        )
    }

    #[test]
    fn test_lp_with_crossover() {
        let ctx = SolveContext::default();
        let r = solve(&production_lp(), &ctx);
        assert_eq!(r.status, ModelStatus::Optimal);
        assert!((r.objective + 11.0).abs() < 1e-6);
        assert!(r.basis.valid);
        assert!((r.col_value[0] - 3.0).abs() < 1e-9);
        assert!((r.col_value[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_lp_without_crossover_keeps_interior_marker() {
        let settings = SolverSettings {
            run_crossover: false,
            ..SolverSettings::default()
        };
        let ctx = SolveContext::new(settings, None);
        let r = solve(&production_lp(), &ctx);
        assert_eq!(r.status, ModelStatus::Optimal);
        assert!(!r.basis.valid);
        assert!((r.objective + 11.0).abs() < 1e-6);
        assert_eq!(r.crossover_iterations, 0);
    }

    #[test]
    fn test_crossover_waits_for_small_residuals() {
        // No residual is ever below a negative tolerance.
        let settings = SolverSettings {
            start_crossover_tolerance: -1.0,
            ..SolverSettings::default()
        };
        let r = solve(&production_lp(), &SolveContext::new(settings, None));
        assert_eq!(r.status, ModelStatus::Optimal);
        assert!(!r.basis.valid);
        assert_eq!(r.crossover_iterations, 0);

        let settings = SolverSettings {
            start_crossover_tolerance: 1e-3,
            ..SolverSettings::default()
        };
        let r = solve(&production_lp(), &SolveContext::new(settings, None));
        assert!(r.basis.valid);
    }

    #[test]
    fn test_box_constrained_qp() {
        // min ½(x² + y²) - 2x - 2y, 0 <= x, y <= 1 → (1, 1), -3
        let q = from_triplets(2, 2, vec![(0, 0, 1.0), (1, 1, 1.0)]);
        let model = Model::new(
            vec![-2.0, -2.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![],
            vec![],
            sparse::zeros(0, 2),
        )
        .with_hessian(q);
        let r = solve(&model, &SolveContext::default());
        assert_eq!(r.status, ModelStatus::Optimal);
        assert!((r.objective + 3.0).abs() < 1e-6);
        assert!(!r.basis.valid);
        // Reduced costs at the upper bounds are negative.
        assert!(r.col_dual[0] < -0.9 && r.col_dual[1] < -0.9);
    }

    #[test]
    fn test_iteration_limit() {
        let settings = SolverSettings {
            ipm_iteration_limit: 1,
            ..SolverSettings::default()
        };
        let ctx = SolveContext::new(settings, None);
        let r = solve(&production_lp(), &ctx);
        assert_eq!(r.status, ModelStatus::IterationLimit);
        assert_eq!(r.iterations, 1);
    }

    #[test]
    fn test_unbounded_lp_diverges() {
        let a = from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, -1.0)]);
        let model = Model::new(
            vec![-1.0, 0.0],
            vec![0.0, 0.0],
            vec![f64::INFINITY; 2],
            vec![f64::NEG_INFINITY],
            vec![1.0],
            a,
        );
        let r = solve(&model, &SolveContext::default());
        assert_ne!(r.status, ModelStatus::Optimal);
    }
}
