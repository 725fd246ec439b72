//! Master backend over the solver-core simplex (LP) and interior point (QP).
//!
//! Node LPs are built from the continuous relaxation by applying the node's
//! bound changes and appending pool cuts as `a^T x <= rhs` rows.

use solver_core::{ipm, simplex, Model, ModelStatus, SolveContext};

use super::{LinearCut, MasterBackend, MasterRequest, MasterResult, MasterStatus};
use crate::model::MipProblem;
use crate::search::{apply_changes, BoundChange};

/// Master backend holding the relaxation of a [`MipProblem`].
#[derive(Debug, Clone)]
pub struct RelaxationMaster {
    base: Model,
}

impl RelaxationMaster {
    pub fn new(problem: &MipProblem) -> Self {
        let mut base = problem.relaxation.clone();
        base.col_lower = problem.var_lb.clone();
        base.col_upper = problem.var_ub.clone();
        Self { base }
    }

    pub fn is_qp(&self) -> bool {
        self.base.is_qp()
    }
}

fn map_status(status: ModelStatus) -> MasterStatus {
    match status {
        ModelStatus::Optimal => MasterStatus::Optimal,
        ModelStatus::Infeasible => MasterStatus::Infeasible,
        ModelStatus::Unbounded | ModelStatus::UnboundedOrInfeasible => MasterStatus::Unbounded,
        ModelStatus::ObjectiveBound => MasterStatus::Cutoff,
        ModelStatus::TimeLimit | ModelStatus::IterationLimit => MasterStatus::Limit,
        _ => MasterStatus::NumericalError,
    }
}

impl MasterBackend for RelaxationMaster {
    fn node_model(&self, changes: &[BoundChange], cuts: &[(usize, LinearCut)]) -> Model {
        let mut lp = self.base.clone();
        let (lb, ub) = apply_changes(changes, &self.base.col_lower, &self.base.col_upper);
        lp.col_lower = lb;
        lp.col_upper = ub;
        if !cuts.is_empty() {
            let lower = vec![f64::NEG_INFINITY; cuts.len()];
            let upper: Vec<f64> = cuts.iter().map(|(_, c)| c.rhs).collect();
            let rows: Vec<_> = cuts.iter().map(|(_, c)| c.coefs.clone()).collect();
            // Cut coefficients index existing columns by construction.
            if let Err(e) = lp.add_rows(&lower, &upper, &rows) {
                log::warn!("dropping cut rows: {}", e);
            }
        }
        lp
    }

    fn solve(&self, request: &MasterRequest<'_>, ctx: &SolveContext) -> MasterResult {
        let lp = self.node_model(request.changes, request.cuts);
        let cut_ids: Vec<usize> = if lp.num_row() > self.base.num_row() {
            request.cuts.iter().map(|&(id, _)| id).collect()
        } else {
            Vec::new()
        };
        if (0..lp.num_col()).any(|j| lp.col_lower[j] > lp.col_upper[j]) {
            return MasterResult::infeasible();
        }

        let limited;
        let ctx = match request.iteration_limit {
            Some(limit) => {
                let mut settings = ctx.settings().clone();
                settings.simplex_iteration_limit = settings.simplex_iteration_limit.min(limit);
                settings.ipm_iteration_limit = settings.ipm_iteration_limit.min(limit);
                limited = ctx.with_settings(settings);
                &limited
            }
            None => ctx,
        };

        if lp.is_qp() {
            let r = ipm::solve(&lp, ctx);
            return MasterResult {
                status: map_status(r.status),
                obj_val: r.objective,
                x: r.col_value,
                basis: r.basis,
                factor: None,
                iterations: r.iterations + r.crossover_iterations,
                cut_ids,
            };
        }

        let warm = request
            .warm
            .map(|w| w.fit(self.base.num_row(), &cut_ids));
        let r = simplex::solve(&lp, warm.as_ref(), ctx);
        MasterResult {
            status: map_status(r.status),
            obj_val: r.objective,
            x: r.col_value,
            basis: r.basis,
            factor: r.factor,
            iterations: r.iterations,
            cut_ids,
        }
    }

    fn num_vars(&self) -> usize {
        self.base.num_col()
    }

    fn num_base_constraints(&self) -> usize {
        self.base.num_row()
    }
}
