//! Branch-and-cut driver.
//!
//! The root relaxation is tightened by rounds of Gomory cuts, then the tree
//! is searched. Children are solved as soon as they are created, so every
//! queued node carries its own relaxation bound; siblings are solved on
//! scoped threads when more than one thread is configured. Incumbent and
//! pool updates happen on the calling thread only.

use solver_core::{Model, ModelStatus, ObjSense, SolveContext};

use crate::cuts::{CutPool, GomorySeparator, GomorySettings};
use crate::error::MipResult;
use crate::heuristics::{
    fix_and_solve, fractional_dive, simple_rounding, DiveSettings, HeuristicBudget, HeuristicSolution,
};
use crate::master::{LinearCut, MasterBackend, MasterRequest, MasterResult, MasterStatus, RelaxationMaster};
use crate::model::{MipProblem, MipSolution};
use crate::search::{
    apply_changes, BoundChange, BranchAndBound, Direction, NodeStatus, ProbeResult, SearchNode,
};
use crate::settings::MipSettings;

/// Iterations the root dive may use even before the effort budget has grown.
const ROOT_DIVE_ITERATIONS: usize = 1000;

/// Iteration limit of a single heuristic LP.
const HEURISTIC_LP_ITERATIONS: usize = 1000;

/// Solve a mixed-integer model with settings taken from `ctx`.
///
/// For minimization, `objective_bound` acts as the node cutoff. Objective
/// values in the result are in minimization form.
pub fn solve_mip(model: &Model, ctx: &SolveContext) -> MipResult<MipSolution> {
    let mut settings = MipSettings::from_solver(ctx.settings());
    if model.sense == ObjSense::Minimize {
        settings.cutoff = ctx.settings().objective_bound;
    }
    solve_mip_with(model, settings, ctx)
}

/// Solve a mixed-integer model with explicit search settings.
pub fn solve_mip_with(model: &Model, settings: MipSettings, ctx: &SolveContext) -> MipResult<MipSolution> {
    let prob = MipProblem::new(model)?;
    log::info!(
        "mip: {} columns ({} integer), {} rows",
        prob.num_vars(),
        prob.num_integers(),
        prob.num_constraints()
    );
    if prob.empty_domain {
        return Ok(MipSolution::with_status(ModelStatus::Infeasible));
    }
    let mut solver = MipSolver::new(&prob, settings, ctx);
    Ok(solver.run())
}

struct MipSolver<'a> {
    prob: &'a MipProblem,
    master: RelaxationMaster,
    pool: CutPool,
    tree: BranchAndBound,
    budget: HeuristicBudget,
    settings: MipSettings,
    /// Caller context: deadline and progress reporting.
    ctx: &'a SolveContext,
    /// Context for relaxation solves: silenced, no objective bound.
    node_ctx: SolveContext,
    /// A node relaxation failed, so exhaustion proves nothing.
    numerical_trouble: bool,
}

impl<'a> MipSolver<'a> {
    fn new(prob: &'a MipProblem, settings: MipSettings, ctx: &'a SolveContext) -> Self {
        let mut node_settings = ctx.settings().clone();
        node_settings.objective_bound = f64::INFINITY;
        Self {
            prob,
            master: RelaxationMaster::new(prob),
            pool: CutPool::new((&settings).into()),
            tree: BranchAndBound::new(settings.clone(), prob),
            budget: HeuristicBudget::new(settings.heuristic_effort),
            node_ctx: ctx.with_settings(node_settings).silenced(),
            settings,
            ctx,
            numerical_trouble: false,
        }
    }

    fn run(&mut self) -> MipSolution {
        let root = match self.solve_root() {
            Ok(root) => root,
            Err(status) => {
                self.ctx.message(log::Level::Info, format!("mip: root relaxation {}", status));
                return self.tree.finalize(status);
            }
        };
        self.tree.log_progress(self.ctx, true);

        let mut node = SearchNode::root();
        node.dual_bound = root.obj_val;
        node.warm = root.warm_start();
        node.x = root.x;
        node.estimate = self
            .tree
            .branching
            .estimate(&node.x, node.dual_bound, self.prob, self.settings.int_feas_tol);
        node.status = NodeStatus::RelaxationSolved;
        self.pool.age_cuts(&node.x);
        self.accept_relaxation(node, true);

        let status = loop {
            if let Some(status) = self.tree.check_termination(self.ctx) {
                break status;
            }
            let Some(mut node) = self.tree.next_node() else {
                continue;
            };
            if node.can_prune(self.tree.cutoff(), self.settings.epsilon) {
                self.tree.fathom(&mut node);
                continue;
            }
            self.branch(node);
            self.tree.log_progress(self.ctx, false);
        };

        let status = match status {
            ModelStatus::Optimal | ModelStatus::Infeasible if self.numerical_trouble => ModelStatus::SolveError,
            s => s,
        };
        self.tree.log_progress(self.ctx, true);
        let stats = self.tree.stats();
        self.ctx.message(
            log::Level::Info,
            format!(
                "mip: {} after {} nodes, primal {:.10e}, dual {:.10e}, gap {:.2}%, {} cuts in pool",
                status,
                stats.nodes_explored,
                stats.incumbent_obj,
                stats.best_bound,
                stats.gap * 100.0,
                self.pool.len()
            ),
        );
        self.tree.finalize(status)
    }

    /// Map a failed relaxation solve onto a model status.
    fn failure_status(&self, status: MasterStatus) -> ModelStatus {
        match status {
            MasterStatus::Optimal => ModelStatus::Optimal,
            MasterStatus::Infeasible => ModelStatus::Infeasible,
            MasterStatus::Unbounded => ModelStatus::UnboundedOrInfeasible,
            MasterStatus::Cutoff => ModelStatus::ObjectiveBound,
            MasterStatus::Limit if self.ctx.time_limit_reached() => ModelStatus::TimeLimit,
            MasterStatus::Limit => ModelStatus::IterationLimit,
            MasterStatus::NumericalError => ModelStatus::SolveError,
        }
    }

    /// Solve the root relaxation and tighten it with cuts.
    fn solve_root(&mut self) -> Result<MasterResult, ModelStatus> {
        let root = self.master.solve(&MasterRequest::new(&[], &[]), &self.node_ctx);
        self.tree.node_explored(root.iterations);
        if root.status != MasterStatus::Optimal {
            return Err(self.failure_status(root.status));
        }
        Ok(self.separate_root_cuts(root))
    }

    fn separate_root_cuts(&mut self, mut root: MasterResult) -> MasterResult {
        if self.master.is_qp() || self.settings.cut_rounds == 0 {
            return root;
        }
        let separator = GomorySeparator::new(GomorySettings {
            max_cuts: self.settings.cuts_per_round,
            ..Default::default()
        });
        let mut active: Vec<(usize, LinearCut)> = Vec::new();

        for round in 0..self.settings.cut_rounds {
            if self.prob.is_integer_feasible(&root.x, self.settings.int_feas_tol) || self.ctx.time_limit_reached() {
                break;
            }
            let Some(factor) = root.factor.as_ref() else {
                break;
            };
            let lp = self.master.node_model(&[], &active);
            let mut added = 0;
            for cut in separator.separate(&lp, &root.basis, factor, &root.x, self.prob) {
                if !self.pool.add(cut).1 {
                    added += 1;
                }
            }
            if added == 0 {
                break;
            }
            self.tree.record_cuts(added);

            let cuts = self.pool.lp_cuts();
            let warm = root.warm_start();
            let next = self
                .master
                .solve(&MasterRequest::new(&[], &cuts).with_warm(warm.as_ref()), &self.node_ctx);
            self.tree.add_iterations(next.iterations);
            if next.status != MasterStatus::Optimal {
                log::warn!("cut round {}: relaxation {:?}, keeping previous root", round, next.status);
                break;
            }
            log::debug!(
                "cut round {}: {} cuts, root bound {:.10e} -> {:.10e}",
                round,
                added,
                root.obj_val,
                next.obj_val
            );
            let stalled = next.obj_val <= root.obj_val + 1e-9 * (1.0 + root.obj_val.abs());
            root = next;
            active = cuts;
            if stalled {
                break;
            }
        }
        root
    }

    /// File a solved relaxation: incumbent, fathom, or queue.
    fn accept_relaxation(&mut self, mut node: SearchNode, is_root: bool) {
        if self.prob.is_integer_feasible(&node.x, self.settings.int_feas_tol) {
            node.status = NodeStatus::IntegerFeasible;
            let obj = self.prob.objective(&node.x);
            self.tree.update_incumbent(&node.x, obj);
            self.tree.fathom(&mut node);
            return;
        }
        if node.can_prune(self.tree.cutoff(), self.settings.epsilon) {
            self.tree.fathom(&mut node);
            return;
        }
        self.run_heuristics(&node, is_root);
        self.tree.enqueue(node);
    }

    fn try_incumbent(&mut self, solution: Option<HeuristicSolution>, name: &str) {
        if let Some(s) = solution {
            if self.tree.update_incumbent(&s.x, s.obj_val) {
                log::debug!("{} found {:.10e}", name, s.obj_val);
            }
        }
    }

    fn run_heuristics(&mut self, node: &SearchNode, is_root: bool) {
        let feas_tol = self.ctx.settings().primal_feasibility_tolerance;
        let int_tol = self.settings.int_feas_tol;
        let rounded = simple_rounding(self.prob, &node.x, feas_tol, int_tol);
        self.try_incumbent(rounded, "rounding");

        let relaxation_iterations = self.tree.lp_iterations().saturating_sub(self.budget.spent());
        let allowed = self.budget.allows(relaxation_iterations);
        if !is_root && !allowed {
            return;
        }
        let mut budget = self.budget.remaining(relaxation_iterations);
        if is_root {
            budget = budget.max(ROOT_DIVE_ITERATIONS);
        }

        let cuts = self.pool.lp_cuts();
        let dive = DiveSettings {
            max_depth: self.prob.num_integers() + 1,
            lp_iteration_limit: HEURISTIC_LP_ITERATIONS,
            iteration_budget: budget,
            cutoff: self.tree.cutoff(),
            feasibility_tolerance: feas_tol,
            integrality_tolerance: int_tol,
        };
        let out = fractional_dive(
            self.prob,
            &self.master,
            &node.bound_changes,
            &node.x,
            node.warm.as_ref(),
            &cuts,
            &dive,
            &self.node_ctx,
        );
        self.budget.charge(out.iterations);
        self.tree.add_iterations(out.iterations);
        if out.solution.is_some() {
            self.try_incumbent(out.solution, "diving");
            return;
        }

        // Dive failed: fix the rounded integers and let the LP repair the rest.
        if !self.prob.is_integer_feasible(&node.x, int_tol) && (is_root || self.budget.allows(relaxation_iterations)) {
            let out = fix_and_solve(
                self.prob,
                &self.master,
                &node.x,
                &cuts,
                node.warm.as_ref(),
                HEURISTIC_LP_ITERATIONS,
                feas_tol,
                &self.node_ctx,
            );
            self.budget.charge(out.iterations);
            self.tree.add_iterations(out.iterations);
            self.try_incumbent(out.solution, "fix-and-solve");
        }
    }

    /// Select a branching variable at `node`, then solve and file both children.
    fn branch(&mut self, mut node: SearchNode) {
        node.status = NodeStatus::Branching;
        let (lb, ub) = apply_changes(&node.bound_changes, &self.prob.var_lb, &self.prob.var_ub);
        let cuts = self.pool.lp_cuts();

        let mut probe_iterations = 0;
        let decision = {
            let master = &self.master;
            let ctx = &self.node_ctx;
            let cutoff = self.tree.cutoff();
            let limit = self.settings.strong_branching_iterations;
            let (parent, cuts) = (&node, &cuts);
            let probe = |change: BoundChange| -> ProbeResult {
                if change.is_infeasible() {
                    return None;
                }
                let mut changes = parent.bound_changes.clone();
                changes.push(change);
                let request = MasterRequest::new(&changes, cuts)
                    .with_warm(parent.warm.as_ref())
                    .with_iteration_limit(limit);
                let r = master.solve(&request, ctx);
                probe_iterations += r.iterations;
                match r.status {
                    MasterStatus::Infeasible | MasterStatus::Cutoff => None,
                    MasterStatus::Optimal if r.obj_val >= cutoff => None,
                    MasterStatus::Optimal | MasterStatus::Limit => Some(r.obj_val.max(parent.dual_bound)),
                    _ => Some(parent.dual_bound),
                }
            };
            self.tree.branching.select(
                &node.x,
                self.prob,
                (&lb, &ub),
                node.dual_bound,
                self.settings.int_feas_tol,
                probe,
            )
        };
        self.tree.add_iterations(probe_iterations);

        let Some(decision) = decision else {
            self.tree.fathom(&mut node);
            return;
        };
        let first = self.tree.allocate_ids(2);
        let mut children = Vec::with_capacity(2);
        for (k, (change, direction)) in [
            (decision.down_branch, Direction::Down),
            (decision.up_branch, Direction::Up),
        ]
        .into_iter()
        .enumerate()
        {
            let mut child = node.child(first + k as u64, change, direction, decision.value);
            if change.is_infeasible() {
                self.tree.fathom(&mut child);
            } else {
                children.push(child);
            }
        }

        // Siblings past the node limit stay open with the parent's bound.
        let unsolved = children.split_off(children.len().min(self.tree.remaining_nodes()));
        let results = self.evaluate(&children, &cuts);
        for (child, r) in children.into_iter().zip(results) {
            self.process_child(child, r);
        }
        for child in unsolved {
            self.tree.enqueue(child);
        }
    }

    /// Solve the relaxations of sibling nodes.
    fn evaluate(&self, children: &[SearchNode], cuts: &[(usize, LinearCut)]) -> Vec<MasterResult> {
        let master = &self.master;
        let ctx = &self.node_ctx;
        let solve_one = |child: &SearchNode| {
            let request = MasterRequest::new(&child.bound_changes, cuts).with_warm(child.warm.as_ref());
            master.solve(&request, ctx)
        };
        if self.settings.threads <= 1 || children.len() < 2 {
            return children.iter().map(solve_one).collect();
        }
        std::thread::scope(|scope| {
            let handles: Vec<_> = children
                .iter()
                .map(|child| scope.spawn(move || solve_one(child)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|_| MasterResult::numerical_error()))
                .collect()
        })
    }

    fn process_child(&mut self, mut child: SearchNode, r: MasterResult) {
        self.tree.node_explored(r.iterations);
        match r.status {
            MasterStatus::Optimal => {}
            MasterStatus::Infeasible | MasterStatus::Cutoff => {
                self.tree.fathom(&mut child);
                return;
            }
            MasterStatus::Limit if self.ctx.time_limit_reached() => {
                // Keep the inherited bound; the search stops before this
                // node is popped.
                self.tree.enqueue(child);
                return;
            }
            status => {
                log::warn!("node {}: relaxation {:?}", child.id, status);
                self.numerical_trouble = true;
                self.tree.fathom(&mut child);
                return;
            }
        }

        if let Some(origin) = child.origin {
            let gain = (r.obj_val - origin.parent_bound).max(0.0);
            let (down, up) = match origin.direction {
                Direction::Down => (Some(gain), None),
                Direction::Up => (None, Some(gain)),
            };
            self.tree.branching.update_pseudocosts(origin.var, origin.value, down, up);
        }
        self.pool.age_cuts(&r.x);

        child.dual_bound = child.dual_bound.max(r.obj_val);
        child.warm = r.warm_start();
        child.x = r.x;
        child.status = NodeStatus::RelaxationSolved;
        child.estimate = self
            .tree
            .branching
            .estimate(&child.x, child.dual_bound, self.prob, self.settings.int_feas_tol);
        self.accept_relaxation(child, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::integrality;
    use solver_core::linalg::sparse;
    use solver_core::SolverSettings;

    /// max 5x0 + 4x1 + 3x2  s.t.  2x0 + 3x1 + x2 <= 6,  4x0 + x1 + 2x2 <= 9,
    /// 3x0 + 4x1 + 2x2 <= 7,  x >= 0 integer.  LP optimum 11.5 at (2, 0, 0.5),
    /// integer optimum 11 at (1, 0, 2).
    fn classic() -> Model {
        let a = sparse::from_triplets(
            3,
            3,
            vec![
                (0, 0, 2.0),
                (0, 1, 3.0),
                (0, 2, 1.0),
                (1, 0, 4.0),
                (1, 1, 1.0),
                (1, 2, 2.0),
                (2, 0, 3.0),
                (2, 1, 4.0),
                (2, 2, 2.0),
            ],
        );
        Model::new(
            vec![5.0, 4.0, 3.0],
            vec![0.0; 3],
            vec![f64::INFINITY; 3],
            vec![f64::NEG_INFINITY; 3],
            vec![6.0, 9.0, 7.0],
            a,
        )
        .with_integrality(integrality(3, &[0, 1, 2]))
        .with_sense(ObjSense::Maximize)
    }

    #[test]
    fn test_classic_mip() {
        let sol = solve_mip(&classic(), &SolveContext::default()).unwrap();
        assert_eq!(sol.status, ModelStatus::Optimal);
        assert!((sol.obj_val + 11.0).abs() < 1e-6);
        assert!((sol.x[0] - 1.0).abs() < 1e-6);
        assert!((sol.x[2] - 2.0).abs() < 1e-6);
        assert!(sol.bound <= sol.obj_val + 1e-9);
    }

    #[test]
    fn test_without_cuts_or_heuristics() {
        let mut settings = MipSettings::default();
        settings.cut_rounds = 0;
        settings.heuristic_effort = 0.0;
        let sol = solve_mip_with(&classic(), settings, &SolveContext::default()).unwrap();
        assert_eq!(sol.status, ModelStatus::Optimal);
        assert!((sol.obj_val + 11.0).abs() < 1e-6);
        assert_eq!(sol.cuts_added, 0);
    }

    #[test]
    fn test_parallel_siblings_agree() {
        let mut settings = MipSettings::default();
        settings.threads = 4;
        settings.cut_rounds = 0;
        let sol = solve_mip_with(&classic(), settings, &SolveContext::default()).unwrap();
        assert_eq!(sol.status, ModelStatus::Optimal);
        assert!((sol.obj_val + 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_integer_infeasible() {
        // 2 x0 = 1, x0 integer
        let a = sparse::from_triplets(1, 1, vec![(0, 0, 2.0)]);
        let model = Model::new(vec![1.0], vec![0.0], vec![10.0], vec![1.0], vec![1.0], a)
            .with_integrality(integrality(1, &[0]));
        let sol = solve_mip(&model, &SolveContext::default()).unwrap();
        assert_eq!(sol.status, ModelStatus::Infeasible);
        assert!(!sol.has_solution());
    }

    #[test]
    fn test_iteration_limit_at_root() {
        let mut settings = SolverSettings::default();
        settings.simplex_iteration_limit = 0;
        let ctx = SolveContext::new(settings, None);
        let sol = solve_mip(&classic(), &ctx).unwrap();
        assert_eq!(sol.status, ModelStatus::IterationLimit);
    }

    #[test]
    fn test_node_limit_is_not_overrun_by_siblings() {
        for threads in [1, 2] {
            let mut settings = MipSettings::default().with_max_nodes(2);
            settings.cut_rounds = 0;
            settings.heuristic_effort = 0.0;
            settings.threads = threads;
            let sol = solve_mip_with(&classic(), settings, &SolveContext::default()).unwrap();
            assert_eq!(sol.status, ModelStatus::NodeLimit);
            assert_eq!(sol.nodes_explored, 2);
            // The unsolved sibling still counts towards the bound.
            assert!(sol.bound <= -11.0 + 1e-6);
        }
    }

    #[test]
    fn test_leaf_limit() {
        let mut settings = MipSettings::default();
        settings.max_leaves = 1;
        settings.cut_rounds = 0;
        settings.heuristic_effort = 0.0;
        let sol = solve_mip_with(&classic(), settings, &SolveContext::default()).unwrap();
        assert_eq!(sol.status, ModelStatus::LeafLimit);
        assert!(sol.leaves >= 1);
    }

    #[test]
    fn test_stall_limit_needs_an_incumbent() {
        let mut settings = MipSettings::default();
        settings.max_stall_nodes = 0;
        settings.cut_rounds = 0;
        settings.heuristic_effort = 0.0;
        let sol = solve_mip_with(&classic(), settings, &SolveContext::default()).unwrap();
        assert_eq!(sol.status, ModelStatus::StallLimit);
        assert!(sol.has_solution());
        assert!(sol.obj_val >= -11.0 - 1e-6);
    }

    #[test]
    fn test_time_limit() {
        let settings = SolverSettings {
            time_limit: 0.0,
            ..SolverSettings::default()
        };
        let ctx = SolveContext::new(settings, None);
        let sol = solve_mip(&classic(), &ctx).unwrap();
        assert_eq!(sol.status, ModelStatus::TimeLimit);
        assert!(!sol.has_solution());
    }

    #[test]
    fn test_pseudocosts_without_strong_branching() {
        let mut settings = MipSettings::default();
        settings.reliability_count = 0;
        settings.cut_rounds = 0;
        let sol = solve_mip_with(&classic(), settings, &SolveContext::default()).unwrap();
        assert_eq!(sol.status, ModelStatus::Optimal);
        assert!((sol.obj_val + 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_node_limit() {
        let mut settings = MipSettings::default();
        settings.max_nodes = 1;
        settings.cut_rounds = 0;
        settings.heuristic_effort = 0.0;
        let sol = solve_mip_with(&classic(), settings, &SolveContext::default()).unwrap();
        assert!(matches!(sol.status, ModelStatus::NodeLimit | ModelStatus::Optimal));
        assert!(sol.bound <= -11.0 + 1e-6);
    }
}
