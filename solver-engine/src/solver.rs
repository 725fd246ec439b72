//! The solver façade.
//!
//! [`Solver`] owns the option registry, the instance arena holding the
//! user's model and the results of the last run. Every entry point validates
//! its input before touching state, so an `Err` leaves the solver unchanged.

use solver_core::linalg::sparse::SparseVec;
use solver_core::solve::primal_infeasibilities;
use solver_core::{
    solve_instance, Basis, InstanceArena, InstanceId, LogSink, Model, ModelError, ModelInstance, ModelLimits,
    ModelStatus, ObjSense, OptionValue, Options, Solution, SolveContext, SolveInfo, SolverSettings, VarType,
};
use solver_mip::solve_mip;

use crate::error::{SolverError, SolverResult};

/// Entry point for building, editing and solving LP, QP and MIP models.
#[derive(Default)]
pub struct Solver {
    options: Options,
    instances: InstanceArena,
    original: Option<InstanceId>,
    sink: Option<LogSink>,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or remove the event sink used by subsequent runs.
    pub fn set_log_sink(&mut self, sink: Option<LogSink>) {
        self.sink = sink;
    }

    // ---- options ----------------------------------------------------------

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Set one option. Rejected values leave the option unchanged.
    pub fn set_option(&mut self, name: &str, value: impl Into<OptionValue>) -> SolverResult<()> {
        self.options.set(name, value)?;
        Ok(())
    }

    pub fn get_option(&self, name: &str) -> SolverResult<&OptionValue> {
        Ok(self.options.get(name)?)
    }

    pub fn reset_options(&mut self) {
        self.options.reset();
    }

    fn settings(&self) -> SolverResult<SolverSettings> {
        Ok(SolverSettings::try_from_options(&self.options)?)
    }

    // ---- model ------------------------------------------------------------

    /// Replace the current model. Values beyond the infinity limits become
    /// infinite and tiny matrix entries are dropped.
    pub fn pass_model(&mut self, mut model: Model) -> SolverResult<()> {
        let limits = ModelLimits::from(&self.settings()?);
        model.validate(&limits)?;
        let dropped = model.normalize(&limits);
        if dropped > 0 {
            log::info!("dropped {} tiny matrix entries", dropped);
        }
        self.instances.clear();
        self.original = Some(self.instances.insert(ModelInstance::new(model)));
        Ok(())
    }

    /// Forget the model and everything derived from it.
    pub fn clear_model(&mut self) {
        if let Some(id) = self.original.take() {
            self.instances.remove(id);
        }
    }

    pub fn model(&self) -> Option<&Model> {
        self.instance().ok().map(|inst| &inst.model)
    }

    fn instance(&self) -> SolverResult<&ModelInstance> {
        self.original
            .and_then(|id| self.instances.get(id))
            .ok_or(SolverError::NoModel)
    }

    fn instance_mut(&mut self) -> SolverResult<&mut ModelInstance> {
        self.original
            .and_then(|id| self.instances.get_mut(id))
            .ok_or(SolverError::NoModel)
    }

    /// Apply `edit` to a copy of the model and swap it in only if the result
    /// still validates. Cached results are dropped.
    fn edit(&mut self, edit: impl FnOnce(&mut Model) -> Result<(), ModelError>) -> SolverResult<()> {
        let limits = ModelLimits::from(&self.settings()?);
        let instance = self.instance_mut()?;
        let mut edited = instance.model.clone();
        edit(&mut edited)?;
        edited.validate(&limits)?;
        edited.normalize(&limits);
        instance.model = edited;
        instance.invalidate();
        Ok(())
    }

    pub fn add_cols(&mut self, cost: &[f64], lower: &[f64], upper: &[f64], columns: &[SparseVec]) -> SolverResult<()> {
        self.edit(|model| model.add_cols(cost, lower, upper, columns))
    }

    pub fn add_rows(&mut self, lower: &[f64], upper: &[f64], rows: &[SparseVec]) -> SolverResult<()> {
        self.edit(|model| model.add_rows(lower, upper, rows))
    }

    pub fn delete_cols(&mut self, cols: &[usize]) -> SolverResult<()> {
        self.edit(|model| model.delete_cols(cols))
    }

    pub fn delete_rows(&mut self, rows: &[usize]) -> SolverResult<()> {
        self.edit(|model| model.delete_rows(rows))
    }

    pub fn change_col_bounds(&mut self, col: usize, lower: f64, upper: f64) -> SolverResult<()> {
        self.edit(|model| model.change_col_bounds(col, lower, upper))
    }

    pub fn change_row_bounds(&mut self, row: usize, lower: f64, upper: f64) -> SolverResult<()> {
        self.edit(|model| model.change_row_bounds(row, lower, upper))
    }

    pub fn change_col_cost(&mut self, col: usize, cost: f64) -> SolverResult<()> {
        self.edit(|model| model.change_col_cost(col, cost))
    }

    pub fn change_objective_sense(&mut self, sense: ObjSense) -> SolverResult<()> {
        self.edit(|model| {
            model.sense = sense;
            Ok(())
        })
    }

    pub fn change_col_integrality(&mut self, col: usize, var_type: VarType) -> SolverResult<()> {
        self.edit(|model| model.change_col_integrality(col, var_type))
    }

    // ---- solve ------------------------------------------------------------

    /// Solve the current model and return its status.
    ///
    /// A valid basis from an earlier run (or from [`Solver::set_basis`]) is
    /// used as a warm start for LPs, so running an already optimal instance
    /// again returns the same solution without iterating.
    pub fn run(&mut self) -> SolverResult<ModelStatus> {
        let settings = self.settings()?;
        let ctx = SolveContext::new(settings, self.sink.clone());
        let id = self.original.ok_or(SolverError::NoModel)?;
        let instance = self.instance_mut()?;

        let model = &instance.model;
        ctx.message(
            log::Level::Info,
            format!(
                "Solving {} with {} rows, {} columns and {} nonzeros",
                model_kind(model),
                model.num_row(),
                model.num_col(),
                model.num_nz()
            ),
        );

        if model.is_mip() {
            run_mip(instance, &ctx)?;
        } else {
            // Warm started from the stored basis when valid.
            solve_instance(&mut self.instances, id, &ctx).ok_or(SolverError::NoModel)?;
        }

        let instance = self.instance()?;
        let status = instance.solution.status;
        ctx.message(
            log::Level::Info,
            format!(
                "Model status {}: objective {:.10e}, {} iterations, {:.3}s",
                status,
                instance.solution.objective_value,
                instance.info.total_iterations(),
                ctx.elapsed().as_secs_f64()
            ),
        );
        Ok(status)
    }

    // ---- results ----------------------------------------------------------

    /// Status of the last run (`NotSet` before any run or after an edit).
    pub fn model_status(&self) -> ModelStatus {
        self.instance().map_or(ModelStatus::NotSet, |inst| inst.solution.status)
    }

    pub fn solution(&self) -> SolverResult<&Solution> {
        Ok(&self.instance()?.solution)
    }

    pub fn basis(&self) -> SolverResult<&Basis> {
        Ok(&self.instance()?.basis)
    }

    pub fn info(&self) -> SolverResult<&SolveInfo> {
        Ok(&self.instance()?.info)
    }

    /// Objective of the current solution in the model's own sense.
    pub fn objective_value(&self) -> SolverResult<f64> {
        Ok(self.instance()?.solution.objective_value)
    }

    /// Simplex, IPM and crossover iterations of the last run.
    pub fn iteration_count(&self) -> SolverResult<usize> {
        Ok(self.instance()?.info.total_iterations())
    }

    /// Activity of row `row` at the current solution.
    pub fn row_value(&self, row: usize) -> SolverResult<f64> {
        let solution = &self.instance()?.solution;
        solution
            .row_value
            .get(row)
            .copied()
            .ok_or(SolverError::IndexOutOfRange {
                what: "row",
                index: row,
                size: solution.row_value.len(),
            })
    }

    /// Install primal column values; row activities and the objective are
    /// derived from them. The model status is reset to `NotSet`.
    pub fn set_solution(&mut self, col_value: &[f64]) -> SolverResult<()> {
        let instance = self.instance_mut()?;
        let model = &instance.model;
        let (n, m) = (model.num_col(), model.num_row());
        if col_value.len() != n {
            return Err(SolverError::DimensionMismatch {
                what: "column values",
                expected: n,
                found: col_value.len(),
            });
        }
        if let Some(index) = col_value.iter().position(|v| v.is_nan()) {
            return Err(ModelError::NotANumber {
                what: "column value",
                index,
            }
            .into());
        }
        let mut solution = Solution::empty(n, m);
        solution.row_value = model.row_activity(col_value);
        solution.objective_value = model.objective_value(col_value);
        solution.col_value = col_value.to_vec();
        solution.value_valid = true;
        instance.invalidate_keep_basis();
        instance.solution = solution;
        Ok(())
    }

    /// Install a warm-start basis for the next run.
    pub fn set_basis(&mut self, basis: Basis) -> SolverResult<()> {
        let instance = self.instance_mut()?;
        let (n, m) = (instance.model.num_col(), instance.model.num_row());
        if basis.col_status.len() != n {
            return Err(SolverError::DimensionMismatch {
                what: "basis column statuses",
                expected: n,
                found: basis.col_status.len(),
            });
        }
        if basis.row_status.len() != m {
            return Err(SolverError::DimensionMismatch {
                what: "basis row statuses",
                expected: m,
                found: basis.row_status.len(),
            });
        }
        if !basis.valid {
            return Err(SolverError::InvalidBasis("basis is not marked valid".into()));
        }
        if !basis.is_consistent() {
            return Err(SolverError::InvalidBasis(format!(
                "{} basic variables for {} rows",
                basis.basic_index.len(),
                m
            )));
        }
        instance.basis = basis;
        instance.invalidate_keep_basis();
        Ok(())
    }
}

fn model_kind(model: &Model) -> &'static str {
    match (model.is_mip(), model.is_qp()) {
        (true, true) => "MIQP",
        (true, false) => "MIP",
        (false, true) => "QP",
        (false, false) => "LP",
    }
}

/// Branch-and-bound, with its minimization-form result mapped back to the
/// model's sense. MIP results carry no duals and no basis.
fn run_mip(instance: &mut ModelInstance, ctx: &SolveContext) -> SolverResult<()> {
    let model = &instance.model;
    let mip = solve_mip(model, ctx)?;
    let (n, m) = (model.num_col(), model.num_row());
    let sign = model.sense.sign();

    let mut info = SolveInfo {
        mip_nodes: mip.nodes_explored,
        mip_dual_bound: sign * mip.bound,
        mip_gap: mip.gap,
        ..SolveInfo::default()
    };
    if model.is_qp() {
        info.ipm_iterations = mip.lp_iterations;
    } else {
        info.simplex_iterations = mip.lp_iterations;
    }

    let mut solution = Solution::empty(n, m);
    solution.status = mip.status;
    if mip.has_solution() {
        let row_value = model.row_activity(&mip.x);
        let tol = ctx.settings().mip_feasibility_tolerance;
        let (count, worst) = primal_infeasibilities(model, &mip.x, &row_value, tol);
        info.num_primal_infeasibilities = count;
        info.max_primal_infeasibility = worst;
        solution.objective_value = model.objective_value(&mip.x);
        solution.row_value = row_value;
        solution.col_value = mip.x;
        solution.value_valid = true;
    }
    info.objective_value = solution.objective_value;

    instance.solution = solution;
    instance.basis = Basis::invalid(n, m);
    instance.factor = None;
    instance.info = info;
    Ok(())
}
