//! Read-only typed snapshot of the option set.
//!
//! Resolved once per `run()` and threaded through every engine inside a
//! [`crate::SolveContext`]. Engines never read the string-keyed registry.

use crate::options::{OptionError, Options};

/// Tri-state switch used by `presolve` and `parallel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    Choose,
    On,
    Off,
}

impl Switch {
    fn parse(s: &str) -> Self {
        match s {
            "on" => Switch::On,
            "off" => Switch::Off,
            _ => Switch::Choose,
        }
    }

    /// Resolve `Choose` to the given default.
    pub fn enabled_or(self, default: bool) -> bool {
        match self {
            Switch::On => true,
            Switch::Off => false,
            Switch::Choose => default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverChoice {
    Choose,
    Simplex,
    Ipm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimplexStrategy {
    Choose,
    Dual,
    Primal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashStrategy {
    Off,
    Triangular,
}

/// Edge-weight (pricing) strategy for either simplex variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeWeightStrategy {
    Choose,
    Dantzig,
    Devex,
    SteepestEdge,
}

impl EdgeWeightStrategy {
    fn from_code(code: i64) -> Self {
        match code {
            0 => EdgeWeightStrategy::Dantzig,
            1 => EdgeWeightStrategy::Devex,
            2 => EdgeWeightStrategy::SteepestEdge,
            _ => EdgeWeightStrategy::Choose,
        }
    }
}

/// Typed solver settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    pub presolve: Switch,
    pub solver: SolverChoice,
    pub parallel: Switch,
    /// Wall-clock limit in seconds (`f64::INFINITY` = none)
    pub time_limit: f64,

    /// Costs with magnitude at or above this are infinite
    pub infinite_cost: f64,
    /// Bounds with magnitude at or above this are infinite
    pub infinite_bound: f64,
    /// Matrix entries below this magnitude are dropped
    pub small_matrix_value: f64,
    /// Matrix entries above this magnitude are rejected
    pub large_matrix_value: f64,

    pub primal_feasibility_tolerance: f64,
    pub dual_feasibility_tolerance: f64,
    pub ipm_optimality_tolerance: f64,
    /// Dual simplex stops once the dual objective exceeds this
    pub objective_bound: f64,
    pub random_seed: u64,

    pub simplex_strategy: SimplexStrategy,
    pub crash_strategy: CrashStrategy,
    pub dual_edge_weight: EdgeWeightStrategy,
    pub primal_edge_weight: EdgeWeightStrategy,
    /// Equilibrate the LP before the simplex
    pub simplex_scale: bool,
    /// Largest exponent of the power-of-two matrix scale factors
    pub simplex_matrix_scale_limit: i32,
    /// Largest exponent of the power-of-two cost scale factor
    pub simplex_cost_scale_limit: i32,
    pub simplex_iteration_limit: usize,
    /// Number of product-form updates before a fresh factorization
    pub simplex_update_limit: usize,
    pub ipm_iteration_limit: usize,

    pub min_threads: usize,
    pub max_threads: usize,

    /// Deliver events to the injected sink
    pub output_flag: bool,
    /// 0..=3, per-iteration event cadence
    pub log_dev_level: u8,

    pub run_crossover: bool,
    pub dual_simplex_cleanup: bool,
    pub initial_condition_check: bool,
    pub initial_condition_tolerance: f64,
    /// Log-error threshold on steepest-edge weights before switching to Devex
    pub dse_log_error_threshold: f64,
    pub cost_perturbation: f64,
    pub bound_perturbation: f64,
    /// Relative threshold for Markowitz pivoting
    pub factor_pivot_threshold: f64,
    /// Absolute pivot magnitude below which a pivot is rejected
    pub factor_pivot_tolerance: f64,
    pub start_crossover_tolerance: f64,
    pub presolve_pass_limit: usize,

    pub mip_max_nodes: usize,
    pub mip_max_stall_nodes: usize,
    pub mip_max_leaves: usize,
    pub mip_lp_age_limit: usize,
    pub mip_pool_age_limit: usize,
    pub mip_pool_soft_limit: usize,
    pub mip_pscost_minreliable: usize,
    pub mip_report_level: u8,
    pub mip_feasibility_tolerance: f64,
    pub mip_epsilon: f64,
    pub mip_heuristic_effort: f64,
    pub mip_rel_gap: f64,
    pub mip_cut_rounds: usize,
}

fn count(v: i64) -> usize {
    usize::try_from(v).unwrap_or(0)
}

impl SolverSettings {
    /// Resolve a snapshot from the registry.
    pub fn try_from_options(opts: &Options) -> Result<Self, OptionError> {
        Ok(Self {
            presolve: Switch::parse(opts.get_string("presolve")?),
            solver: match opts.get_string("solver")? {
                "simplex" => SolverChoice::Simplex,
                "ipm" => SolverChoice::Ipm,
                _ => SolverChoice::Choose,
            },
            parallel: Switch::parse(opts.get_string("parallel")?),
            time_limit: opts.get_double("time_limit")?,
            infinite_cost: opts.get_double("infinite_cost")?,
            infinite_bound: opts.get_double("infinite_bound")?,
            small_matrix_value: opts.get_double("small_matrix_value")?,
            large_matrix_value: opts.get_double("large_matrix_value")?,
            primal_feasibility_tolerance: opts.get_double("primal_feasibility_tolerance")?,
            dual_feasibility_tolerance: opts.get_double("dual_feasibility_tolerance")?,
            ipm_optimality_tolerance: opts.get_double("ipm_optimality_tolerance")?,
            objective_bound: opts.get_double("objective_bound")?,
            random_seed: opts.get_int("random_seed")?.max(0) as u64,
            simplex_strategy: match opts.get_int("simplex_strategy")? {
                1 => SimplexStrategy::Dual,
                2 => SimplexStrategy::Primal,
                _ => SimplexStrategy::Choose,
            },
            crash_strategy: match opts.get_int("simplex_crash_strategy")? {
                1 => CrashStrategy::Triangular,
                _ => CrashStrategy::Off,
            },
            dual_edge_weight: EdgeWeightStrategy::from_code(
                opts.get_int("simplex_dual_edge_weight_strategy")?,
            ),
            primal_edge_weight: EdgeWeightStrategy::from_code(
                opts.get_int("simplex_primal_edge_weight_strategy")?,
            ),
            simplex_scale: opts.get_int("simplex_scale_strategy")? != 0,
            simplex_matrix_scale_limit: opts.get_int("allowed_simplex_matrix_scale_factor")?.clamp(0, 20) as i32,
            simplex_cost_scale_limit: opts.get_int("allowed_simplex_cost_scale_factor")?.clamp(0, 20) as i32,
            simplex_iteration_limit: count(opts.get_int("simplex_iteration_limit")?),
            simplex_update_limit: count(opts.get_int("simplex_update_limit")?),
            ipm_iteration_limit: count(opts.get_int("ipm_iteration_limit")?),
            min_threads: count(opts.get_int("min_threads")?),
            max_threads: count(opts.get_int("max_threads")?),
            output_flag: opts.get_bool("output_flag")?,
            log_dev_level: opts.get_int("log_dev_level")?.clamp(0, 3) as u8,
            run_crossover: opts.get_bool("run_crossover")?,
            dual_simplex_cleanup: opts.get_bool("dual_simplex_cleanup")?,
            initial_condition_check: opts.get_bool("simplex_initial_condition_check")?,
            initial_condition_tolerance: opts.get_double("simplex_initial_condition_tolerance")?,
            dse_log_error_threshold: opts.get_double("dual_steepest_edge_weight_log_error_threshold")?,
            cost_perturbation: opts.get_double("dual_simplex_cost_perturbation_multiplier")?,
            bound_perturbation: opts.get_double("primal_simplex_bound_perturbation_multiplier")?,
            factor_pivot_threshold: opts.get_double("factor_pivot_threshold")?,
            factor_pivot_tolerance: opts.get_double("factor_pivot_tolerance")?,
            start_crossover_tolerance: opts.get_double("start_crossover_tolerance")?,
            presolve_pass_limit: count(opts.get_int("presolve_pass_limit")?),
            mip_max_nodes: count(opts.get_int("mip_max_nodes")?),
            mip_max_stall_nodes: count(opts.get_int("mip_max_stall_nodes")?),
            mip_max_leaves: count(opts.get_int("mip_max_leaves")?),
            mip_lp_age_limit: count(opts.get_int("mip_lp_age_limit")?),
            mip_pool_age_limit: count(opts.get_int("mip_pool_age_limit")?),
            mip_pool_soft_limit: count(opts.get_int("mip_pool_soft_limit")?),
            mip_pscost_minreliable: count(opts.get_int("mip_pscost_minreliable")?),
            mip_report_level: opts.get_int("mip_report_level")?.clamp(0, 2) as u8,
            mip_feasibility_tolerance: opts.get_double("mip_feasibility_tolerance")?,
            mip_epsilon: opts.get_double("mip_epsilon")?,
            mip_heuristic_effort: opts.get_double("mip_heuristic_effort")?,
            mip_rel_gap: opts.get_double("mip_rel_gap")?,
            mip_cut_rounds: count(opts.get_int("mip_cut_rounds")?),
        })
    }

    /// Number of worker threads the B&B may use for sibling evaluation.
    pub fn worker_threads(&self) -> usize {
        if self.parallel.enabled_or(self.max_threads > 1) {
            self.max_threads.max(self.min_threads).max(1)
        } else {
            1
        }
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self::try_from_options(&Options::default())
            .expect("default option catalogue covers every setting")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_resolves() {
        let s = SolverSettings::try_from_options(&Options::default()).unwrap();
        assert_eq!(s.presolve, Switch::Choose);
        assert_eq!(s.simplex_update_limit, 5000);
        assert_eq!(s.dual_edge_weight, EdgeWeightStrategy::Choose);
        assert_eq!(s.mip_pscost_minreliable, 8);
        assert!(s.simplex_scale);
        assert_eq!((s.simplex_matrix_scale_limit, s.simplex_cost_scale_limit), (10, 0));
        assert!(s.time_limit.is_infinite());
        assert_eq!(s, SolverSettings::default());
    }

    #[test]
    fn test_snapshot_follows_options() {
        let mut opts = Options::default();
        opts.set("presolve", "off").unwrap();
        opts.set("simplex_strategy", 2).unwrap();
        opts.set("simplex_dual_edge_weight_strategy", 1).unwrap();
        opts.set("parallel", "off").unwrap();
        opts.set("simplex_scale_strategy", 0).unwrap();
        opts.set("allowed_simplex_cost_scale_factor", 3).unwrap();
        let s = SolverSettings::try_from_options(&opts).unwrap();
        assert_eq!(s.presolve, Switch::Off);
        assert_eq!(s.simplex_strategy, SimplexStrategy::Primal);
        assert_eq!(s.dual_edge_weight, EdgeWeightStrategy::Devex);
        assert_eq!(s.worker_threads(), 1);
        assert!(!s.simplex_scale);
        assert_eq!(s.simplex_cost_scale_limit, 3);
    }
}
