//! Typed option registry.
//!
//! Every tunable is an [`OptionRecord`] carrying its kind (bool, int, double
//! or string), bounds, default and current value. [`Options::set`] is the only
//! way to change a value: it validates type and range first and leaves the
//! prior value untouched on failure.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Integer used where an int option is "unlimited".
pub const INT_INFINITY: i64 = i32::MAX as i64;

/// A value held by (or offered to) an option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl OptionValue {
    fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "int",
            OptionValue::Double(_) => "double",
            OptionValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Double(d) => write!(f, "{}", d),
            OptionValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<usize> for OptionValue {
    fn from(v: usize) -> Self {
        OptionValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Double(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

/// Type, bounds and default of one option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    Bool {
        default: bool,
    },
    Int {
        lower: i64,
        default: i64,
        upper: i64,
    },
    Double {
        lower: f64,
        default: f64,
        upper: f64,
    },
    Str {
        default: &'static str,
        allowed: &'static [&'static str],
    },
}

impl OptionKind {
    fn default_value(&self) -> OptionValue {
        match self {
            OptionKind::Bool { default } => OptionValue::Bool(*default),
            OptionKind::Int { default, .. } => OptionValue::Int(*default),
            OptionKind::Double { default, .. } => OptionValue::Double(*default),
            OptionKind::Str { default, .. } => OptionValue::Str((*default).to_string()),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            OptionKind::Bool { .. } => "bool",
            OptionKind::Int { .. } => "int",
            OptionKind::Double { .. } => "double",
            OptionKind::Str { .. } => "string",
        }
    }
}

/// One registry entry.
#[derive(Debug, Clone)]
pub struct OptionRecord {
    pub name: &'static str,
    pub description: &'static str,
    /// Hidden from user-facing reports unless explicitly requested.
    pub advanced: bool,
    pub kind: OptionKind,
    value: OptionValue,
}

impl OptionRecord {
    fn new(name: &'static str, description: &'static str, advanced: bool, kind: OptionKind) -> Self {
        let value = kind.default_value();
        Self {
            name,
            description,
            advanced,
            kind,
            value,
        }
    }

    pub fn value(&self) -> &OptionValue {
        &self.value
    }

    pub fn is_default(&self) -> bool {
        self.value == self.kind.default_value()
    }

    fn admit_double(&self, d: f64, lower: f64, upper: f64) -> Result<OptionValue, OptionError> {
        if d.is_nan() || d < lower || d > upper {
            Err(OptionError::IllegalValue {
                name: self.name.to_string(),
                value: d.to_string(),
            })
        } else {
            Ok(OptionValue::Double(d))
        }
    }

    /// Check `value` against this record, coercing ints offered to double
    /// options. Returns the value that would be stored.
    fn admit(&self, value: OptionValue) -> Result<OptionValue, OptionError> {
        let illegal = |v: &OptionValue| OptionError::IllegalValue {
            name: self.name.to_string(),
            value: v.to_string(),
        };
        match (&self.kind, value) {
            (OptionKind::Bool { .. }, OptionValue::Bool(b)) => Ok(OptionValue::Bool(b)),
            (OptionKind::Int { lower, upper, .. }, OptionValue::Int(i)) => {
                if i < *lower || i > *upper {
                    Err(illegal(&OptionValue::Int(i)))
                } else {
                    Ok(OptionValue::Int(i))
                }
            }
            (OptionKind::Double { lower, upper, .. }, OptionValue::Int(i)) => {
                self.admit_double(i as f64, *lower, *upper)
            }
            (OptionKind::Double { lower, upper, .. }, OptionValue::Double(d)) => {
                self.admit_double(d, *lower, *upper)
            }
            (OptionKind::Str { allowed, .. }, OptionValue::Str(s)) => {
                if allowed.is_empty() || allowed.contains(&s.as_str()) {
                    Ok(OptionValue::Str(s))
                } else {
                    Err(illegal(&OptionValue::Str(s)))
                }
            }
            (kind, v) => Err(OptionError::WrongType {
                name: self.name.to_string(),
                expected: kind.type_name(),
                found: v.type_name(),
            }),
        }
    }
}

/// Errors from option lookup or assignment. A failed assignment never
/// changes the stored value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionError {
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("option '{name}' expects a {expected} value, got {found}")]
    WrongType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} is illegal for option '{name}'")]
    IllegalValue { name: String, value: String },
}

/// The option set.
#[derive(Debug, Clone)]
pub struct Options {
    records: Vec<OptionRecord>,
    index: HashMap<&'static str, usize>,
}

impl Default for Options {
    fn default() -> Self {
        let records = catalogue();
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name, i))
            .collect();
        Self { records, index }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &str) -> Result<&OptionRecord, OptionError> {
        self.index
            .get(name)
            .map(|&i| &self.records[i])
            .ok_or_else(|| OptionError::UnknownOption(name.to_string()))
    }

    /// Validate and store a value.
    pub fn set(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<(), OptionError> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| OptionError::UnknownOption(name.to_string()))?;
        let admitted = self.records[idx].admit(value.into())?;
        self.records[idx].value = admitted;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&OptionValue, OptionError> {
        Ok(&self.record(name)?.value)
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, OptionError> {
        match self.get(name)? {
            OptionValue::Bool(b) => Ok(*b),
            other => Err(self.type_error(name, "bool", other)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<i64, OptionError> {
        match self.get(name)? {
            OptionValue::Int(i) => Ok(*i),
            other => Err(self.type_error(name, "int", other)),
        }
    }

    pub fn get_double(&self, name: &str) -> Result<f64, OptionError> {
        match self.get(name)? {
            OptionValue::Double(d) => Ok(*d),
            other => Err(self.type_error(name, "double", other)),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<&str, OptionError> {
        match self.get(name)? {
            OptionValue::Str(s) => Ok(s.as_str()),
            other => Err(self.type_error(name, "string", other)),
        }
    }

    fn type_error(&self, name: &str, expected: &'static str, found: &OptionValue) -> OptionError {
        OptionError::WrongType {
            name: name.to_string(),
            expected,
            found: found.type_name(),
        }
    }

    /// Restore every option to its default.
    pub fn reset(&mut self) {
        for r in &mut self.records {
            r.value = r.kind.default_value();
        }
    }

    /// All records in catalogue order, for external reporting.
    pub fn records(&self) -> impl Iterator<Item = &OptionRecord> {
        self.records.iter()
    }

    /// Records whose value differs from the default.
    pub fn non_default(&self) -> impl Iterator<Item = &OptionRecord> {
        self.records.iter().filter(|r| !r.is_default())
    }
}

const ON_OFF_CHOOSE: &[&str] = &["choose", "on", "off"];
const SOLVERS: &[&str] = &["choose", "simplex", "ipm"];

fn boolean(name: &'static str, description: &'static str, default: bool) -> OptionRecord {
    OptionRecord::new(name, description, false, OptionKind::Bool { default })
}

fn int(name: &'static str, description: &'static str, lower: i64, default: i64, upper: i64) -> OptionRecord {
    OptionRecord::new(name, description, false, OptionKind::Int { lower, default, upper })
}

fn double(name: &'static str, description: &'static str, lower: f64, default: f64, upper: f64) -> OptionRecord {
    OptionRecord::new(name, description, false, OptionKind::Double { lower, default, upper })
}

fn string(
    name: &'static str,
    description: &'static str,
    default: &'static str,
    allowed: &'static [&'static str],
) -> OptionRecord {
    OptionRecord::new(name, description, false, OptionKind::Str { default, allowed })
}

fn advanced(mut record: OptionRecord) -> OptionRecord {
    record.advanced = true;
    record
}

fn catalogue() -> Vec<OptionRecord> {
    let inf = f64::INFINITY;
    vec![
        string("presolve", "Presolve option: \"off\", \"choose\" or \"on\"", "choose", ON_OFF_CHOOSE),
        string("solver", "Solver option: \"simplex\", \"choose\" or \"ipm\"", "choose", SOLVERS),
        string("parallel", "Parallel option: \"off\", \"choose\" or \"on\"", "choose", ON_OFF_CHOOSE),
        double("time_limit", "Time limit (seconds)", 0.0, inf, inf),
        double("infinite_cost", "Limit on cost coefficient: values larger than this will be treated as infinite", 1e15, 1e20, inf),
        double("infinite_bound", "Limit on |constraint bound|: values larger than this will be treated as infinite", 1e15, 1e20, inf),
        double("small_matrix_value", "Lower limit on |matrix entries|: values smaller than this will be treated as zero", 1e-12, 1e-9, inf),
        double("large_matrix_value", "Upper limit on |matrix entries|: values larger than this will be treated as infinite", 1.0, 1e15, inf),
        double("primal_feasibility_tolerance", "Primal feasibility tolerance", 1e-10, 1e-7, inf),
        double("dual_feasibility_tolerance", "Dual feasibility tolerance", 1e-10, 1e-7, inf),
        double("ipm_optimality_tolerance", "IPM optimality tolerance", 1e-12, 1e-8, inf),
        double("objective_bound", "Objective bound for termination of the dual simplex", -inf, inf, inf),
        int("random_seed", "Random seed used in the solver", 0, 0, INT_INFINITY),
        int("simplex_strategy", "Strategy for simplex solver 0 => Choose; 1 => Dual; 2 => Primal", 0, 0, 2),
        int("simplex_crash_strategy", "Strategy for simplex crash: off / triangular", 0, 0, 1),
        int(
            "simplex_dual_edge_weight_strategy",
            "Strategy for simplex dual edge weights: Choose / Dantzig / Devex / Steepest Edge (-1/0/1/2)",
            -1,
            -1,
            2,
        ),
        int(
            "simplex_primal_edge_weight_strategy",
            "Strategy for simplex primal edge weights: Choose / Dantzig / Devex / Steepest Edge (-1/0/1/2)",
            -1,
            -1,
            2,
        ),
        int("simplex_scale_strategy", "Strategy for scaling before simplex solver: off / on (0/1)", 0, 1, 1),
        advanced(int(
            "allowed_simplex_matrix_scale_factor",
            "Largest power-of-two factor that can be used to scale the constraint matrix for the simplex solver",
            0,
            10,
            20,
        )),
        advanced(int(
            "allowed_simplex_cost_scale_factor",
            "Largest power-of-two factor that can be used to scale the costs for the simplex solver",
            0,
            0,
            20,
        )),
        int("simplex_iteration_limit", "Iteration limit for simplex solver", 0, INT_INFINITY, INT_INFINITY),
        int("simplex_update_limit", "Limit on the number of simplex UPDATE operations", 0, 5000, INT_INFINITY),
        int("ipm_iteration_limit", "Iteration limit for IPM solver", 0, INT_INFINITY, INT_INFINITY),
        int("min_threads", "Minimum number of threads in parallel execution", 1, 1, 64),
        int("max_threads", "Maximum number of threads in parallel execution", 1, 8, 64),
        boolean("output_flag", "Enables or disables solver output", true),
        int("log_dev_level", "Output development messages: 0 => none; 1 => info; 2 => detailed; 3 => verbose", 0, 0, 3),
        boolean("run_crossover", "Run crossover after IPM", true),
        advanced(boolean("dual_simplex_cleanup", "Clean up primal simplex perturbations with the dual simplex", true)),
        advanced(boolean("simplex_initial_condition_check", "Perform initial basis condition check in simplex", true)),
        advanced(double(
            "simplex_initial_condition_tolerance",
            "Tolerance on initial basis condition in simplex",
            1.0,
            1e14,
            inf,
        )),
        advanced(double(
            "dual_steepest_edge_weight_log_error_threshold",
            "Threshold on dual steepest edge weight errors for Devex switch",
            1.0,
            10.0,
            inf,
        )),
        advanced(double(
            "dual_simplex_cost_perturbation_multiplier",
            "Dual simplex cost perturbation multiplier: 0 => no perturbation",
            0.0,
            1.0,
            inf,
        )),
        advanced(double(
            "primal_simplex_bound_perturbation_multiplier",
            "Primal simplex bound perturbation multiplier: 0 => no perturbation",
            0.0,
            1.0,
            inf,
        )),
        advanced(double("factor_pivot_threshold", "Matrix factorization pivot threshold", 8e-4, 0.1, 0.5)),
        advanced(double("factor_pivot_tolerance", "Matrix factorization pivot tolerance", 0.0, 1e-10, 1.0)),
        advanced(double(
            "start_crossover_tolerance",
            "Tolerance to be satisfied before IPM crossover will start",
            1e-12,
            1e-8,
            inf,
        )),
        int("presolve_pass_limit", "Limit on the number of presolve passes over the rule list", 0, 100, INT_INFINITY),
        int("mip_max_nodes", "MIP solver max number of nodes", 0, INT_INFINITY, INT_INFINITY),
        int(
            "mip_max_stall_nodes",
            "MIP solver max number of nodes without improving the incumbent",
            0,
            INT_INFINITY,
            INT_INFINITY,
        ),
        int("mip_max_leaves", "MIP solver max number of leave nodes", 0, INT_INFINITY, INT_INFINITY),
        int("mip_lp_age_limit", "Maximal age of dynamic LP rows before they are removed from the LP relaxation", 0, 10, 32767),
        int("mip_pool_age_limit", "Maximal age of rows in the cutpool before they are deleted", 0, 30, 1000),
        int(
            "mip_pool_soft_limit",
            "Soft limit on the number of rows in the cutpool for dynamic age adjustment",
            1,
            10000,
            INT_INFINITY,
        ),
        int(
            "mip_pscost_minreliable",
            "Minimal number of observations before pseudo costs are considered reliable",
            0,
            8,
            INT_INFINITY,
        ),
        int("mip_report_level", "MIP solver reporting level", 0, 1, 2),
        double("mip_feasibility_tolerance", "MIP feasibility tolerance", 1e-10, 1e-6, inf),
        advanced(double("mip_epsilon", "MIP epsilon tolerance", 1e-15, 1e-9, inf)),
        double("mip_heuristic_effort", "Effort spent for MIP heuristics", 0.0, 0.05, 1.0),
        double(
            "mip_rel_gap",
            "Tolerance on relative gap, |ub-lb|/|ub|, to determine whether optimality has been reached for a MIP instance",
            0.0,
            1e-4,
            inf,
        ),
        int("mip_cut_rounds", "Rounds of Gomory cut separation at the root node", 0, 3, 100),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_lookup() {
        let opts = Options::new();
        assert_eq!(opts.get_string("presolve").unwrap(), "choose");
        assert_eq!(opts.get_double("primal_feasibility_tolerance").unwrap(), 1e-7);
        assert_eq!(opts.get_int("simplex_update_limit").unwrap(), 5000);
        assert!(opts.get_bool("run_crossover").unwrap());
        assert!(opts.get_double("time_limit").unwrap().is_infinite());
    }

    #[test]
    fn test_round_trip_in_range() {
        let mut opts = Options::new();
        opts.set("dual_feasibility_tolerance", 1e-9).unwrap();
        assert_eq!(opts.get_double("dual_feasibility_tolerance").unwrap(), 1e-9);
        opts.set("simplex_strategy", 2).unwrap();
        assert_eq!(opts.get_int("simplex_strategy").unwrap(), 2);
        opts.set("solver", "ipm").unwrap();
        assert_eq!(opts.get_string("solver").unwrap(), "ipm");
    }

    #[test]
    fn test_out_of_range_rejected_and_unchanged() {
        let mut opts = Options::new();
        opts.set("primal_feasibility_tolerance", 1e-6).unwrap();
        let err = opts.set("primal_feasibility_tolerance", -1.0).unwrap_err();
        assert!(matches!(err, OptionError::IllegalValue { .. }));
        assert_eq!(opts.get_double("primal_feasibility_tolerance").unwrap(), 1e-6);

        assert!(opts.set("simplex_strategy", 7).is_err());
        assert_eq!(opts.get_int("simplex_strategy").unwrap(), 0);

        assert!(opts.set("presolve", "sometimes").is_err());
        assert_eq!(opts.get_string("presolve").unwrap(), "choose");

        assert!(opts.set("time_limit", f64::NAN).is_err());
    }

    #[test]
    fn test_wrong_type_and_unknown() {
        let mut opts = Options::new();
        assert!(matches!(
            opts.set("output_flag", 1.5),
            Err(OptionError::WrongType { .. })
        ));
        assert!(matches!(
            opts.set("no_such_option", true),
            Err(OptionError::UnknownOption(_))
        ));
        assert!(opts.get_int("output_flag").is_err());
    }

    #[test]
    fn test_int_promotes_to_double() {
        let mut opts = Options::new();
        opts.set("time_limit", 10).unwrap();
        assert_eq!(opts.get_double("time_limit").unwrap(), 10.0);
    }

    #[test]
    fn test_reset_and_non_default() {
        let mut opts = Options::new();
        opts.set("random_seed", 42).unwrap();
        assert_eq!(opts.non_default().count(), 1);
        opts.reset();
        assert_eq!(opts.non_default().count(), 0);
        assert_eq!(opts.get_int("random_seed").unwrap(), 0);
    }

    #[test]
    fn test_catalogue_names_unique() {
        let opts = Options::new();
        assert_eq!(opts.records().count(), opts.index.len());
        assert!(opts.records().any(|r| r.advanced));
    }
}
