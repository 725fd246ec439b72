//! MIP problem representation.

use solver_core::{Model, ModelLimits, VarType};

use crate::error::{MipError, MipResult};

/// Mixed-integer problem wrapper.
///
/// Holds the minimization form of the model (integrality dropped from the
/// relaxation) and the integer column indices with integral global bounds.
#[derive(Debug, Clone)]
pub struct MipProblem {
    /// Continuous relaxation in minimization form.
    pub relaxation: Model,

    /// Indices of integer variables.
    pub integer_vars: Vec<usize>,

    /// Global lower bounds for all variables.
    pub var_lb: Vec<f64>,

    /// Global upper bounds for all variables.
    pub var_ub: Vec<f64>,

    /// Some integer column has no integer value in its bounds.
    pub empty_domain: bool,
}

impl MipProblem {
    /// Create a MipProblem from a model in any objective sense.
    ///
    /// Integer bounds are rounded inward.
    pub fn new(model: &Model) -> MipResult<Self> {
        let n = model.num_col();
        if let Some(integrality) = &model.integrality {
            if integrality.len() != n {
                return Err(MipError::InvalidProblem(format!(
                    "integrality has {} entries for {} columns",
                    integrality.len(),
                    n
                )));
            }
        }
        model.validate(&ModelLimits::default())?;

        let mut relaxation = model.to_minimization();
        relaxation.integrality = None;
        let integer_vars: Vec<usize> = (0..n).filter(|&j| model.is_integer(j)).collect();

        let mut empty_domain = false;
        for &j in &integer_vars {
            let lb = relaxation.col_lower[j];
            let ub = relaxation.col_upper[j];
            relaxation.col_lower[j] = (lb - 1e-9).ceil();
            relaxation.col_upper[j] = (ub + 1e-9).floor();
            if relaxation.col_lower[j] > relaxation.col_upper[j] {
                log::debug!("integer column {} has empty domain [{}, {}]", j, lb, ub);
                empty_domain = true;
            }
        }

        Ok(Self {
            var_lb: relaxation.col_lower.clone(),
            var_ub: relaxation.col_upper.clone(),
            relaxation,
            integer_vars,
            empty_domain,
        })
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.relaxation.num_col()
    }

    /// Number of constraints.
    pub fn num_constraints(&self) -> usize {
        self.relaxation.num_row()
    }

    /// Number of integer variables.
    pub fn num_integers(&self) -> usize {
        self.integer_vars.len()
    }

    pub fn is_integer(&self, var: usize) -> bool {
        self.integer_vars.binary_search(&var).is_ok()
    }

    /// Check if a solution is integer-feasible within tolerance.
    pub fn is_integer_feasible(&self, x: &[f64], tol: f64) -> bool {
        self.integer_vars
            .iter()
            .all(|&i| (x[i] - x[i].round()).abs() <= tol)
    }

    /// Get the fractionality of a variable (distance to nearest integer).
    pub fn fractionality(&self, val: f64) -> f64 {
        let frac = val - val.floor();
        frac.min(1.0 - frac)
    }

    /// Get fractional integer variables and their values.
    ///
    /// Returns (var_index, current_value, fractionality) for each fractional variable.
    pub fn get_fractional_vars(&self, x: &[f64], tol: f64) -> Vec<(usize, f64, f64)> {
        self.integer_vars
            .iter()
            .filter_map(|&i| {
                let frac = self.fractionality(x[i]);
                (frac > tol).then_some((i, x[i], frac))
            })
            .collect()
    }

    /// Objective of `x` in minimization form.
    pub fn objective(&self, x: &[f64]) -> f64 {
        self.relaxation.objective_value(x)
    }

    /// Bounds, rows and integrality all satisfied.
    pub fn is_feasible(&self, x: &[f64], feas_tol: f64, int_tol: f64) -> bool {
        let bounds_ok = (0..self.num_vars())
            .all(|j| x[j] >= self.var_lb[j] - feas_tol && x[j] <= self.var_ub[j] + feas_tol);
        bounds_ok
            && self.relaxation.max_primal_violation(x) <= feas_tol
            && self.is_integer_feasible(x, int_tol)
    }
}

/// Integrality vector with the given integer columns.
pub fn integrality(n: usize, integer: &[usize]) -> Vec<VarType> {
    let mut types = vec![VarType::Continuous; n];
    for &j in integer {
        types[j] = VarType::Integer;
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use solver_core::linalg::sparse;
    use solver_core::ObjSense;

    fn simple_milp() -> Model {
        // max x0 + x1  s.t.  x0 + x1 <= 1.5,  x0 integer in [0.5, 3.7]
        let a = sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
        Model::new(
            vec![1.0, 1.0],
            vec![0.5, 0.0],
            vec![3.7, 1.0],
            vec![f64::NEG_INFINITY],
            vec![1.5],
            a,
        )
        .with_integrality(integrality(2, &[0]))
        .with_sense(ObjSense::Maximize)
    }

    #[test]
    fn test_mip_problem_creation() {
        let mip = MipProblem::new(&simple_milp()).unwrap();

        assert_eq!(mip.num_vars(), 2);
        assert_eq!(mip.num_integers(), 1);
        assert_eq!(mip.integer_vars, vec![0]);
        assert!(mip.is_integer(0));
        assert!(!mip.is_integer(1));

        // Integer bounds rounded inward, relaxation minimizes
        assert_eq!(mip.var_lb[0], 1.0);
        assert_eq!(mip.var_ub[0], 3.0);
        assert_eq!(mip.relaxation.col_cost, vec![-1.0, -1.0]);
        assert!(mip.relaxation.integrality.is_none());
        assert!(!mip.empty_domain);
    }

    #[test]
    fn test_empty_integer_domain() {
        let model = simple_milp();
        let mut model = model;
        model.col_lower[0] = 0.2;
        model.col_upper[0] = 0.8;
        assert!(MipProblem::new(&model).unwrap().empty_domain);
    }

    #[test]
    fn test_integer_feasibility() {
        let mip = MipProblem::new(&simple_milp()).unwrap();

        assert!(mip.is_integer_feasible(&[1.0, 0.5], 1e-6));
        assert!(!mip.is_integer_feasible(&[0.5, 0.5], 1e-6));
        assert!(mip.is_integer_feasible(&[0.9999999, 0.5], 1e-6));
        assert!(mip.is_feasible(&[1.0, 0.5], 1e-7, 1e-6));
        assert!(!mip.is_feasible(&[1.0, 0.8], 1e-7, 1e-6));
    }

    #[test]
    fn test_fractionality() {
        let mip = MipProblem::new(&simple_milp()).unwrap();

        assert!((mip.fractionality(0.5) - 0.5).abs() < 1e-10);
        assert!((mip.fractionality(0.3) - 0.3).abs() < 1e-10);
        assert!((mip.fractionality(0.7) - 0.3).abs() < 1e-10);
        assert!((mip.fractionality(-0.7) - 0.3).abs() < 1e-10);
        assert!(mip.fractionality(2.0) < 1e-10);
    }
}
