//! Solve orchestrator for linear, quadratic and mixed-integer programs.
//!
//! [`Solver`] is the public façade: pass or build a model, set options,
//! call [`Solver::run`] and read the status, solution, basis and counters.
//! Continuous models go through presolve, simplex or IPM and postsolve in
//! `solver-core`; models with integer columns go through branch-and-bound in
//! `solver-mip`.
//!
//! # Example
//!
//! ```
//! use solver_core::linalg::sparse;
//! use solver_core::{Model, ModelStatus};
//! use solver_engine::Solver;
//!
//! // min -x0 - x1  s.t.  x0 + x1 <= 1,  x >= 0
//! let inf = f64::INFINITY;
//! let a = sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
//! let model = Model::new(vec![-1.0, -1.0], vec![0.0; 2], vec![inf; 2], vec![-inf], vec![1.0], a);
//!
//! let mut solver = Solver::new();
//! solver.pass_model(model).unwrap();
//! assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
//! assert!((solver.objective_value().unwrap() + 1.0).abs() < 1e-9);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod error;
mod solver;

pub use error::{SolverError, SolverResult};
pub use solver::Solver;

pub use solver_core::{
    Basis, BasisStatus, LogEvent, LogSink, Model, ModelStatus, ObjSense, OptionValue, Options, Solution,
    SolveInfo, VarType,
};
