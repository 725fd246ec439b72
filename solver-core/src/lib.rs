//! Sparse LP/QP solving kernels.
//!
//! This crate holds everything a continuous solve needs:
//!
//! - **Model**: columns, rows, constraint matrix, optional Hessian and
//!   integrality, with validation and incremental editing ([`problem`])
//! - **Options**: string-keyed registry with typed records ([`options`]) and
//!   the typed snapshot engines read ([`settings`])
//! - **Simplex**: dual and primal revised simplex over an LU-factored basis
//!   with product-form updates ([`simplex`], [`linalg::factor`])
//! - **Interior point**: Mehrotra predictor-corrector on the normal
//!   equations, followed by crossover to a vertex basis ([`ipm`])
//! - **Presolve / postsolve**: rule-based reductions with an undo stack
//!   ([`presolve`], [`postsolve`])
//!
//! # Example
//!
//! ```ignore
//! use solver_core::{solve_lp, Model, SolveContext};
//! use solver_core::linalg::sparse;
//!
//! // min x0 + x1  s.t.  x0 + x1 >= 1,  x >= 0
//! let a = sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
//! let model = Model::new(
//!     vec![1.0, 1.0],
//!     vec![0.0, 0.0],
//!     vec![f64::INFINITY; 2],
//!     vec![1.0],
//!     vec![f64::INFINITY],
//!     a,
//! );
//! let result = solve_lp(&model, None, &SolveContext::default());
//! println!("{:?} {}", result.status(), result.solution.objective_value);
//! ```
//!
//! Mixed-integer search lives in `solver-mip`; the user-facing façade in
//! `solver-engine`.

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod context;
pub mod instance;
pub mod ipm;
pub mod linalg;
pub mod options;
pub mod postsolve;
pub mod presolve;
pub mod problem;
pub mod settings;
pub mod simplex;
pub mod solution;
pub mod solve;
pub mod util;

pub use context::SolveContext;
pub use instance::{InstanceArena, InstanceId, ModelInstance};
pub use options::{OptionError, OptionValue, Options};
pub use problem::{Model, ModelError, ModelLimits, ObjSense, VarType};
pub use settings::{SolverChoice, SolverSettings, Switch};
pub use solution::{Basis, BasisStatus, ModelStatus, Solution, SolveInfo};
pub use solve::{solve_instance, solve_lp, LpResult};
pub use util::logging::{LogEvent, LogSink};
