//! Mixed-integer layer on top of solver-core.
//!
//! Branch-and-cut over LP (or convex QP) relaxations:
//!
//! - **Search**: best-bound tree with reliability branching; pseudocosts
//!   take over once both directions of a column have enough observations
//! - **Cuts**: Gomory mixed-integer cuts from the root tableau, kept in an
//!   aging pool
//! - **Heuristics**: rounding and fractional diving under an effort budget
//! - **Termination**: relative gap, node, leaf, stall-node and time limits
//!
//! # Example
//!
//! ```ignore
//! use solver_core::{Model, SolveContext};
//! use solver_mip::{integrality, solve_mip};
//!
//! let model: Model = build_model().with_integrality(integrality(n, &[0, 2]));
//! let sol = solve_mip(&model, &SolveContext::default())?;
//! println!("{} {}", sol.status, sol.obj_val);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod cuts;
pub mod error;
pub mod heuristics;
pub mod master;
pub mod model;
pub mod search;
pub mod settings;
mod solver;

pub use error::{MipError, MipResult};
pub use model::{integrality, MipProblem, MipSolution};
pub use settings::{BranchingRule, MipSettings, NodeSelection};
pub use solver::{solve_mip, solve_mip_with};
