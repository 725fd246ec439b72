//! Simple LP example.
//!
//! Solves:
//!   minimize    x1 + x2
//!   subject to  x1 + x2 = 1
//!               x1 - x2 >= -0.5
//!               x1, x2 >= 0
//!
//! Any point of the segment between (0.25, 0.75) and (1, 0) is optimal with
//! objective 1.0; the simplex returns a vertex.

use std::sync::Arc;

use solver_core::linalg::sparse;
use solver_core::{solve_lp, LogEvent, LogSink, Model, SolveContext, SolverSettings};

fn main() {
    println!("Simple LP Example");
    println!("=================");

    let inf = f64::INFINITY;
    let model = Model::new(
        vec![1.0, 1.0],
        vec![0.0; 2],
        vec![inf; 2],
        vec![1.0, -0.5],
        vec![1.0, inf],
        sparse::from_triplets(
            2,
            2,
            vec![
                (0, 0, 1.0),
                (0, 1, 1.0),  // Row 0: x1 + x2
                (1, 0, 1.0),
                (1, 1, -1.0), // Row 1: x1 - x2
            ],
        ),
    );

    let settings = SolverSettings {
        log_dev_level: 1,
        ..Default::default()
    };
    let sink: LogSink = Arc::new(|event: &LogEvent| println!("  {}", event));
    let ctx = SolveContext::new(settings, Some(sink));

    let result = solve_lp(&model, None, &ctx);
    let sol = &result.solution;
    println!("\n=== Solution ===");
    println!("Status: {}", result.status());
    println!("x1 = {:.6}", sol.col_value[0]);
    println!("x2 = {:.6}", sol.col_value[1]);
    println!("row duals = {:?}", sol.row_dual);
    println!("Objective value: {:.6}", sol.objective_value);
    println!("Iterations: {}", result.info.total_iterations());

    let sum = sol.col_value[0] + sol.col_value[1];
    println!("\nConstraint verification: x1 + x2 = {:.6} (should be 1.0)", sum);
}
