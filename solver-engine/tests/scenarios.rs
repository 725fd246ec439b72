//! End-to-end scenarios through the solver façade.

use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use solver_core::linalg::sparse;
use solver_engine::{LogEvent, LogSink, Model, ModelStatus, ObjSense, OptionValue, Solution, Solver, SolverError, VarType};

const INF: f64 = f64::INFINITY;

fn solver_with(model: Model) -> Solver {
    let mut solver = Solver::new();
    solver.pass_model(model).unwrap();
    solver
}

/// min x1² + x2² - 2 x1 - 5 x2
/// s.t. x1 - 2 x2 >= -2,  -x1 - 2 x2 >= -6,  -x1 + 2 x2 >= -2,  x >= 0
fn qptestnw() -> Model {
    let a = sparse::from_triplets(
        3,
        2,
        vec![(0, 0, 1.0), (0, 1, -2.0), (1, 0, -1.0), (1, 1, -2.0), (2, 0, -1.0), (2, 1, 2.0)],
    );
    let q = sparse::from_triplets(2, 2, vec![(0, 0, 2.0), (1, 1, 2.0)]);
    Model::new(vec![-2.0, -5.0], vec![0.0; 2], vec![INF; 2], vec![-2.0, -6.0, -2.0], vec![INF; 3], a).with_hessian(q)
}

/// min -x2 - 3 x3 + ½ (2 x1² - 2 x1 x3 + 0.2 x2² + 2 x3²)  s.t.  x1 + x3 <= `row_upper`
fn qo1(col_lower: f64, row_upper: f64) -> Model {
    let a = sparse::from_triplets(1, 3, vec![(0, 0, 1.0), (0, 2, 1.0)]);
    let q = sparse::from_triplets(
        3,
        3,
        vec![(0, 0, 2.0), (0, 2, -1.0), (1, 1, 0.2), (2, 0, -1.0), (2, 2, 2.0)],
    );
    Model::new(vec![0.0, -1.0, -3.0], vec![col_lower; 3], vec![INF; 3], vec![-INF], vec![row_upper], a).with_hessian(q)
}

/// max 5 x0 + 4 x1 + 3 x2  s.t.  2 x0 + 3 x1 + x2 <= 6,  4 x0 + x1 + 2 x2 <= 9,
/// 3 x0 + 4 x1 + 2 x2 <= 7,  x >= 0 integer
fn knapsack_ip() -> Model {
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
    Model::new(vec![5.0, 4.0, 3.0], vec![0.0; 3], vec![INF; 3], vec![-INF; 3], vec![6.0, 9.0, 7.0], a)
        .with_sense(ObjSense::Maximize)
        .with_integrality(vec![VarType::Integer; 3])
}

/// min -x0 - x1  s.t.  x0 + 2 x1 <= 4,  3 x0 + x1 <= 6,  x >= 0
fn small_lp() -> Model {
    let a = sparse::from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 1.0)]);
    Model::new(vec![-1.0, -1.0], vec![0.0; 2], vec![INF; 2], vec![-INF; 2], vec![4.0, 6.0], a)
}

/// Bounded LP whose rows are built around a known feasible point.
fn random_lp(rng: &mut ChaCha8Rng, n: usize, m: usize) -> Model {
    let point: Vec<f64> = (0..n).map(|_| rng.random_range(0.0..5.0)).collect();
    let mut triplets = Vec::new();
    let mut row_lower = Vec::with_capacity(m);
    let mut row_upper = Vec::with_capacity(m);
    for i in 0..m {
        let mut activity = 0.0;
        for (j, &p) in point.iter().enumerate() {
            if rng.random_bool(0.6) {
                let a = rng.random_range(-4.0..4.0_f64).round();
                if a != 0.0 {
                    triplets.push((i, j, a));
                    activity += a * p;
                }
            }
        }
        let (lower, upper) = match rng.random_range(0..3) {
            0 => (-INF, activity + rng.random_range(0.0..1.0)),
            1 => (activity - rng.random_range(0.0..1.0), INF),
            _ => (activity, activity),
        };
        row_lower.push(lower);
        row_upper.push(upper);
    }
    let cost = (0..n).map(|_| rng.random_range(-2.0..2.0)).collect();
    Model::new(
        cost,
        vec![0.0; n],
        vec![5.0; n],
        row_lower,
        row_upper,
        sparse::from_triplets(m, n, triplets),
    )
}

fn collecting_sink() -> (LogSink, Arc<Mutex<Vec<String>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&events);
    let sink: LogSink = Arc::new(move |event: &LogEvent| {
        seen.lock().unwrap().push(event.to_string());
    });
    (sink, events)
}

#[test]
fn test_qptestnw() {
    let mut solver = solver_with(qptestnw());
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    let sol = solver.solution().unwrap();
    assert!((sol.col_value[0] - 1.4).abs() < 1e-5);
    assert!((sol.col_value[1] - 1.7).abs() < 1e-5);
    assert!((solver.objective_value().unwrap() + 6.45).abs() < 1e-5);
    assert!(solver.info().unwrap().ipm_iterations > 0);
}

#[test]
fn test_qo1_free_columns() {
    // The row is inactive at the unconstrained minimizer (1, 5, 2).
    let mut solver = solver_with(qo1(-INF, 10.0));
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    let x = &solver.solution().unwrap().col_value;
    assert!((x[0] - 1.0).abs() < 1e-5);
    assert!((x[1] - 5.0).abs() < 1e-5);
    assert!((x[2] - 2.0).abs() < 1e-5);
    assert!((solver.objective_value().unwrap() + 5.5).abs() < 1e-5);
}

#[test]
fn test_qo1_without_rows() {
    let q = sparse::from_triplets(
        3,
        3,
        vec![(0, 0, 2.0), (0, 2, -1.0), (1, 1, 0.2), (2, 0, -1.0), (2, 2, 2.0)],
    );
    let model = Model::new(
        vec![0.0, -1.0, -3.0],
        vec![-INF; 3],
        vec![INF; 3],
        vec![],
        vec![],
        sparse::zeros(0, 3),
    )
    .with_hessian(q);
    let mut solver = solver_with(model);
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    let x = &solver.solution().unwrap().col_value;
    assert!((x[0] - 1.0).abs() < 1e-5);
    assert!((x[1] - 5.0).abs() < 1e-5);
    assert!((x[2] - 2.0).abs() < 1e-5);
    assert!((solver.objective_value().unwrap() + 5.5).abs() < 1e-5);
    assert!(solver.solution().unwrap().row_value.is_empty());
}

#[test]
fn test_qo1_constrained() {
    let mut solver = solver_with(qo1(0.0, 2.0));
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    let x = &solver.solution().unwrap().col_value;
    assert!((x[0] - 0.5).abs() < 1e-5);
    assert!((x[1] - 5.0).abs() < 1e-5);
    assert!((x[2] - 1.5).abs() < 1e-5);
    assert!((solver.objective_value().unwrap() + 5.25).abs() < 1e-5);
    assert!((solver.row_value(0).unwrap() - 2.0).abs() < 1e-5);
}

#[test]
fn test_crossed_row_bounds_are_infeasible() {
    // x0 in [0, 10] with row x0 in [1, -inf)
    for presolve in ["on", "off"] {
        let a = sparse::from_triplets(1, 1, vec![(0, 0, 1.0)]);
        let model = Model::new(vec![1.0], vec![0.0], vec![10.0], vec![1.0], vec![-INF], a);
        let mut solver = solver_with(model);
        solver.set_option("presolve", presolve).unwrap();
        let status = solver.run().unwrap();
        assert_eq!(status, ModelStatus::Infeasible, "presolve {}", presolve);
        assert!(!solver.solution().unwrap().value_valid);
    }
}

#[test]
fn test_zero_iteration_limit() {
    let mut solver = solver_with(small_lp());
    solver.set_option("presolve", "off").unwrap();
    solver.set_option("simplex_iteration_limit", 0).unwrap();
    assert_eq!(solver.run().unwrap(), ModelStatus::IterationLimit);
    assert_eq!(solver.iteration_count().unwrap(), 0);

    // Lifting the limit finishes from where the run stopped.
    solver.set_option("simplex_iteration_limit", i32::MAX).unwrap();
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    assert!((solver.objective_value().unwrap() + 2.8).abs() < 1e-7);
}

#[test]
fn test_time_limit_stops_lp_and_mip() {
    for model in [small_lp(), knapsack_ip()] {
        let mut solver = solver_with(model);
        solver.set_option("time_limit", 0.0).unwrap();
        assert_eq!(solver.run().unwrap(), ModelStatus::TimeLimit);
    }
}

#[test]
fn test_ipm_without_crossover_reports_interior_point() {
    let mut solver = solver_with(small_lp());
    solver.set_option("solver", "ipm").unwrap();
    solver.set_option("presolve", "off").unwrap();
    solver.set_option("run_crossover", false).unwrap();
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    assert!((solver.objective_value().unwrap() + 2.8).abs() < 1e-6);
    assert!(!solver.basis().unwrap().valid);
    let info = solver.info().unwrap();
    assert!(info.ipm_iterations > 0);
    assert_eq!(info.crossover_iterations, 0);

    solver.set_option("run_crossover", true).unwrap();
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    assert!(solver.basis().unwrap().valid);
}

#[test]
fn test_small_pivots_are_rejected_without_failing() {
    // min x + 10y  s.t.  0.5x + 2y >= 3,  y >= 1.5
    let a = sparse::from_triplets(2, 2, vec![(0, 0, 0.5), (0, 1, 2.0), (1, 1, 1.0)]);
    let model = Model::new(vec![1.0, 10.0], vec![0.0; 2], vec![INF; 2], vec![3.0, 1.5], vec![INF; 2], a);
    for strategy in [1, 2] {
        let mut solver = solver_with(model.clone());
        solver.set_option("presolve", "off").unwrap();
        solver.set_option("simplex_scale_strategy", 0).unwrap();
        solver.set_option("factor_pivot_tolerance", 0.9).unwrap();
        solver.set_option("simplex_strategy", strategy).unwrap();
        assert_eq!(solver.run().unwrap(), ModelStatus::Optimal, "strategy {}", strategy);
        assert!((solver.objective_value().unwrap() - 15.0).abs() < 1e-9);
        let x = &solver.solution().unwrap().col_value;
        assert!(x[0].abs() < 1e-9);
        assert!((x[1] - 1.5).abs() < 1e-9);
    }
}

#[test]
fn test_run_is_idempotent() {
    let mut solver = solver_with(small_lp());
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    let first: Solution = solver.solution().unwrap().clone();
    let basis = solver.basis().unwrap().clone();

    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    assert_eq!(solver.iteration_count().unwrap(), 0);
    let second = solver.solution().unwrap();
    assert!((first.objective_value - second.objective_value).abs() < 1e-12);
    for (a, b) in first.col_value.iter().zip(&second.col_value) {
        assert!((a - b).abs() < 1e-9);
    }
    assert_eq!(solver.basis().unwrap().col_status, basis.col_status);
}

#[test]
fn test_set_basis_warm_starts_a_fresh_model() {
    let mut solver = solver_with(small_lp());
    solver.run().unwrap();
    let basis = solver.basis().unwrap().clone();

    let mut fresh = solver_with(small_lp());
    fresh.set_basis(basis).unwrap();
    assert_eq!(fresh.run().unwrap(), ModelStatus::Optimal);
    assert_eq!(fresh.iteration_count().unwrap(), 0);
}

#[test]
fn test_option_round_trip() {
    let mut solver = Solver::new();
    solver.set_option("primal_feasibility_tolerance", 1e-8).unwrap();
    assert_eq!(
        solver.get_option("primal_feasibility_tolerance").unwrap(),
        &OptionValue::Double(1e-8)
    );

    let err = solver.set_option("primal_feasibility_tolerance", -1.0).unwrap_err();
    assert!(matches!(err, SolverError::Option(_)));
    assert_eq!(
        solver.get_option("primal_feasibility_tolerance").unwrap(),
        &OptionValue::Double(1e-8)
    );
    assert!(solver.set_option("presolve", "sometimes").is_err());
    assert!(solver.set_option("output_flag", 3).is_err());
    assert!(solver.set_option("no_such_option", true).is_err());

    let changed: Vec<&str> = solver.options().non_default().map(|r| r.name).collect();
    assert_eq!(changed, vec!["primal_feasibility_tolerance"]);
    solver.reset_options();
    assert_eq!(solver.options().non_default().count(), 0);
}

#[test]
fn test_presolve_does_not_change_the_optimum() {
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    for case in 0..15 {
        let model = random_lp(&mut rng, 7, 5);
        let mut objectives = Vec::new();
        for presolve in ["off", "on"] {
            let mut solver = solver_with(model.clone());
            solver.set_option("presolve", presolve).unwrap();
            assert_eq!(solver.run().unwrap(), ModelStatus::Optimal, "case {}", case);
            let sol = solver.solution().unwrap();
            assert!(model.max_primal_violation(&sol.col_value) < 1e-6, "case {}", case);
            assert!(solver.basis().unwrap().is_consistent(), "case {}", case);
            objectives.push(sol.objective_value);
        }
        let (a, b) = (objectives[0], objectives[1]);
        assert!((a - b).abs() <= 1e-6 * (1.0 + a.abs()), "case {}: {} vs {}", case, a, b);
    }
}

#[test]
fn test_mip_through_the_facade() {
    let mut solver = solver_with(knapsack_ip());
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    let sol = solver.solution().unwrap();
    assert!(sol.value_valid);
    assert!(!sol.dual_valid);
    assert!((sol.objective_value - 11.0).abs() < 1e-6);
    for x in &sol.col_value {
        assert!((x - x.round()).abs() < 1e-6);
    }
    assert!((solver.row_value(0).unwrap() - sol.row_value[0]).abs() < 1e-12);

    let info = solver.info().unwrap();
    assert!(info.mip_nodes >= 1);
    // Maximization: the dual bound lies above the incumbent.
    assert!(info.mip_dual_bound >= 11.0 - 1e-6);
    assert!(info.mip_dual_bound <= 11.5 + 1e-6);
    assert!(!solver.basis().unwrap().valid);
}

#[test]
fn test_relaxing_integrality_gives_lp_optimum() {
    let mut solver = solver_with(knapsack_ip());
    for col in 0..3 {
        solver.change_col_integrality(col, VarType::Continuous).unwrap();
    }
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    assert!((solver.objective_value().unwrap() - 11.5).abs() < 1e-7);
    assert!(solver.solution().unwrap().dual_valid);
}

#[test]
fn test_mip_objective_bound() {
    // min x0 + x1  s.t.  x0 + x1 >= 1.5, integer: optimum 2 lies above the bound
    let a = sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
    let model = Model::new(vec![1.0, 1.0], vec![0.0; 2], vec![5.0; 2], vec![1.5], vec![INF], a)
        .with_integrality(vec![VarType::Integer; 2]);
    let mut solver = solver_with(model);
    solver.set_option("objective_bound", 1.8).unwrap();
    assert_eq!(solver.run().unwrap(), ModelStatus::ObjectiveBound);
    assert!(!solver.solution().unwrap().value_valid);
}

#[test]
fn test_editing_workflow() {
    let mut solver = solver_with(small_lp());
    solver.run().unwrap();
    assert!((solver.objective_value().unwrap() + 2.8).abs() < 1e-7);

    // x0 + x1 <= 2 cuts the old vertex (1.6, 1.2) off.
    solver.add_rows(&[-INF], &[2.0], &[vec![(0, 1.0), (1, 1.0)]]).unwrap();
    assert_eq!(solver.model_status(), ModelStatus::NotSet);
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    assert!((solver.objective_value().unwrap() + 2.0).abs() < 1e-7);

    // A third column with a better ratio in the new row.
    solver.add_cols(&[-3.0], &[0.0], &[1.0], &[vec![(2, 1.0)]]).unwrap();
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    assert!((solver.objective_value().unwrap() + 4.0).abs() < 1e-7);

    solver.change_col_cost(2, 0.0).unwrap();
    solver.change_col_bounds(2, 0.0, 0.0).unwrap();
    solver.delete_cols(&[2]).unwrap();
    solver.delete_rows(&[2]).unwrap();
    let model = solver.model().unwrap();
    let original = small_lp();
    assert_eq!((model.num_col(), model.num_row(), model.num_nz()), (2, 2, 4));
    assert_eq!(model.col_cost, original.col_cost);
    assert_eq!(model.row_upper, original.row_upper);
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    assert!((solver.objective_value().unwrap() + 2.8).abs() < 1e-7);

    solver.change_objective_sense(ObjSense::Maximize).unwrap();
    assert_eq!(solver.run().unwrap(), ModelStatus::Optimal);
    // max -x0 - x1 sits at the origin
    assert!(solver.objective_value().unwrap().abs() < 1e-9);

    // Rejected edits leave the model and its results alone.
    let before = solver.model().unwrap().clone();
    assert!(solver.add_rows(&[0.0], &[1.0], &[vec![(7, 1.0)]]).is_err());
    assert!(solver.delete_rows(&[5]).is_err());
    assert!(solver.change_row_bounds(0, f64::NAN, 1.0).is_err());
    assert_eq!(solver.model().unwrap(), &before);
    assert_eq!(solver.model_status(), ModelStatus::Optimal);
}

#[test]
fn test_log_sink_does_not_change_outcome() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let model = random_lp(&mut rng, 6, 4);

    let mut quiet = solver_with(model.clone());
    let quiet_status = quiet.run().unwrap();

    let (sink, events) = collecting_sink();
    let mut loud = solver_with(model.clone());
    loud.set_log_sink(Some(sink.clone()));
    loud.set_option("log_dev_level", 3).unwrap();
    let loud_status = loud.run().unwrap();

    assert_eq!(quiet_status, loud_status);
    assert_eq!(quiet.solution().unwrap(), loud.solution().unwrap());
    assert!(!events.lock().unwrap().is_empty());
    assert!(events.lock().unwrap().iter().any(|e| e.starts_with("Solving LP")));

    // Output disabled: nothing reaches the sink.
    let (sink, events) = collecting_sink();
    let mut muted = solver_with(model);
    muted.set_log_sink(Some(sink));
    muted.set_option("output_flag", false).unwrap();
    assert_eq!(muted.run().unwrap(), quiet_status);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn test_empty_model() {
    let model = Model::new(vec![], vec![], vec![], vec![-1.0], vec![1.0], sparse::zeros(1, 0)).with_offset(3.0);
    let mut solver = solver_with(model);
    assert_eq!(solver.run().unwrap(), ModelStatus::ModelEmpty);
    assert_eq!(solver.objective_value().unwrap(), 3.0);
}

#[test]
fn test_snapshots_serialize() {
    let mut solver = solver_with(small_lp());
    solver.run().unwrap();

    let json = serde_json::to_string(solver.solution().unwrap()).unwrap();
    let back: Solution = serde_json::from_str(&json).unwrap();
    assert_eq!(&back, solver.solution().unwrap());

    let value = serde_json::to_value(solver.basis().unwrap()).unwrap();
    assert_eq!(value["valid"], serde_json::Value::Bool(true));
    assert_eq!(value["basic_index"].as_array().map(Vec::len), Some(2));

    let info = serde_json::to_value(solver.info().unwrap()).unwrap();
    assert!(info["simplex_iterations"].as_u64().unwrap() > 0);
}
