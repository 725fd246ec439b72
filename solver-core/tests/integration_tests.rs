//! End-to-end tests of the continuous pipeline.
//!
//! Random feasible LPs are solved with and without presolve and through the
//! interior point route; results must agree and satisfy the optimality
//! conditions of the original model.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use solver_core::linalg::sparse;
use solver_core::{
    solve_lp, Model, ModelStatus, ObjSense, Solution, SolveContext, SolverChoice, SolverSettings, Switch,
};

const INF: f64 = f64::INFINITY;

fn ctx_with(f: impl FnOnce(&mut SolverSettings)) -> SolveContext {
    let mut settings = SolverSettings::default();
    f(&mut settings);
    SolveContext::new(settings, None)
}

/// Bounded LP whose rows are built around a known feasible point.
fn random_lp(rng: &mut ChaCha8Rng, n: usize, m: usize) -> Model {
    let point: Vec<f64> = (0..n).map(|_| rng.random_range(0.0..10.0)).collect();
    let mut triplets = Vec::new();
    let mut row_lower = Vec::with_capacity(m);
    let mut row_upper = Vec::with_capacity(m);
    for i in 0..m {
        let mut activity = 0.0;
        for (j, &p) in point.iter().enumerate() {
            if rng.random_bool(0.5) {
                let a = rng.random_range(-3.0..3.0_f64).round();
                if a != 0.0 {
                    triplets.push((i, j, a));
                    activity += a * p;
                }
            }
        }
        let (lower, upper) = match rng.random_range(0..3) {
            0 => (-INF, activity + rng.random_range(0.0..2.0)),
            1 => (activity - rng.random_range(0.0..2.0), INF),
            _ => (activity - 1.0, activity + 1.0),
        };
        row_lower.push(lower);
        row_upper.push(upper);
    }
    let cost = (0..n).map(|_| rng.random_range(-1.0..1.0)).collect();
    Model::new(
        cost,
        vec![0.0; n],
        vec![10.0; n],
        row_lower,
        row_upper,
        sparse::from_triplets(m, n, triplets),
    )
}

/// Stationarity, primal feasibility and complementary slackness for a
/// minimization LP.
fn assert_kkt(model: &Model, sol: &Solution, tol: f64) {
    let aty = sparse::spmv_transpose(&model.a_matrix, &sol.row_dual);
    for j in 0..model.num_col() {
        let d = model.col_cost[j] - aty[j];
        assert!((d - sol.col_dual[j]).abs() < tol, "column {} dual mismatch", j);
        let x = sol.col_value[j];
        assert!(x >= model.col_lower[j] - tol && x <= model.col_upper[j] + tol);
        if d > tol {
            assert!((x - model.col_lower[j]).abs() < 1e-6, "column {} should sit at lower", j);
        } else if d < -tol {
            assert!((x - model.col_upper[j]).abs() < 1e-6, "column {} should sit at upper", j);
        }
    }
    for i in 0..model.num_row() {
        let r = sol.row_value[i];
        assert!(r >= model.row_lower[i] - tol && r <= model.row_upper[i] + tol);
        let y = sol.row_dual[i];
        if y > tol {
            assert!((r - model.row_lower[i]).abs() < 1e-6, "row {} should sit at lower", i);
        } else if y < -tol {
            assert!((r - model.row_upper[i]).abs() < 1e-6, "row {} should sit at upper", i);
        }
    }
}

#[test]
fn test_presolve_preserves_optimum_on_random_lps() {
    let mut rng = ChaCha8Rng::seed_from_u64(20);
    for case in 0..20 {
        let model = random_lp(&mut rng, 6, 4);
        let plain = solve_lp(&model, None, &ctx_with(|s| s.presolve = Switch::Off));
        let reduced = solve_lp(&model, None, &ctx_with(|s| s.presolve = Switch::On));
        assert_eq!(plain.status(), ModelStatus::Optimal, "case {}", case);
        assert_eq!(reduced.status(), ModelStatus::Optimal, "case {}", case);
        let (a, b) = (plain.solution.objective_value, reduced.solution.objective_value);
        assert!((a - b).abs() <= 1e-6 * (1.0 + a.abs()), "case {}: {} vs {}", case, a, b);
        assert_kkt(&model, &reduced.solution, 1e-6);
        assert!(reduced.basis.valid && reduced.basis.is_consistent());
    }
}

#[test]
fn test_ipm_agrees_with_simplex_on_random_lps() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for case in 0..10 {
        let model = random_lp(&mut rng, 5, 3);
        let simplex = solve_lp(&model, None, &ctx_with(|s| s.solver = SolverChoice::Simplex));
        let ipm = solve_lp(
            &model,
            None,
            &ctx_with(|s| {
                s.solver = SolverChoice::Ipm;
                s.presolve = Switch::Off;
            }),
        );
        assert_eq!(ipm.status(), ModelStatus::Optimal, "case {}", case);
        let (a, b) = (simplex.solution.objective_value, ipm.solution.objective_value);
        assert!((a - b).abs() <= 1e-6 * (1.0 + a.abs()), "case {}: {} vs {}", case, a, b);
    }
}

#[test]
fn test_strong_duality_for_maximization() {
    // max 3x + 2y  s.t.  x + y <= 4,  x + 3y <= 6,  0 <= x <= 3,  y >= 0
    let a = sparse::from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
    let model = Model::new(vec![3.0, 2.0], vec![0.0; 2], vec![3.0, INF], vec![-INF; 2], vec![4.0, 6.0], a)
        .with_sense(ObjSense::Maximize);
    let r = solve_lp(&model, None, &SolveContext::default());
    assert_eq!(r.status(), ModelStatus::Optimal);
    let sol = &r.solution;
    assert!((sol.col_value[0] - 3.0).abs() < 1e-9);
    assert!((sol.col_value[1] - 1.0).abs() < 1e-9);

    // Dual objective: row bounds times row duals plus bound terms of the
    // column duals.
    let mut dual_obj = 0.0;
    for i in 0..2 {
        let y = sol.row_dual[i];
        dual_obj += y * if y > 0.0 { model.row_upper[i] } else { model.row_lower[i].max(0.0) };
    }
    for j in 0..2 {
        let d = sol.col_dual[j];
        if d.abs() > 1e-12 {
            dual_obj += d * if d > 0.0 { model.col_upper[j] } else { model.col_lower[j] };
        }
    }
    assert!((dual_obj - sol.objective_value).abs() < 1e-7);
    assert!((sol.objective_value - 11.0).abs() < 1e-9);
}

#[test]
fn test_solution_serializes_round_trip() {
    let a = sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
    let model = Model::new(vec![1.0, 2.0], vec![0.0; 2], vec![INF; 2], vec![1.0], vec![INF], a);
    let r = solve_lp(&model, None, &SolveContext::default());
    assert_eq!(r.status(), ModelStatus::Optimal);

    let json = serde_json::to_string(&r.solution).unwrap();
    let back: Solution = serde_json::from_str(&json).unwrap();
    assert_eq!(back, r.solution);
    let json = serde_json::to_string(&r.basis).unwrap();
    assert!(json.contains("\"valid\":true"));

    let value: serde_json::Value = serde_json::to_value(&r.info).unwrap();
    assert_eq!(value["objective_value"].as_f64(), Some(1.0));
}

#[test]
fn test_convex_qp_through_pipeline() {
    // min x0^2 + x1^2 - 2 x0 - 4 x1  s.t.  x0 + x1 <= 2: optimum at (0.5, 1.5)
    let a = sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]);
    let q = sparse::from_triplets(2, 2, vec![(0, 0, 2.0), (1, 1, 2.0)]);
    let model = Model::new(vec![-2.0, -4.0], vec![-INF; 2], vec![INF; 2], vec![-INF], vec![2.0], a).with_hessian(q);
    let r = solve_lp(&model, None, &SolveContext::default());
    assert_eq!(r.status(), ModelStatus::Optimal);
    assert!((r.solution.col_value[0] - 0.5).abs() < 1e-5);
    assert!((r.solution.col_value[1] - 1.5).abs() < 1e-5);
    assert!(!r.basis.valid);
    assert!((r.solution.objective_value + 4.5).abs() < 1e-5);
}
