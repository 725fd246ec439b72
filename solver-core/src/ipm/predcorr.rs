//! Mehrotra predictor-corrector steps.
//!
//! Each iteration factorizes the normal equations once and solves twice:
//! 1. **Affine step**: pure Newton direction (σ = 0)
//! 2. **Combined step**: centering σμ with σ = (μ_aff/μ)³ plus the
//!    second-order correction from the affine direction

use crate::linalg::normal_eqns::{NormalEquations, NormalEquationsError};

use super::termination::Residuals;
use super::workspace::{BoundKind, IpmState};

/// Fraction of the distance to the boundary taken by a step.
const STEP_FRACTION: f64 = 0.99;
/// Primal regularization added to `D_x`.
const PRIMAL_REGULARIZATION: f64 = 1e-9;
/// Diagonal standing in for a fixed structural (pins `dx` near zero).
const FIXED_DIAGONAL: f64 = 1e12;
/// `D_r` of a free row.
const FREE_ROW_DIAGONAL: f64 = 1e-8;

/// Search direction over all blocks.
#[derive(Debug, Clone)]
pub struct Direction {
    pub dz: Vec<f64>,
    pub dy: Vec<f64>,
    pub dwl: Vec<f64>,
    pub dwu: Vec<f64>,
}

/// Outcome of one predictor-corrector iteration.
#[derive(Debug, Clone, Copy)]
pub struct StepResult {
    pub alpha: f64,
    pub sigma: f64,
}

/// Barrier diagonal `w_l/s_l + w_u/s_u` of variable `v`.
fn barrier_diagonal(st: &IpmState, v: usize) -> f64 {
    let mut d = 0.0;
    if st.kind[v].has_lower() {
        d += st.wl[v] / st.slack_lower(v);
    }
    if st.kind[v].has_upper() {
        d += st.wu[v] / st.slack_upper(v);
    }
    d
}

/// Factorize the normal equations for the current iterate.
pub fn factor(ne: &mut NormalEquations, st: &IpmState) -> Result<(), NormalEquationsError> {
    let n = st.n;
    let d_x: Vec<f64> = (0..n)
        .map(|j| match st.kind[j] {
            BoundKind::Fixed => FIXED_DIAGONAL,
            _ => barrier_diagonal(st, j) + PRIMAL_REGULARIZATION,
        })
        .collect();
    let dr_inv: Vec<f64> = (0..st.m)
        .map(|i| match st.kind[n + i] {
            BoundKind::Fixed => 0.0,
            BoundKind::Free => 1.0 / FREE_ROW_DIAGONAL,
            _ => 1.0 / barrier_diagonal(st, n + i),
        })
        .collect();
    ne.factor(&d_x, &dr_inv)
}

/// Solve for a direction with target complementarity `sigma_mu` and the
/// optional Mehrotra correction taken from `affine`.
pub fn direction(
    ne: &NormalEquations,
    st: &IpmState,
    res: &Residuals,
    sigma_mu: f64,
    affine: Option<&Direction>,
) -> Direction {
    let (n, m) = (st.n, st.m);
    let nt = n + m;
    let mut lterm = vec![0.0; nt];
    let mut uterm = vec![0.0; nt];
    for v in 0..nt {
        if st.kind[v].has_lower() {
            let corr = affine.map_or(0.0, |a| a.dz[v] * a.dwl[v]);
            lterm[v] = (sigma_mu - corr) / st.slack_lower(v) - st.wl[v];
        }
        if st.kind[v].has_upper() {
            let corr = affine.map_or(0.0, |a| -a.dz[v] * a.dwu[v]);
            uterm[v] = (sigma_mu - corr) / st.slack_upper(v) - st.wu[v];
        }
    }
    let g: Vec<f64> = (0..nt)
        .map(|v| {
            if st.kind[v] == BoundKind::Fixed {
                0.0
            } else {
                -res.r_d[v] + lterm[v] - uterm[v]
            }
        })
        .collect();

    let (dx, dr, dy) = ne.solve(&g[..n], &g[n..], &res.r_p);
    let mut dz = dx;
    dz.extend(dr);
    for v in 0..nt {
        if st.kind[v] == BoundKind::Fixed {
            dz[v] = 0.0;
        }
    }

    let mut dwl = vec![0.0; nt];
    let mut dwu = vec![0.0; nt];
    for v in 0..nt {
        if st.kind[v].has_lower() {
            dwl[v] = lterm[v] - st.wl[v] / st.slack_lower(v) * dz[v];
        }
        if st.kind[v].has_upper() {
            dwu[v] = uterm[v] + st.wu[v] / st.slack_upper(v) * dz[v];
        }
    }
    Direction { dz, dy, dwl, dwu }
}

/// Largest step keeping slacks and multipliers nonnegative (infinite when
/// nothing blocks).
pub fn max_step(st: &IpmState, dir: &Direction) -> f64 {
    let mut alpha = f64::INFINITY;
    for v in 0..st.z.len() {
        if st.kind[v].has_lower() {
            if dir.dz[v] < 0.0 {
                alpha = alpha.min(st.slack_lower(v) / -dir.dz[v]);
            }
            if dir.dwl[v] < 0.0 {
                alpha = alpha.min(st.wl[v] / -dir.dwl[v]);
            }
        }
        if st.kind[v].has_upper() {
            if dir.dz[v] > 0.0 {
                alpha = alpha.min(st.slack_upper(v) / dir.dz[v]);
            }
            if dir.dwu[v] < 0.0 {
                alpha = alpha.min(st.wu[v] / -dir.dwu[v]);
            }
        }
    }
    alpha
}

/// Complementarity after a step of length `alpha`.
fn mu_after(st: &IpmState, dir: &Direction, alpha: f64) -> f64 {
    let pairs = st.num_pairs();
    if pairs == 0 {
        return 0.0;
    }
    let mut sum = 0.0;
    for v in 0..st.z.len() {
        if st.kind[v].has_lower() {
            sum += (st.slack_lower(v) + alpha * dir.dz[v]) * (st.wl[v] + alpha * dir.dwl[v]);
        }
        if st.kind[v].has_upper() {
            sum += (st.slack_upper(v) - alpha * dir.dz[v]) * (st.wu[v] + alpha * dir.dwu[v]);
        }
    }
    sum / pairs as f64
}

fn apply(st: &mut IpmState, dir: &Direction, alpha: f64) {
    for v in 0..st.z.len() {
        st.z[v] += alpha * dir.dz[v];
        st.wl[v] += alpha * dir.dwl[v];
        st.wu[v] += alpha * dir.dwu[v];
    }
    for (y, dy) in st.y.iter_mut().zip(&dir.dy) {
        *y += alpha * dy;
    }
}

/// Take one predictor-corrector step in place.
pub fn predictor_corrector_step(
    ne: &mut NormalEquations,
    st: &mut IpmState,
    res: &Residuals,
) -> Result<StepResult, NormalEquationsError> {
    factor(ne, st)?;
    let mu = st.mu();

    let affine = direction(ne, st, res, 0.0, None);
    let alpha_aff = max_step(st, &affine).min(1.0);
    let mu_aff = mu_after(st, &affine, alpha_aff);
    let sigma = if mu > 0.0 { (mu_aff / mu).powi(3).min(1.0) } else { 0.0 };

    let combined = direction(ne, st, res, sigma * mu, Some(&affine));
    let alpha = (STEP_FRACTION * max_step(st, &combined)).min(1.0);
    apply(st, &combined, alpha);
    Ok(StepResult { alpha, sigma })
}
