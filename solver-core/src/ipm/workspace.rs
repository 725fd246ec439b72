//! Iterate and bound classification for the bound-form IPM.
//!
//! Variables are `z = (x, r)`: the `n` structurals followed by the `m` row
//! activities. Every finite, non-fixed bound carries an implicit slack
//! (`z - l` or `u - z`, kept strictly positive) and a dual multiplier.

use crate::problem::Model;

/// Bound structure of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Free,
    Lower,
    Upper,
    Boxed,
    Fixed,
}

impl BoundKind {
    pub fn classify(l: f64, u: f64) -> Self {
        match (l.is_finite(), u.is_finite()) {
            (true, true) if l == u => BoundKind::Fixed,
            (true, true) => BoundKind::Boxed,
            (true, false) => BoundKind::Lower,
            (false, true) => BoundKind::Upper,
            (false, false) => BoundKind::Free,
        }
    }

    pub fn has_lower(self) -> bool {
        matches!(self, BoundKind::Lower | BoundKind::Boxed)
    }

    pub fn has_upper(self) -> bool {
        matches!(self, BoundKind::Upper | BoundKind::Boxed)
    }
}

/// Primal-dual iterate.
#[derive(Debug, Clone)]
pub struct IpmState {
    pub n: usize,
    pub m: usize,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub kind: Vec<BoundKind>,
    /// (x, r)
    pub z: Vec<f64>,
    /// Row multipliers
    pub y: Vec<f64>,
    /// Multipliers of lower bounds (zero where absent)
    pub wl: Vec<f64>,
    /// Multipliers of upper bounds (zero where absent)
    pub wu: Vec<f64>,
}

impl IpmState {
    /// Interior starting point: one unit inside each finite bound, the
    /// midpoint of narrow boxes, zero for free variables.
    pub fn initial(model: &Model) -> Self {
        let n = model.num_col();
        let m = model.num_row();
        let mut lower = model.col_lower.clone();
        lower.extend_from_slice(&model.row_lower);
        let mut upper = model.col_upper.clone();
        upper.extend_from_slice(&model.row_upper);
        let kind: Vec<BoundKind> = lower
            .iter()
            .zip(&upper)
            .map(|(&l, &u)| BoundKind::classify(l, u))
            .collect();

        let z = (0..n + m)
            .map(|v| {
                let (l, u) = (lower[v], upper[v]);
                match kind[v] {
                    BoundKind::Free => 0.0,
                    BoundKind::Fixed => l,
                    BoundKind::Lower => l.max(0.0) + 1.0,
                    BoundKind::Upper => u.min(0.0) - 1.0,
                    BoundKind::Boxed if u - l <= 2.0 => 0.5 * (l + u),
                    BoundKind::Boxed => 0.0_f64.clamp(l + 1.0, u - 1.0),
                }
            })
            .collect();
        let wl = kind.iter().map(|k| if k.has_lower() { 1.0 } else { 0.0 }).collect();
        let wu = kind.iter().map(|k| if k.has_upper() { 1.0 } else { 0.0 }).collect();

        Self {
            n,
            m,
            lower,
            upper,
            kind,
            z,
            y: vec![0.0; m],
            wl,
            wu,
        }
    }

    pub fn x(&self) -> &[f64] {
        &self.z[..self.n]
    }

    pub fn r(&self) -> &[f64] {
        &self.z[self.n..]
    }

    pub fn slack_lower(&self, v: usize) -> f64 {
        self.z[v] - self.lower[v]
    }

    pub fn slack_upper(&self, v: usize) -> f64 {
        self.upper[v] - self.z[v]
    }

    /// Number of complementarity pairs.
    pub fn num_pairs(&self) -> usize {
        self.kind
            .iter()
            .map(|k| usize::from(k.has_lower()) + usize::from(k.has_upper()))
            .sum()
    }

    /// Average complementarity, zero without finite bounds.
    pub fn mu(&self) -> f64 {
        let pairs = self.num_pairs();
        if pairs == 0 {
            return 0.0;
        }
        let mut sum = 0.0;
        for v in 0..self.z.len() {
            if self.kind[v].has_lower() {
                sum += self.slack_lower(v) * self.wl[v];
            }
            if self.kind[v].has_upper() {
                sum += self.slack_upper(v) * self.wu[v];
            }
        }
        sum / pairs as f64
    }
}
