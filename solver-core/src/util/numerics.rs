//! Small dense-vector helpers shared by the simplex, IPM and presolve code.

/// Dot product of two equal-length slices.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Infinity norm (max absolute entry); 0 for an empty slice.
#[inline]
pub fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}

/// Euclidean norm.
#[inline]
pub fn two_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Sparse dot product of `(index, value)` pairs against a dense vector.
#[inline]
pub fn sparse_dot(entries: &[(usize, f64)], dense: &[f64]) -> f64 {
    entries.iter().map(|&(i, v)| v * dense[i]).sum()
}

/// Distance of `x` from the nearest integer.
#[inline]
pub fn fractionality(x: f64) -> f64 {
    (x - x.round()).abs()
}

/// `x - floor(x)`, in `[0, 1)`.
#[inline]
pub fn frac(x: f64) -> f64 {
    x - x.floor()
}

/// True when `a` and `b` agree to within `tol` absolutely or relative to
/// their magnitude.
#[inline]
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    let diff = (a - b).abs();
    diff <= tol || diff <= tol * a.abs().max(b.abs())
}

/// Relative gap `|a - b| / max(1, |a|)`.
#[inline]
pub fn relative_gap(a: f64, b: f64) -> f64 {
    if a.is_infinite() || b.is_infinite() {
        return f64::INFINITY;
    }
    (a - b).abs() / a.abs().max(1.0)
}
