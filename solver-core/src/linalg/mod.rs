//! Linear algebra layer.
//!
//! Sparse matrix helpers, the LU basis factorization with product-form
//! updates, and the normal-equations Cholesky used by the interior point
//! method.

pub mod factor;
pub mod lu;
pub mod normal_eqns;
pub mod sparse;
