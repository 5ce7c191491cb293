//! Numerical stability utilities.
//!
//! Provides safe implementations of the simplex transforms used to map an
//! unconstrained parameter vector onto probability weights, together with the
//! vector–Jacobian product needed to push gradients back through them.
//!
//! # Provided items
//! - [`NEAR_ZERO`]: magnitude below which a quantity is treated as zero when
//!   it appears in a denominator (relative deviations, weight ratios).
//! - [`safe_softmax`]: max-shifted softmax, ℝⁿ → open simplex, without
//!   overflow for large logits.
//! - [`softmax_vjp`]: `Jᵀg` for the softmax Jacobian in O(n).
//! - [`centered_log`]: inverse of softmax up to its shift invariance.
use ndarray::{Array1, ArrayView1};

/// Magnitudes below this are treated as zero in denominators.
pub const NEAR_ZERO: f64 = 1e-8;

/// Numerically stable softmax: `p_i = exp(x_i − max x) / Σ_j exp(x_j − max x)`.
///
/// Subtracting the maximum keeps every exponent ≤ 0, so the largest term is
/// exactly 1 and the normalizer lies in `[1, n]`; no overflow is possible and
/// underflow only affects entries that are negligible anyway.
///
/// # Parameters
/// - `x`: finite logits. An empty input yields an empty output.
///
/// # Returns
/// - Probabilities summing to 1.
pub fn safe_softmax(x: ArrayView1<f64>) -> Array1<f64> {
    let max_x = x.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let exp_x = x.mapv(|v| (v - max_x).exp());
    let sum_exp_x = exp_x.sum();
    exp_x / sum_exp_x
}

/// Vector–Jacobian product of the softmax at probabilities `p`.
///
/// With `J_ij = p_i(δ_ij − p_j)`, returns `(Jᵀg)_j = p_j (g_j − Σ_i p_i g_i)`.
/// The Jacobian is symmetric, so this is also the Jacobian–vector product.
///
/// # Parameters
/// - `p`: softmax output.
/// - `g`: upstream gradient with respect to `p`, same length as `p`.
pub fn softmax_vjp(p: ArrayView1<f64>, g: ArrayView1<f64>) -> Array1<f64> {
    let mean_g = p.dot(&g);
    let mut out = g.to_owned();
    out.zip_mut_with(&p, |o, &pi| *o = pi * (*o - mean_g));
    out
}

/// Centered logarithm `ln p − mean(ln p)`.
///
/// `safe_softmax(centered_log(p)) == p` for strictly positive `p` summing to
/// one; centering picks the representative whose entries sum to zero.
///
/// Callers must ensure every entry of `p` is strictly positive.
pub fn centered_log(p: ArrayView1<f64>) -> Array1<f64> {
    let mut logs = p.mapv(f64::ln);
    let n = logs.len();
    if n > 0 {
        let mean = logs.sum() / n as f64;
        logs.mapv_inplace(|v| v - mean);
    }
    logs
}
