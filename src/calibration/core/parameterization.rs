//! Weight parameterization: unconstrained θ ∈ ℝᴺ to bounded, normalized
//! weights.
//!
//! Purpose
//! -------
//! Let the optimizer search an unconstrained space while every iterate maps
//! to a valid weight vector. The map is
//!
//! ```text
//! p = softmax(θ)                         (max-shifted)
//! s_i = a + b·p_i,   a = min, b = max − min
//! w_i = r·s_i,       r = total / (N·a + b)
//! ```
//!
//! `Σs_i = N·a + b` does not depend on θ, so the renormalization factor `r`
//! is a constant of the problem and `Σw_i = total` holds exactly.
//!
//! Key behaviors
//! -------------
//! - [`WeightTransform::raw_to_weights`]: forward map, returning the softmax
//!   probabilities alongside the weights for gradient propagation.
//! - [`WeightTransform::pull_back`]: vector–Jacobian product
//!   `∂L/∂θ_j = r·b·p_j·(g_j − Σ_i p_i g_i)`.
//! - [`WeightTransform::weights_to_raw`]: inverse map for warm starts.
//!
//! Invariants & assumptions
//! ------------------------
//! - Bounds satisfy `0 < min < max` and `N·min ≤ total ≤ N·max`.
//! - When `r ≥ 1` the lower bound holds strictly; when `r ≤ 1` the upper
//!   bound does. The other bound can be overshot and is repaired after the
//!   solve by [`WeightBounds::project`].
use ndarray::{Array1, ArrayView1};

use crate::{
    calibration::{
        core::bounds::WeightBounds,
        errors::{ConfigError, ConfigResult},
    },
    optimization::numerical_stability::{centered_log, safe_softmax, softmax_vjp},
};

/// Relative tolerance on `Σw = total` accepted by [`WeightTransform::weights_to_raw`].
const WARM_START_SUM_TOL: f64 = 1e-8;

/// Softmax-affine map from θ to calibration weights for a fixed sample size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightTransform {
    bounds: WeightBounds,
    n: usize,
    total: f64,
    scale: f64,
}

/// Weights together with the softmax probabilities that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedWeights {
    pub probs: Array1<f64>,
    pub weights: Array1<f64>,
}

impl WeightTransform {
    /// # Errors
    /// - [`ConfigError::TooFewRows`] if `n < 2`.
    /// - Errors from [`WeightBounds::check_total`].
    pub fn new(bounds: WeightBounds, n: usize, total: f64) -> ConfigResult<Self> {
        if n < 2 {
            return Err(ConfigError::TooFewRows { rows: n });
        }
        bounds.check_total(n, total)?;
        let span = bounds.max() - bounds.min();
        let scale = total / (n as f64 * bounds.min() + span);
        Ok(Self { bounds, n, total, scale })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn bounds(&self) -> WeightBounds {
        self.bounds
    }

    /// Renormalization factor `r`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    fn span(&self) -> f64 {
        self.bounds.max() - self.bounds.min()
    }

    /// Forward map `θ → (p, w)`.
    pub fn raw_to_weights(&self, theta: ArrayView1<f64>) -> MappedWeights {
        let probs = safe_softmax(theta);
        let (a, b, r) = (self.bounds.min(), self.span(), self.scale);
        let weights = probs.mapv(|p| r * (a + b * p));
        MappedWeights { probs, weights }
    }

    /// Push `∂L/∂w` back to `∂L/∂θ` at softmax probabilities `probs`.
    pub fn pull_back(&self, probs: ArrayView1<f64>, grad_w: ArrayView1<f64>) -> Array1<f64> {
        let factor = self.scale * self.span();
        let mut grad_theta = softmax_vjp(probs, grad_w);
        grad_theta.mapv_inplace(|g| g * factor);
        grad_theta
    }

    /// Invert the map: find θ (zero-sum representative) with
    /// `raw_to_weights(θ) == w`.
    ///
    /// # Errors
    /// - [`ConfigError::WarmStartLength`] if `w.len() != N`.
    /// - [`ConfigError::WeightsOutsideImage`] if an entry is non-finite, if
    ///   `Σw` differs from the total, or if some `w_i ≤ r·min` (the softmax
    ///   never produces a zero probability).
    pub fn weights_to_raw(&self, weights: ArrayView1<f64>) -> ConfigResult<Array1<f64>> {
        if weights.len() != self.n {
            return Err(ConfigError::WarmStartLength { expected: self.n, actual: weights.len() });
        }
        if let Some((index, &value)) = weights.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::WeightsOutsideImage {
                index,
                value,
                reason: "Weights must be finite.",
            });
        }
        let sum = weights.sum();
        if (sum - self.total).abs() > WARM_START_SUM_TOL * self.total {
            return Err(ConfigError::WeightsOutsideImage {
                index: 0,
                value: sum,
                reason: "Weights must sum to the normalization total.",
            });
        }
        let (a, b, r) = (self.bounds.min(), self.span(), self.scale);
        let mut probs = Array1::zeros(self.n);
        for (index, (&w, p)) in weights.iter().zip(probs.iter_mut()).enumerate() {
            let value = (w / r - a) / b;
            if value <= 0.0 {
                return Err(ConfigError::WeightsOutsideImage {
                    index,
                    value: w,
                    reason: "Weight is at or below the smallest reachable value.",
                });
            }
            *p = value;
        }
        // Renormalize away rounding in the sum check.
        let mass = probs.sum();
        probs.mapv_inplace(|p| p / mass);
        Ok(centered_log(probs.view()))
    }
}
