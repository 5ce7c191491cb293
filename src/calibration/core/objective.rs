//! Masked KL calibration objective.
//!
//! Purpose
//! -------
//! Evaluate the scalar calibration loss and its analytic gradient with
//! respect to the unconstrained parameters θ. With `w = w(θ)` from
//! [`WeightTransform`], `W = Σw`, weighted means `m` and population-style
//! weighted covariance `C`:
//!
//! ```text
//! L(θ) = (c / total) · Σ_i w_i ln(w_i / ū)                        entropy
//!      + λ · 0.5 · Σ_k (m_k − μ_k)² / (T_kk + ridge)               means
//!      + λ · 0.5 · Σ_{mask_ij = 1} (C_ij − T_ij)² / (sd_i sd_j + ridge)
//! ```
//!
//! with `ū = total / N` and `sd_k = √T_kk`.
//!
//! Key behaviors
//! -------------
//! - Covariance entries outside the mask never enter the loss or gradient:
//!   only [`MomentMask::constrained_pairs`] is iterated.
//! - Loss and gradient come from a single pass (`value_and_grad`); weights
//!   are computed once per evaluation.
//! - Gradient chain: `θ → p → w → (m, C) → L`, using
//!   `∂m_k/∂w_l = (X_lk − m_k)/W` and
//!   `∂C_ij/∂w_l = ((X_li − m_i)(X_lj − m_j) − C_ij)/W`.
//!
//! Invariants & assumptions
//! ------------------------
//! - The design matrix has already been validated against the targets.
//! - With `ridge = 0` a zero target variance yields a non-finite loss, which
//!   the optimizer reports as a numerical failure.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::{
    calibration::core::{
        moments::MomentMask,
        options::Regularization,
        parameterization::{MappedWeights, WeightTransform},
        stats::{centered, weighted_cov_from_centered, weighted_mean},
    },
    optimization::{
        errors::{OptError, OptResult},
        loss_optimizer::{Cost, Grad, Objective, Theta},
    },
};

/// A masked covariance constraint with its precomputed normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WeightedConstraint {
    i: usize,
    j: usize,
    target: f64,
    inv_denom: f64,
    multiplicity: f64,
}

/// Loss split into its three parts (moment parts already multiplied by λ).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveBreakdown {
    pub entropy: f64,
    pub mean_penalty: f64,
    pub cov_penalty: f64,
}

impl ObjectiveBreakdown {
    pub fn total(&self) -> f64 {
        self.entropy + self.mean_penalty + self.cov_penalty
    }
}

/// Calibration loss over a borrowed design matrix.
///
/// `Data` is the N×K design matrix view; the objective itself only holds
/// the targets, the weight map, and precomputed normalizations.
#[derive(Debug, Clone)]
pub struct MaskedObjective<'a> {
    targets: &'a MomentMask,
    transform: WeightTransform,
    regularization: Regularization,
    mean_inv_denom: Array1<f64>,
    constraints: Vec<WeightedConstraint>,
}

impl<'a> MaskedObjective<'a> {
    pub fn new(
        targets: &'a MomentMask, transform: WeightTransform, regularization: Regularization,
    ) -> Self {
        let ridge = regularization.ridge;
        let k = targets.dim();
        let mean_inv_denom =
            Array1::from_shape_fn(k, |idx| 1.0 / (targets.target_variance(idx) + ridge));
        let sd = Array1::from_shape_fn(k, |idx| targets.target_variance(idx).sqrt());
        let constraints = targets
            .constrained_pairs()
            .iter()
            .map(|c| WeightedConstraint {
                i: c.i,
                j: c.j,
                target: c.target,
                inv_denom: 1.0 / (sd[c.i] * sd[c.j] + ridge),
                multiplicity: c.multiplicity,
            })
            .collect();
        Self { targets, transform, regularization, mean_inv_denom, constraints }
    }

    pub fn transform(&self) -> &WeightTransform {
        &self.transform
    }

    /// Loss parts at θ.
    pub fn breakdown(&self, theta: &Theta, design: &ArrayView2<'a, f64>) -> ObjectiveBreakdown {
        self.evaluate(theta, design, false).0
    }

    /// Shared evaluation; the gradient is only assembled when requested.
    fn evaluate(
        &self, theta: &Theta, design: &ArrayView2<'a, f64>, with_grad: bool,
    ) -> (ObjectiveBreakdown, Option<Grad>) {
        let MappedWeights { probs, weights } = self.transform.raw_to_weights(theta.view());
        let n = weights.len() as f64;
        let total = self.transform.total();
        let w_sum = weights.sum();
        let lambda = self.regularization.moment_weight;

        // entropy
        let coef = self.regularization.concentration / total;
        let u_bar = total / n;
        let entropy = coef * weights.iter().map(|&w| w * (w / u_bar).ln()).sum::<f64>();

        // means
        let mean = weighted_mean(design.view(), weights.view());
        let mean_resid = &mean - self.targets.target_mean();
        let mean_grad = &mean_resid * &self.mean_inv_denom;
        let mean_penalty = 0.5 * lambda * mean_resid.dot(&mean_grad);

        // masked covariance
        let dev = centered(design.view(), mean.view());
        let cov = weighted_cov_from_centered(dev.view(), weights.view());
        let mut cov_penalty = 0.0;
        let mut cov_grads = Vec::with_capacity(self.constraints.len());
        for c in &self.constraints {
            let diff = cov[[c.i, c.j]] - c.target;
            cov_penalty += 0.5 * c.multiplicity * diff * diff * c.inv_denom;
            cov_grads.push(c.multiplicity * diff * c.inv_denom);
        }
        cov_penalty *= lambda;

        let parts = ObjectiveBreakdown { entropy, mean_penalty, cov_penalty };
        if !with_grad {
            return (parts, None);
        }

        let mut grad_w = weights.mapv(|w| coef * ((w / u_bar).ln() + 1.0));
        let mut moment_grad = dev.dot(&mean_grad);
        for (c, &g) in self.constraints.iter().zip(cov_grads.iter()) {
            let cov_ij = cov[[c.i, c.j]];
            let col_i = dev.index_axis(Axis(1), c.i);
            let col_j = dev.index_axis(Axis(1), c.j);
            moment_grad.zip_mut_with(&(&col_i * &col_j), |acc, &prod| *acc += g * (prod - cov_ij));
        }
        grad_w.scaled_add(lambda / w_sum, &moment_grad);
        let grad_theta = self.transform.pull_back(probs.view(), grad_w.view());
        (parts, Some(grad_theta))
    }

    fn check_theta(&self, theta: &Theta) -> OptResult<()> {
        if theta.len() != self.transform.n() {
            return Err(OptError::ThetaLengthMismatch {
                expected: self.transform.n(),
                actual: theta.len(),
            });
        }
        Ok(())
    }
}

impl<'a> Objective for MaskedObjective<'a> {
    type Data = ArrayView2<'a, f64>;

    fn value(&self, theta: &Theta, design: &Self::Data) -> OptResult<Cost> {
        self.check_theta(theta)?;
        Ok(self.evaluate(theta, design, false).0.total())
    }

    fn check(&self, theta: &Theta, design: &Self::Data) -> OptResult<()> {
        self.check_theta(theta)?;
        if design.nrows() != self.transform.n() || design.ncols() != self.targets.dim() {
            return Err(OptError::InvalidParameter {
                text: format!(
                    "design matrix is {}x{}, expected {}x{}",
                    design.nrows(),
                    design.ncols(),
                    self.transform.n(),
                    self.targets.dim()
                ),
            });
        }
        Ok(())
    }

    fn grad(&self, theta: &Theta, design: &Self::Data) -> OptResult<Grad> {
        self.value_and_grad(theta, design).map(|(_, grad)| grad)
    }

    fn value_and_grad(&self, theta: &Theta, design: &Self::Data) -> OptResult<(Cost, Grad)> {
        self.check_theta(theta)?;
        match self.evaluate(theta, design, true) {
            (parts, Some(grad)) => Ok((parts.total(), grad)),
            (_, None) => Err(OptError::GradientNotImplemented),
        }
    }
}

/// Achieved weighted means and covariance for weights `w`.
pub fn achieved_moments(
    design: ArrayView2<f64>, weights: ArrayView1<f64>,
) -> (Array1<f64>, Array2<f64>) {
    let mean = weighted_mean(design, weights);
    let dev = centered(design, mean.view());
    let cov = weighted_cov_from_centered(dev.view(), weights);
    (mean, cov)
}
