//! Calibration output types.
//!
//! [`CalibrationWeights`] is the final, immutable weight vector of a solve;
//! [`CalibrationResult`] bundles it with the optimizer outcome and the
//! [`Diagnostics`] computed on those weights.
use ndarray::{Array1, Array2, ArrayView1};

use crate::{
    calibration::core::{
        diagnostics::{CalibrationWarning, Diagnostics, MarginalRow, MomentKind},
        objective::ObjectiveBreakdown,
    },
    optimization::loss_optimizer::{FnEvalMap, Termination},
};

/// Final calibration weights, one per respondent.
///
/// Read-only once built; use [`into_inner`](Self::into_inner) to take
/// ownership of the underlying array.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationWeights(Array1<f64>);

impl CalibrationWeights {
    pub(crate) fn new(weights: Array1<f64>) -> Self {
        Self(weights)
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }

    pub fn as_array(&self) -> &Array1<f64> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Array1<f64> {
        self.0
    }
}

/// Outcome of one masked calibration solve.
///
/// Fields
/// ------
/// - `weights`: final (projected) weights.
/// - `converged` / `termination` / `iterations`: how the optimizer stopped.
/// - `objective_value`: loss at the optimizer's best iterate, with its
///   `objective` breakdown; `grad_norm` and `fn_evals` as reported by the
///   optimizer.
/// - `trace`: loss per iteration, starting at the initial point.
/// - `n_projected`: weights pinned to a bound after optimization.
/// - `diagnostics`: achieved moments, deviation table, weight ratio,
///   effective sample size, quality gate, and warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationResult {
    pub weights: CalibrationWeights,
    pub converged: bool,
    pub termination: Termination,
    pub iterations: usize,
    pub objective_value: f64,
    pub objective: ObjectiveBreakdown,
    pub grad_norm: Option<f64>,
    pub fn_evals: FnEvalMap,
    pub trace: Vec<f64>,
    pub n_projected: usize,
    pub diagnostics: Diagnostics,
}

impl CalibrationResult {
    pub fn achieved_mean(&self) -> &Array1<f64> {
        &self.diagnostics.achieved_mean
    }

    /// Full achieved weighted covariance (masked and unmasked entries).
    pub fn achieved_cov(&self) -> &Array2<f64> {
        &self.diagnostics.achieved_cov
    }

    /// Achieved values of the masked off-diagonal covariance entries as
    /// `(i, j, value)` with `i < j`.
    pub fn achieved_masked_covariances(&self) -> &[(usize, usize, f64)] {
        &self.diagnostics.achieved_masked
    }

    pub fn rows(&self) -> &[MarginalRow] {
        &self.diagnostics.rows
    }

    /// Row for `variable`'s mean, if present.
    pub fn mean_row(&self, variable: &str) -> Option<&MarginalRow> {
        self.diagnostics.rows.iter().find(|r| r.variable == variable && r.kind == MomentKind::Mean)
    }

    pub fn weight_ratio(&self) -> f64 {
        self.diagnostics.weight_ratio
    }

    pub fn effective_sample_size(&self) -> f64 {
        self.diagnostics.effective_sample_size.ess
    }

    pub fn efficiency_pct(&self) -> f64 {
        self.diagnostics.effective_sample_size.efficiency_pct
    }

    pub fn acceptable(&self) -> bool {
        self.diagnostics.acceptable
    }

    /// Largest gated deviation over all rows, in percent.
    pub fn max_abs_pct_diff(&self) -> f64 {
        self.diagnostics.max_gate_value
    }

    pub fn warnings(&self) -> &[CalibrationWarning] {
        &self.diagnostics.warnings
    }
}
