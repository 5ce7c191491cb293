//! Calibration options: configuration for a masked KL calibration solve.
//!
//! Purpose
//! -------
//! Collect every configuration knob of a solve in one place: weight bounds
//! and normalization, the regularization of the objective, the L-BFGS
//! settings, diagnostic thresholds, and the opt-in hard quality gate.
//!
//! Key behaviors
//! -------------
//! - [`Regularization`] bundles the entropy concentration, the ridge added to
//!   every variance denominator, and the weight of the moment penalties.
//! - [`DiagnosticThresholds`] bundles the advisory limits used when
//!   assessing a result.
//! - [`CalibrationOptions`] composes them with [`WeightBounds`] and
//!   [`SolverOptions`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Every component validates itself in `new`; [`CalibrationOptions::new`]
//!   only validates the fields it owns (`total`, `hard_failure_pct`).
//! - Whether `total` is reachable for a given sample size is checked at solve
//!   time, once `N` is known.
//!
//! Conventions
//! -----------
//! - Percent values (`max_pct_diff`, `min_efficiency_pct`,
//!   `hard_failure_pct`) are expressed in percent, not fractions.
//! - `total = None` means "normalize to the sample size `N`".
use crate::{
    calibration::{
        core::bounds::WeightBounds,
        errors::{ConfigError, ConfigResult},
    },
    optimization::loss_optimizer::SolverOptions,
};

/// Default entropy concentration.
pub const DEFAULT_CONCENTRATION: f64 = 1.0;

/// Default ridge added to variance denominators.
pub const DEFAULT_RIDGE: f64 = 1e-6;

/// Default weight of the moment-matching penalties.
pub const DEFAULT_MOMENT_WEIGHT: f64 = 1000.0;

/// Default per-variable deviation gate, in percent.
pub const DEFAULT_MAX_PCT_DIFF: f64 = 1.0;

/// Default weight-ratio warning threshold.
pub const DEFAULT_WEIGHT_RATIO_WARNING: f64 = 1000.0;

/// Default efficiency floor for the low-efficiency warning, in percent.
pub const DEFAULT_MIN_EFFICIENCY_PCT: f64 = 10.0;

/// Objective regularization.
///
/// - `concentration`: coefficient `c` of the entropy term
///   `(c / total)·Σ w_i ln(w_i / ū)`; larger values pull harder toward
///   uniform weights. It scales the term multiplicatively, so it must be
///   strictly positive: `c = 0` would drop the divergence from the loss.
/// - `ridge`: added to every variance normalization denominator so that
///   zero target variances do not divide by zero.
/// - `moment_weight`: multiplier `λ` of the mean and covariance penalties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regularization {
    pub concentration: f64,
    pub ridge: f64,
    pub moment_weight: f64,
}

impl Regularization {
    /// # Errors
    /// - [`ConfigError::InvalidConcentration`] unless finite and > 0.
    /// - [`ConfigError::InvalidRidge`] unless finite and ≥ 0.
    /// - [`ConfigError::InvalidMomentWeight`] unless finite and > 0.
    pub fn new(concentration: f64, ridge: f64, moment_weight: f64) -> ConfigResult<Self> {
        if !concentration.is_finite() || concentration <= 0.0 {
            return Err(ConfigError::InvalidConcentration { value: concentration });
        }
        if !ridge.is_finite() || ridge < 0.0 {
            return Err(ConfigError::InvalidRidge { value: ridge });
        }
        if !moment_weight.is_finite() || moment_weight <= 0.0 {
            return Err(ConfigError::InvalidMomentWeight { value: moment_weight });
        }
        Ok(Self { concentration, ridge, moment_weight })
    }
}

impl Default for Regularization {
    fn default() -> Self {
        Self {
            concentration: DEFAULT_CONCENTRATION,
            ridge: DEFAULT_RIDGE,
            moment_weight: DEFAULT_MOMENT_WEIGHT,
        }
    }
}

/// Advisory limits applied when assessing a result.
///
/// - `max_pct_diff`: a row is within tolerance when `|pct_diff| <` this.
/// - `weight_ratio_warning`: warn when `max(w)/min(w)` exceeds this.
/// - `min_efficiency_pct`: warn when Kish efficiency falls below this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticThresholds {
    pub max_pct_diff: f64,
    pub weight_ratio_warning: f64,
    pub min_efficiency_pct: f64,
}

impl DiagnosticThresholds {
    /// # Errors
    /// [`ConfigError::InvalidThreshold`] for any non-finite or non-positive
    /// value.
    pub fn new(
        max_pct_diff: f64, weight_ratio_warning: f64, min_efficiency_pct: f64,
    ) -> ConfigResult<Self> {
        for (name, value) in [
            ("max_pct_diff", max_pct_diff),
            ("weight_ratio_warning", weight_ratio_warning),
            ("min_efficiency_pct", min_efficiency_pct),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        Ok(Self { max_pct_diff, weight_ratio_warning, min_efficiency_pct })
    }
}

impl Default for DiagnosticThresholds {
    fn default() -> Self {
        Self {
            max_pct_diff: DEFAULT_MAX_PCT_DIFF,
            weight_ratio_warning: DEFAULT_WEIGHT_RATIO_WARNING,
            min_efficiency_pct: DEFAULT_MIN_EFFICIENCY_PCT,
        }
    }
}

/// Solve-time configuration.
///
/// Fields
/// ------
/// - `bounds`: per-weight box constraints (default `[0.01, 100]`).
/// - `total`: normalization constant `Σw`; `None` means `N`.
/// - `regularization`: objective regularization (see [`Regularization`]).
/// - `solver`: L-BFGS configuration.
/// - `thresholds`: diagnostic thresholds.
/// - `hard_failure_pct`: when `Some(p)`, a non-converged run with any
///   `|pct_diff| > p` is returned as an `UnacceptableResult` error instead
///   of a result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationOptions {
    pub bounds: WeightBounds,
    pub total: Option<f64>,
    pub regularization: Regularization,
    pub solver: SolverOptions,
    pub thresholds: DiagnosticThresholds,
    pub hard_failure_pct: Option<f64>,
}

impl CalibrationOptions {
    /// # Errors
    /// - [`ConfigError::InvalidTotal`] for a non-finite or non-positive total.
    /// - [`ConfigError::InvalidThreshold`] for an invalid `hard_failure_pct`.
    pub fn new(
        bounds: WeightBounds, total: Option<f64>, regularization: Regularization,
        solver: SolverOptions, thresholds: DiagnosticThresholds, hard_failure_pct: Option<f64>,
    ) -> ConfigResult<Self> {
        if let Some(value) = total {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidTotal { value });
            }
        }
        if let Some(value) = hard_failure_pct {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidThreshold { name: "hard_failure_pct", value });
            }
        }
        Ok(Self { bounds, total, regularization, solver, thresholds, hard_failure_pct })
    }

    /// Normalization constant for a sample of size `n`.
    pub fn total_for(&self, n: usize) -> f64 {
        self.total.unwrap_or(n as f64)
    }
}
