//! Diagnostics: how well final weights reproduce the targets, and at what
//! cost in precision.
//!
//! Purpose
//! -------
//! Turn a weight vector into the report a survey analyst reads: achieved
//! versus target moments with relative deviations, the weight ratio, the
//! Kish effective sample size, an advisory quality gate, and structured
//! warnings. Nothing here fails; warnings are data.
//!
//! Key behaviors
//! -------------
//! - [`achieved_marginals`]: per variable, one mean row and one variance
//!   row; [`covariance_rows`] adds one row per masked off-diagonal pair.
//! - [`Deviation`]: percent difference `100·(a − t)/t`, or the absolute
//!   difference when `|t| < NEAR_ZERO`. Absolute differences are gated as
//!   fractions (`100·|a − t| < threshold`).
//! - [`effective_sample_size`]: `(Σw)²/Σw²` and its ratio to `N` in percent.
//! - [`weight_ratio`]: `max(w)/min(w)`.
//! - [`assess`]: bundles the above into [`Diagnostics`], including the
//!   `acceptable` flag and [`CalibrationWarning`]s.
use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::{
    calibration::core::{
        moments::MomentMask, objective::achieved_moments, options::DiagnosticThresholds,
    },
    optimization::numerical_stability::NEAR_ZERO,
};

/// Difference between an achieved and a target moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deviation {
    /// `100·(achieved − target)/target`.
    Percent(f64),
    /// `achieved − target`, used when the target is numerically zero.
    Absolute(f64),
}

impl Deviation {
    pub fn new(target: f64, achieved: f64) -> Self {
        if target.abs() < NEAR_ZERO {
            Deviation::Absolute(achieved - target)
        } else {
            Deviation::Percent(100.0 * (achieved - target) / target)
        }
    }

    /// Magnitude compared against percent thresholds.
    pub fn gate_value(&self) -> f64 {
        match self {
            Deviation::Percent(p) => p.abs(),
            Deviation::Absolute(d) => 100.0 * d.abs(),
        }
    }

    pub fn within(&self, threshold_pct: f64) -> bool {
        self.gate_value() < threshold_pct
    }

    /// Percent difference, if the target was not numerically zero.
    pub fn pct(&self) -> Option<f64> {
        match self {
            Deviation::Percent(p) => Some(*p),
            Deviation::Absolute(_) => None,
        }
    }
}

impl fmt::Display for Deviation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deviation::Percent(p) => write!(f, "{p:+.3}%"),
            Deviation::Absolute(d) => write!(f, "{d:+.3e} (abs)"),
        }
    }
}

/// Which moment a diagnostics row compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MomentKind {
    Mean,
    Variance,
    /// Covariance of the row's variable with `other`.
    Covariance { other: String },
}

/// One line of the diagnostics table.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalRow {
    pub variable: String,
    pub kind: MomentKind,
    pub target: f64,
    pub achieved: f64,
    pub deviation: Deviation,
    pub within_tolerance: bool,
}

impl MarginalRow {
    fn new(
        variable: &str, kind: MomentKind, target: f64, achieved: f64, threshold_pct: f64,
    ) -> Self {
        let deviation = Deviation::new(target, achieved);
        Self {
            variable: variable.to_string(),
            kind,
            target,
            achieved,
            within_tolerance: deviation.within(threshold_pct),
            deviation,
        }
    }
}

/// Kish effective sample size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveSampleSize {
    pub ess: f64,
    /// `100·ess/N`.
    pub efficiency_pct: f64,
}

/// Structured, non-fatal findings about a result.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationWarning {
    NotConverged { termination: String },
    LargeWeightRatio { ratio: f64, threshold: f64 },
    LowEfficiency { efficiency_pct: f64, floor_pct: f64 },
    MarginalDeviation { variable: String, kind: MomentKind, deviation: Deviation },
    WeightsProjected { count: usize },
}

impl fmt::Display for CalibrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationWarning::NotConverged { termination } => {
                write!(f, "optimizer did not converge: {termination}")
            }
            CalibrationWarning::LargeWeightRatio { ratio, threshold } => {
                write!(f, "weight ratio {ratio:.1} exceeds {threshold}")
            }
            CalibrationWarning::LowEfficiency { efficiency_pct, floor_pct } => {
                write!(f, "weighting efficiency {efficiency_pct:.1}% below {floor_pct}%")
            }
            CalibrationWarning::MarginalDeviation { variable, kind, deviation } => {
                write!(f, "{variable} ({kind:?}) deviates from target by {deviation}")
            }
            CalibrationWarning::WeightsProjected { count } => {
                write!(f, "{count} weights were pinned to a bound after optimization")
            }
        }
    }
}

/// Everything [`assess`] derives from a weight vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub achieved_mean: Array1<f64>,
    pub achieved_cov: Array2<f64>,
    /// Achieved masked off-diagonal covariances `(i, j, C_ij)`, `i < j`.
    pub achieved_masked: Vec<(usize, usize, f64)>,
    pub rows: Vec<MarginalRow>,
    pub effective_sample_size: EffectiveSampleSize,
    pub weight_ratio: f64,
    pub acceptable: bool,
    pub max_gate_value: f64,
    pub warnings: Vec<CalibrationWarning>,
}

/// Mean and variance rows for every variable, in variable order.
pub fn achieved_marginals(
    targets: &MomentMask, achieved_mean: ArrayView1<f64>, achieved_cov: ArrayView2<f64>,
    threshold_pct: f64,
) -> Vec<MarginalRow> {
    let mut rows = Vec::with_capacity(2 * targets.dim());
    for (k, name) in targets.variable_names().iter().enumerate() {
        rows.push(MarginalRow::new(
            name,
            MomentKind::Mean,
            targets.target_mean()[k],
            achieved_mean[k],
            threshold_pct,
        ));
        rows.push(MarginalRow::new(
            name,
            MomentKind::Variance,
            targets.target_variance(k),
            achieved_cov[[k, k]],
            threshold_pct,
        ));
    }
    rows
}

/// One row per masked off-diagonal covariance pair `(i, j)`, `i < j`.
pub fn covariance_rows(
    targets: &MomentMask, achieved_cov: ArrayView2<f64>, threshold_pct: f64,
) -> Vec<MarginalRow> {
    let names = targets.variable_names();
    targets
        .constrained_pairs()
        .iter()
        .filter(|c| !c.is_variance())
        .map(|c| {
            MarginalRow::new(
                &names[c.i],
                MomentKind::Covariance { other: names[c.j].clone() },
                c.target,
                achieved_cov[[c.i, c.j]],
                threshold_pct,
            )
        })
        .collect()
}

/// Kish effective sample size `(Σw)²/Σw²`.
pub fn effective_sample_size(weights: ArrayView1<f64>) -> EffectiveSampleSize {
    let n = weights.len() as f64;
    let (sum, sum_sq) = weights.fold((0.0, 0.0), |(s, sq), &w| (s + w, sq + w * w));
    if sum_sq == 0.0 || n == 0.0 {
        return EffectiveSampleSize { ess: 0.0, efficiency_pct: 0.0 };
    }
    let ess = sum * sum / sum_sq;
    EffectiveSampleSize { ess, efficiency_pct: 100.0 * ess / n }
}

/// `max(w)/min(w)`; infinite when the smallest weight is not positive.
pub fn weight_ratio(weights: ArrayView1<f64>) -> f64 {
    let min = weights.fold(f64::INFINITY, |a, &b| a.min(b));
    let max = weights.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if min <= 0.0 { f64::INFINITY } else { max / min }
}

/// Build the full diagnostics for final weights.
///
/// `converged`/`termination` describe the optimizer run and `projected` is
/// the number of weights pinned by the bound projection; both only feed
/// warnings.
pub fn assess(
    targets: &MomentMask, design: ArrayView2<f64>, weights: ArrayView1<f64>,
    thresholds: &DiagnosticThresholds, converged: bool, termination: &str, projected: usize,
) -> Diagnostics {
    let (achieved_mean, achieved_cov) = achieved_moments(design, weights);
    let mut rows = achieved_marginals(
        targets,
        achieved_mean.view(),
        achieved_cov.view(),
        thresholds.max_pct_diff,
    );
    rows.extend(covariance_rows(targets, achieved_cov.view(), thresholds.max_pct_diff));
    let achieved_masked = targets
        .constrained_pairs()
        .iter()
        .filter(|c| !c.is_variance())
        .map(|c| (c.i, c.j, achieved_cov[[c.i, c.j]]))
        .collect();

    let ess = effective_sample_size(weights);
    let ratio = weight_ratio(weights);
    let acceptable = rows.iter().all(|r| r.within_tolerance);
    let max_gate_value = rows.iter().map(|r| r.deviation.gate_value()).fold(0.0, f64::max);

    let mut warnings = Vec::new();
    if !converged {
        warnings.push(CalibrationWarning::NotConverged { termination: termination.to_string() });
    }
    if ratio > thresholds.weight_ratio_warning {
        warnings.push(CalibrationWarning::LargeWeightRatio {
            ratio,
            threshold: thresholds.weight_ratio_warning,
        });
    }
    if ess.efficiency_pct < thresholds.min_efficiency_pct {
        warnings.push(CalibrationWarning::LowEfficiency {
            efficiency_pct: ess.efficiency_pct,
            floor_pct: thresholds.min_efficiency_pct,
        });
    }
    for row in rows.iter().filter(|r| !r.within_tolerance) {
        warnings.push(CalibrationWarning::MarginalDeviation {
            variable: row.variable.clone(),
            kind: row.kind.clone(),
            deviation: row.deviation,
        });
    }
    if projected > 0 {
        warnings.push(CalibrationWarning::WeightsProjected { count: projected });
    }

    Diagnostics {
        achieved_mean,
        achieved_cov,
        achieved_masked,
        rows,
        effective_sample_size: ess,
        weight_ratio: ratio,
        acceptable,
        max_gate_value,
        warnings,
    }
}
