//! core — moment targets, weight map, objective, and diagnostics.
//!
//! Purpose
//! -------
//! Collect the building blocks of a masked KL calibration: validated target
//! moments with a covariance mask, weight bounds and the softmax-affine
//! weight parameterization, the masked objective driven by the optimizer,
//! and the diagnostics computed on final weights. The calibrator in
//! `calibration::calibrators` composes these into a solve.
//!
//! Key behaviors
//! -------------
//! - [`MomentMask`] validates target means, the (possibly singular) target
//!   covariance, and the binary mask, and exposes the mask as a sparse
//!   constraint list.
//! - [`WeightTransform`] maps unconstrained θ to bounded, normalized weights,
//!   pulls gradients back to θ, and inverts the map for warm starts.
//!   [`WeightBounds::project`] repairs bound overshoot after a solve.
//! - [`MaskedObjective`] implements the optimizer's `Objective` trait with an
//!   analytic gradient.
//! - [`assess`] turns final weights into [`Diagnostics`]: achieved moments,
//!   deviations, weight ratio, Kish effective sample size, warnings.
//!
//! Invariants & assumptions
//! ------------------------
//! - Variables are aligned by position: design column `k` is variable `k`
//!   of the [`MomentMask`].
//! - Weighted moments are population-style (divide by `Σw`).
//! - Every constructor validates its inputs and returns `ConfigError`;
//!   after construction, types assume finite data.
//!
//! Conventions
//! -----------
//! - Indexing is 0-based; covariance constraints are stored for `i ≤ j`.
//! - Percent quantities are in percent, not fractions.
//! - This module never logs; the calibrator does.
//!
//! Testing notes
//! -------------
//! - Unit tests in each submodule cover validation rules, the parameterization
//!   and its pull-back against finite differences, the objective gradient and
//!   mask respect, projection cascades, and diagnostics arithmetic.

pub mod bounds;
pub mod diagnostics;
pub mod moments;
pub mod objective;
pub mod options;
pub mod parameterization;
pub mod result;
pub mod stats;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::bounds::{DEFAULT_MAX_WEIGHT, DEFAULT_MIN_WEIGHT, WeightBounds};
pub use self::diagnostics::{
    CalibrationWarning, Deviation, Diagnostics, EffectiveSampleSize, MarginalRow, MomentKind,
    achieved_marginals, assess, covariance_rows, effective_sample_size, weight_ratio,
};
pub use self::moments::{CovConstraint, MomentMask};
pub use self::objective::{MaskedObjective, ObjectiveBreakdown, achieved_moments};
pub use self::options::{CalibrationOptions, DiagnosticThresholds, Regularization};
pub use self::parameterization::{MappedWeights, WeightTransform};
pub use self::result::{CalibrationResult, CalibrationWeights};

pub mod prelude {
    pub use super::bounds::WeightBounds;
    pub use super::diagnostics::{CalibrationWarning, MarginalRow, MomentKind};
    pub use super::moments::MomentMask;
    pub use super::options::{CalibrationOptions, DiagnosticThresholds, Regularization};
    pub use super::result::{CalibrationResult, CalibrationWeights};
}
