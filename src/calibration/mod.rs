//! calibration — masked KL-divergence survey calibration.
//!
//! Purpose
//! -------
//! Compute one weight per respondent so that weighted sample moments match
//! population targets whose covariance is only partially known. Weights
//! stay as close to uniform as the targets allow (minimum KL divergence),
//! inside box bounds, and sum to a fixed total.
//!
//! Key behaviors
//! -------------
//! - [`core`]: moment targets with a covariance mask ([`MomentMask`]), the
//!   bounded weight parameterization, the masked objective, and
//!   diagnostics.
//! - [`calibrators`]: [`MaskedKLCalibrator`], the solve entry point.
//! - [`errors`]: [`ConfigError`] for invalid inputs and [`CalibrationError`]
//!   for solve failures, with the `CalResult` alias.
//!
//! Invariants & assumptions
//! ------------------------
//! - Design-matrix column `k` is variable `k` of the targets.
//! - Final weights satisfy `min ≤ w_i ≤ max` and `Σw_i = total`.
//! - Only masked covariance entries influence a solve; unmasked entries are
//!   placeholders.
//!
//! Downstream usage
//! ----------------
//! 1. Build a [`MomentMask`] from names, target means, target covariance,
//!    and a 0/1 mask.
//! 2. Configure [`CalibrationOptions`] (bounds, total, regularization,
//!    L-BFGS settings, thresholds) or use the defaults.
//! 3. Call `MaskedKLCalibrator::new(options).solve(&targets, design.view())`
//!    and inspect the returned [`CalibrationResult`].
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each submodule; end-to-end scenarios live in
//!   `tests/integration_calibration_pipeline.rs`.

pub mod calibrators;
pub mod core;
pub mod errors;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::calibrators::MaskedKLCalibrator;
pub use self::core::{
    CalibrationOptions, CalibrationResult, CalibrationWarning, CalibrationWeights,
    DiagnosticThresholds, MarginalRow, MomentKind, MomentMask, Regularization, WeightBounds,
};
pub use self::errors::{CalResult, CalibrationError, ConfigError, ConfigResult};

pub mod prelude {
    pub use super::{
        CalResult, CalibrationError, CalibrationOptions, CalibrationResult, CalibrationWarning,
        CalibrationWeights, ConfigError, DiagnosticThresholds, MaskedKLCalibrator, MarginalRow,
        MomentKind, MomentMask, Regularization, WeightBounds,
    };
}
