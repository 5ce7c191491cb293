//! Errors for masked calibration (moment targets, design matrix, weight
//! bounds, tuning values, warm starts, and optimizer failures).
//!
//! This module defines the configuration error type, [`ConfigError`], raised
//! before any optimization happens, and the solve-level error type,
//! [`CalibrationError`], which also covers mid-run numerical failures and the
//! opt-in hard quality gate. Both implement `Display`/`Error` and, with the
//! `python-bindings` feature, convert to `PyErr`.
//!
//! ## Conventions
//! - **Indices are 0-based**; matrix positions are `(row, col)`.
//! - Configuration errors are fatal and never retried.
//! - Optimizer failures other than non-finite losses keep their
//!   [`OptError`] payload in [`CalibrationError::Solver`].
use ndarray::Array1;

use crate::{calibration::core::result::CalibrationResult, optimization::errors::OptError};

#[cfg(feature = "python-bindings")]
use pyo3::{
    PyErr,
    exceptions::{PyRuntimeError, PyValueError},
};

/// Result alias for validated constructors that may produce [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Crate-wide result alias for calibration solves.
pub type CalResult<T> = Result<T, CalibrationError>;

/// Invalid input detected before optimization.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    // ---- Moment targets ----
    /// At least one variable is required.
    EmptyVariables,

    /// Variable names must be unique.
    DuplicateVariable { name: String },

    /// Target mean length must equal the number of variables.
    MeanLengthMismatch { expected: usize, actual: usize },

    /// Target covariance must be K×K.
    CovShapeMismatch { expected: usize, rows: usize, cols: usize },

    /// Covariance mask must be K×K.
    MaskShapeMismatch { expected: usize, rows: usize, cols: usize },

    /// Target mean entries must be finite.
    NonFiniteTargetMean { index: usize, value: f64 },

    /// Target covariance entries must be finite (placeholders included).
    NonFiniteTargetCov { row: usize, col: usize, value: f64 },

    /// Target variances must be non-negative.
    NegativeTargetVariance { index: usize, value: f64 },

    /// Mask entries must be exactly 0 or 1.
    NonBinaryMask { row: usize, col: usize, value: f64 },

    /// Mask must be symmetric.
    AsymmetricMask { row: usize, col: usize },

    /// Variances are always constrained; the mask diagonal must be 1.
    MaskDiagonalZero { index: usize },

    /// Masked off-diagonal targets must satisfy `cov[i, j] == cov[j, i]`.
    AsymmetricTargetCov { row: usize, col: usize, upper: f64, lower: f64 },

    // ---- Design matrix ----
    /// Design matrix columns must match the variable list.
    DesignColumnMismatch { expected: usize, actual: usize },

    /// At least two respondents are required.
    TooFewRows { rows: usize },

    /// Design matrix entries must be finite.
    NonFiniteDesign { row: usize, col: usize, value: f64 },

    /// A target mean must lie within the range of its design column.
    TargetMeanOutOfRange { variable: String, target: f64, lower: f64, upper: f64 },

    // ---- Weight bounds and normalization ----
    /// Bounds must be finite with 0 < min < max.
    InvalidWeightBounds { min: f64, max: f64, reason: &'static str },

    /// Normalization total must be finite and > 0.
    InvalidTotal { value: f64 },

    /// `N·min ≤ total ≤ N·max` must hold.
    InfeasibleTotal { total: f64, lower: f64, upper: f64 },

    // ---- Tuning ----
    /// Entropy concentration must be finite and > 0.
    InvalidConcentration { value: f64 },

    /// Ridge must be finite and ≥ 0.
    InvalidRidge { value: f64 },

    /// Moment weight must be finite and > 0.
    InvalidMomentWeight { value: f64 },

    /// Diagnostic thresholds must be finite and > 0.
    InvalidThreshold { name: &'static str, value: f64 },

    // ---- Warm starts ----
    /// Warm-start vector length must equal the number of respondents.
    WarmStartLength { expected: usize, actual: usize },

    /// Warm-start weights cannot be produced by the parameterization.
    WeightsOutsideImage { index: usize, value: f64, reason: &'static str },
}

impl std::error::Error for ConfigError {}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Moment targets ----
            ConfigError::EmptyVariables => write!(f, "At least one variable is required"),
            ConfigError::DuplicateVariable { name } => {
                write!(f, "Duplicate variable name '{name}'")
            }
            ConfigError::MeanLengthMismatch { expected, actual } => {
                write!(f, "Target mean length mismatch: expected {expected}, actual {actual}")
            }
            ConfigError::CovShapeMismatch { expected, rows, cols } => {
                write!(f, "Target covariance must be {expected}x{expected}, got {rows}x{cols}")
            }
            ConfigError::MaskShapeMismatch { expected, rows, cols } => {
                write!(f, "Covariance mask must be {expected}x{expected}, got {rows}x{cols}")
            }
            ConfigError::NonFiniteTargetMean { index, value } => {
                write!(f, "Non-finite target mean at index {index}: {value}")
            }
            ConfigError::NonFiniteTargetCov { row, col, value } => {
                write!(f, "Non-finite target covariance at ({row}, {col}): {value}")
            }
            ConfigError::NegativeTargetVariance { index, value } => {
                write!(f, "Negative target variance at index {index}: {value}")
            }
            ConfigError::NonBinaryMask { row, col, value } => {
                write!(f, "Mask entry at ({row}, {col}) must be 0 or 1, got {value}")
            }
            ConfigError::AsymmetricMask { row, col } => {
                write!(f, "Mask is not symmetric at ({row}, {col})")
            }
            ConfigError::MaskDiagonalZero { index } => {
                write!(f, "Mask diagonal must be 1, got 0 at index {index}")
            }
            ConfigError::AsymmetricTargetCov { row, col, upper, lower } => {
                write!(
                    f,
                    "Masked covariance target is not symmetric at ({row}, {col}): {upper} vs {lower}"
                )
            }

            // ---- Design matrix ----
            ConfigError::DesignColumnMismatch { expected, actual } => {
                write!(f, "Design matrix has {actual} columns, expected {expected}")
            }
            ConfigError::TooFewRows { rows } => {
                write!(f, "Design matrix needs at least 2 rows, got {rows}")
            }
            ConfigError::NonFiniteDesign { row, col, value } => {
                write!(f, "Non-finite design value at ({row}, {col}): {value}")
            }
            ConfigError::TargetMeanOutOfRange { variable, target, lower, upper } => {
                write!(
                    f,
                    "Target mean {target} for '{variable}' is outside the design range \
                     [{lower}, {upper}]"
                )
            }

            // ---- Weight bounds and normalization ----
            ConfigError::InvalidWeightBounds { min, max, reason } => {
                write!(f, "Invalid weight bounds [{min}, {max}]: {reason}")
            }
            ConfigError::InvalidTotal { value } => {
                write!(f, "Invalid normalization total {value}: must be finite and > 0")
            }
            ConfigError::InfeasibleTotal { total, lower, upper } => {
                write!(f, "Normalization total {total} outside reachable range [{lower}, {upper}]")
            }

            // ---- Tuning ----
            ConfigError::InvalidConcentration { value } => {
                write!(f, "Invalid concentration {value}: must be finite and > 0")
            }
            ConfigError::InvalidRidge { value } => {
                write!(f, "Invalid ridge {value}: must be finite and >= 0")
            }
            ConfigError::InvalidMomentWeight { value } => {
                write!(f, "Invalid moment weight {value}: must be finite and > 0")
            }
            ConfigError::InvalidThreshold { name, value } => {
                write!(f, "Invalid {name} {value}: must be finite and > 0")
            }

            // ---- Warm starts ----
            ConfigError::WarmStartLength { expected, actual } => {
                write!(f, "Warm start length mismatch: expected {expected}, actual {actual}")
            }
            ConfigError::WeightsOutsideImage { index, value, reason } => {
                write!(f, "Warm-start weight at index {index} ({value}) is not reachable: {reason}")
            }
        }
    }
}

/// Solve-level failure.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Invalid input; nothing was optimized.
    Config(ConfigError),

    /// The loss or its gradient became non-finite mid-run.
    Optimization { reason: String, iterations: usize, last_iterate: Array1<f64> },

    /// Any other optimizer-layer failure.
    Solver(OptError),

    /// The run did not converge and some deviation exceeded the configured
    /// `hard_failure_pct`. The full result is kept for inspection.
    UnacceptableResult { max_abs_pct_diff: f64, threshold: f64, result: Box<CalibrationResult> },
}

impl std::error::Error for CalibrationError {}

impl std::fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationError::Config(err) => write!(f, "Configuration error: {err}"),
            CalibrationError::Optimization { reason, iterations, .. } => {
                write!(f, "Optimization failed after {iterations} iterations: {reason}")
            }
            CalibrationError::Solver(err) => write!(f, "Solver error: {err}"),
            CalibrationError::UnacceptableResult { max_abs_pct_diff, threshold, result } => {
                write!(
                    f,
                    "Calibration did not converge ({}) and deviates by {max_abs_pct_diff:.3}% \
                     (limit {threshold}%)",
                    result.termination
                )
            }
        }
    }
}

impl From<ConfigError> for CalibrationError {
    fn from(err: ConfigError) -> Self {
        CalibrationError::Config(err)
    }
}

impl From<OptError> for CalibrationError {
    fn from(err: OptError) -> Self {
        match err {
            OptError::NumericalFailure { reason, iterations, last_iterate } => {
                CalibrationError::Optimization { reason, iterations, last_iterate }
            }
            other => CalibrationError::Solver(other),
        }
    }
}

/// Configuration errors surface as Python `ValueError`.
#[cfg(feature = "python-bindings")]
impl From<ConfigError> for PyErr {
    fn from(err: ConfigError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// Configuration errors surface as `ValueError`; everything else as
/// `RuntimeError`.
#[cfg(feature = "python-bindings")]
impl From<CalibrationError> for PyErr {
    fn from(err: CalibrationError) -> PyErr {
        match err {
            CalibrationError::Config(_) => PyValueError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Numerical failures from the optimizer become `Optimization` errors
    // that keep the last finite iterate; other optimizer errors are wrapped.
    //
    // Given
    // -----
    // - `OptError::NumericalFailure` and `OptError::InvalidTolGrad`.
    //
    // Expect
    // ------
    // - `Optimization { iterations: 4, last_iterate }` and `Solver(_)`.
    fn opt_errors_map_onto_calibration_errors() {
        // Arrange
        let numerical = OptError::NumericalFailure {
            reason: "Non-finite cost value: inf".to_string(),
            iterations: 4,
            last_iterate: array![0.1, -0.1],
        };
        let config = OptError::InvalidTolGrad { tol: -1.0, reason: "x" };

        // Act
        let mapped_numerical = CalibrationError::from(numerical);
        let mapped_config = CalibrationError::from(config.clone());

        // Assert
        assert_eq!(
            mapped_numerical,
            CalibrationError::Optimization {
                reason: "Non-finite cost value: inf".to_string(),
                iterations: 4,
                last_iterate: array![0.1, -0.1],
            }
        );
        assert_eq!(mapped_config, CalibrationError::Solver(config));
    }

    #[test]
    // Purpose
    // -------
    // Messages name the offending position.
    //
    // Given
    // -----
    // - `AsymmetricMask { row: 0, col: 2 }` lifted into `CalibrationError`.
    //
    // Expect
    // ------
    // - The message mentions "(0, 2)".
    fn config_error_messages_name_positions() {
        // Act
        let err: CalibrationError = ConfigError::AsymmetricMask { row: 0, col: 2 }.into();

        // Assert
        assert!(err.to_string().contains("(0, 2)"));
    }
}
