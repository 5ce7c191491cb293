//! masked_calibration — masked KL-divergence survey calibration with Python
//! bindings.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the calibrator to Python. Given a respondent-level design matrix
//! and population targets whose covariance is only partially trusted, the
//! crate finds weights that stay as close to uniform as possible while
//! matching the trusted moments inside box bounds.
//!
//! Key behaviors
//! -------------
//! - Re-export the core Rust modules: `calibration` (targets, weight map,
//!   objective, diagnostics, calibrator) and `optimization` (the L-BFGS
//!   layer and its numerical helpers).
//! - With `python-bindings`, define the `KLCalibrator` and
//!   `CalibrationReport` classes and the `masked_calibration` module.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; this file performs only
//!   FFI glue, input conversion, and error mapping.
//! - Configuration errors surface in Python as `ValueError`, optimization
//!   failures as `RuntimeError`.
//!
//! Conventions
//! -----------
//! - Design matrices are N×K with columns in the order of the variable
//!   names; masks are K×K with 0/1 entries.
//! - Weights returned to Python are plain lists of floats.
//!
//! Downstream usage
//! ----------------
//! ```
//! use masked_calibration::calibration::{MaskedKLCalibrator, MomentMask};
//! use ndarray::array;
//!
//! let design = array![[0.0, 1.0], [0.0, 2.0], [1.0, 1.0], [1.0, 2.0]];
//! let targets = MomentMask::fully_observed(
//!     vec!["flag".to_string(), "score".to_string()],
//!     array![0.5, 1.5],
//!     array![[0.25, 0.0], [0.0, 0.25]],
//! )?;
//! let result = MaskedKLCalibrator::default().solve(&targets, design.view())?;
//! assert!(result.acceptable());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Testing notes
//! -------------
//! - Core numerical behavior is covered by unit tests in the inner modules
//!   and by `tests/integration_calibration_pipeline.rs`.

pub mod calibration;
pub mod optimization;
pub mod utils;

#[cfg(feature = "python-bindings")]
use numpy::PyReadonlyArray2;

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    calibration::{
        calibrators::MaskedKLCalibrator,
        core::{
            bounds::{DEFAULT_MAX_WEIGHT, DEFAULT_MIN_WEIGHT},
            diagnostics::MomentKind,
            moments::MomentMask,
            options::{
                DEFAULT_CONCENTRATION, DEFAULT_MAX_PCT_DIFF, DEFAULT_MIN_EFFICIENCY_PCT,
                DEFAULT_MOMENT_WEIGHT, DEFAULT_RIDGE, DEFAULT_WEIGHT_RATIO_WARNING,
            },
            result::CalibrationResult,
        },
    },
    utils::{extract_calibration_opts, extract_f64_array, extract_f64_matrix, extract_solver_opts},
};

/// KLCalibrator — Python-facing wrapper for [`MaskedKLCalibrator`].
///
/// Purpose
/// -------
/// Build a calibrator once from keyword arguments and run any number of
/// solves against numpy inputs.
///
/// Parameters
/// ----------
/// Constructed from Python via `KLCalibrator(min_weight=0.01, ...)`:
/// - `min_weight`, `max_weight`, `total`: weight bounds and the sum of the
///   weights (`None` = number of respondents).
/// - `concentration`, `ridge`, `moment_weight`: objective regularization.
/// - `tol_grad`, `tol_cost`, `max_iter`, `line_searcher`, `history_size`,
///   `verbose`: L-BFGS configuration.
/// - `max_pct_diff`, `weight_ratio_warning`, `min_efficiency_pct`,
///   `hard_failure_pct`: diagnostics thresholds and the hard gate.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "masked_calibration", frozen)]
pub struct KLCalibrator {
    inner: MaskedKLCalibrator,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl KLCalibrator {
    #[new]
    #[pyo3(
        signature = (
            min_weight = DEFAULT_MIN_WEIGHT,
            max_weight = DEFAULT_MAX_WEIGHT,
            total = None,
            concentration = DEFAULT_CONCENTRATION,
            ridge = DEFAULT_RIDGE,
            moment_weight = DEFAULT_MOMENT_WEIGHT,
            tol_grad = None,
            tol_cost = None,
            max_iter = None,
            line_searcher = None,
            history_size = None,
            verbose = false,
            max_pct_diff = DEFAULT_MAX_PCT_DIFF,
            weight_ratio_warning = DEFAULT_WEIGHT_RATIO_WARNING,
            min_efficiency_pct = DEFAULT_MIN_EFFICIENCY_PCT,
            hard_failure_pct = None,
        ),
        text_signature = "(min_weight=0.01, max_weight=100.0, total=None, concentration=1.0, \
                          ridge=1e-6, moment_weight=1000.0, tol_grad=None, tol_cost=None, \
                          max_iter=None, line_searcher=None, history_size=None, verbose=False, \
                          max_pct_diff=1.0, weight_ratio_warning=1000.0, \
                          min_efficiency_pct=10.0, hard_failure_pct=None)"
    )]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        min_weight: f64, max_weight: f64, total: Option<f64>, concentration: f64, ridge: f64,
        moment_weight: f64, tol_grad: Option<f64>, tol_cost: Option<f64>,
        max_iter: Option<usize>, line_searcher: Option<&str>, history_size: Option<usize>,
        verbose: bool, max_pct_diff: f64, weight_ratio_warning: f64, min_efficiency_pct: f64,
        hard_failure_pct: Option<f64>,
    ) -> PyResult<Self> {
        let solver =
            extract_solver_opts(tol_grad, tol_cost, max_iter, line_searcher, history_size, verbose)?;
        let options = extract_calibration_opts(
            (min_weight, max_weight),
            total,
            (concentration, ridge, moment_weight),
            solver,
            (max_pct_diff, weight_ratio_warning, min_efficiency_pct),
            hard_failure_pct,
        )?;
        Ok(KLCalibrator { inner: MaskedKLCalibrator::new(options) })
    }

    /// Calibrate `design` (N×K) to the given targets.
    ///
    /// `cov_mask` defaults to all ones. `initial_weights` warm-starts the
    /// solve from an existing weight vector.
    #[pyo3(
        signature = (
            design,
            variable_names,
            target_mean,
            target_cov,
            cov_mask = None,
            initial_weights = None,
        ),
        text_signature = "(self, design, variable_names, target_mean, target_cov, /, \
                          cov_mask=None, initial_weights=None)"
    )]
    pub fn solve<'py>(
        &self, py: Python<'py>, design: &Bound<'py, PyAny>, variable_names: Vec<String>,
        target_mean: &Bound<'py, PyAny>, target_cov: &Bound<'py, PyAny>,
        cov_mask: Option<&Bound<'py, PyAny>>, initial_weights: Option<&Bound<'py, PyAny>>,
    ) -> PyResult<CalibrationReport> {
        let design_arr: PyReadonlyArray2<f64> = extract_f64_matrix(py, design)?;
        let mean = extract_f64_array(py, target_mean)?.as_array().to_owned();
        let cov = extract_f64_matrix(py, target_cov)?.as_array().to_owned();
        let targets = match cov_mask {
            Some(mask) => {
                let mask = extract_f64_matrix(py, mask)?.as_array().to_owned();
                MomentMask::new(variable_names, mean, cov, mask)?
            }
            None => MomentMask::fully_observed(variable_names, mean, cov)?,
        };
        let design_view = design_arr.as_array();
        let result = match initial_weights {
            Some(raw) => {
                let w = extract_f64_array(py, raw)?;
                self.inner.solve_from_weights(&targets, design_view, w.as_array())?
            }
            None => self.inner.solve(&targets, design_view)?,
        };
        Ok(CalibrationReport { inner: result })
    }
}

/// CalibrationReport — read-only view of a [`CalibrationResult`] for Python.
///
/// Instances are produced by `KLCalibrator.solve` and are not created
/// directly by user code. Accessors copy into Python-owned containers.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "masked_calibration", frozen)]
pub struct CalibrationReport {
    inner: CalibrationResult,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl CalibrationReport {
    #[getter]
    pub fn weights(&self) -> Vec<f64> {
        self.inner.weights.as_array().to_vec()
    }

    #[getter]
    pub fn converged(&self) -> bool {
        self.inner.converged
    }

    #[getter]
    pub fn status(&self) -> String {
        self.inner.termination.to_string()
    }

    #[getter]
    pub fn iterations(&self) -> usize {
        self.inner.iterations
    }

    #[getter]
    pub fn objective_value(&self) -> f64 {
        self.inner.objective_value
    }

    #[getter]
    pub fn trace(&self) -> Vec<f64> {
        self.inner.trace.clone()
    }

    #[getter]
    pub fn achieved_mean(&self) -> Vec<f64> {
        self.inner.achieved_mean().to_vec()
    }

    /// Masked off-diagonal covariances as `(i, j, achieved)`.
    #[getter]
    pub fn achieved_covariances(&self) -> Vec<(usize, usize, f64)> {
        self.inner.achieved_masked_covariances().to_vec()
    }

    /// Rows of `(variable, moment, target, achieved, pct_diff, within_tolerance)`;
    /// `pct_diff` is `None` when the target is zero.
    #[getter]
    pub fn marginals(&self) -> Vec<(String, String, f64, f64, Option<f64>, bool)> {
        self.inner
            .rows()
            .iter()
            .map(|r| {
                let moment = match &r.kind {
                    MomentKind::Mean => "mean".to_string(),
                    MomentKind::Variance => "variance".to_string(),
                    MomentKind::Covariance { other } => format!("cov:{other}"),
                };
                (r.variable.clone(), moment, r.target, r.achieved, r.deviation.pct(), r.within_tolerance)
            })
            .collect()
    }

    #[getter]
    pub fn weight_ratio(&self) -> f64 {
        self.inner.weight_ratio()
    }

    #[getter]
    pub fn effective_sample_size(&self) -> f64 {
        self.inner.effective_sample_size()
    }

    #[getter]
    pub fn efficiency_pct(&self) -> f64 {
        self.inner.efficiency_pct()
    }

    #[getter]
    pub fn acceptable(&self) -> bool {
        self.inner.acceptable()
    }

    #[getter]
    pub fn n_projected(&self) -> usize {
        self.inner.n_projected
    }

    #[getter]
    pub fn warnings(&self) -> Vec<String> {
        self.inner.warnings().iter().map(|w| w.to_string()).collect()
    }
}

/// masked_calibration — PyO3 module initializer for the Python extension.
#[cfg(feature = "python-bindings")]
#[pymodule]
#[pyo3(name = "masked_calibration")]
fn py_masked_calibration<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    m.add_class::<KLCalibrator>()?;
    m.add_class::<CalibrationReport>()?;
    Ok(())
}
