//! Python-side input helpers for the `python-bindings` feature.
//!
//! Convert numpy arrays, pandas objects, and plain sequences into contiguous
//! `f64` arrays, and keyword arguments into validated calibration options.
#[cfg(feature = "python-bindings")]
use ndarray::Array2;

#[cfg(feature = "python-bindings")]
use pyo3::{
    exceptions::{PyTypeError, PyValueError},
    prelude::*,
    types::PyAny,
};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Vec / Array2 → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray1,
    PyReadonlyArray2,
};

#[cfg(feature = "python-bindings")]
use crate::{
    calibration::core::{
        bounds::WeightBounds,
        options::{CalibrationOptions, DiagnosticThresholds, Regularization},
    },
    optimization::loss_optimizer::{
        DEFAULT_MAX_ITER, DEFAULT_TOL_COST, DEFAULT_TOL_GRAD, LineSearcher, SolverOptions,
        Tolerances,
    },
};

/// Accept a 1-D float64 numpy array, a pandas Series, or a sequence of
/// floats.
#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_array<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray1<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray1<f64>>() {
        if arr_ro.as_slice().is_ok() {
            return Ok(arr_ro);
        }
    }

    if let Ok(obj) = raw_data.call_method0("to_numpy") {
        if let Ok(series_ro) = obj.extract::<PyReadonlyArray1<f64>>() {
            if series_ro.as_slice().is_ok() {
                return Ok(series_ro);
            }
        }
    }

    let vec: Vec<f64> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err("expected a 1-D numpy.ndarray, pandas.Series, or sequence of float64")
    })?;
    Ok(vec.into_pyarray(py).readonly())
}

/// Accept a 2-D float64 numpy array, a pandas DataFrame, or a sequence of
/// equal-length rows.
#[cfg(feature = "python-bindings")]
pub fn extract_f64_matrix<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray2<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr_ro);
    }

    if let Ok(obj) = raw_data.call_method0("to_numpy") {
        if let Ok(frame_ro) = obj.extract::<PyReadonlyArray2<f64>>() {
            return Ok(frame_ro);
        }
    }

    let rows: Vec<Vec<f64>> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err(
            "expected a 2-D numpy.ndarray, pandas.DataFrame, or sequence of float64 rows",
        )
    })?;
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(PyValueError::new_err("all rows must have the same length"));
    }
    let nrows = rows.len();
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let matrix = Array2::from_shape_vec((nrows, ncols), flat)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(matrix.into_pyarray(py).readonly())
}

/// Build L-BFGS options from Python keyword arguments.
#[cfg(feature = "python-bindings")]
pub fn extract_solver_opts(
    tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    line_searcher: Option<&str>, history_size: Option<usize>, verbose: bool,
) -> PyResult<SolverOptions> {
    let to_value_error = |e: crate::optimization::errors::OptError| {
        PyValueError::new_err(e.to_string())
    };
    let tols = Tolerances::new(
        Some(tol_grad.unwrap_or(DEFAULT_TOL_GRAD)),
        Some(tol_cost.unwrap_or(DEFAULT_TOL_COST)),
        Some(max_iter.unwrap_or(DEFAULT_MAX_ITER)),
    )
    .map_err(to_value_error)?;
    let ls = match line_searcher {
        Some(name) => name.parse::<LineSearcher>().map_err(to_value_error)?,
        None => LineSearcher::MoreThuente,
    };
    SolverOptions::new(tols, ls, verbose, history_size).map_err(to_value_error)
}

/// Build full calibration options from Python keyword arguments.
#[cfg(feature = "python-bindings")]
pub fn extract_calibration_opts(
    bounds: (f64, f64), total: Option<f64>, regularization: (f64, f64, f64),
    solver: SolverOptions, thresholds: (f64, f64, f64), hard_failure_pct: Option<f64>,
) -> PyResult<CalibrationOptions> {
    let bounds = WeightBounds::new(bounds.0, bounds.1)?;
    let regularization = Regularization::new(regularization.0, regularization.1, regularization.2)?;
    let thresholds = DiagnosticThresholds::new(thresholds.0, thresholds.1, thresholds.2)?;
    Ok(CalibrationOptions::new(
        bounds,
        total,
        regularization,
        solver,
        thresholds,
        hard_failure_pct,
    )?)
}
