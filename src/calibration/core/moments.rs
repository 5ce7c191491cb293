//! Moment targets: validated population means, covariance, and mask.
//!
//! Purpose
//! -------
//! Represent the target moment structure a calibration must reproduce: one
//! mean per variable, a covariance matrix that may be singular or only
//! partially known, and a binary mask telling which covariance entries are
//! trustworthy. Entries outside the mask are ignored entirely by the solver.
//!
//! Key behaviors
//! -------------
//! - [`MomentMask::new`] validates shapes, finiteness, mask symmetry and
//!   binarity, and a fully constrained diagonal.
//! - [`MomentMask::constrained_pairs`] exposes the mask as a sparse list of
//!   upper-triangle [`CovConstraint`]s, which is what the objective iterates
//!   over.
//! - [`MomentMask::validate_design`] checks a design matrix against the
//!   variable list before a solve, including that every target mean lies
//!   inside the range its column can reach.
//!
//! Invariants
//! ----------
//! - `variable_names.len() == target_mean.len() == K`; `target_cov` and
//!   `cov_mask` are K×K.
//! - The mask is symmetric with `mask[k, k] == 1` for every `k`.
//! - Target variances are non-negative; off-diagonal placeholders may hold
//!   any finite value, but masked off-diagonal targets are symmetric.
use std::collections::HashSet;

use ndarray::{Array1, Array2, ArrayView2};

use crate::calibration::errors::{ConfigError, ConfigResult};

/// Relative tolerance when comparing the two halves of a masked
/// off-diagonal covariance target.
const SYMMETRY_TOL: f64 = 1e-10;

/// One constrained covariance entry `(i, j)` with `i ≤ j`.
///
/// `multiplicity` is 2 for off-diagonal entries (the pair stands for both
/// `(i, j)` and `(j, i)`) and 1 on the diagonal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CovConstraint {
    pub i: usize,
    pub j: usize,
    pub target: f64,
    pub multiplicity: f64,
}

impl CovConstraint {
    pub fn is_variance(&self) -> bool {
        self.i == self.j
    }
}

/// Validated target moments with a covariance mask.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentMask {
    variable_names: Vec<String>,
    target_mean: Array1<f64>,
    target_cov: Array2<f64>,
    cov_mask: Array2<bool>,
    constraints: Vec<CovConstraint>,
}

impl MomentMask {
    /// Build validated moment targets.
    ///
    /// `cov_mask` is given as numbers so it can come straight from numeric
    /// arrays; every entry must be exactly `0.0` or `1.0`.
    ///
    /// # Errors
    /// - [`ConfigError::EmptyVariables`], [`ConfigError::DuplicateVariable`].
    /// - Shape mismatches for the mean, covariance, and mask.
    /// - Non-finite targets, negative variances.
    /// - Non-binary or asymmetric masks, or a zero on the mask diagonal.
    /// - [`ConfigError::AsymmetricTargetCov`] if a masked pair has different
    ///   targets at `(i, j)` and `(j, i)`.
    pub fn new(
        variable_names: Vec<String>, target_mean: Array1<f64>, target_cov: Array2<f64>,
        cov_mask: Array2<f64>,
    ) -> ConfigResult<Self> {
        let k = variable_names.len();
        if k == 0 {
            return Err(ConfigError::EmptyVariables);
        }
        let mut seen = HashSet::with_capacity(k);
        for name in &variable_names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateVariable { name: name.clone() });
            }
        }
        if target_mean.len() != k {
            return Err(ConfigError::MeanLengthMismatch { expected: k, actual: target_mean.len() });
        }
        let (rows, cols) = target_cov.dim();
        if rows != k || cols != k {
            return Err(ConfigError::CovShapeMismatch { expected: k, rows, cols });
        }
        let (rows, cols) = cov_mask.dim();
        if rows != k || cols != k {
            return Err(ConfigError::MaskShapeMismatch { expected: k, rows, cols });
        }

        for (index, &value) in target_mean.iter().enumerate() {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteTargetMean { index, value });
            }
        }
        for ((row, col), &value) in target_cov.indexed_iter() {
            if !value.is_finite() {
                return Err(ConfigError::NonFiniteTargetCov { row, col, value });
            }
        }
        for index in 0..k {
            let value = target_cov[[index, index]];
            if value < 0.0 {
                return Err(ConfigError::NegativeTargetVariance { index, value });
            }
        }

        for ((row, col), &value) in cov_mask.indexed_iter() {
            if value != 0.0 && value != 1.0 {
                return Err(ConfigError::NonBinaryMask { row, col, value });
            }
        }
        for row in 0..k {
            if cov_mask[[row, row]] == 0.0 {
                return Err(ConfigError::MaskDiagonalZero { index: row });
            }
            for col in (row + 1)..k {
                if cov_mask[[row, col]] != cov_mask[[col, row]] {
                    return Err(ConfigError::AsymmetricMask { row, col });
                }
                if cov_mask[[row, col]] == 1.0 {
                    let (upper, lower) = (target_cov[[row, col]], target_cov[[col, row]]);
                    let scale = upper.abs().max(lower.abs()).max(1.0);
                    if (upper - lower).abs() > SYMMETRY_TOL * scale {
                        return Err(ConfigError::AsymmetricTargetCov { row, col, upper, lower });
                    }
                }
            }
        }

        let cov_mask = cov_mask.mapv(|v| v == 1.0);
        let constraints = build_constraints(&target_cov, &cov_mask);
        Ok(Self { variable_names, target_mean, target_cov, cov_mask, constraints })
    }

    /// Targets with every covariance entry constrained.
    pub fn fully_observed(
        variable_names: Vec<String>, target_mean: Array1<f64>, target_cov: Array2<f64>,
    ) -> ConfigResult<Self> {
        let k = variable_names.len();
        Self::new(variable_names, target_mean, target_cov, Array2::ones((k, k)))
    }

    /// Number of variables `K`.
    pub fn dim(&self) -> usize {
        self.variable_names.len()
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variable_names.iter().position(|n| n == name)
    }

    pub fn target_mean(&self) -> &Array1<f64> {
        &self.target_mean
    }

    pub fn target_cov(&self) -> &Array2<f64> {
        &self.target_cov
    }

    pub fn cov_mask(&self) -> &Array2<bool> {
        &self.cov_mask
    }

    /// Target variance of variable `k`.
    pub fn target_variance(&self, k: usize) -> f64 {
        self.target_cov[[k, k]]
    }

    /// Whether covariance entry `(i, j)` must be matched.
    ///
    /// Out-of-range indices are reported as unconstrained.
    pub fn is_constrained(&self, i: usize, j: usize) -> bool {
        self.cov_mask.get((i, j)).copied().unwrap_or(false)
    }

    /// Constrained upper-triangle entries, diagonal included, in row-major
    /// order.
    pub fn constrained_pairs(&self) -> &[CovConstraint] {
        &self.constraints
    }

    /// Number of constrained off-diagonal pairs `(i, j)` with `i < j`.
    pub fn n_constrained_covariances(&self) -> usize {
        self.constraints.iter().filter(|c| !c.is_variance()).count()
    }

    /// Check a design matrix against the variable list.
    ///
    /// # Errors
    /// - [`ConfigError::DesignColumnMismatch`] if the column count is not `K`.
    /// - [`ConfigError::TooFewRows`] for fewer than two respondents.
    /// - [`ConfigError::NonFiniteDesign`] for the first NaN/±∞ entry.
    /// - [`ConfigError::TargetMeanOutOfRange`] if a target mean lies outside
    ///   `[min_i X[i, k], max_i X[i, k]]`; no positive weighting can reach it.
    pub fn validate_design(&self, design: ArrayView2<f64>) -> ConfigResult<()> {
        let (rows, cols) = design.dim();
        if cols != self.dim() {
            return Err(ConfigError::DesignColumnMismatch { expected: self.dim(), actual: cols });
        }
        if rows < 2 {
            return Err(ConfigError::TooFewRows { rows });
        }
        if let Some(((row, col), &value)) = design.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::NonFiniteDesign { row, col, value });
        }
        for (k, column) in design.columns().into_iter().enumerate() {
            let lower = column.fold(f64::INFINITY, |acc, &v| acc.min(v));
            let upper = column.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
            let target = self.target_mean[k];
            if target < lower || target > upper {
                return Err(ConfigError::TargetMeanOutOfRange {
                    variable: self.variable_names[k].clone(),
                    target,
                    lower,
                    upper,
                });
            }
        }
        Ok(())
    }
}

fn build_constraints(target_cov: &Array2<f64>, mask: &Array2<bool>) -> Vec<CovConstraint> {
    let k = target_cov.nrows();
    let mut constraints = Vec::new();
    for i in 0..k {
        for j in i..k {
            if mask[[i, j]] {
                let multiplicity = if i == j { 1.0 } else { 2.0 };
                constraints.push(CovConstraint { i, j, target: target_cov[[i, j]], multiplicity });
            }
        }
    }
    constraints
}
