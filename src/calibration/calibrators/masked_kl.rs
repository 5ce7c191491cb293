//! Masked KL calibrator: one solve from targets and a design matrix to a
//! [`CalibrationResult`].
//!
//! A solve runs in five steps:
//! 1. validate the design matrix against the [`MomentMask`] and build the
//!    [`WeightTransform`] for `N` respondents;
//! 2. minimize the [`MaskedObjective`] over θ with L-BFGS, starting from
//!    uniform weights (θ = 0), a previous weight vector, or a raw θ;
//! 3. map the best θ to weights and project them onto the weight bounds;
//! 4. compute diagnostics on the projected weights;
//! 5. apply the opt-in hard quality gate.
//!
//! The calibrator holds only options, so one instance can serve many
//! independent solves, including from several threads.
use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::{
    calibration::{
        core::{
            diagnostics::assess,
            moments::MomentMask,
            objective::MaskedObjective,
            options::CalibrationOptions,
            parameterization::WeightTransform,
            result::{CalibrationResult, CalibrationWeights},
        },
        errors::{CalResult, CalibrationError, ConfigError},
    },
    optimization::loss_optimizer::minimize,
};

/// Survey calibrator minimizing KL divergence from uniform weights subject
/// to masked moment constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskedKLCalibrator {
    pub options: CalibrationOptions,
}

impl MaskedKLCalibrator {
    pub fn new(options: CalibrationOptions) -> Self {
        MaskedKLCalibrator { options }
    }

    /// Calibrate starting from uniform weights.
    ///
    /// # Errors
    /// - [`CalibrationError::Config`] for a design matrix that does not fit
    ///   the targets (including a target mean outside its column's range),
    ///   or bounds that cannot reach the normalization total.
    /// - [`CalibrationError::Optimization`] when the loss or gradient turns
    ///   non-finite (e.g. a zero target variance with `ridge = 0`).
    /// - [`CalibrationError::UnacceptableResult`] when `hard_failure_pct` is
    ///   set and the run neither converged nor came within it.
    ///
    /// Hitting the iteration cap is not an error: the result carries
    /// `converged = false` and a `NotConverged` warning.
    pub fn solve(
        &self, targets: &MomentMask, design: ArrayView2<f64>,
    ) -> CalResult<CalibrationResult> {
        targets.validate_design(design)?;
        let transform = self.transform_for(design.nrows())?;
        self.run(targets, design.view(), transform, Array1::zeros(design.nrows()))
    }

    /// Calibrate starting from existing weights (e.g. a previous solve).
    ///
    /// # Errors
    /// As [`solve`](Self::solve), plus [`ConfigError::WarmStartLength`] and
    /// [`ConfigError::WeightsOutsideImage`] for weights the parameterization
    /// cannot produce.
    pub fn solve_from_weights(
        &self, targets: &MomentMask, design: ArrayView2<f64>, weights: ArrayView1<f64>,
    ) -> CalResult<CalibrationResult> {
        targets.validate_design(design)?;
        let transform = self.transform_for(design.nrows())?;
        let theta0 = transform.weights_to_raw(weights)?;
        self.run(targets, design.view(), transform, theta0)
    }

    /// Calibrate starting from a raw parameter vector θ₀ (length `N`).
    ///
    /// # Errors
    /// As [`solve`](Self::solve), plus [`ConfigError::WarmStartLength`].
    pub fn solve_from_theta(
        &self, targets: &MomentMask, design: ArrayView2<f64>, theta0: Array1<f64>,
    ) -> CalResult<CalibrationResult> {
        targets.validate_design(design)?;
        if theta0.len() != design.nrows() {
            return Err(ConfigError::WarmStartLength {
                expected: design.nrows(),
                actual: theta0.len(),
            }
            .into());
        }
        let transform = self.transform_for(design.nrows())?;
        self.run(targets, design.view(), transform, theta0)
    }

    fn transform_for(&self, n: usize) -> CalResult<WeightTransform> {
        let total = self.options.total_for(n);
        Ok(WeightTransform::new(self.options.bounds, n, total)?)
    }

    fn run<'a>(
        &self, targets: &'a MomentMask, design: ArrayView2<'a, f64>, transform: WeightTransform,
        theta0: Array1<f64>,
    ) -> CalResult<CalibrationResult> {
        log::info!(
            "calibrating {} respondents to {} variables ({} masked covariances)",
            design.nrows(),
            targets.dim(),
            targets.n_constrained_covariances()
        );
        let objective = MaskedObjective::new(targets, transform, self.options.regularization);
        let outcome = minimize(&objective, theta0, &design, &self.options.solver)?;
        let parts = objective.breakdown(&outcome.theta_hat, &design);

        let mut weights = transform.raw_to_weights(outcome.theta_hat.view()).weights;
        let n_projected = self.options.bounds.project(&mut weights, transform.total());
        let diagnostics = assess(
            targets,
            design,
            weights.view(),
            &self.options.thresholds,
            outcome.converged,
            &outcome.status,
            n_projected,
        );
        for warning in &diagnostics.warnings {
            log::warn!("{warning}");
        }
        log::info!(
            "calibration finished after {} iterations ({}): max deviation {:.4}%, ESS {:.1}",
            outcome.iterations,
            outcome.status,
            diagnostics.max_gate_value,
            diagnostics.effective_sample_size.ess
        );

        let result = CalibrationResult {
            weights: CalibrationWeights::new(weights),
            converged: outcome.converged,
            termination: outcome.termination,
            iterations: outcome.iterations,
            objective_value: outcome.value,
            objective: parts,
            grad_norm: outcome.grad_norm,
            fn_evals: outcome.fn_evals,
            trace: outcome.trace,
            n_projected,
            diagnostics,
        };
        match self.options.hard_failure_pct {
            Some(threshold) if !result.converged && result.max_abs_pct_diff() > threshold => {
                Err(CalibrationError::UnacceptableResult {
                    max_abs_pct_diff: result.max_abs_pct_diff(),
                    threshold,
                    result: Box::new(result),
                })
            }
            _ => Ok(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calibration::core::{bounds::WeightBounds, diagnostics::CalibrationWarning},
        optimization::loss_optimizer::{SolverOptions, Termination, Tolerances},
    };
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    // Eight respondents: a 0/1 indicator and a score, independent by design.
    fn design() -> Array2<f64> {
        array![
            [0.0, 1.0],
            [0.0, 2.0],
            [0.0, 3.0],
            [0.0, 4.0],
            [1.0, 1.0],
            [1.0, 2.0],
            [1.0, 3.0],
            [1.0, 4.0],
        ]
    }

    // Targets reachable by reweighting the indicator only.
    fn targets(p: f64) -> MomentMask {
        let names = vec!["flag".to_string(), "score".to_string()];
        MomentMask::fully_observed(
            names,
            array![p, 2.5],
            array![[p * (1.0 - p), 0.0], [0.0, 1.25]],
        )
        .unwrap()
    }

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // Solve flow on a tiny design: convergence and invariants, warm starts,
    // argument validation, and the hard quality gate.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // A feasible shift in one indicator converges, keeps the total and
    // bounds, and matches every target.
    //
    // Given
    // -----
    // - 8 respondents, flag share 0.5 → 0.6, score unchanged.
    //
    // Expect
    // ------
    // - converged, Σw = 8, flag mean ≈ 0.6, acceptable.
    fn feasible_shift_converges() {
        // Arrange
        let x = design();
        let calibrator = MaskedKLCalibrator::default();

        // Act
        let result = calibrator.solve(&targets(0.6), x.view()).unwrap();

        // Assert
        assert!(result.converged, "{}", result.termination);
        assert_abs_diff_eq!(result.weights.sum(), 8.0, epsilon = 1e-8);
        assert!(calibrator.options.bounds.contains_all(result.weights.as_array()));
        assert_abs_diff_eq!(result.achieved_mean()[0], 0.6, epsilon = 2e-3);
        assert!(result.acceptable());
        assert!(result.trace.last().unwrap() < &result.trace[0]);
        assert_eq!(result.n_projected, 0);
    }

    #[test]
    // Purpose
    // -------
    // Warm-starting from a converged solution stays at that solution.
    //
    // Given
    // -----
    // - Weights from a cold solve fed back through `solve_from_weights`.
    //
    // Expect
    // ------
    // - Same achieved flag mean within 1e-4.
    fn warm_start_from_previous_weights() {
        // Arrange
        let x = design();
        let calibrator = MaskedKLCalibrator::default();
        let first = calibrator.solve(&targets(0.6), x.view()).unwrap();

        // Act
        let second =
            calibrator.solve_from_weights(&targets(0.6), x.view(), first.weights.view()).unwrap();

        // Assert
        assert_abs_diff_eq!(second.achieved_mean()[0], first.achieved_mean()[0], epsilon = 1e-4);
    }

    #[test]
    // Purpose
    // -------
    // Argument problems surface as configuration errors before optimizing.
    //
    // Given
    // -----
    // - A design with the wrong column count, a θ₀ of the wrong length, and
    //   a flag mean target of 1.2 on a 0/1 column.
    //
    // Expect
    // ------
    // - `Config(DesignColumnMismatch)`, `Config(WarmStartLength)`, and
    //   `Config(TargetMeanOutOfRange)` for the flag.
    fn bad_arguments_are_config_errors() {
        // Arrange
        let calibrator = MaskedKLCalibrator::default();
        let wide = Array2::<f64>::zeros((8, 3));
        let x = design();

        // Act
        let wrong_cols = calibrator.solve(&targets(0.5), wide.view());
        let wrong_theta = calibrator.solve_from_theta(&targets(0.5), x.view(), Array1::zeros(3));
        let unreachable = MomentMask::fully_observed(
            vec!["flag".to_string(), "score".to_string()],
            array![1.2, 2.5],
            array![[0.25, 0.0], [0.0, 1.25]],
        )
        .unwrap();
        let out_of_range = calibrator.solve_from_theta(&unreachable, x.view(), Array1::zeros(8));

        // Assert
        assert!(matches!(
            wrong_cols,
            Err(CalibrationError::Config(ConfigError::DesignColumnMismatch { .. }))
        ));
        assert!(matches!(
            wrong_theta,
            Err(CalibrationError::Config(ConfigError::WarmStartLength { expected: 8, actual: 3 }))
        ));
        assert!(matches!(
            out_of_range,
            Err(CalibrationError::Config(ConfigError::TargetMeanOutOfRange { ref variable, .. }))
                if variable == "flag"
        ));
    }

    #[test]
    // Purpose
    // -------
    // The iteration cap is a soft failure unless the hard gate is set.
    //
    // Given
    // -----
    // - `max_iter = 1` on a target far from uniform, with and without
    //   `hard_failure_pct = 0.5`.
    //
    // Expect
    // ------
    // - Without the gate: a result with `converged = false` and a
    //   `NotConverged` warning. With it: `UnacceptableResult` carrying the
    //   same kind of result.
    fn iteration_cap_is_soft_unless_gated() {
        // Arrange
        let x = design();
        let solver = SolverOptions {
            tols: Tolerances::new(None, None, Some(1)).unwrap(),
            ..SolverOptions::default()
        };
        let soft = CalibrationOptions { solver, ..CalibrationOptions::default() };
        let hard = CalibrationOptions { hard_failure_pct: Some(0.5), ..soft.clone() };

        // Act
        let soft_result = MaskedKLCalibrator::new(soft).solve(&targets(0.8), x.view()).unwrap();
        let hard_result = MaskedKLCalibrator::new(hard).solve(&targets(0.8), x.view());

        // Assert
        assert!(!soft_result.converged);
        assert_eq!(soft_result.termination, Termination::MaxIterationsReached);
        assert!(
            soft_result
                .warnings()
                .iter()
                .any(|w| matches!(w, CalibrationWarning::NotConverged { .. }))
        );
        match hard_result {
            Err(CalibrationError::UnacceptableResult { threshold, result, .. }) => {
                assert_eq!(threshold, 0.5);
                assert!(!result.converged);
            }
            other => panic!("expected UnacceptableResult, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // A normalization total the bounds cannot reach is rejected.
    //
    // Given
    // -----
    // - Bounds [0.5, 2] and total 100 for 8 respondents.
    //
    // Expect
    // ------
    // - `Config(InfeasibleTotal)`.
    fn unreachable_total_is_rejected() {
        // Arrange
        let options = CalibrationOptions {
            bounds: WeightBounds::new(0.5, 2.0).unwrap(),
            total: Some(100.0),
            ..CalibrationOptions::default()
        };
        let x = design();

        // Act
        let result = MaskedKLCalibrator::new(options).solve(&targets(0.5), x.view());

        // Assert
        assert!(matches!(
            result,
            Err(CalibrationError::Config(ConfigError::InfeasibleTotal { .. }))
        ));
    }
}
