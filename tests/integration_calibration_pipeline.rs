//! Integration tests for masked KL calibration.
//!
//! Purpose
//! -------
//! - Validate the end-to-end calibration pipeline: from validated moment
//!   targets and a design matrix, through the L-BFGS solve, to projected
//!   weights and diagnostics.
//! - Exercise survey-shaped scenarios (an indicator plus ordinal
//!   covariates, a thousand respondents) rather than toy edge cases only.
//!
//! Coverage
//! --------
//! - `calibration::core::moments::MomentMask`: full and partial masks,
//!   singular target covariance.
//! - `calibration::calibrators::MaskedKLCalibrator`: cold starts, warm
//!   starts, soft iteration caps, infeasible targets, and numerical
//!   failure on a zero variance without ridge.
//! - `calibration::core::diagnostics`: deviation rows, weight ratio,
//!   effective sample size, and the quality gate.
//! - Thread safety: independent solves sharing one calibrator.
//!
//! Exclusions
//! ----------
//! - Gradient correctness, parameterization round trips, and projection
//!   cascades are covered by unit tests.
//! - Python bindings are exercised from the Python side.
use approx::assert_abs_diff_eq;
use masked_calibration::{
    calibration::{
        CalibrationError, CalibrationOptions, CalibrationWarning, ConfigError, MaskedKLCalibrator,
        MomentKind, MomentMask, Regularization, WeightBounds, core::achieved_moments,
    },
    optimization::loss_optimizer::{SolverOptions, Termination, Tolerances},
};
use ndarray::{Array1, Array2, array};

/// Purpose
/// -------
/// Build a sample of `n` respondents, the first `males` of them male, with
/// an age score cycling through {0.5, 1.5, 2.5, 3.5, 4.5} within each sex.
/// When both group sizes are multiples of 5, age has mean exactly 2.5 and
/// variance exactly 2.0 for both sexes.
///
/// Returns
/// -------
/// - An `n × 2` design with columns `(male, age)`.
fn sex_age_design(n: usize, males: usize) -> Array2<f64> {
    const AGE_CYCLE: [f64; 5] = [0.5, 4.5, 1.5, 3.5, 2.5];
    Array2::from_shape_fn((n, 2), |(i, k)| {
        let (is_male, j) = if i < males { (1.0, i) } else { (0.0, i - males) };
        if k == 0 { is_male } else { AGE_CYCLE[j % AGE_CYCLE.len()] }
    })
}

/// Purpose
/// -------
/// Reference targets for `sex_age_design`: male mean `share`, age mean 2.5,
/// `target_cov = diag(0.25, 2.0)`, and an identity mask, so the sex/age
/// covariance is left unconstrained.
fn sex_age_targets(share: f64) -> MomentMask {
    MomentMask::new(
        vec!["male".to_string(), "age".to_string()],
        array![share, 2.5],
        array![[0.25, 0.0], [0.0, 2.0]],
        array![[1.0, 0.0], [0.0, 1.0]],
    )
    .unwrap()
}

/// Determinant of a 3×3 matrix by cofactor expansion.
fn det3(m: &Array2<f64>) -> f64 {
    m[[0, 0]] * (m[[1, 1]] * m[[2, 2]] - m[[1, 2]] * m[[2, 1]])
        - m[[0, 1]] * (m[[1, 0]] * m[[2, 2]] - m[[1, 2]] * m[[2, 0]])
        + m[[0, 2]] * (m[[1, 0]] * m[[2, 1]] - m[[1, 1]] * m[[2, 0]])
}

#[test]
// Purpose
// -------
// The reference two-variable scenario: shift the male share from 0.45 to
// 0.51 while leaving age untouched.
//
// Given
// -----
// - N = 1000, 450 males, age distribution identical across sexes
//   (mean 2.5, variance 2.0).
// - Targets mean (0.51, 2.5), `target_cov = diag(0.25, 2.0)`, identity
//   mask; default options.
//
// Expect
// ------
// - Converged; male mean 0.51 ± 0.005; age mean 2.5 ± 0.01;
//   weight ratio < 5; Σw = N within 1e-8; all weights within bounds.
fn trivial_two_variable_scenario() {
    // Arrange
    let x = sex_age_design(1000, 450);
    let targets = sex_age_targets(0.51);
    let calibrator = MaskedKLCalibrator::default();

    // Act
    let result = calibrator.solve(&targets, x.view()).unwrap();

    // Assert
    assert!(result.converged, "{}", result.termination);
    assert_abs_diff_eq!(result.achieved_mean()[0], 0.51, epsilon = 0.005);
    assert_abs_diff_eq!(result.achieved_mean()[1], 2.5, epsilon = 0.01);
    assert!(result.weight_ratio() < 5.0, "weight ratio {}", result.weight_ratio());
    assert_abs_diff_eq!(result.weights.sum(), 1000.0, epsilon = 1e-8);
    assert!(calibrator.options.bounds.contains_all(result.weights.as_array()));
    assert!(result.acceptable());
    assert!(result.efficiency_pct() > 90.0);
    assert!(result.achieved_masked_covariances().is_empty());
    assert_eq!(result.rows().len(), 4);
    let male = result.mean_row("male").unwrap();
    assert!(male.within_tolerance);
    assert!(male.deviation.pct().unwrap().abs() < 1.0);
}

#[test]
// Purpose
// -------
// Targets already met by uniform weights leave the weights uniform.
//
// Given
// -----
// - Targets equal to the unweighted moments of the sex/age design.
//
// Expect
// ------
// - Every weight equals 1 within 1e-6, no projection, converged.
fn uniform_targets_are_idempotent() {
    // Arrange
    let x = sex_age_design(400, 180);
    let (mean, cov) = achieved_moments(x.view(), Array1::ones(400).view());
    let targets =
        MomentMask::fully_observed(vec!["male".to_string(), "age".to_string()], mean, cov).unwrap();

    // Act
    let result = MaskedKLCalibrator::default().solve(&targets, x.view()).unwrap();

    // Assert
    assert!(result.converged);
    assert_eq!(result.n_projected, 0);
    for &w in result.weights.iter() {
        assert_abs_diff_eq!(w, 1.0, epsilon = 1e-6);
    }
    assert_abs_diff_eq!(result.effective_sample_size(), 400.0, epsilon = 1e-6);
}

#[test]
// Purpose
// -------
// An impossible target (mean 1.5 of a 0/1 variable) is rejected before
// optimizing instead of being reported as a converged calibration.
//
// Given
// -----
// - 200 respondents, 90 males, male mean target 1.5.
//
// Expect
// ------
// - `Config(TargetMeanOutOfRange)` naming "male" and the reachable range
//   [0, 1], for cold and warm starts alike.
fn infeasible_target_is_flagged() {
    // Arrange
    let x = sex_age_design(200, 90);
    let targets = MomentMask::fully_observed(
        vec!["male".to_string(), "age".to_string()],
        array![1.5, 2.5],
        array![[0.25, 0.0], [0.0, 2.0]],
    )
    .unwrap();
    let calibrator = MaskedKLCalibrator::default();
    let expected = ConfigError::TargetMeanOutOfRange {
        variable: "male".to_string(),
        target: 1.5,
        lower: 0.0,
        upper: 1.0,
    };

    // Act
    let cold = calibrator.solve(&targets, x.view());
    let warm = calibrator.solve_from_weights(&targets, x.view(), Array1::ones(200).view());

    // Assert
    for outcome in [cold, warm] {
        match outcome {
            Err(CalibrationError::Config(err)) => assert_eq!(err, expected),
            other => panic!("expected TargetMeanOutOfRange, got {other:?}"),
        }
    }
}

#[test]
// Purpose
// -------
// A singular target covariance with some entries masked out still
// calibrates, and the masked-out entries have no influence.
//
// Given
// -----
// - Three variables (male, age, score) with score = 2·age + 1, so the full
//   target covariance (taken from a known reweighting) is singular.
// - The (male, score) and (age, score) covariances are masked out.
// - A second copy of the targets with 99.0 in the masked-out entries.
//
// Expect
// ------
// - det(target_cov) ≈ 0; converged and acceptable; only the (male, age)
//   covariance row is reported; both copies give identical weights.
fn singular_masked_covariance_converges() {
    // Arrange
    let base = sex_age_design(400, 180);
    let x = Array2::from_shape_fn((400, 3), |(i, k)| match k {
        2 => 2.0 * base[[i, 1]] + 1.0,
        _ => base[[i, k]],
    });
    let reference = Array1::from_shape_fn(400, |i| if i < 180 { 1.2 } else { 0.85 });
    let (mean, cov) = achieved_moments(x.view(), reference.view());
    let mut placeholders = cov.clone();
    for (i, j) in [(0, 2), (2, 0), (1, 2), (2, 1)] {
        placeholders[[i, j]] = 99.0;
    }
    let mask = array![[1.0, 1.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    let names = vec!["male".to_string(), "age".to_string(), "score".to_string()];
    let targets = MomentMask::new(names.clone(), mean.clone(), cov.clone(), mask.clone()).unwrap();
    let garbage = MomentMask::new(names, mean.clone(), placeholders, mask).unwrap();
    let calibrator = MaskedKLCalibrator::default();

    // Act
    let result = calibrator.solve(&targets, x.view()).unwrap();
    let with_garbage = calibrator.solve(&garbage, x.view()).unwrap();

    // Assert
    assert_abs_diff_eq!(det3(&cov), 0.0, epsilon = 1e-9);
    assert!(result.converged, "{}", result.termination);
    assert!(result.acceptable());
    assert_abs_diff_eq!(result.achieved_mean()[0], mean[0], epsilon = 0.005);
    assert_eq!(result.achieved_masked_covariances().len(), 1);
    assert_eq!(result.achieved_masked_covariances()[0].0, 0);
    assert_eq!(result.achieved_masked_covariances()[0].1, 1);
    let cov_rows = result
        .rows()
        .iter()
        .filter(|r| matches!(r.kind, MomentKind::Covariance { .. }))
        .count();
    assert_eq!(cov_rows, 1);
    assert_eq!(result.weights, with_garbage.weights);
}

#[test]
// Purpose
// -------
// A zero target variance without ridge is a hard numerical failure.
//
// Given
// -----
// - Age variance target 0 and `ridge = 0`.
//
// Expect
// ------
// - `CalibrationError::Optimization` with zero iterations and the initial
//   iterate (θ = 0) as the last finite point.
fn zero_variance_without_ridge_fails() {
    // Arrange
    let x = sex_age_design(100, 45);
    let targets = MomentMask::fully_observed(
        vec!["male".to_string(), "age".to_string()],
        array![0.5, 2.5],
        array![[0.25, 0.0], [0.0, 0.0]],
    )
    .unwrap();
    let options = CalibrationOptions {
        regularization: Regularization::new(1.0, 0.0, 1000.0).unwrap(),
        ..CalibrationOptions::default()
    };

    // Act
    let outcome = MaskedKLCalibrator::new(options).solve(&targets, x.view());

    // Assert
    match outcome {
        Err(CalibrationError::Optimization { iterations, last_iterate, .. }) => {
            assert_eq!(iterations, 0);
            assert_eq!(last_iterate, Array1::<f64>::zeros(100));
        }
        other => panic!("expected Optimization error, got {other:?}"),
    }
}

#[test]
// Purpose
// -------
// Hitting the iteration cap is a soft failure that still returns weights
// satisfying the invariants.
//
// Given
// -----
// - The reference scenario with `max_iter = 1`.
//
// Expect
// ------
// - `converged = false`, `MaxIterationsReached`, a `NotConverged` warning,
//   Σw = N within 1e-8, and weights within bounds.
fn iteration_cap_returns_soft_failure() {
    // Arrange
    let x = sex_age_design(1000, 450);
    let targets = sex_age_targets(0.51);
    let options = CalibrationOptions {
        solver: SolverOptions {
            tols: Tolerances::new(None, None, Some(1)).unwrap(),
            ..SolverOptions::default()
        },
        ..CalibrationOptions::default()
    };
    let calibrator = MaskedKLCalibrator::new(options);

    // Act
    let result = calibrator.solve(&targets, x.view()).unwrap();

    // Assert
    assert!(!result.converged);
    assert_eq!(result.termination, Termination::MaxIterationsReached);
    assert!(result.warnings().iter().any(|w| matches!(w, CalibrationWarning::NotConverged { .. })));
    assert_abs_diff_eq!(result.weights.sum(), 1000.0, epsilon = 1e-8);
    assert!(calibrator.options.bounds.contains_all(result.weights.as_array()));
    assert_eq!(result.trace.len(), 2);
}

#[test]
// Purpose
// -------
// The recorded objective never increases from one iteration to the next.
//
// Given
// -----
// - The reference scenario.
//
// Expect
// ------
// - Trace starts at L(θ₀), is non-increasing up to rounding, and ends at
//   the reported objective value.
fn objective_trace_is_monotone() {
    // Arrange
    let x = sex_age_design(1000, 450);
    let targets = sex_age_targets(0.51);

    // Act
    let result = MaskedKLCalibrator::default().solve(&targets, x.view()).unwrap();

    // Assert
    let slack = 1e-10 * result.trace[0].abs().max(1.0);
    assert!(result.trace.len() > 1);
    for pair in result.trace.windows(2) {
        assert!(pair[1] <= pair[0] + slack, "trace increased: {} -> {}", pair[0], pair[1]);
    }
    assert_abs_diff_eq!(*result.trace.last().unwrap(), result.objective_value, epsilon = 1e-12);
}

#[test]
// Purpose
// -------
// A custom normalization total and bounds are honored.
//
// Given
// -----
// - The reference scenario with total 5000 and bounds [0.05, 500].
//
// Expect
// ------
// - Σw = 5000 within 1e-8 (relative), every weight within the bounds,
//   and the male target still met.
fn custom_total_and_bounds_hold() {
    // Arrange
    let x = sex_age_design(1000, 450);
    let targets = sex_age_targets(0.51);
    let options = CalibrationOptions {
        bounds: WeightBounds::new(0.05, 500.0).unwrap(),
        total: Some(5000.0),
        ..CalibrationOptions::default()
    };
    let calibrator = MaskedKLCalibrator::new(options);

    // Act
    let result = calibrator.solve(&targets, x.view()).unwrap();

    // Assert
    assert_abs_diff_eq!(result.weights.sum(), 5000.0, epsilon = 5000.0 * 1e-8);
    assert!(calibrator.options.bounds.contains_all(result.weights.as_array()));
    assert_abs_diff_eq!(result.achieved_mean()[0], 0.51, epsilon = 0.005);
}

#[test]
// Purpose
// -------
// Warm-starting from a previous solution lands on the same calibration.
//
// Given
// -----
// - Weights from a cold solve of the reference scenario.
//
// Expect
// ------
// - The warm solve reproduces the male mean within 1e-4.
fn warm_start_reproduces_solution() {
    // Arrange
    let x = sex_age_design(1000, 450);
    let targets = sex_age_targets(0.51);
    let calibrator = MaskedKLCalibrator::default();
    let cold = calibrator.solve(&targets, x.view()).unwrap();

    // Act
    let warm = calibrator.solve_from_weights(&targets, x.view(), cold.weights.view()).unwrap();

    // Assert
    assert_abs_diff_eq!(warm.achieved_mean()[0], cold.achieved_mean()[0], epsilon = 1e-4);
    assert!(warm.iterations <= cold.iterations);
}

#[test]
// Purpose
// -------
// Independent solves can share one calibrator across threads and are
// deterministic.
//
// Given
// -----
// - Four threads solving the reference scenario with a shared calibrator,
//   targets, and design.
//
// Expect
// ------
// - All four results are identical.
fn concurrent_solves_are_deterministic() {
    // Arrange
    let x = sex_age_design(1000, 450);
    let targets = sex_age_targets(0.51);
    let calibrator = MaskedKLCalibrator::default();

    // Act
    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| calibrator.solve(&targets, x.view()).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Assert
    for other in &results[1..] {
        assert_eq!(other, &results[0]);
    }
}
