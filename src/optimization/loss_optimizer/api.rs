//! High-level entry point for minimizing a user-provided [`Objective`].
//!
//! This validates the starting point, evaluates `L(θ₀)` once to scale the
//! relative objective tolerance, selects an L-BFGS solver with either
//! Hager–Zhang or More–Thuente line search, and delegates the run to
//! `run_lbfgs`.
use crate::optimization::{
    errors::{OptError, OptResult},
    loss_optimizer::{
        OptimOutcome, Theta,
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{LineSearcher, Objective, SolverOptions},
        validation::validate_theta,
    },
};
use argmin::core::CostFunction;

/// Minimize a loss `L(θ)` using L-BFGS with the chosen line search.
///
/// # Behavior
/// - Rejects non-finite starting points, then calls `f.check(theta0, data)`.
/// - Evaluates `L(θ₀)`; a non-finite value fails immediately with
///   `NumericalFailure` (zero iterations, `last_iterate = θ₀`).
/// - Builds the solver with the objective tolerance scaled by
///   `max(|L(θ₀)|, 1)` and runs it.
///
/// # Errors
/// - Propagates any error from `f.check`.
/// - Propagates builder errors.
/// - `OptError::NumericalFailure` for non-finite losses or gradients.
///
/// # Example
/// ```
/// use masked_calibration::optimization::errors::OptResult;
/// use masked_calibration::optimization::loss_optimizer::{
///     Objective, SolverOptions, Theta, minimize,
/// };
/// use ndarray::array;
///
/// struct Bowl;
/// impl Objective for Bowl {
///     type Data = ();
///     fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
///         Ok(theta.dot(theta))
///     }
///     fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = minimize(&Bowl, array![0.5, -0.25], &(), &SolverOptions::default())?;
/// assert!(out.value < 1e-8);
/// # Ok::<(), masked_calibration::optimization::errors::OptError>(())
/// ```
pub fn minimize<F: Objective>(
    f: &F, theta0: Theta, data: &F::Data, opts: &SolverOptions,
) -> OptResult<OptimOutcome> {
    validate_theta(theta0.view(), theta0.len())?;
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    let cost0 = match problem.cost(&theta0) {
        Ok(cost) => cost,
        Err(err) => {
            let err = OptError::from(err);
            if err.is_numerical_failure() {
                return Err(OptError::NumericalFailure {
                    reason: err.to_string(),
                    iterations: 0,
                    last_iterate: theta0,
                });
            }
            return Err(err);
        }
    };
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts, cost0)?;
            run_lbfgs(theta0, cost0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts, cost0)?;
            run_lbfgs(theta0, cost0, opts, problem, solver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loss_optimizer::{Grad, Termination, Tolerances};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // End-to-end runs of `minimize` on toy losses:
    // - analytic and finite-difference gradients, both line searches,
    // - soft termination on the iteration cap,
    // - hard failure on a non-finite starting loss.
    // -------------------------------------------------------------------------

    // Anisotropic quadratic with minimum at (1, −2).
    struct Quadratic;

    impl Objective for Quadratic {
        type Data = ();

        fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
            Ok((theta[0] - 1.0).powi(2) + 10.0 * (theta[1] + 2.0).powi(2))
        }

        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }

        fn grad(&self, theta: &Theta, _: &()) -> OptResult<Grad> {
            Ok(array![2.0 * (theta[0] - 1.0), 20.0 * (theta[1] + 2.0)])
        }
    }

    // Same loss, value only.
    struct QuadraticNoGrad;

    impl Objective for QuadraticNoGrad {
        type Data = ();

        fn value(&self, theta: &Theta, data: &()) -> OptResult<f64> {
            Quadratic.value(theta, data)
        }

        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
    }

    // Loss that is infinite everywhere.
    struct Broken;

    impl Objective for Broken {
        type Data = ();

        fn value(&self, _: &Theta, _: &()) -> OptResult<f64> {
            Ok(f64::INFINITY)
        }

        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // Both line searches converge on a quadratic with an analytic gradient,
    // and the loss trace never increases.
    //
    // Given
    // -----
    // - `Quadratic` from θ₀ = (0, 0) with tight tolerances.
    //
    // Expect
    // ------
    // - θ̂ ≈ (1, −2), `converged`, monotone trace.
    fn minimize_converges_with_analytic_gradient() {
        for line_searcher in [LineSearcher::MoreThuente, LineSearcher::HagerZhang] {
            // Arrange
            let tols = Tolerances::new(Some(1e-8), Some(1e-12), Some(1000)).unwrap();
            let opts = SolverOptions { tols, line_searcher, ..SolverOptions::default() };

            // Act
            let out = minimize(&Quadratic, array![0.0, 0.0], &(), &opts).unwrap();

            // Assert
            assert!(out.converged, "{line_searcher:?}: {}", out.status);
            assert_abs_diff_eq!(out.theta_hat[0], 1.0, epsilon = 1e-4);
            assert_abs_diff_eq!(out.theta_hat[1], -2.0, epsilon = 1e-4);
            assert!(out.trace.windows(2).all(|w| w[1] <= w[0] + 1e-12));
            assert_eq!(out.trace[0], 41.0);
        }
    }

    #[test]
    // Purpose
    // -------
    // Without an analytic gradient the finite-difference fallback still
    // reaches the minimum.
    //
    // Given
    // -----
    // - `QuadraticNoGrad` with a loose gradient tolerance.
    //
    // Expect
    // ------
    // - θ̂ within 1e-3 of (1, −2).
    fn minimize_converges_with_finite_differences() {
        // Arrange
        let tols = Tolerances::new(Some(1e-6), Some(1e-10), Some(500)).unwrap();
        let opts = SolverOptions { tols, ..SolverOptions::default() };

        // Act
        let out = minimize(&QuadraticNoGrad, array![0.0, 0.0], &(), &opts).unwrap();

        // Assert
        assert_abs_diff_eq!(out.theta_hat[0], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(out.theta_hat[1], -2.0, epsilon = 1e-3);
    }

    #[test]
    // Purpose
    // -------
    // Hitting the iteration cap is a soft outcome.
    //
    // Given
    // -----
    // - `max_iter = 1` and tolerances far too tight to be met in one step.
    //
    // Expect
    // ------
    // - `Ok` with `MaxIterationsReached`, `converged == false`, and a loss
    //   no worse than L(θ₀).
    fn iteration_cap_is_soft() {
        // Arrange
        let tols = Tolerances::new(Some(1e-14), None, Some(1)).unwrap();
        let opts = SolverOptions { tols, ..SolverOptions::default() };

        // Act
        let out = minimize(&Quadratic, array![5.0, 5.0], &(), &opts).unwrap();

        // Assert
        assert_eq!(out.termination, Termination::MaxIterationsReached);
        assert!(!out.converged);
        assert!(out.value <= 506.0);
    }

    #[test]
    // Purpose
    // -------
    // A non-finite loss at θ₀ is a hard failure carrying θ₀.
    //
    // Given
    // -----
    // - `Broken` from θ₀ = (0.5).
    //
    // Expect
    // ------
    // - `NumericalFailure { iterations: 0, last_iterate: θ₀ }`.
    fn non_finite_start_is_numerical_failure() {
        // Act
        let err = minimize(&Broken, array![0.5], &(), &SolverOptions::default()).unwrap_err();

        // Assert
        match err {
            OptError::NumericalFailure { iterations, last_iterate, .. } => {
                assert_eq!(iterations, 0);
                assert_eq!(last_iterate, array![0.5]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
