//! loss_optimizer::builders — L-BFGS solver construction helpers.
//!
//! Purpose
//! -------
//! Build L-BFGS solvers for the loss optimizer with crate-level options
//! (history size, gradient tolerance, relative objective tolerance) applied,
//! so higher-level code never touches Argmin generics directly.
//!
//! Key behaviors
//! -------------
//! - One builder per supported line search (Hager–Zhang, More–Thuente).
//! - Convert the *relative* objective tolerance of [`Tolerances`] into the
//!   absolute per-iteration change Argmin expects, using a cost scale
//!   supplied by the caller (`max(|L(θ₀)|, 1)`).
//! - Leave the initial parameter vector and the iteration cap to the runner.
//!
//! Conventions
//! -----------
//! - Errors are reported via [`OptResult`]; `argmin::core::Error` values are
//!   normalized through `From<Error> for OptError`.
//!
//! [`Tolerances`]: crate::optimization::loss_optimizer::Tolerances
use argmin::solver::quasinewton::LBFGS;

use crate::optimization::{
    errors::OptResult,
    loss_optimizer::{
        traits::SolverOptions,
        types::{
            Cost, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente, MoreThuenteLS, Theta,
        },
    },
};

/// Construct L-BFGS with a Hager–Zhang line search.
///
/// Parameters
/// ----------
/// - `opts`: history size and tolerances.
/// - `cost_scale`: magnitude the relative objective tolerance is measured
///   against; callers pass `max(|L(θ₀)|, 1)`.
///
/// Errors
/// ------
/// - `OptError` (via `From<argmin::core::Error>`) if Argmin rejects a
///   tolerance.
pub fn build_optimizer_hager_zhang(
    opts: &SolverOptions, cost_scale: f64,
) -> OptResult<LbfgsHagerZhang> {
    let lbfgs = LbfgsHagerZhang::new(HagerZhangLS::new(), opts.effective_history_size());
    configure_lbfgs(lbfgs, opts, cost_scale)
}

/// Construct L-BFGS with a More–Thuente line search.
///
/// Same parameters and errors as [`build_optimizer_hager_zhang`].
pub fn build_optimizer_more_thuente(
    opts: &SolverOptions, cost_scale: f64,
) -> OptResult<LbfgsMoreThuente> {
    let lbfgs = LbfgsMoreThuente::new(MoreThuenteLS::new(), opts.effective_history_size());
    configure_lbfgs(lbfgs, opts, cost_scale)
}

/// Absolute objective-change tolerance for a relative tolerance `rel`.
///
/// Scales below 1 are clamped to 1 so that losses near zero still get a
/// meaningful stopping rule.
pub fn absolute_tol_cost(rel: f64, cost_scale: f64) -> f64 {
    let scale = if cost_scale.is_finite() { cost_scale.abs().max(1.0) } else { 1.0 };
    rel * scale
}

/// Apply optional tolerances to an L-BFGS solver, regardless of line search.
///
/// When a tolerance is `None` the corresponding `with_tolerance_*` call is
/// skipped and Argmin's default stays in effect.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &SolverOptions, cost_scale: f64,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(absolute_tol_cost(c, cost_scale))?;
    }
    Ok(solver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loss_optimizer::{
        traits::{LineSearcher, Tolerances},
        types::DEFAULT_HISTORY_SIZE,
    };

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Construction of both line-search variants with default and explicit
    //   history sizes.
    // - Conversion of the relative objective tolerance.
    //
    // End-to-end runs are covered in `api`.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Both builders succeed for valid tolerances, with and without an
    // explicit history size.
    //
    // Given
    // -----
    // - Default tolerances; history `None` and `Some(7)`.
    //
    // Expect
    // ------
    // - All four builds return `Ok(_)`.
    fn builders_succeed_for_valid_options() {
        // Arrange
        let default_mem = SolverOptions::default();
        let explicit_mem =
            SolverOptions::new(Tolerances::default(), LineSearcher::HagerZhang, false, Some(7))
                .expect("options should be valid");

        // Act / Assert
        assert!(build_optimizer_hager_zhang(&default_mem, 1.0).is_ok());
        assert!(build_optimizer_more_thuente(&default_mem, 1.0).is_ok());
        assert!(build_optimizer_hager_zhang(&explicit_mem, 250.0).is_ok());
        assert!(build_optimizer_more_thuente(&explicit_mem, 250.0).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // `configure_lbfgs` works when no tolerance is set at all.
    //
    // Given
    // -----
    // - Tolerances with only `max_iter`.
    //
    // Expect
    // ------
    // - `Ok(_)`.
    fn configure_lbfgs_respects_absent_tolerances() {
        // Arrange
        let raw = LBFGS::new(MoreThuenteLS::new(), DEFAULT_HISTORY_SIZE);
        let tols = Tolerances::new(None, None, Some(50)).expect("tolerances should be valid");
        let opts = SolverOptions::new(tols, LineSearcher::MoreThuente, false, None)
            .expect("options should be valid");

        // Act / Assert
        assert!(configure_lbfgs(raw, &opts, 1.0).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // The relative tolerance scales with |L(θ₀)| but never below 1.
    //
    // Given
    // -----
    // - rel = 1e-6 with scales 0.01, −250, and NaN.
    //
    // Expect
    // ------
    // - 1e-6, 2.5e-4, and 1e-6.
    fn absolute_tol_cost_clamps_scale() {
        assert_eq!(absolute_tol_cost(1e-6, 0.01), 1e-6);
        assert!((absolute_tol_cost(1e-6, -250.0) - 2.5e-4).abs() < 1e-18);
        assert_eq!(absolute_tol_cost(1e-6, f64::NAN), 1e-6);
    }
}
