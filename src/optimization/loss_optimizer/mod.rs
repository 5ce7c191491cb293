//! loss_optimizer — argmin-powered L-BFGS minimizer for smooth losses.
//!
//! Purpose
//! -------
//! Provide a high-level, Argmin-backed optimization layer for **minimizing**
//! smooth losses `L(θ)` over an unconstrained parameter vector. Callers
//! implement a single trait, [`Objective`], and invoke [`minimize`] to run
//! L-BFGS with a configurable line search, tolerances, and a
//! finite-difference fallback.
//!
//! Key behaviors
//! -------------
//! - Bridge objectives into Argmin via [`adapter::ArgMinAdapter`], which
//!   caches the last joint loss/gradient evaluation.
//! - Expose a single entrypoint [`minimize`] that:
//!   - validates the initial guess with [`Objective::check`],
//!   - selects an L-BFGS solver via [`builders`] based on [`LineSearcher`],
//!   - executes it via [`run::run_lbfgs`] with an [`trace::IterationTrace`]
//!     observer attached, and
//!   - normalizes results into an [`OptimOutcome`].
//! - Classify how a run ended ([`Termination`]): converged, capped by the
//!   iteration limit, or stalled. Non-finite losses abort with
//!   `OptError::NumericalFailure` instead.
//!
//! Invariants & assumptions
//! ------------------------
//! - [`Objective::value`] and [`Objective::grad`] report invalid inputs as
//!   recoverable `OptError` values, not panics.
//! - The objective tolerance in [`Tolerances`] is relative to
//!   `max(|L(θ₀)|, 1)`.
//! - Runs are deterministic for a fixed objective, data, and `θ₀`.
//!
//! Conventions
//! -----------
//! - Parameters live in an unconstrained space as [`Theta`]
//!   (`Array1<f64>`). Any mapping to constrained quantities happens in the
//!   model layer (see `calibration::core::parameterization`).
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover caching and FD fallback ([`adapter`]),
//!   solver construction ([`builders`]), configuration invariants
//!   ([`traits`], [`validation`]), failure classification ([`run`]), and
//!   end-to-end toy problems ([`api`]).

pub mod adapter;
pub mod api;
pub mod builders;
pub mod run;
pub mod trace;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::minimize;
pub use self::trace::IterationTrace;
pub use self::traits::{
    LineSearcher, Objective, OptimOutcome, SolverOptions, Termination, Tolerances,
};
pub use self::types::{
    Cost, DEFAULT_HISTORY_SIZE, DEFAULT_MAX_ITER, DEFAULT_TOL_COST, DEFAULT_TOL_GRAD, FnEvalMap,
    Grad, Theta,
};

pub mod prelude {
    pub use super::api::minimize;
    pub use super::traits::{LineSearcher, Objective, OptimOutcome, SolverOptions, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
