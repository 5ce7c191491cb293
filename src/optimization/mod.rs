//! optimization — L-BFGS stack, numerical helpers, and unified error surface.
//!
//! Purpose
//! -------
//! Provide a cohesive optimization layer for calibration: an Argmin-backed
//! loss minimizer, numerically stable simplex transforms, and a single
//! error/result surface. Callers implement a loss, choose tolerances, and
//! obtain the minimizer without touching backend solver details.
//!
//! Key behaviors
//! -------------
//! - Expose a high-level API for **minimizing smooth losses** `L(θ)`
//!   (`loss_optimizer`), including solver configuration, stopping criteria,
//!   and a per-iteration loss trace.
//! - Supply shared numerical primitives (`numerical_stability`) for mapping
//!   unconstrained parameters onto the simplex and propagating gradients
//!   back.
//! - Normalize configuration issues, numerical failures, and backend solver
//!   errors into a single enum (`errors::OptError`) with a common result
//!   alias (`OptResult<T>`).
//!
//! Invariants & assumptions
//! ------------------------
//! - Optimizers operate in an unconstrained parameter space `θ` and assume
//!   that inputs are finite once validation has passed; invalid states are
//!   reported as `OptError`, not panics.
//! - Objectives treat domain violations as recoverable errors surfaced
//!   through the optimization layer.
//!
//! Downstream usage
//! ----------------
//! - `calibration::core::objective::MaskedObjective` implements
//!   `loss_optimizer::Objective` and is driven by `minimize`.
//! - Front-ends can import the curated surface via
//!   `optimization::prelude::*`.

pub mod errors;
pub mod loss_optimizer;
pub mod numerical_stability;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loss_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
