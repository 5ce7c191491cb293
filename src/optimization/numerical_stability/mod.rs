//! numerical_stability — numerically robust simplex transforms.
//!
//! Purpose
//! -------
//! Collect the small, overflow-safe transforms that map unconstrained
//! optimizer parameters onto the probability simplex and back, so the
//! calibration layer can assume well-conditioned `f64` arithmetic.
//!
//! Key behaviors
//! -------------
//! - `safe_softmax`: max-shifted softmax.
//! - `softmax_vjp`: O(n) vector–Jacobian product for gradient propagation.
//! - `centered_log`: shift-normalized inverse used for warm starts.
//! - `NEAR_ZERO`: shared guard for near-zero denominators.
//!
//! Conventions
//! -----------
//! - All routines operate on `ndarray` views and return owned arrays.
//! - Inputs are assumed finite; shape and domain validation happens in the
//!   calibration layer.
//! - This module never logs or touches global state.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{NEAR_ZERO, centered_log, safe_softmax, softmax_vjp};

pub mod prelude {
    pub use super::transformations::{NEAR_ZERO, safe_softmax, softmax_vjp};
}
