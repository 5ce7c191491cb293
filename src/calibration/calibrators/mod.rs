//! calibrators — end-to-end calibration solves.
//!
//! [`MaskedKLCalibrator`] composes the `core` building blocks into a single
//! `solve` call: validation, L-BFGS minimization of the masked objective,
//! bound projection, diagnostics, and the optional hard quality gate.

pub mod masked_kl;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::masked_kl::MaskedKLCalibrator;

pub mod prelude {
    pub use super::masked_kl::MaskedKLCalibrator;
}
