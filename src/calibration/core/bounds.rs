//! Weight bounds and the post-solve projection onto them.
//!
//! The parameterization guarantees `Σw = total` but, depending on the ratio
//! between `total` and the bounds, may overshoot one of the two bounds.
//! [`WeightBounds::project`] repairs that after optimization by pinning
//! offending weights to the violated bound and redistributing the remaining
//! mass proportionally over the free weights, repeating until no weight is
//! out of range.
use ndarray::Array1;

use crate::calibration::errors::{ConfigError, ConfigResult};

/// Default lower weight bound.
pub const DEFAULT_MIN_WEIGHT: f64 = 0.01;

/// Default upper weight bound.
pub const DEFAULT_MAX_WEIGHT: f64 = 100.0;

/// Relative slack used when deciding whether a weight violates a bound.
const BOUND_SLACK: f64 = 1e-12;

/// Box constraints `min ≤ w_i ≤ max` on individual weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightBounds {
    min: f64,
    max: f64,
}

impl WeightBounds {
    /// # Errors
    /// [`ConfigError::InvalidWeightBounds`] unless both bounds are finite and
    /// `0 < min < max`.
    pub fn new(min: f64, max: f64) -> ConfigResult<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ConfigError::InvalidWeightBounds {
                min,
                max,
                reason: "Bounds must be finite.",
            });
        }
        if min <= 0.0 {
            return Err(ConfigError::InvalidWeightBounds {
                min,
                max,
                reason: "Lower bound must be strictly positive.",
            });
        }
        if min >= max {
            return Err(ConfigError::InvalidWeightBounds {
                min,
                max,
                reason: "Lower bound must be strictly below the upper bound.",
            });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Check that `n` weights within the bounds can sum to `total`.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidTotal`] for a non-finite or non-positive total.
    /// - [`ConfigError::InfeasibleTotal`] unless `n·min ≤ total ≤ n·max`.
    pub fn check_total(&self, n: usize, total: f64) -> ConfigResult<()> {
        if !total.is_finite() || total <= 0.0 {
            return Err(ConfigError::InvalidTotal { value: total });
        }
        let lower = n as f64 * self.min;
        let upper = n as f64 * self.max;
        if total < lower || total > upper {
            return Err(ConfigError::InfeasibleTotal { total, lower, upper });
        }
        Ok(())
    }

    /// Whether every weight lies in `[min, max]` up to a relative slack.
    pub fn contains_all(&self, weights: &Array1<f64>) -> bool {
        let (lo, hi) = self.slackened();
        weights.iter().all(|&w| w >= lo && w <= hi)
    }

    fn slackened(&self) -> (f64, f64) {
        (self.min * (1.0 - BOUND_SLACK), self.max * (1.0 + BOUND_SLACK))
    }

    /// Project `weights` onto `{min ≤ w ≤ max, Σw = total}` in place.
    ///
    /// Weights already inside the bounds keep their relative proportions.
    /// Returns the number of weights pinned to a bound. Assumes
    /// [`check_total`](Self::check_total) has passed for `weights.len()`.
    pub fn project(&self, weights: &mut Array1<f64>, total: f64) -> usize {
        if self.contains_all(weights) {
            return 0;
        }
        let original = weights.clone();
        let (lo, hi) = self.slackened();
        // 0 = free, -1 = pinned low, +1 = pinned high
        let mut pinned = vec![0i8; original.len()];
        let mut n_pinned = 0usize;
        for _ in 0..=original.len() {
            let mut fixed_mass = 0.0;
            let mut free_mass = 0.0;
            for (&w, &state) in original.iter().zip(pinned.iter()) {
                match state {
                    -1 => fixed_mass += self.min,
                    1 => fixed_mass += self.max,
                    _ => free_mass += w,
                }
            }
            let scale = if free_mass > 0.0 { (total - fixed_mass) / free_mass } else { 0.0 };

            let mut newly_pinned = 0usize;
            for ((w, &orig), state) in weights.iter_mut().zip(original.iter()).zip(pinned.iter_mut())
            {
                match *state {
                    -1 => *w = self.min,
                    1 => *w = self.max,
                    _ => {
                        let candidate = orig * scale;
                        if candidate > hi {
                            *state = 1;
                            *w = self.max;
                            newly_pinned += 1;
                        } else if candidate < lo {
                            *state = -1;
                            *w = self.min;
                            newly_pinned += 1;
                        } else {
                            *w = candidate;
                        }
                    }
                }
            }
            n_pinned += newly_pinned;
            if newly_pinned == 0 {
                break;
            }
        }
        n_pinned
    }
}

impl Default for WeightBounds {
    fn default() -> Self {
        Self { min: DEFAULT_MIN_WEIGHT, max: DEFAULT_MAX_WEIGHT }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Bounds must be finite, positive, and ordered.
    //
    // Given
    // -----
    // - (0, 1), (2, 1), (0.1, ∞), and the defaults.
    //
    // Expect
    // ------
    // - The first three are rejected; defaults are (0.01, 100).
    fn bounds_are_validated() {
        assert!(WeightBounds::new(0.0, 1.0).is_err());
        assert!(WeightBounds::new(2.0, 1.0).is_err());
        assert!(WeightBounds::new(0.1, f64::INFINITY).is_err());
        let defaults = WeightBounds::default();
        assert_eq!((defaults.min(), defaults.max()), (0.01, 100.0));
    }

    #[test]
    // Purpose
    // -------
    // The normalization total must be reachable.
    //
    // Given
    // -----
    // - Bounds [0.5, 2] with n = 4: totals 1, 4, 9, and NaN.
    //
    // Expect
    // ------
    // - 4 passes; 1 and 9 are infeasible; NaN is invalid.
    fn check_total_enforces_reachability() {
        // Arrange
        let bounds = WeightBounds::new(0.5, 2.0).unwrap();

        // Act / Assert
        assert!(bounds.check_total(4, 4.0).is_ok());
        assert!(matches!(bounds.check_total(4, 1.0), Err(ConfigError::InfeasibleTotal { .. })));
        assert!(matches!(bounds.check_total(4, 9.0), Err(ConfigError::InfeasibleTotal { .. })));
        assert!(matches!(bounds.check_total(4, f64::NAN), Err(ConfigError::InvalidTotal { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Projection pins overshooting weights and keeps the total.
    //
    // Given
    // -----
    // - Bounds [0.5, 2], weights (5, 1, 1, 1) summing to 8.
    //
    // Expect
    // ------
    // - First weight pinned to 2, the rest share 6 equally, one weight moved.
    fn project_pins_and_redistributes() {
        // Arrange
        let bounds = WeightBounds::new(0.5, 2.0).unwrap();
        let mut weights = array![5.0, 1.0, 1.0, 1.0];

        // Act
        let moved = bounds.project(&mut weights, 8.0);

        // Assert
        assert_eq!(moved, 1);
        assert_abs_diff_eq!(weights[0], 2.0, epsilon = 1e-12);
        for &w in weights.iter().skip(1) {
            assert_abs_diff_eq!(w, 2.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(weights.sum(), 8.0, epsilon = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Redistribution can push further weights over the bound; the loop
    // keeps pinning until everything fits.
    //
    // Given
    // -----
    // - Bounds [0.1, 3], weights (10, 2.5, 0.5, 0.5, 0.5) with total 14.
    //
    // Expect
    // ------
    // - All weights within bounds, sum 14, two weights moved.
    fn project_cascades() {
        // Arrange
        let bounds = WeightBounds::new(0.1, 3.0).unwrap();
        let mut weights = array![10.0, 2.5, 0.5, 0.5, 0.5];

        // Act
        let moved = bounds.project(&mut weights, 14.0);

        // Assert
        assert!(bounds.contains_all(&weights));
        assert_abs_diff_eq!(weights.sum(), 14.0, epsilon = 1e-10);
        assert_eq!(moved, 2);
    }

    #[test]
    // Purpose
    // -------
    // Feasible weights are left untouched.
    //
    // Given
    // -----
    // - Weights already within bounds.
    //
    // Expect
    // ------
    // - Zero moved and identical values.
    fn project_is_noop_when_feasible() {
        // Arrange
        let bounds = WeightBounds::default();
        let mut weights = array![0.5, 1.5, 1.0];

        // Act
        let moved = bounds.project(&mut weights, 3.0);

        // Assert
        assert_eq!(moved, 0);
        assert_eq!(weights, array![0.5, 1.5, 1.0]);
    }
}
