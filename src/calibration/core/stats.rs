//! Weighted sample moments.
//!
//! Population-style (divide by `W = Σw`) weighted means and covariances of a
//! design matrix. These are the quantities the objective matches against the
//! targets and that diagnostics report.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Weighted column means `m_k = Σ_i w_i X[i,k] / W`.
pub fn weighted_mean(design: ArrayView2<f64>, weights: ArrayView1<f64>) -> Array1<f64> {
    let total = weights.sum();
    design.t().dot(&weights) / total
}

/// Weighted deviations `X[i,k] − m_k`.
pub fn centered(design: ArrayView2<f64>, mean: ArrayView1<f64>) -> Array2<f64> {
    let mut out = design.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        row -= &mean;
    }
    out
}

/// Weighted covariance `C_ij = Σ_l w_l (X_li − m_i)(X_lj − m_j) / W`.
pub fn weighted_cov(design: ArrayView2<f64>, weights: ArrayView1<f64>) -> Array2<f64> {
    let mean = weighted_mean(design, weights);
    let dev = centered(design, mean.view());
    weighted_cov_from_centered(dev.view(), weights)
}

/// Weighted covariance from already-centered data.
pub fn weighted_cov_from_centered(dev: ArrayView2<f64>, weights: ArrayView1<f64>) -> Array2<f64> {
    let total = weights.sum();
    let mut scaled = dev.to_owned();
    for (mut row, &w) in scaled.axis_iter_mut(Axis(0)).zip(weights.iter()) {
        row *= w;
    }
    dev.t().dot(&scaled) / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Weighted moments match hand-computed values.
    //
    // Given
    // -----
    // - X = [[0, 1], [1, 3], [1, 5]], w = (2, 1, 1).
    //
    // Expect
    // ------
    // - m = (0.5, 2.5); var_0 = 0.25, var_1 = 2.75, cov_01 = 0.75.
    fn weighted_moments_match_hand_computation() {
        // Arrange
        let x = array![[0.0, 1.0], [1.0, 3.0], [1.0, 5.0]];
        let w = array![2.0, 1.0, 1.0];

        // Act
        let m = weighted_mean(x.view(), w.view());
        let c = weighted_cov(x.view(), w.view());

        // Assert
        assert_abs_diff_eq!(m[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(m[1], 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(c[[0, 0]], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(c[[1, 1]], 2.75, epsilon = 1e-12);
        assert_abs_diff_eq!(c[[0, 1]], 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(c[[1, 0]], 0.75, epsilon = 1e-12);
    }
}
