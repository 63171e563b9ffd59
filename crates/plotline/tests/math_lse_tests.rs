//! Tests for the least-squares cascade solver.
//!
//! These tests verify the accumulator the polyfit pass is built on:
//! - Shape validation and capacity limits
//! - Exact fits for linear, quadratic, and multi-column problems
//! - Residual deviation against hand-computed sample deviations
//! - Cascade collapses over long insert streams
//! - Rank-deficient fallback behavior
//!
//! ## Test Organization
//!
//! 1. **Shape Validation** - Rejected and accepted row shapes
//! 2. **Exact Fits** - Known-coefficient recovery
//! 3. **Deviation** - Residual statistics
//! 4. **Cascades** - Collapse correctness over large streams
//! 5. **Edge Cases** - Degenerate columns, single rows

use approx::assert_relative_eq;
use plotline::math::lse::{Lse, CASCADE_MAX, FULL_MAX};
use plotline::primitives::errors::PlotError;

// ============================================================================
// Shape Validation Tests
// ============================================================================

/// Test that empty row shapes are rejected.
///
/// Verifies that both the regressor and the observation side need at
/// least one column.
#[test]
fn test_shape_rejects_empty_sides() {
    assert_eq!(
        Lse::new(1, 0, 1).err(),
        Some(PlotError::SolverShape {
            len_x: 0,
            len_z: 1,
            max: FULL_MAX,
        }),
        "Zero regressors should be rejected"
    );
    assert_eq!(
        Lse::new(1, 2, 0).err(),
        Some(PlotError::SolverShape {
            len_x: 2,
            len_z: 0,
            max: FULL_MAX,
        }),
        "Zero observation columns should be rejected"
    );
}

/// Test the combined width limit.
///
/// Verifies that rows wider than the packed triangle are rejected and
/// the widest legal shape is accepted.
#[test]
fn test_shape_width_limit() {
    assert!(
        Lse::new(1, FULL_MAX, 1).is_err(),
        "One past the width limit should be rejected"
    );
    let lse = Lse::new(1, FULL_MAX - 1, 1).expect("widest legal shape");
    assert_eq!(lse.n_full(), FULL_MAX, "Full width at the limit");
}

/// Test that the cascade count is clamped.
///
/// Verifies that out-of-range cascade requests still configure a
/// working accumulator.
#[test]
fn test_cascades_clamped() {
    for cascades in [0, 1, CASCADE_MAX, CASCADE_MAX + 3] {
        let mut lse = Lse::new(cascades, 2, 1).expect("shape is legal");
        for i in 0..40 {
            let x = i as f64;
            lse.insert(&[1.0, x, 2.0 * x + 3.0]);
        }
        let sol = lse.solve();
        assert_relative_eq!(sol.beta(0, 0), 3.0, epsilon = 1e-9);
        assert_relative_eq!(sol.beta(1, 0), 2.0, epsilon = 1e-9);
    }
}

// ============================================================================
// Exact Fit Tests
// ============================================================================

/// Test recovery of a line.
///
/// Verifies `y = 2x + 3` comes back as intercept 3 and slope 2.
#[test]
fn test_fit_line() {
    let mut lse = Lse::new(2, 2, 1).expect("shape is legal");
    for i in 0..8 {
        let x = i as f64;
        lse.insert(&[1.0, x, 2.0 * x + 3.0]);
    }
    assert_eq!(lse.total(), 8, "Every inserted row counted");

    let sol = lse.solve();
    assert_eq!(sol.total, 8, "Total carried into the solution");
    let coefs = sol.coefficients(0);
    assert_relative_eq!(coefs[0], 3.0, epsilon = 1e-9);
    assert_relative_eq!(coefs[1], 2.0, epsilon = 1e-9);
    assert!(sol.deviation(0) < 1e-9, "Exact fit leaves no residual");
}

/// Test recovery of a quadratic.
///
/// Verifies `y = 1 - 2x + 0.5x^2` with three regressor columns.
#[test]
fn test_fit_quadratic() {
    let mut lse = Lse::new(2, 3, 1).expect("shape is legal");
    for i in 0..=6 {
        let x = i as f64;
        lse.insert(&[1.0, x, x * x, 1.0 - 2.0 * x + 0.5 * x * x]);
    }

    let sol = lse.solve();
    let coefs = sol.coefficients(0);
    assert_relative_eq!(coefs[0], 1.0, epsilon = 1e-8);
    assert_relative_eq!(coefs[1], -2.0, epsilon = 1e-8);
    assert_relative_eq!(coefs[2], 0.5, epsilon = 1e-8);
}

/// Test two observation columns solved in one pass.
///
/// Verifies that each column gets its own coefficient vector.
#[test]
fn test_fit_two_observation_columns() {
    let mut lse = Lse::new(1, 2, 2).expect("shape is legal");
    for i in 0..10 {
        let x = i as f64;
        lse.insert(&[1.0, x, 2.0 * x + 3.0, -x + 1.0]);
    }

    let sol = lse.solve();
    assert_relative_eq!(sol.beta(0, 0), 3.0, epsilon = 1e-9);
    assert_relative_eq!(sol.beta(1, 0), 2.0, epsilon = 1e-9);
    assert_relative_eq!(sol.beta(0, 1), 1.0, epsilon = 1e-9);
    assert_relative_eq!(sol.beta(1, 1), -1.0, epsilon = 1e-9);
    assert!(sol.deviation(1) < 1e-9, "Second column fits exactly too");
}

// ============================================================================
// Deviation Tests
// ============================================================================

/// Test the deviation of a constant fit.
///
/// Verifies that fitting a mean to {1, 3} reports the sample
/// deviation sqrt(2).
#[test]
fn test_deviation_constant_fit() {
    let mut lse = Lse::new(1, 1, 1).expect("shape is legal");
    lse.insert(&[1.0, 1.0]);
    lse.insert(&[1.0, 3.0]);

    let sol = lse.solve();
    assert_relative_eq!(sol.coefficients(0)[0], 2.0, epsilon = 1e-12);
    assert_relative_eq!(sol.deviation(0), core::f64::consts::SQRT_2, epsilon = 1e-12);
}

/// Test the deviation over a known spread.
///
/// Verifies the mean fit over 0..10 reports sqrt(82.5 / 9).
#[test]
fn test_deviation_known_spread() {
    let mut lse = Lse::new(1, 1, 1).expect("shape is legal");
    for i in 0..10 {
        lse.insert(&[1.0, i as f64]);
    }

    let sol = lse.solve();
    assert_relative_eq!(sol.coefficients(0)[0], 4.5, epsilon = 1e-12);
    assert_relative_eq!(sol.deviation(0), (82.5f64 / 9.0).sqrt(), epsilon = 1e-12);
}

// ============================================================================
// Cascade Tests
// ============================================================================

/// Test a long stream through every cascade level.
///
/// Verifies that hundreds of ripple collapses keep the solution equal
/// to the single-level accumulation.
#[test]
fn test_cascade_collapse_long_stream() {
    let mut deep = Lse::new(CASCADE_MAX, 2, 1).expect("shape is legal");
    let mut flat = Lse::new(1, 2, 1).expect("shape is legal");

    for i in 0..500 {
        let x = i as f64 * 0.01;
        let y = 2.0 * x + 3.0 + if i % 2 == 0 { 0.125 } else { -0.125 };
        deep.insert(&[1.0, x, y]);
        flat.insert(&[1.0, x, y]);
    }
    assert_eq!(deep.total(), 500, "Collapses never lose rows");

    let deep = deep.solve();
    let flat = flat.solve();
    assert_relative_eq!(deep.beta(0, 0), flat.beta(0, 0), epsilon = 1e-9);
    assert_relative_eq!(deep.beta(1, 0), flat.beta(1, 0), epsilon = 1e-9);
    assert_relative_eq!(deep.deviation(0), flat.deviation(0), epsilon = 1e-9);
    assert!(
        (deep.deviation(0) - 0.125).abs() < 0.01,
        "Residual deviation tracks the noise amplitude: {}",
        deep.deviation(0)
    );
}

// ============================================================================
// Edge Case Tests
// ============================================================================

/// Test a degenerate regressor column.
///
/// Verifies that an all-zero regressor falls back to a zero
/// coefficient instead of dividing by the empty diagonal.
#[test]
fn test_degenerate_regressor_column() {
    let mut lse = Lse::new(1, 2, 1).expect("shape is legal");
    for _ in 0..5 {
        lse.insert(&[1.0, 0.0, 5.0]);
    }

    let sol = lse.solve();
    assert_relative_eq!(sol.beta(0, 0), 5.0, epsilon = 1e-12);
    assert_eq!(sol.beta(1, 0), 0.0, "Empty diagonal yields a zero coefficient");
}

/// Test a single absorbed row.
///
/// Verifies that the deviation is zero when no residual is defined.
#[test]
fn test_single_row() {
    let mut lse = Lse::new(2, 1, 1).expect("shape is legal");
    lse.insert(&[1.0, 7.0]);

    let sol = lse.solve();
    assert_relative_eq!(sol.coefficients(0)[0], 7.0, epsilon = 1e-12);
    assert_eq!(sol.deviation(0), 0.0, "One row leaves no residual");
}

/// Test an accumulator solved with no rows.
///
/// Verifies that the empty solve yields zero coefficients and
/// deviation rather than touching empty diagonals.
#[test]
fn test_empty_solve() {
    let lse = Lse::new(2, 2, 1).expect("shape is legal");
    let sol = lse.solve();
    assert_eq!(sol.total, 0, "Nothing absorbed");
    assert_eq!(sol.coefficients(0), &[0.0, 0.0], "Zero coefficients");
    assert_eq!(sol.deviation(0), 0.0, "Zero deviation");
}
