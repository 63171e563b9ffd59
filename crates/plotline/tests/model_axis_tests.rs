//! Tests for the axis table and its interactive gestures.
//!
//! These tests verify the normalized-space axis model:
//! - Claiming through figure binding and data-to-pixel conversion
//! - Zoom, shift, and isometric equalization in pixel terms
//! - The scale lock driving bulk autoscale
//! - Slave binding, rebasing, and unbinding
//!
//! ## Test Organization
//!
//! 1. **Claiming and Conversion** - Roles, defaults, pixel maps
//! 2. **Gestures** - Zoom about an origin, pixel pans, equalization
//! 3. **Slave Binding** - Projection, hold-as-is, rejections, unbind

use approx::assert_relative_eq;
use plotline::math::affine::Viewport;
use plotline::model::axis::AxisRole::{BusyX, BusyY};
use plotline::model::axis::{Axes, SlaveAction};
use plotline::model::figure::{figure_add, Drawing, Figures};
use plotline::primitives::errors::PlotError;
use plotline::storage::dataset::Source::Col;
use plotline::storage::dataset::{Dataset, StoreConfig};

fn cfg() -> StoreConfig {
    StoreConfig {
        derived: 2,
        chunk_bytes: 128,
        chunk_cap: 64,
        cache_slots: 4,
        compress: false,
    }
}

/// Axis table with axes 0 (X) and 1 (Y) claimed by one figure.
fn setup() -> (Axes, Figures, Vec<Dataset<f64>>) {
    let mut axes = Axes::new(6);
    let mut figures = Figures::new(4);
    let mut data: Vec<Dataset<f64>> = vec![Dataset::default()];
    data[0].alloc(2, 16, &cfg()).expect("alloc should succeed");
    for i in 0..8 {
        data[0].insert(&[i as f64, (i * i) as f64]);
    }
    figure_add(
        &mut axes, &mut figures, &data,
        0, 0, Col(0), Col(1), 0, 1,
        "first", Drawing::Line, 2,
    )
    .expect("figure should bind");
    (axes, figures, data)
}

fn vp() -> Viewport {
    Viewport::new(100, 500, 50, 250)
}

// ============================================================================
// Claiming and Conversion Tests
// ============================================================================

/// Test roles and defaults after the first binding.
///
/// Verifies claimed roles, armed scale locks, and the default axes.
#[test]
fn test_claim_roles_and_defaults() {
    let (axes, _figures, _data) = setup();

    assert_eq!(axes.get(0).map(|a| a.role()), Some(BusyX), "X axis claimed");
    assert_eq!(axes.get(1).map(|a| a.role()), Some(BusyY), "Y axis claimed");
    assert_eq!(axes.on_x(), Some(0), "First X axis becomes the default");
    assert_eq!(axes.on_y(), Some(1), "First Y axis becomes the default");
    assert!(axes.get(0).is_some_and(|a| a.locked()), "Claim arms the lock");
    assert!(axes.get(1).is_some_and(|a| a.locked()), "Claim arms the lock");
    assert_eq!(axes.free_axis(), Some(2), "Lowest free axis after the claim");
}

/// Test data-to-pixel conversion on both orientations.
///
/// Verifies that [0, 10] spans the viewport, with Y flipped.
#[test]
fn test_conv_both_orientations() {
    let (mut axes, _figures, _data) = setup();
    let vp = vp();
    axes.scale_manual(0, 0.0, 10.0);
    axes.scale_manual(1, 0.0, 10.0);

    assert_relative_eq!(axes.conv(0, &vp, 0.0), 100.0);
    assert_relative_eq!(axes.conv(0, &vp, 5.0), 300.0);
    assert_relative_eq!(axes.conv(0, &vp, 10.0), 500.0);

    assert_relative_eq!(axes.conv(1, &vp, 0.0), 250.0, epsilon = 1e-12);
    assert_relative_eq!(axes.conv(1, &vp, 10.0), 50.0, epsilon = 1e-12);

    assert_relative_eq!(axes.conv_inv(0, &vp, 300.0), 5.0, epsilon = 1e-12);
    assert_relative_eq!(axes.conv_inv(1, &vp, 150.0), 5.0, epsilon = 1e-12);
}

/// Test that manual scaling skips free axes.
///
/// Verifies an unclaimed axis keeps its unit mapping.
#[test]
fn test_scale_manual_skips_free() {
    let (mut axes, _figures, _data) = setup();
    axes.scale_manual(2, 0.0, 10.0);
    assert_relative_eq!(
        axes.get(2).map(|a| a.map().apply(3.0)).unwrap_or(f64::NAN),
        3.0,
        epsilon = 1e-12
    );
}

// ============================================================================
// Gesture Tests
// ============================================================================

/// Test zoom about a pixel origin.
///
/// Verifies the value under the origin pixel stays put while the span
/// contracts, and the scale lock disarms.
#[test]
fn test_zoom_about_origin() {
    let (mut axes, _figures, _data) = setup();
    let vp = vp();
    axes.scale_manual(0, 0.0, 10.0);
    axes.scale_manual(1, 0.0, 10.0);

    axes.zoom(0, &vp, 300, 0.5);
    assert_relative_eq!(axes.conv(0, &vp, 5.0), 300.0, epsilon = 1e-9);
    assert_relative_eq!(axes.conv(0, &vp, 0.0), 200.0, epsilon = 1e-9);
    assert_relative_eq!(axes.conv(0, &vp, 10.0), 400.0, epsilon = 1e-9);
    assert!(!axes.get(0).is_some_and(|a| a.locked()), "Zoom disarms the lock");

    axes.zoom(1, &vp, 150, 0.5);
    assert_relative_eq!(axes.conv(1, &vp, 5.0), 150.0, epsilon = 1e-9);
    assert_relative_eq!(axes.conv(1, &vp, 0.0), 200.0, epsilon = 1e-9);
    assert_relative_eq!(axes.conv(1, &vp, 10.0), 100.0, epsilon = 1e-9);
}

/// Test pixel pans on both orientations.
///
/// Verifies a positive delta moves data right on X and down on Y.
#[test]
fn test_shift_by_pixels() {
    let (mut axes, _figures, _data) = setup();
    let vp = vp();
    axes.scale_manual(0, 0.0, 10.0);
    axes.scale_manual(1, 0.0, 10.0);

    axes.shift(0, &vp, 40);
    assert_relative_eq!(axes.conv(0, &vp, 0.0), 140.0, epsilon = 1e-9);
    assert_relative_eq!(axes.conv(0, &vp, 10.0), 540.0, epsilon = 1e-9);

    axes.shift(1, &vp, 40);
    assert_relative_eq!(axes.conv(1, &vp, 0.0), 290.0, epsilon = 1e-9);
    assert!(!axes.get(1).is_some_and(|a| a.locked()), "Shift disarms the lock");
}

/// Test isometric equalization.
///
/// Verifies both axes land on the same pixels-per-unit, keeping the
/// wider axis centered.
#[test]
fn test_scale_equal_isometric() {
    let (mut axes, _figures, _data) = setup();
    let vp = vp();
    axes.scale_manual(0, 0.0, 10.0);
    axes.scale_manual(1, 0.0, 20.0);

    axes.scale_equal(&vp);

    let px_x = axes.conv(0, &vp, 1.0) - axes.conv(0, &vp, 0.0);
    let px_y = axes.conv(1, &vp, 0.0) - axes.conv(1, &vp, 1.0);
    assert_relative_eq!(px_x, 10.0, epsilon = 1e-9);
    assert_relative_eq!(px_y, 10.0, epsilon = 1e-9);

    // The adjusted X axis stays centered on its old midpoint.
    assert_relative_eq!(axes.conv(0, &vp, 5.0), 300.0, epsilon = 1e-9);
    assert_relative_eq!(axes.conv(0, &vp, 0.0), 250.0, epsilon = 1e-9);
}

/// Test the bulk scale lock.
///
/// Verifies that every entry follows the lock toggle.
#[test]
fn test_scale_lock_bulk() {
    let (mut axes, _figures, _data) = setup();
    axes.scale_lock(false);
    assert!(!axes.get(0).is_some_and(|a| a.locked()), "Lock dropped");
    axes.scale_lock(true);
    for a in 0..axes.len() {
        assert!(axes.get(a).is_some_and(|x| x.locked()), "Lock armed on {a}");
    }
}

// ============================================================================
// Slave Binding Tests
// ============================================================================

/// Claim axis 2 as a second Y axis through a second figure.
fn setup_second_y() -> (Axes, Figures, Vec<Dataset<f64>>) {
    let (mut axes, mut figures, data) = setup();
    figure_add(
        &mut axes, &mut figures, &data,
        1, 0, Col(0), Col(1), 0, 2,
        "second", Drawing::Line, 2,
    )
    .expect("figure should bind");
    (axes, figures, data)
}

/// Test the relative projection of an enabled slave.
///
/// Verifies slave value v lands where base value 2v + 5 does.
#[test]
fn test_slave_enable_projection() {
    let (mut axes, _figures, _data) = setup_second_y();
    let vp = vp();
    axes.scale_manual(1, 0.0, 10.0);

    axes.slave(2, 1, SlaveAction::Enable { scale: 2.0, offset: 5.0 })
        .expect("slave should bind");
    assert_eq!(axes.get(2).and_then(|a| a.slave_base()), Some(1));

    assert_relative_eq!(
        axes.conv(2, &vp, 0.0),
        axes.conv(1, &vp, 5.0),
        epsilon = 1e-9
    );
    assert_relative_eq!(
        axes.conv(2, &vp, 1.0),
        axes.conv(1, &vp, 7.0),
        epsilon = 1e-9
    );

    // Rescaling the base carries the slave with it.
    axes.scale_manual(1, 0.0, 20.0);
    assert_relative_eq!(
        axes.conv(2, &vp, 0.0),
        axes.conv(1, &vp, 5.0),
        epsilon = 1e-9
    );
}

/// Test hold-as-is rebasing.
///
/// Verifies the slave's screen image does not move at the moment of
/// binding.
#[test]
fn test_slave_hold_as_is() {
    let (mut axes, _figures, _data) = setup_second_y();
    let vp = vp();
    axes.scale_manual(1, 0.0, 10.0);
    axes.scale_manual(2, 0.0, 40.0);

    let before: Vec<f64> = [0.0, 10.0, 40.0]
        .iter()
        .map(|&v| axes.conv(2, &vp, v))
        .collect();

    axes.slave(2, 1, SlaveAction::HoldAsIs).expect("slave should bind");

    for (&v, &px) in [0.0, 10.0, 40.0].iter().zip(&before) {
        assert_relative_eq!(axes.conv(2, &vp, v), px, epsilon = 1e-9);
    }
}

/// Test slave binding rejections.
///
/// Verifies the self, chained, and base-in-use cases, plus the
/// already-slaved no-op.
#[test]
fn test_slave_rejections() {
    let (mut axes, _figures, _data) = setup_second_y();
    axes.slave(2, 1, SlaveAction::Enable { scale: 1.0, offset: 0.0 })
        .expect("slave should bind");

    assert_eq!(
        axes.slave(1, 1, SlaveAction::HoldAsIs),
        Err(PlotError::SlaveSelf(1)),
        "An axis cannot slave to itself"
    );
    assert_eq!(
        axes.slave(3, 2, SlaveAction::HoldAsIs),
        Err(PlotError::SlaveOfSlave { base: 2 }),
        "A slave cannot serve as a base"
    );
    assert_eq!(
        axes.slave(1, 3, SlaveAction::HoldAsIs),
        Err(PlotError::BaseInUse(1)),
        "A base in use cannot become a slave"
    );
    assert_eq!(
        axes.slave(9, 0, SlaveAction::HoldAsIs),
        Err(PlotError::AxisIndex { got: 9, max: 6 }),
        "Out-of-table index is rejected"
    );

    // Binding again is a no-op, not a rebind.
    assert_eq!(
        axes.slave(2, 1, SlaveAction::Enable { scale: 7.0, offset: 7.0 }),
        Ok(()),
        "Re-slaving is accepted quietly"
    );
    assert_relative_eq!(
        axes.get(2).map(|a| a.map().apply(1.0)).unwrap_or(f64::NAN),
        1.0,
        epsilon = 1e-12
    );
}

/// Test that slaving the default axis redirects the default.
///
/// Verifies on_y follows the base when the default becomes a slave.
#[test]
fn test_slave_redirects_default() {
    let (mut axes, _figures, _data) = setup_second_y();
    assert_eq!(axes.on_y(), Some(1));

    axes.slave(1, 2, SlaveAction::HoldAsIs).expect("slave should bind");
    assert_eq!(axes.on_y(), Some(2), "Default follows the base");
}

/// Test unbinding a slave.
///
/// Verifies the folded absolute mapping keeps the image, then stops
/// tracking the base.
#[test]
fn test_slave_disable_folds() {
    let (mut axes, _figures, _data) = setup_second_y();
    let vp = vp();
    axes.scale_manual(1, 0.0, 10.0);
    axes.slave(2, 1, SlaveAction::Enable { scale: 2.0, offset: 5.0 })
        .expect("slave should bind");

    let before = axes.conv(2, &vp, 1.0);
    axes.slave_disable(2).expect("unbind should succeed");
    assert_eq!(axes.get(2).and_then(|a| a.slave_base()), None);
    assert_relative_eq!(axes.conv(2, &vp, 1.0), before, epsilon = 1e-12);

    // The base no longer carries the former slave.
    axes.scale_manual(1, 0.0, 100.0);
    assert_relative_eq!(axes.conv(2, &vp, 1.0), before, epsilon = 1e-12);
}
