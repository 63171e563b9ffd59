//! Segment and point clipping against the viewport.
//!
//! ## Purpose
//!
//! Trial drawing needs a cheap visibility test for each candidate
//! segment, and sketch replay needs the visible portion of segments
//! whose endpoints drifted off screen after an axis gesture. Both come
//! from one Cohen-Sutherland pass.
//!
//! ## Edge cases
//!
//! * Segments fully on one side of the viewport reject in one outcode
//!   comparison without intersection math.
//! * Degenerate segments (both endpoints equal) clip like points.

// Internal dependencies
use crate::math::affine::Viewport;

const LEFT: u8 = 0b0001;
const RIGHT: u8 = 0b0010;
const TOP: u8 = 0b0100;
const BOTTOM: u8 = 0b1000;

fn outcode(vp: &Viewport, x: f64, y: f64) -> u8 {
    let mut code = 0;
    if x < vp.min_x as f64 {
        code |= LEFT;
    } else if x > vp.max_x as f64 {
        code |= RIGHT;
    }
    if y < vp.min_y as f64 {
        code |= TOP;
    } else if y > vp.max_y as f64 {
        code |= BOTTOM;
    }
    code
}

/// Whether a pixel lands inside the viewport.
#[inline]
pub fn point_visible(vp: &Viewport, x: f64, y: f64) -> bool {
    outcode(vp, x, y) == 0
}

/// Clip a segment to the viewport, `None` when fully outside.
pub fn clip_segment(
    vp: &Viewport,
    p0: (f64, f64),
    p1: (f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    let (mut x0, mut y0) = p0;
    let (mut x1, mut y1) = p1;
    let mut c0 = outcode(vp, x0, y0);
    let mut c1 = outcode(vp, x1, y1);

    loop {
        if c0 | c1 == 0 {
            return Some(((x0, y0), (x1, y1)));
        }
        if c0 & c1 != 0 {
            return None;
        }

        // Push the endpoint that is outside onto the crossed border.
        let out = if c0 != 0 { c0 } else { c1 };
        let (x, y) = if out & TOP != 0 {
            let edge = vp.min_y as f64;
            (x0 + (x1 - x0) * (edge - y0) / (y1 - y0), edge)
        } else if out & BOTTOM != 0 {
            let edge = vp.max_y as f64;
            (x0 + (x1 - x0) * (edge - y0) / (y1 - y0), edge)
        } else if out & RIGHT != 0 {
            let edge = vp.max_x as f64;
            (edge, y0 + (y1 - y0) * (edge - x0) / (x1 - x0))
        } else {
            let edge = vp.min_x as f64;
            (edge, y0 + (y1 - y0) * (edge - x0) / (x1 - x0))
        };

        if out == c0 {
            x0 = x;
            y0 = y;
            c0 = outcode(vp, x0, y0);
        } else {
            x1 = x;
            y1 = y;
            c1 = outcode(vp, x1, y1);
        }
    }
}

/// Whether any part of a segment lands inside the viewport.
#[inline]
pub fn segment_visible(vp: &Viewport, p0: (f64, f64), p1: (f64, f64)) -> bool {
    clip_segment(vp, p0, p1).is_some()
}
