//! Coordinate boundary for comment pins.
//!
//! Pins are stored normalized to the component they are attached to, so
//! they survive resizes and render at the right spot on every breakpoint.

use crate::geometry::Rect;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Pin anchor, normalized to its component's box. Both axes are in
/// `[0, 1]`: `(0, 0)` is the top-left corner, `(1, 1)` the bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PinPosition {
    pub x: f64,
    pub y: f64,
}

impl PinPosition {
    /// Clamps into the unit square.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x: x.clamp(0.0, 1.0), y: y.clamp(0.0, 1.0) }
    }
}

/// Resolve a pin against the component's current canvas rectangle.
pub fn pin_to_canvas(rect: &Rect, pin: PinPosition) -> Point {
    Point::new(rect.left + pin.x * rect.width, rect.top + pin.y * rect.height)
}

/// Normalize a canvas point into a pin on `rect`. Points outside the
/// rectangle clamp to its nearest edge; degenerate rectangles pin to the
/// top-left corner.
pub fn canvas_to_pin(rect: &Rect, point: Point) -> PinPosition {
    let x = if rect.width > 0.0 { (point.x - rect.left) / rect.width } else { 0.0 };
    let y = if rect.height > 0.0 { (point.y - rect.top) / rect.height } else { 0.0 };
    PinPosition::new(x, y)
}
