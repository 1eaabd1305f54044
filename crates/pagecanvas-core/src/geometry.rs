//! Screen/canvas coordinate transforms and rectangle math.
//!
//! Every interaction feature converts pointer coordinates through this
//! module; nothing else in the crate is allowed to hand-roll coordinate
//! math. All functions are pure and side-effect free.

use crate::component::ComponentId;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Smallest zoom value the transforms will divide by. Guards against a
/// zoom slider driven all the way to zero.
pub const MIN_ZOOM: f64 = 1e-4;

/// An axis-aligned rectangle in canvas-local, zoom-independent units.
///
/// Derived continuously from renderer measurement; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    /// Rectangle spanning two corner points, normalized so that width and
    /// height are non-negative regardless of drag direction.
    pub fn from_points(a: Point, b: Point) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    /// Strict axis-aligned overlap test. Rectangles that merely touch at an
    /// edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right()
            && other.left < self.right()
            && self.top < other.bottom()
            && other.top < self.bottom()
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right() && p.y >= self.top && p.y <= self.bottom()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        Rect {
            left,
            top,
            width: self.right().max(other.right()) - left,
            height: self.bottom().max(other.bottom()) - top,
        }
    }

    pub fn to_kurbo(&self) -> kurbo::Rect {
        kurbo::Rect::new(self.left, self.top, self.right(), self.bottom())
    }

    pub fn from_kurbo(r: kurbo::Rect) -> Self {
        Self::new(r.x0, r.y0, r.width(), r.height())
    }
}

/// The view transform between screen (pointer/renderer) coordinates and
/// canvas-local coordinates.
///
/// `origin` is the canvas element's top-left corner in screen coordinates;
/// `zoom` is the current scale factor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CanvasTransform {
    pub origin: Point,
    pub zoom: f64,
}

impl Default for CanvasTransform {
    fn default() -> Self {
        Self { origin: Point::ZERO, zoom: 1.0 }
    }
}

impl CanvasTransform {
    pub fn new(origin: Point, zoom: f64) -> Self {
        Self { origin, zoom }
    }

    fn safe_zoom(&self) -> f64 {
        self.zoom.max(MIN_ZOOM)
    }

    /// Convert a screen point to canvas-local coordinates.
    pub fn screen_to_canvas(&self, screen: Point) -> Point {
        let z = self.safe_zoom();
        Point::new((screen.x - self.origin.x) / z, (screen.y - self.origin.y) / z)
    }

    /// Convert a canvas-local point back to screen coordinates.
    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        let z = self.safe_zoom();
        Point::new(canvas.x * z + self.origin.x, canvas.y * z + self.origin.y)
    }

    /// Convert a screen-space rectangle to canvas-local units, transforming
    /// all four fields independently.
    pub fn rect_screen_to_canvas(&self, rect: Rect) -> Rect {
        let z = self.safe_zoom();
        Rect {
            left: (rect.left - self.origin.x) / z,
            top: (rect.top - self.origin.y) / z,
            width: rect.width / z,
            height: rect.height / z,
        }
    }
}

/// Normalize a pointer drag delta into canvas units, dividing out the zoom.
pub fn normalize_drag_delta(start: Point, current: Point, zoom: f64) -> Vec2 {
    let z = zoom.max(MIN_ZOOM);
    Vec2::new((current.x - start.x) / z, (current.y - start.y) / z)
}

/// Source of live component rectangles.
///
/// The renderer owns the concrete measurement (one element per component id,
/// tagged with `data-component-id`); the engine depends only on this trait so
/// headless tests and non-DOM surfaces can supply rectangles directly.
pub trait RectProvider {
    /// Canvas-local rectangle of a component, if it is currently rendered.
    fn rect_of(&self, id: ComponentId) -> Option<Rect>;
}

/// A plain map of measured rectangles.
///
/// Hosts refresh this from their renderer on a polling interval (component
/// rectangles are a rendering side effect, not reachable synchronously after
/// a tree mutation) and hand it to the selection engine.
#[derive(Debug, Clone, Default)]
pub struct MeasuredRects {
    rects: HashMap<ComponentId, Rect>,
}

impl MeasuredRects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or replace the measurement for a component.
    pub fn insert(&mut self, id: ComponentId, rect: Rect) {
        self.rects.insert(id, rect);
    }

    pub fn remove(&mut self, id: ComponentId) {
        self.rects.remove(&id);
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, Rect)> + '_ {
        self.rects.iter().map(|(id, r)| (*id, *r))
    }
}

impl RectProvider for MeasuredRects {
    fn rect_of(&self, id: ComponentId) -> Option<Rect> {
        self.rects.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_to_canvas_identity() {
        let t = CanvasTransform::default();
        let p = Point::new(100.0, 200.0);
        let c = t.screen_to_canvas(p);
        assert!((c.x - p.x).abs() < f64::EPSILON);
        assert!((c.y - p.y).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_canvas_with_origin_and_zoom() {
        let t = CanvasTransform::new(Point::new(50.0, 100.0), 2.0);
        let c = t.screen_to_canvas(Point::new(150.0, 300.0));
        assert!((c.x - 50.0).abs() < f64::EPSILON);
        assert!((c.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let t = CanvasTransform::new(Point::new(30.0, -20.0), 1.5);
        let original = Point::new(123.0, 456.0);
        let canvas = t.screen_to_canvas(original);
        let back = t.canvas_to_screen(canvas);
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_zero_zoom_guard() {
        let t = CanvasTransform::new(Point::ZERO, 0.0);
        let c = t.screen_to_canvas(Point::new(1.0, 1.0));
        assert!(c.x.is_finite());
        assert!(c.y.is_finite());

        let d = normalize_drag_delta(Point::ZERO, Point::new(1.0, 0.0), 0.0);
        assert!(d.x.is_finite());
    }

    #[test]
    fn test_rect_screen_to_canvas() {
        let t = CanvasTransform::new(Point::new(10.0, 10.0), 2.0);
        let r = t.rect_screen_to_canvas(Rect::new(30.0, 50.0, 40.0, 20.0));
        assert!((r.left - 10.0).abs() < f64::EPSILON);
        assert!((r.top - 20.0).abs() < f64::EPSILON);
        assert!((r.width - 20.0).abs() < f64::EPSILON);
        assert!((r.height - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_drag_delta() {
        let d = normalize_drag_delta(Point::new(10.0, 10.0), Point::new(30.0, 50.0), 2.0);
        assert!((d.x - 10.0).abs() < f64::EPSILON);
        assert!((d.y - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 50.0, 100.0, 100.0);
        let c = Rect::new(200.0, 200.0, 10.0, 10.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));

        // Touching edges do not count as overlap.
        let d = Rect::new(100.0, 0.0, 50.0, 50.0);
        assert!(!a.intersects(&d));
    }

    #[test]
    fn test_rect_from_points_any_direction() {
        let a = Rect::from_points(Point::new(10.0, 10.0), Point::new(50.0, 40.0));
        let b = Rect::from_points(Point::new(50.0, 40.0), Point::new(10.0, 10.0));
        assert_eq!(a, b);
        assert!((a.width - 40.0).abs() < f64::EPSILON);
        assert!((a.height - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rect_union() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 5.0, 10.0, 10.0);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0.0, 0.0, 30.0, 15.0));
    }

    #[test]
    fn test_measured_rects_provider() {
        let mut m = MeasuredRects::new();
        let id = ComponentId::new_v4();
        assert!(m.rect_of(id).is_none());
        m.insert(id, Rect::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(m.rect_of(id), Some(Rect::new(1.0, 2.0, 3.0, 4.0)));
        m.remove(id);
        assert!(m.rect_of(id).is_none());
    }
}
