//! Marquee selection, multi-select bounds, and anchored group resize.
//!
//! Each gesture is an explicit state machine (Idle → Dragging → Committed)
//! with pure transition functions, so any UI binding can drive it and an
//! interrupted gesture (Escape, window blur) can always be cancelled back
//! to a known state.

use crate::component::ComponentId;
use crate::geometry::{Rect, RectProvider};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Floor for group-resize scale factors; prevents collapse and inversion.
pub const MIN_SCALE: f64 = 0.01;

/// How marquee hits combine with the selection that existed before the
/// drag started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionModifier {
    /// No modifier: hits replace the selection.
    Replace,
    /// Shift: hits are added to the prior selection.
    Union,
    /// Meta/Ctrl: each hit flips membership relative to the prior selection.
    Toggle,
}

impl SelectionModifier {
    pub fn from_keys(shift: bool, meta: bool) -> Self {
        if meta {
            SelectionModifier::Toggle
        } else if shift {
            SelectionModifier::Union
        } else {
            SelectionModifier::Replace
        }
    }
}

/// One frozen hit-test entry. The snapshot is taken at drag start so the
/// result stays stable even if layout shifts mid-drag.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotEntry {
    pub id: ComponentId,
    pub rect: Rect,
}

#[derive(Debug, Clone, Default)]
enum MarqueeState {
    #[default]
    Idle,
    Dragging {
        start: Point,
        current: Point,
        snapshot: Vec<SnapshotEntry>,
        base: HashSet<ComponentId>,
        modifier: SelectionModifier,
    },
}

/// Rubber-band selection state machine.
///
/// The caller supplies the snapshot in canvas coordinates and pre-filters
/// it: locked or viewport-hidden components must never be offered, so they
/// can never be marquee-selected.
#[derive(Debug, Clone, Default)]
pub struct Marquee {
    state: MarqueeState,
}

impl Marquee {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, MarqueeState::Dragging { .. })
    }

    /// Begin a drag at `start` (canvas coordinates), freezing the hit-test
    /// snapshot and the pre-drag selection.
    pub fn begin(
        &mut self,
        start: Point,
        snapshot: Vec<SnapshotEntry>,
        base: HashSet<ComponentId>,
        modifier: SelectionModifier,
    ) {
        self.state = MarqueeState::Dragging { start, current: start, snapshot, base, modifier };
    }

    pub fn update(&mut self, point: Point) {
        if let MarqueeState::Dragging { current, .. } = &mut self.state {
            *current = point;
        }
    }

    /// The current selection rectangle, normalized for any drag direction.
    pub fn rect(&self) -> Option<Rect> {
        match &self.state {
            MarqueeState::Dragging { start, current, .. } => {
                Some(Rect::from_points(*start, *current))
            }
            MarqueeState::Idle => None,
        }
    }

    /// The selection the drag would produce right now.
    pub fn preview(&self) -> Option<HashSet<ComponentId>> {
        match &self.state {
            MarqueeState::Dragging { snapshot, base, modifier, .. } => {
                let rect = self.rect().expect("dragging state has a rect");
                let hits: HashSet<ComponentId> = snapshot
                    .iter()
                    .filter(|entry| rect.intersects(&entry.rect))
                    .map(|entry| entry.id)
                    .collect();
                Some(combine(base, &hits, *modifier))
            }
            MarqueeState::Idle => None,
        }
    }

    /// Pointer-up: commit the final selection and clear the marquee.
    pub fn commit(&mut self) -> Option<HashSet<ComponentId>> {
        let result = self.preview();
        self.state = MarqueeState::Idle;
        result
    }

    /// Escape or window blur: abandon the drag, restoring the pre-drag
    /// selection.
    pub fn cancel(&mut self) -> Option<HashSet<ComponentId>> {
        let base = match std::mem::take(&mut self.state) {
            MarqueeState::Dragging { base, .. } => Some(base),
            MarqueeState::Idle => None,
        };
        base
    }
}

fn combine(
    base: &HashSet<ComponentId>,
    hits: &HashSet<ComponentId>,
    modifier: SelectionModifier,
) -> HashSet<ComponentId> {
    match modifier {
        SelectionModifier::Replace => hits.clone(),
        SelectionModifier::Union => base.union(hits).copied().collect(),
        SelectionModifier::Toggle => base.symmetric_difference(hits).copied().collect(),
    }
}

/// Union bounding rectangle of a selection, from live measurements.
/// `None` when no member has a rectangle.
pub fn selection_bounds<P: RectProvider>(
    ids: impl IntoIterator<Item = ComponentId>,
    provider: &P,
) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    for id in ids {
        if let Some(rect) = provider.rect_of(id) {
            bounds = Some(match bounds {
                Some(b) => b.union(&rect),
                None => rect,
            });
        }
    }
    bounds
}

/// Resize handle on the multi-select bounding box. The anchor edge is
/// opposite the dragged handle and stays fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    N,
    S,
    E,
    W,
    Ne,
    Nw,
    Se,
    Sw,
}

impl ResizeHandle {
    /// Whether this handle scales the horizontal axis.
    pub fn affects_x(&self) -> bool {
        matches!(self, Self::E | Self::W | Self::Ne | Self::Nw | Self::Se | Self::Sw)
    }

    /// Whether this handle scales the vertical axis.
    pub fn affects_y(&self) -> bool {
        matches!(self, Self::N | Self::S | Self::Ne | Self::Nw | Self::Se | Self::Sw)
    }

    /// True when the dragged edge is the west one (anchor on the right).
    fn west(&self) -> bool {
        matches!(self, Self::W | Self::Nw | Self::Sw)
    }

    /// True when the dragged edge is the north one (anchor on the bottom).
    fn north(&self) -> bool {
        matches!(self, Self::N | Self::Ne | Self::Nw)
    }
}

/// Geometry patch produced by group move/resize, in the same parent-relative
/// units as the member rectangles. Only the axes the gesture affects (and
/// actually changed) are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl RectPatch {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.top.is_none() && self.width.is_none() && self.height.is_none()
    }
}

/// One selection member at gesture start. `rect` is relative to the
/// member's offset parent; members sharing `parent` scale as one group
/// against that group's own bounding box, so nested groups stay
/// proportional to their own container.
#[derive(Debug, Clone, Copy)]
pub struct ResizeMember {
    pub id: ComponentId,
    pub rect: Rect,
    pub parent: Option<ComponentId>,
}

/// Anchored scaling of a multi-selection from one handle.
#[derive(Debug, Clone)]
pub struct GroupResize {
    handle: ResizeHandle,
    start_pointer: Point,
    members: Vec<ResizeMember>,
    group_bounds: HashMap<Option<ComponentId>, Rect>,
}

impl GroupResize {
    /// Start a resize gesture. `pointer` is in canvas coordinates; member
    /// rectangles are frozen at this instant.
    pub fn begin(handle: ResizeHandle, pointer: Point, members: Vec<ResizeMember>) -> Self {
        let mut group_bounds: HashMap<Option<ComponentId>, Rect> = HashMap::new();
        for m in &members {
            group_bounds
                .entry(m.parent)
                .and_modify(|b| *b = b.union(&m.rect))
                .or_insert(m.rect);
        }
        Self { handle, start_pointer: pointer, members, group_bounds }
    }

    /// Per-node patches for the current pointer position. The drag delta
    /// must already be normalized to canvas units by the caller.
    pub fn update(&self, pointer: Point) -> Vec<(ComponentId, RectPatch)> {
        let dx = pointer.x - self.start_pointer.x;
        let dy = pointer.y - self.start_pointer.y;

        let mut patches = Vec::with_capacity(self.members.len());
        for m in &self.members {
            let group = self.group_bounds[&m.parent];
            let mut patch = RectPatch::default();

            if self.handle.affects_x() && group.width > 0.0 {
                let new_width = if self.handle.west() { group.width - dx } else { group.width + dx };
                let sx = (new_width / group.width).max(MIN_SCALE);
                let anchor = if self.handle.west() { group.right() } else { group.left };
                let left = anchor + (m.rect.left - anchor) * sx;
                let width = m.rect.width * sx;
                if (left - m.rect.left).abs() > f64::EPSILON {
                    patch.left = Some(left);
                }
                patch.width = Some(width);
            }
            if self.handle.affects_y() && group.height > 0.0 {
                let new_height =
                    if self.handle.north() { group.height - dy } else { group.height + dy };
                let sy = (new_height / group.height).max(MIN_SCALE);
                let anchor = if self.handle.north() { group.bottom() } else { group.top };
                let top = anchor + (m.rect.top - anchor) * sy;
                let height = m.rect.height * sy;
                if (top - m.rect.top).abs() > f64::EPSILON {
                    patch.top = Some(top);
                }
                patch.height = Some(height);
            }
            patches.push((m.id, patch));
        }
        patches
    }
}

/// One member of a bounding-box drag. `rect` is parent-relative;
/// `parent_size` is the parent's content box, used for clamping.
#[derive(Debug, Clone, Copy)]
pub struct MoveMember {
    pub id: ComponentId,
    pub rect: Rect,
    pub parent_size: kurbo::Size,
}

/// Uniform translation of a multi-selection, clamped per node to its own
/// parent's bounds.
#[derive(Debug, Clone)]
pub struct GroupMove {
    start_pointer: Point,
    members: Vec<MoveMember>,
}

impl GroupMove {
    pub fn begin(pointer: Point, members: Vec<MoveMember>) -> Self {
        Self { start_pointer: pointer, members }
    }

    pub fn update(&self, pointer: Point) -> Vec<(ComponentId, RectPatch)> {
        let dx = pointer.x - self.start_pointer.x;
        let dy = pointer.y - self.start_pointer.y;
        self.members
            .iter()
            .map(|m| {
                let max_left = (m.parent_size.width - m.rect.width).max(0.0);
                let max_top = (m.parent_size.height - m.rect.height).max(0.0);
                let patch = RectPatch {
                    left: Some((m.rect.left + dx).clamp(0.0, max_left)),
                    top: Some((m.rect.top + dy).clamp(0.0, max_top)),
                    width: None,
                    height: None,
                };
                (m.id, patch)
            })
            .collect()
    }
}
