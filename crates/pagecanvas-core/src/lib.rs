//! PageCanvas Core Library
//!
//! Platform-agnostic editing engine for the page-builder canvas: the
//! component tree, viewport decoration, selection gestures, and peer
//! presence.

pub mod bus;
pub mod comments;
pub mod component;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod presence;
pub mod selection;
pub mod tree;
pub mod viewport;

pub use bus::{EditorBus, EditorBusReceiver, EditorEvent};
pub use comments::{PinPosition, canvas_to_pin, pin_to_canvas};
pub use component::{Component, ComponentId, ComponentKind, ComponentType, Viewport};
pub use editor::CanvasEditor;
pub use error::DocumentError;
pub use geometry::{CanvasTransform, MIN_ZOOM, MeasuredRects, Rect, RectProvider};
pub use presence::{
    DEBOUNCE_MS, HEARTBEAT_MS, LocalBus, PeerChannel, PeerId, PeerState, PresenceClient,
    PresenceMessage, STALE_AFTER_MS, presence_topic,
};
pub use selection::{
    GroupMove, GroupResize, MIN_SCALE, Marquee, MoveMember, RectPatch, ResizeHandle, ResizeMember,
    SelectionModifier,
};
pub use tree::{Action, ComponentPatch, Document, ResizePatch, TreePosition};
pub use viewport::{EditorFlags, EditorMap};
