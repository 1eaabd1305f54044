//! Typed editor event bus.
//!
//! Cross-cutting editor signals (grouping shortcuts, live announcements,
//! comment-mode toggles) travel over an explicit bus instead of ambient
//! globals, so several editors can coexist in one process and tests can
//! assert on exactly what was published.

use crate::component::ComponentId;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Receiver, Sender, channel};

/// Events the editor publishes for its host shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorEvent {
    /// Screen-reader announcement for a structural change.
    LiveMessage { text: String },
    /// The grouped/ungrouped selection, for the host to re-select or
    /// scroll into view.
    Grouped { container: ComponentId, members: Vec<ComponentId> },
    Ungrouped { members: Vec<ComponentId> },
    /// Toggle the comment overlay.
    ToggleComments,
    /// Selection changed; carries the new set for inspector panes.
    SelectionChanged { ids: Vec<ComponentId> },
}

/// Publish half of the bus. Cheap to clone into whatever needs to emit.
#[derive(Clone)]
pub struct EditorBus {
    tx: Sender<EditorEvent>,
}

impl EditorBus {
    /// Create a bus and the receiver the host drains each frame.
    pub fn new() -> (Self, EditorBusReceiver) {
        let (tx, rx) = channel();
        (Self { tx }, EditorBusReceiver { rx })
    }

    pub fn publish(&self, event: EditorEvent) {
        // A closed receiver means the host is shutting down.
        let _ = self.tx.send(event);
    }
}

pub struct EditorBusReceiver {
    rx: Receiver<EditorEvent>,
}

impl EditorBusReceiver {
    /// All events published since the last drain.
    pub fn drain(&self) -> Vec<EditorEvent> {
        self.rx.try_iter().collect()
    }
}
