//! Host-facing editor facade.
//!
//! [`CanvasEditor`] owns the document, the overlay flags, and the
//! selection, and is the single serialization point for mutations: every
//! structural change goes through [`CanvasEditor::dispatch`], so the host
//! observes the tree move atomically from one valid state to the next.

use crate::bus::{EditorBus, EditorEvent};
use crate::component::{Component, ComponentId, ComponentType, Viewport};
use crate::geometry::RectProvider;
use crate::selection::{
    Marquee, RectPatch, SelectionModifier, SnapshotEntry, selection_bounds,
};
use crate::tree::{Action, Document, ResizePatch};
use crate::viewport::{
    EditorFlags, EditorMap, apply_desktop_order_across_breakpoints, is_hidden_for_viewport,
    is_locked, merge_flags,
};
use std::collections::HashSet;

pub struct CanvasEditor {
    document: Document,
    editor: EditorMap,
    selection: HashSet<ComponentId>,
    viewport: Viewport,
    marquee: Marquee,
    bus: EditorBus,
}

impl CanvasEditor {
    pub fn new(document: Document, bus: EditorBus) -> Self {
        Self {
            document,
            editor: EditorMap::new(),
            selection: HashSet::new(),
            viewport: Viewport::Desktop,
            marquee: Marquee::new(),
            bus,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn editor_map(&self) -> &EditorMap {
        &self.editor
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn selected(&self) -> &HashSet<ComponentId> {
        &self.selection
    }

    /// Apply one action to the tree. Ids that no longer exist afterwards
    /// fall out of the selection.
    pub fn dispatch(&mut self, action: Action) {
        self.document = self.document.apply(&action);
        let before = self.selection.len();
        self.selection.retain(|id| self.document.contains(*id));
        if self.selection.len() != before {
            self.announce_selection();
        }
    }

    pub fn merge_editor_flags(&mut self, id: ComponentId, patch: &EditorFlags) {
        merge_flags(&mut self.editor, id, patch);
    }

    /// Mark every container's desktop order as the explicit order on the
    /// narrower breakpoints.
    pub fn propagate_desktop_order(&mut self) {
        let patches = apply_desktop_order_across_breakpoints(&self.document.components, &self.editor);
        for (id, patch) in patches {
            merge_flags(&mut self.editor, id, &patch);
        }
    }

    // ---- click selection -------------------------------------------------

    /// Click-select `id` with the active keyboard modifier. Locked
    /// components are inert.
    pub fn select(&mut self, id: ComponentId, modifier: SelectionModifier) {
        let Some(component) = self.document.find(id) else {
            return;
        };
        if is_locked(component, &self.editor) {
            return;
        }
        match modifier {
            SelectionModifier::Replace => {
                self.selection.clear();
                self.selection.insert(id);
            }
            SelectionModifier::Union => {
                self.selection.insert(id);
            }
            SelectionModifier::Toggle => {
                if !self.selection.remove(&id) {
                    self.selection.insert(id);
                }
            }
        }
        self.announce_selection();
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.announce_selection();
        }
    }

    /// Select every selectable root component on the current breakpoint.
    pub fn select_all(&mut self) {
        self.selection = self
            .document
            .components
            .iter()
            .filter(|c| self.selectable(c))
            .map(|c| c.id)
            .collect();
        self.announce_selection();
    }

    // ---- marquee ---------------------------------------------------------

    /// Start a rubber-band drag at `point` (canvas coordinates). The
    /// hit-test snapshot covers root components that are selectable and
    /// currently measured.
    pub fn begin_marquee<P: RectProvider>(
        &mut self,
        point: kurbo::Point,
        provider: &P,
        modifier: SelectionModifier,
    ) {
        let snapshot: Vec<SnapshotEntry> = self
            .document
            .components
            .iter()
            .filter(|c| self.selectable(c))
            .filter_map(|c| provider.rect_of(c.id).map(|rect| SnapshotEntry { id: c.id, rect }))
            .collect();
        self.marquee.begin(point, snapshot, self.selection.clone(), modifier);
    }

    pub fn update_marquee(&mut self, point: kurbo::Point) {
        self.marquee.update(point);
    }

    pub fn marquee_rect(&self) -> Option<crate::geometry::Rect> {
        self.marquee.rect()
    }

    pub fn commit_marquee(&mut self) {
        if let Some(selection) = self.marquee.commit() {
            self.selection = selection;
            self.announce_selection();
        }
    }

    pub fn cancel_marquee(&mut self) {
        if let Some(base) = self.marquee.cancel() {
            self.selection = base;
            self.announce_selection();
        }
    }

    /// Union bounds of the current selection, for the multi-select overlay.
    pub fn selection_bounds<P: RectProvider>(&self, provider: &P) -> Option<crate::geometry::Rect> {
        selection_bounds(self.selection.iter().copied(), provider)
    }

    // ---- geometry patches ------------------------------------------------

    /// Commit gesture output to the tree. Each patch becomes a `Resize`
    /// for the active breakpoint, and when that breakpoint is not desktop
    /// the base (desktop) fields are written too, keeping the default
    /// layout in step the way the page renderer expects.
    pub fn apply_rect_patches(&mut self, patches: &[(ComponentId, RectPatch)]) {
        for (id, patch) in patches {
            if patch.is_empty() {
                continue;
            }
            let resize = ResizePatch {
                width: patch.width.map(format_px),
                height: patch.height.map(format_px),
                left: patch.left.map(format_px),
                top: patch.top.map(format_px),
                margin: None,
                padding: None,
            };
            if self.viewport != Viewport::Desktop {
                self.dispatch(Action::Resize {
                    id: *id,
                    viewport: Viewport::Desktop,
                    patch: resize.clone(),
                });
            }
            self.dispatch(Action::Resize { id: *id, viewport: self.viewport, patch: resize });
        }
    }

    // ---- structural conveniences -----------------------------------------

    /// Wrap the current selection in a new container. The members must be
    /// siblings; otherwise nothing happens. Selects the wrapper on
    /// success.
    pub fn group_selection(&mut self, container: ComponentType) {
        if self.selection.is_empty() || !self.same_parent(&self.selection) {
            return;
        }
        let members: Vec<ComponentId> = self.selection.iter().copied().collect();
        let before: HashSet<ComponentId> = self.document.all_ids().into_iter().collect();
        self.dispatch(Action::Group { ids: members.clone(), container });

        // The wrapper is the one id that did not exist before.
        let Some(wrapper) =
            self.document.all_ids().into_iter().find(|id| !before.contains(id))
        else {
            return;
        };
        self.selection.clear();
        self.selection.insert(wrapper);
        self.bus.publish(EditorEvent::Grouped { container: wrapper, members: members.clone() });
        self.bus.publish(EditorEvent::LiveMessage {
            text: format!("Grouped {} components", members.len()),
        });
        self.announce_selection();
    }

    /// Dissolve the selected container, selecting its former children.
    pub fn ungroup_selection(&mut self) {
        let ids: Vec<ComponentId> = self.selection.iter().copied().collect();
        let [id] = ids[..] else {
            return;
        };
        let Some(children) = self.document.find(id).and_then(Component::children) else {
            return;
        };
        let members: Vec<ComponentId> = children.iter().map(|c| c.id).collect();
        if members.is_empty() {
            return;
        }
        self.dispatch(Action::Ungroup { id });
        self.selection = members.iter().copied().collect();
        self.bus.publish(EditorEvent::Ungrouped { members: members.clone() });
        self.bus
            .publish(EditorEvent::LiveMessage { text: format!("Ungrouped {} components", members.len()) });
        self.announce_selection();
    }

    pub fn duplicate_selection(&mut self) {
        let ids: Vec<ComponentId> = self.selection.iter().copied().collect();
        for id in &ids {
            self.dispatch(Action::Duplicate { id: *id });
        }
        if !ids.is_empty() {
            self.bus.publish(EditorEvent::LiveMessage {
                text: format!("Duplicated {} components", ids.len()),
            });
        }
    }

    pub fn remove_selection(&mut self) {
        let ids: Vec<ComponentId> = self.selection.iter().copied().collect();
        for id in &ids {
            self.dispatch(Action::Remove { id: *id });
        }
        if !ids.is_empty() {
            self.bus
                .publish(EditorEvent::LiveMessage { text: format!("Removed {} components", ids.len()) });
        }
    }

    // ---- helpers ---------------------------------------------------------

    fn selectable(&self, component: &Component) -> bool {
        !is_locked(component, &self.editor)
            && !is_hidden_for_viewport(component.id, &self.editor, component.hidden, self.viewport)
    }

    fn same_parent(&self, ids: &HashSet<ComponentId>) -> bool {
        let mut parents = ids.iter().map(|id| self.document.position_of(*id).map(|(p, _)| p));
        let Some(first) = parents.next() else {
            return false;
        };
        first.is_some() && parents.all(|p| p == first)
    }

    fn announce_selection(&self) {
        let mut ids: Vec<ComponentId> = self.selection.iter().copied().collect();
        ids.sort();
        self.bus.publish(EditorEvent::SelectionChanged { ids });
    }
}

fn format_px(value: f64) -> String {
    format!("{}px", value.round())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EditorBusReceiver;
    use crate::geometry::{MeasuredRects, Rect};
    use crate::tree::TreePosition;
    use kurbo::Point;

    fn editor_with(components: Vec<Component>) -> (CanvasEditor, EditorBusReceiver) {
        let (bus, rx) = EditorBus::new();
        (CanvasEditor::new(Document::with_components(components), bus), rx)
    }

    fn section() -> Component {
        Component::new(ComponentType::Section)
    }

    #[test]
    fn test_click_select_modifiers() {
        let (a, b) = (section(), section());
        let (a_id, b_id) = (a.id, b.id);
        let (mut editor, _rx) = editor_with(vec![a, b]);

        editor.select(a_id, SelectionModifier::Replace);
        editor.select(b_id, SelectionModifier::Union);
        assert_eq!(editor.selected().len(), 2);

        editor.select(a_id, SelectionModifier::Toggle);
        assert_eq!(editor.selected(), &HashSet::from([b_id]));

        editor.select(a_id, SelectionModifier::Replace);
        assert_eq!(editor.selected(), &HashSet::from([a_id]));
    }

    #[test]
    fn test_locked_component_not_selectable() {
        let a = section();
        let a_id = a.id;
        let (mut editor, _rx) = editor_with(vec![a]);
        editor.merge_editor_flags(a_id, &EditorFlags { locked: Some(true), ..Default::default() });

        editor.select(a_id, SelectionModifier::Replace);
        assert!(editor.selected().is_empty());
    }

    #[test]
    fn test_dispatch_prunes_selection_of_removed_ids() {
        let a = section();
        let a_id = a.id;
        let (mut editor, _rx) = editor_with(vec![a]);
        editor.select(a_id, SelectionModifier::Replace);

        editor.dispatch(Action::Remove { id: a_id });
        assert!(editor.selected().is_empty());
        assert!(editor.document().components.is_empty());
    }

    #[test]
    fn test_marquee_skips_hidden_and_locked() {
        let (a, b, c) = (section(), section(), section());
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        let (mut editor, _rx) = editor_with(vec![a, b, c]);

        editor.merge_editor_flags(b_id, &EditorFlags { locked: Some(true), ..Default::default() });
        editor.merge_editor_flags(
            c_id,
            &EditorFlags { hidden: Some(vec![Viewport::Desktop]), ..Default::default() },
        );

        let mut rects = MeasuredRects::new();
        rects.insert(a_id, Rect::new(0.0, 0.0, 100.0, 100.0));
        rects.insert(b_id, Rect::new(0.0, 150.0, 100.0, 100.0));
        rects.insert(c_id, Rect::new(0.0, 300.0, 100.0, 100.0));

        editor.begin_marquee(Point::new(-10.0, -10.0), &rects, SelectionModifier::Replace);
        editor.update_marquee(Point::new(500.0, 500.0));
        editor.commit_marquee();

        assert_eq!(editor.selected(), &HashSet::from([a_id]));
    }

    #[test]
    fn test_marquee_unaffected_by_midflight_layout_change() {
        let a = section();
        let a_id = a.id;
        let (mut editor, _rx) = editor_with(vec![a]);

        let mut rects = MeasuredRects::new();
        rects.insert(a_id, Rect::new(0.0, 0.0, 50.0, 50.0));
        editor.begin_marquee(Point::new(-10.0, -10.0), &rects, SelectionModifier::Replace);

        // Layout shifts mid-drag; the frozen snapshot still wins.
        rects.insert(a_id, Rect::new(5000.0, 5000.0, 50.0, 50.0));
        editor.update_marquee(Point::new(100.0, 100.0));
        editor.commit_marquee();

        assert_eq!(editor.selected(), &HashSet::from([a_id]));
    }

    #[test]
    fn test_group_then_ungroup_roundtrip() {
        let (a, b) = (section(), section());
        let (a_id, b_id) = (a.id, b.id);
        let (mut editor, rx) = editor_with(vec![a, b]);

        editor.select(a_id, SelectionModifier::Replace);
        editor.select(b_id, SelectionModifier::Union);
        editor.group_selection(ComponentType::Section);

        assert_eq!(editor.document().components.len(), 1);
        let wrapper = editor.document().components[0].id;
        assert_eq!(editor.selected(), &HashSet::from([wrapper]));
        assert!(rx.drain().iter().any(|e| matches!(e, EditorEvent::Grouped { .. })));

        editor.ungroup_selection();
        assert_eq!(editor.document().components.len(), 2);
        assert_eq!(editor.selected(), &HashSet::from([a_id, b_id]));
    }

    #[test]
    fn test_group_requires_siblings() {
        let child = section();
        let child_id = child.id;
        let parent = Component::container(ComponentType::Section, vec![child]).unwrap();
        let root = section();
        let root_id = root.id;
        let (mut editor, _rx) = editor_with(vec![parent, root]);

        editor.select(child_id, SelectionModifier::Replace);
        editor.select(root_id, SelectionModifier::Union);
        editor.group_selection(ComponentType::Section);

        // Nothing changed: the members live under different parents.
        assert_eq!(editor.document().components.len(), 2);
    }

    #[test]
    fn test_apply_rect_patches_writes_viewport_fields() {
        let a = section();
        let a_id = a.id;
        let (mut editor, _rx) = editor_with(vec![a]);
        editor.set_viewport(Viewport::Tablet);

        let patch = RectPatch {
            left: Some(10.4),
            top: None,
            width: Some(320.0),
            height: Some(200.6),
        };
        editor.apply_rect_patches(&[(a_id, patch)]);

        let layout = &editor.document().find(a_id).unwrap().layout;
        assert_eq!(layout.tablet.width.as_deref(), Some("320px"));
        assert_eq!(layout.tablet.height.as_deref(), Some("201px"));
        assert_eq!(layout.tablet.left.as_deref(), Some("10px"));
        assert_eq!(layout.tablet.top, None);
        // The base breakpoint is kept in step.
        assert_eq!(layout.desktop.width.as_deref(), Some("320px"));
    }

    #[test]
    fn test_duplicate_and_remove_announce() {
        let a = section();
        let a_id = a.id;
        let (mut editor, rx) = editor_with(vec![a]);

        editor.select(a_id, SelectionModifier::Replace);
        editor.duplicate_selection();
        assert_eq!(editor.document().components.len(), 2);

        editor.remove_selection();
        assert_eq!(editor.document().components.len(), 1);

        let messages: Vec<String> = rx
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                EditorEvent::LiveMessage { text } => Some(text),
                _ => None,
            })
            .collect();
        assert!(messages.contains(&"Duplicated 1 components".to_string()));
        assert!(messages.contains(&"Removed 1 components".to_string()));
    }

    #[test]
    fn test_move_via_dispatch_keeps_selection() {
        let (a, b) = (section(), section());
        let (a_id, b_id) = (a.id, b.id);
        let (mut editor, _rx) = editor_with(vec![a, b]);
        editor.select(a_id, SelectionModifier::Replace);

        editor.dispatch(Action::Move {
            from: TreePosition::root(0),
            to: TreePosition::root(1),
        });
        assert_eq!(editor.document().components[0].id, b_id);
        assert_eq!(editor.selected(), &HashSet::from([a_id]));
    }
}
