//! Document tree model and its mutation actions.
//!
//! Every operation is pure: tree in, tree out, the input is never mutated.
//! Structural errors (unknown target, cross-parent group, cycle-creating
//! move) return the tree unchanged rather than raising; the host must never
//! lose an in-progress edit to a malformed action.

use crate::component::{
    coerce_i32, coerce_u32, Component, ComponentId, ComponentKind, ComponentType, ContentAlign,
    Viewport,
};
use crate::error::DocumentError;
use log::warn;
use serde::{Deserialize, Serialize};

/// A position in the tree: an index within the child list of `parent_id`,
/// or within the root list when `parent_id` is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePosition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ComponentId>,
    pub index: usize,
}

impl TreePosition {
    pub fn root(index: usize) -> Self {
        Self { parent_id: None, index }
    }

    pub fn under(parent_id: ComponentId, index: usize) -> Self {
        Self { parent_id: Some(parent_id), index }
    }
}

/// Scalar patch applied by [`Action::UpdateEditor`]. Numeric-looking string
/// fields are coerced; garbage input unsets nothing and sets nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Numeric-looking strings, coerced on apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_align: Option<ContentAlign>,
}

/// Layout patch applied by [`Action::Resize`] for one breakpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<String>,
}

/// The action contract the host dispatches against the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    Add {
        component: Component,
        index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_id: Option<ComponentId>,
    },
    Remove {
        id: ComponentId,
    },
    Move {
        from: TreePosition,
        to: TreePosition,
    },
    Duplicate {
        id: ComponentId,
    },
    UpdateEditor {
        id: ComponentId,
        patch: ComponentPatch,
    },
    Resize {
        id: ComponentId,
        viewport: Viewport,
        patch: ResizePatch,
    },
    Group {
        ids: Vec<ComponentId>,
        container: ComponentType,
    },
    Ungroup {
        id: ComponentId,
    },
}

/// The page's component tree: an ordered forest of root-level components.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub components: Vec<Component>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_components(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Apply one action, returning the resulting tree. Invalid actions
    /// return a structurally equal tree.
    pub fn apply(&self, action: &Action) -> Document {
        match action {
            Action::Add { component, index, parent_id } => {
                self.add(*parent_id, *index, component.clone())
            }
            Action::Remove { id } => self.remove(*id),
            Action::Move { from, to } => self.move_component(*from, *to),
            Action::Duplicate { id } => self.duplicate(*id),
            Action::UpdateEditor { id, patch } => self.update_editor_props(*id, patch),
            Action::Resize { id, viewport, patch } => self.resize(*id, *viewport, patch),
            Action::Group { ids, container } => self.group(ids, *container),
            Action::Ungroup { id } => self.ungroup(*id),
        }
    }

    /// Insert `component` at `index` under `parent_id` (root when absent),
    /// clamping the index into `[0, len]`. No-op when the parent does not
    /// resolve to a container, or the component's ids already occur in the
    /// tree.
    pub fn add(
        &self,
        parent_id: Option<ComponentId>,
        index: usize,
        component: Component,
    ) -> Document {
        let mut incoming = Vec::new();
        component.collect_ids(&mut incoming);
        if incoming.iter().any(|id| self.contains(*id)) {
            warn!("add rejected: component id already present in tree");
            return self.clone();
        }

        let mut next = self.clone();
        let inserted = match parent_id {
            None => {
                insert_clamped(&mut next.components, index, component);
                true
            }
            Some(pid) => match find_mut(&mut next.components, pid) {
                Some(parent) => match parent.children_mut() {
                    Some(children) => {
                        insert_clamped(children, index, component);
                        true
                    }
                    None => false,
                },
                None => false,
            },
        };
        if inserted { next } else { self.clone() }
    }

    /// Delete the node and its entire subtree. Idempotent.
    pub fn remove(&self, id: ComponentId) -> Document {
        let mut next = self.clone();
        remove_in(&mut next.components, id);
        next
    }

    /// Atomic positional extract-then-insert. Rejected (tree unchanged)
    /// when the source position is empty or when the destination parent is
    /// the moved node or one of its descendants.
    pub fn move_component(&self, from: TreePosition, to: TreePosition) -> Document {
        let mut next = self.clone();
        let Some(extracted) = extract_at(&mut next.components, from) else {
            return self.clone();
        };

        // Cycle guard: never move a node into its own subtree.
        if let Some(dest) = to.parent_id {
            if extracted.contains(dest) {
                warn!("move rejected: destination {dest} is inside the moved subtree");
                return self.clone();
            }
        }

        let reinserted = match to.parent_id {
            None => {
                insert_clamped(&mut next.components, to.index, extracted);
                true
            }
            Some(pid) => match find_mut(&mut next.components, pid) {
                Some(parent) => match parent.children_mut() {
                    Some(children) => {
                        insert_clamped(children, to.index, extracted);
                        true
                    }
                    None => false,
                },
                None => false,
            },
        };
        if reinserted { next } else { self.clone() }
    }

    /// Clone the subtree rooted at `id` with fresh ids throughout, inserted
    /// immediately after the original at the same level.
    pub fn duplicate(&self, id: ComponentId) -> Document {
        let mut next = self.clone();
        if duplicate_in(&mut next.components, id) { next } else { self.clone() }
    }

    /// Patch scalar fields on a single node. Numeric-looking strings are
    /// coerced; non-numeric input is discarded, leaving the field unset.
    pub fn update_editor_props(&self, id: ComponentId, patch: &ComponentPatch) -> Document {
        let mut next = self.clone();
        let Some(node) = find_mut(&mut next.components, id) else {
            return self.clone();
        };

        if let Some(name) = &patch.name {
            node.name = Some(name.clone());
        }
        if let Some(z) = &patch.z_index {
            node.layout.z_index = coerce_i32(z);
        }
        if let Some(w) = &patch.content_width {
            node.layout.content_width = Some(w.clone());
        }
        if let Some(align) = patch.content_align {
            node.layout.content_align = Some(align);
        }

        match &mut node.kind {
            ComponentKind::Text { text } => {
                if let Some(t) = &patch.text {
                    *text = t.clone();
                }
            }
            ComponentKind::Button { label, href } => {
                if let Some(l) = &patch.label {
                    *label = l.clone();
                }
                if let Some(h) = &patch.href {
                    *href = Some(h.clone());
                }
            }
            ComponentKind::Image { src, alt } => {
                if let Some(s) = &patch.src {
                    *src = s.clone();
                }
                if let Some(a) = &patch.alt {
                    *alt = Some(a.clone());
                }
            }
            ComponentKind::MultiColumn { columns, .. } => {
                if let Some(c) = &patch.columns {
                    *columns = coerce_u32(c);
                }
            }
            ComponentKind::Gallery { min_items, max_items, .. } => {
                if let Some(m) = &patch.min_items {
                    *min_items = coerce_u32(m);
                }
                if let Some(m) = &patch.max_items {
                    *max_items = coerce_u32(m);
                }
            }
            ComponentKind::Section { .. } => {}
        }
        next
    }

    /// Patch layout fields for one breakpoint on a single node.
    pub fn resize(&self, id: ComponentId, viewport: Viewport, patch: &ResizePatch) -> Document {
        let mut next = self.clone();
        let Some(node) = find_mut(&mut next.components, id) else {
            return self.clone();
        };
        let layout = node.layout.viewport_mut(viewport);
        if let Some(w) = &patch.width {
            layout.width = Some(w.clone());
        }
        if let Some(h) = &patch.height {
            layout.height = Some(h.clone());
        }
        if let Some(l) = &patch.left {
            layout.left = Some(l.clone());
        }
        if let Some(t) = &patch.top {
            layout.top = Some(t.clone());
        }
        if let Some(m) = &patch.margin {
            layout.margin = Some(m.clone());
        }
        if let Some(p) = &patch.padding {
            layout.padding = Some(p.clone());
        }
        next
    }

    /// Wrap same-parent siblings in a new container at the position of the
    /// first grouped item, preserving their relative order. Fails (tree
    /// unchanged) when the ids span different parents, any id is missing,
    /// or `container` is not a container type.
    pub fn group(&self, ids: &[ComponentId], container: ComponentType) -> Document {
        if ids.is_empty() || !container.is_container() {
            return self.clone();
        }

        // All ids must resolve under one shared parent.
        let mut shared_parent: Option<Option<ComponentId>> = None;
        for id in ids {
            let Some((parent, _)) = self.position_of(*id) else {
                return self.clone();
            };
            match shared_parent {
                None => shared_parent = Some(parent),
                Some(p) if p == parent => {}
                Some(_) => {
                    warn!("group rejected: ids span different parents");
                    return self.clone();
                }
            }
        }
        let parent = shared_parent.expect("ids checked non-empty");

        let mut next = self.clone();
        let siblings = match parent {
            None => &mut next.components,
            Some(pid) => match find_mut(&mut next.components, pid).and_then(|p| p.children_mut()) {
                Some(children) => children,
                None => return self.clone(),
            },
        };

        let first_index = siblings
            .iter()
            .position(|c| ids.contains(&c.id))
            .expect("membership verified above");

        // Extract in ascending index order, which preserves relative order.
        let mut grouped = Vec::with_capacity(ids.len());
        siblings.retain_mut(|c| {
            if ids.contains(&c.id) {
                grouped.push(c.clone());
                false
            } else {
                true
            }
        });

        let wrapper =
            Component::container(container, grouped).expect("container type checked above");
        insert_clamped(siblings, first_index, wrapper);
        next
    }

    /// Replace a container with its children, spliced in at the container's
    /// former position. No-op when the target has no children.
    pub fn ungroup(&self, id: ComponentId) -> Document {
        let Some((parent, index)) = self.position_of(id) else {
            return self.clone();
        };
        let has_children =
            self.find(id).and_then(|c| c.children()).is_some_and(|c| !c.is_empty());
        if !has_children {
            return self.clone();
        }

        let mut next = self.clone();
        let siblings = match parent {
            None => &mut next.components,
            Some(pid) => match find_mut(&mut next.components, pid).and_then(|p| p.children_mut()) {
                Some(children) => children,
                None => return self.clone(),
            },
        };
        let container = siblings.remove(index);
        let children = match container.kind {
            ComponentKind::Section { children, .. }
            | ComponentKind::MultiColumn { children, .. } => children,
            _ => return self.clone(),
        };
        for (offset, child) in children.into_iter().enumerate() {
            siblings.insert(index + offset, child);
        }
        next
    }

    // --- Queries ---

    pub fn find(&self, id: ComponentId) -> Option<&Component> {
        self.components.iter().find_map(|c| c.find(id))
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.find(id).is_some()
    }

    /// Parent id (None for root level) and sibling index of a node.
    pub fn position_of(&self, id: ComponentId) -> Option<(Option<ComponentId>, usize)> {
        position_in(&self.components, None, id)
    }

    /// Every id in the tree, depth first.
    pub fn all_ids(&self) -> Vec<ComponentId> {
        let mut ids = Vec::new();
        for c in &self.components {
            c.collect_ids(&mut ids);
        }
        ids
    }

    /// Total node count across the whole tree.
    pub fn len(&self) -> usize {
        self.all_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    // --- Serialization boundary ---

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize and validate a document from the host. Duplicate ids are
    /// rejected here, at the ingestion boundary, so the runtime invariant
    /// (every id appears exactly once) holds for all later operations.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let doc: Document = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut seen = std::collections::HashSet::new();
        for id in self.all_ids() {
            if !seen.insert(id) {
                return Err(DocumentError::DuplicateId(id));
            }
        }
        Ok(())
    }
}

fn insert_clamped(children: &mut Vec<Component>, index: usize, component: Component) {
    let at = index.min(children.len());
    children.insert(at, component);
}

fn find_mut(components: &mut [Component], id: ComponentId) -> Option<&mut Component> {
    for c in components.iter_mut() {
        if c.id == id {
            return Some(c);
        }
        if let Some(children) = c.children_mut() {
            if let Some(found) = find_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn remove_in(components: &mut Vec<Component>, id: ComponentId) {
    components.retain(|c| c.id != id);
    for c in components.iter_mut() {
        if let Some(children) = c.children_mut() {
            remove_in(children, id);
        }
    }
}

fn extract_at(components: &mut Vec<Component>, position: TreePosition) -> Option<Component> {
    match position.parent_id {
        None => {
            if position.index < components.len() {
                Some(components.remove(position.index))
            } else {
                None
            }
        }
        Some(pid) => {
            let children = find_mut(components, pid)?.children_mut()?;
            if position.index < children.len() {
                Some(children.remove(position.index))
            } else {
                None
            }
        }
    }
}

/// Insert a fresh-id clone right after the first occurrence of `id`,
/// searching depth first. Ids are unique so at most one match exists.
fn duplicate_in(components: &mut Vec<Component>, id: ComponentId) -> bool {
    if let Some(pos) = components.iter().position(|c| c.id == id) {
        let clone = components[pos].with_fresh_ids();
        components.insert(pos + 1, clone);
        return true;
    }
    for c in components.iter_mut() {
        if let Some(children) = c.children_mut() {
            if duplicate_in(children, id) {
                return true;
            }
        }
    }
    false
}

fn position_in(
    components: &[Component],
    parent: Option<ComponentId>,
    id: ComponentId,
) -> Option<(Option<ComponentId>, usize)> {
    for (i, c) in components.iter().enumerate() {
        if c.id == id {
            return Some((parent, i));
        }
        if let Some(children) = c.children() {
            if let Some(found) = position_in(children, Some(c.id), id) {
                return Some(found);
            }
        }
    }
    None
}
