//! Per-breakpoint editor overlay.
//!
//! The overlay decorates tree nodes without mutating the base tree: absence
//! of an entry means "use base-node defaults". Entries are created on first
//! edit of a property and live for the editing session; the host persists
//! them externally.

use crate::component::{Component, ComponentId, StackStrategy, Viewport};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Overlay entry keyed by component id. Doubles as the patch shape for
/// [`merge_flags`]: unset fields leave the existing entry untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    /// Breakpoints on which the component is hidden. `None` defers to the
    /// base node's `hidden` flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<Vec<Viewport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_desktop: Option<StackStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_tablet: Option<StackStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_mobile: Option<StackStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_desktop: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_tablet: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_mobile: Option<u32>,
    /// Marks a component shared across pages; informational for the host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global: Option<bool>,
}

impl EditorFlags {
    pub fn stack(&self, viewport: Viewport) -> Option<StackStrategy> {
        match viewport {
            Viewport::Desktop => self.stack_desktop,
            Viewport::Tablet => self.stack_tablet,
            Viewport::Mobile => self.stack_mobile,
        }
    }

    pub fn order(&self, viewport: Viewport) -> Option<u32> {
        match viewport {
            Viewport::Desktop => self.order_desktop,
            Viewport::Tablet => self.order_tablet,
            Viewport::Mobile => self.order_mobile,
        }
    }

    /// Overlay `patch` onto this entry; set fields win, unset fields keep
    /// the current value.
    pub fn merge(&mut self, patch: &EditorFlags) {
        macro_rules! take {
            ($field:ident) => {
                if patch.$field.is_some() {
                    self.$field = patch.$field.clone();
                }
            };
        }
        take!(name);
        take!(locked);
        take!(z_index);
        take!(hidden);
        take!(stack_desktop);
        take!(stack_tablet);
        take!(stack_mobile);
        take!(order_desktop);
        take!(order_tablet);
        take!(order_mobile);
        take!(global);
    }
}

/// Session-local decoration map, keyed by component id.
pub type EditorMap = HashMap<ComponentId, EditorFlags>;

/// Upsert a patch into the map, creating the entry on first edit.
pub fn merge_flags(map: &mut EditorMap, id: ComponentId, patch: &EditorFlags) {
    map.entry(id).or_default().merge(patch);
}

/// Effective hidden state for one breakpoint.
///
/// Returns `fallback_hidden` (the base node's flag) when no entry or no
/// `hidden` list exists; otherwise the overlay list alone decides.
pub fn is_hidden_for_viewport(
    id: ComponentId,
    map: &EditorMap,
    fallback_hidden: bool,
    viewport: Viewport,
) -> bool {
    match map.get(&id).and_then(|flags| flags.hidden.as_ref()) {
        Some(hidden) => hidden.contains(&viewport),
        None => fallback_hidden,
    }
}

/// Decorated copy of a node for one breakpoint: effective name, locked,
/// z-index, and hidden merged in, children decorated recursively.
pub fn decorate_for_viewport(
    component: &Component,
    map: &EditorMap,
    viewport: Viewport,
) -> Component {
    let mut decorated = component.clone();
    if let Some(flags) = map.get(&component.id) {
        if let Some(name) = &flags.name {
            decorated.name = Some(name.clone());
        }
        if let Some(locked) = flags.locked {
            decorated.locked = locked;
        }
        if let Some(z) = flags.z_index {
            decorated.layout.z_index = Some(z);
        }
    }
    decorated.hidden = is_hidden_for_viewport(component.id, map, component.hidden, viewport);
    if let Some(children) = decorated.children_mut() {
        let originals = component.children().expect("container in both copies");
        children.clear();
        children.extend(originals.iter().map(|c| decorate_for_viewport(c, map, viewport)));
    }
    decorated
}

/// Effective lock state (overlay wins over the base flag).
pub fn is_locked(component: &Component, map: &EditorMap) -> bool {
    map.get(&component.id)
        .and_then(|flags| flags.locked)
        .unwrap_or(component.locked)
}

/// The sibling list filtered to what the canvas renders for a breakpoint.
pub fn visible_components<'a>(
    components: &'a [Component],
    map: &EditorMap,
    viewport: Viewport,
) -> Vec<&'a Component> {
    components
        .iter()
        .filter(|c| !is_hidden_for_viewport(c.id, map, c.hidden, viewport))
        .collect()
}

/// Map an index in the visible list back to an index in the full sibling
/// list. Indices past the visible list append at the end.
pub fn to_underlying_index(
    components: &[Component],
    visible: &[&Component],
    ui_index: usize,
) -> usize {
    if let Some(target) = visible.get(ui_index) {
        if let Some(idx) = components.iter().position(|c| c.id == target.id) {
            return idx;
        }
    }
    components.len()
}

/// Effective desktop ordering of a container's children: source order for
/// `Default`, reversed for `Reverse`, and per-child `order_desktop` (ties
/// broken by source index) for `Custom`.
pub fn effective_desktop_order<'a>(
    parent: &'a Component,
    map: &EditorMap,
) -> Vec<&'a Component> {
    let Some(children) = parent.children() else {
        return Vec::new();
    };
    let strategy = map
        .get(&parent.id)
        .and_then(|flags| flags.stack_desktop)
        .unwrap_or_else(|| parent.stack_strategy());

    let mut ordered: Vec<(usize, &Component)> = children.iter().enumerate().collect();
    match strategy {
        StackStrategy::Default => {}
        StackStrategy::Reverse => ordered.reverse(),
        StackStrategy::Custom => {
            ordered.sort_by_key(|(source_index, c)| {
                let order = map
                    .get(&c.id)
                    .and_then(|flags| flags.order_desktop)
                    .unwrap_or(*source_index as u32);
                (order, *source_index)
            });
        }
    }
    ordered.into_iter().map(|(_, c)| c).collect()
}

/// One-way sync of the desktop layout onto tablet and mobile: every
/// container's effective desktop child order becomes an explicit custom
/// order on the other two breakpoints. Returns overlay patches; the caller
/// merges them via [`merge_flags`].
pub fn apply_desktop_order_across_breakpoints(
    components: &[Component],
    map: &EditorMap,
) -> Vec<(ComponentId, EditorFlags)> {
    let mut patches = Vec::new();
    for component in components {
        collect_order_patches(component, map, &mut patches);
    }
    patches
}

fn collect_order_patches(
    component: &Component,
    map: &EditorMap,
    patches: &mut Vec<(ComponentId, EditorFlags)>,
) {
    let Some(children) = component.children() else {
        return;
    };
    if !children.is_empty() {
        patches.push((
            component.id,
            EditorFlags {
                stack_tablet: Some(StackStrategy::Custom),
                stack_mobile: Some(StackStrategy::Custom),
                ..EditorFlags::default()
            },
        ));
        for (position, child) in effective_desktop_order(component, map).iter().enumerate() {
            patches.push((
                child.id,
                EditorFlags {
                    order_tablet: Some(position as u32),
                    order_mobile: Some(position as u32),
                    ..EditorFlags::default()
                },
            ));
        }
    }
    for child in children {
        collect_order_patches(child, map, patches);
    }
}
