//! Component definitions for the page document tree.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for components. Assigned at creation, never reused.
pub type ComponentId = Uuid;

/// Tag identifying a component's renderer and capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    Section,
    MultiColumn,
    Text,
    Button,
    Image,
    Gallery,
}

impl ComponentType {
    /// Container-capable types may carry children.
    pub fn is_container(&self) -> bool {
        matches!(self, ComponentType::Section | ComponentType::MultiColumn)
    }
}

/// Breakpoint the canvas is currently previewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewport {
    Desktop,
    Tablet,
    Mobile,
}

impl Viewport {
    pub const ALL: [Viewport; 3] = [Viewport::Desktop, Viewport::Tablet, Viewport::Mobile];
}

/// Horizontal alignment of a container's content column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// How a container orders its children on a given breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackStrategy {
    /// Source order.
    #[default]
    Default,
    /// Source order reversed.
    Reverse,
    /// Per-child numeric order, ties broken by source index.
    Custom,
}

/// Layout fields for one breakpoint. All values are CSS strings, kept
/// opaque to the engine (the renderer interprets them).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewportLayout {
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

impl ViewportLayout {
    pub fn is_empty(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.left.is_none()
            && self.top.is_none()
            && self.margin.is_none()
            && self.padding.is_none()
    }
}

/// Per-component layout properties across breakpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutProps {
    #[serde(default)]
    pub desktop: ViewportLayout,
    #[serde(default)]
    pub tablet: ViewportLayout,
    #[serde(default)]
    pub mobile: ViewportLayout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_align: Option<ContentAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

impl LayoutProps {
    pub fn viewport(&self, viewport: Viewport) -> &ViewportLayout {
        match viewport {
            Viewport::Desktop => &self.desktop,
            Viewport::Tablet => &self.tablet,
            Viewport::Mobile => &self.mobile,
        }
    }

    pub fn viewport_mut(&mut self, viewport: Viewport) -> &mut ViewportLayout {
        match viewport {
            Viewport::Desktop => &mut self.desktop,
            Viewport::Tablet => &mut self.tablet,
            Viewport::Mobile => &mut self.mobile,
        }
    }
}

/// Type-specific payload. Only container variants carry children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ComponentKind {
    Section {
        #[serde(default)]
        children: Vec<Component>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<StackStrategy>,
    },
    MultiColumn {
        #[serde(default)]
        children: Vec<Component>,
        #[serde(skip_serializing_if = "Option::is_none")]
        columns: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        gap: Option<String>,
    },
    Text {
        #[serde(default)]
        text: String,
    },
    Button {
        #[serde(default)]
        label: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        href: Option<String>,
    },
    Image {
        #[serde(default)]
        src: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
    Gallery {
        #[serde(default)]
        images: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_items: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_items: Option<u32>,
    },
}

impl ComponentKind {
    pub fn component_type(&self) -> ComponentType {
        match self {
            ComponentKind::Section { .. } => ComponentType::Section,
            ComponentKind::MultiColumn { .. } => ComponentType::MultiColumn,
            ComponentKind::Text { .. } => ComponentType::Text,
            ComponentKind::Button { .. } => ComponentType::Button,
            ComponentKind::Image { .. } => ComponentType::Image,
            ComponentKind::Gallery { .. } => ComponentType::Gallery,
        }
    }
}

/// A node in the page document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Base visibility; the editor overlay can override per breakpoint.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    /// Base lock state; prevents canvas move/resize when set.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
    #[serde(default)]
    pub layout: LayoutProps,
    #[serde(flatten)]
    pub kind: ComponentKind,
}

impl Component {
    /// Create a component of the given type with a fresh id and empty
    /// payload defaults.
    pub fn new(component_type: ComponentType) -> Self {
        let kind = match component_type {
            ComponentType::Section => ComponentKind::Section { children: Vec::new(), stack: None },
            ComponentType::MultiColumn => {
                ComponentKind::MultiColumn { children: Vec::new(), columns: None, gap: None }
            }
            ComponentType::Text => ComponentKind::Text { text: String::new() },
            ComponentType::Button => ComponentKind::Button { label: String::new(), href: None },
            ComponentType::Image => ComponentKind::Image { src: String::new(), alt: None },
            ComponentType::Gallery => {
                ComponentKind::Gallery { images: Vec::new(), min_items: None, max_items: None }
            }
        };
        Self {
            id: Uuid::new_v4(),
            name: None,
            hidden: false,
            locked: false,
            layout: LayoutProps::default(),
            kind,
        }
    }

    /// Create a container of the given type wrapping existing children.
    /// Returns `None` for non-container types.
    pub fn container(component_type: ComponentType, children: Vec<Component>) -> Option<Self> {
        let kind = match component_type {
            ComponentType::Section => ComponentKind::Section { children, stack: None },
            ComponentType::MultiColumn => {
                ComponentKind::MultiColumn { children, columns: None, gap: None }
            }
            _ => return None,
        };
        Some(Self {
            id: Uuid::new_v4(),
            name: None,
            hidden: false,
            locked: false,
            layout: LayoutProps::default(),
            kind,
        })
    }

    pub fn component_type(&self) -> ComponentType {
        self.kind.component_type()
    }

    pub fn is_container(&self) -> bool {
        self.component_type().is_container()
    }

    /// Children of a container, or `None` for leaf types. A container may
    /// have an empty child list.
    pub fn children(&self) -> Option<&[Component]> {
        match &self.kind {
            ComponentKind::Section { children, .. }
            | ComponentKind::MultiColumn { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Component>> {
        match &mut self.kind {
            ComponentKind::Section { children, .. }
            | ComponentKind::MultiColumn { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Desktop stacking strategy declared on the node itself.
    pub fn stack_strategy(&self) -> StackStrategy {
        match &self.kind {
            ComponentKind::Section { stack, .. } => stack.unwrap_or_default(),
            _ => StackStrategy::Default,
        }
    }

    /// Find a node by id in this subtree.
    pub fn find(&self, id: ComponentId) -> Option<&Component> {
        if self.id == id {
            return Some(self);
        }
        self.children()?.iter().find_map(|c| c.find(id))
    }

    /// Whether this subtree contains the given id.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.find(id).is_some()
    }

    /// Collect every id in this subtree, depth first.
    pub fn collect_ids(&self, out: &mut Vec<ComponentId>) {
        out.push(self.id);
        if let Some(children) = self.children() {
            for child in children {
                child.collect_ids(out);
            }
        }
    }

    /// Clone this subtree assigning a fresh id to every node.
    pub fn with_fresh_ids(&self) -> Component {
        let mut clone = self.clone();
        clone.reassign_ids();
        clone
    }

    fn reassign_ids(&mut self) {
        self.id = Uuid::new_v4();
        if let Some(children) = self.children_mut() {
            for child in children {
                child.reassign_ids();
            }
        }
    }
}

/// Coerce a numeric-looking string field to a number. Non-numeric input is
/// discarded (field left unset) rather than surfaced as an error.
pub fn coerce_u32(input: &str) -> Option<u32> {
    input.trim().parse::<u32>().ok()
}

/// Signed variant for fields such as z-index.
pub fn coerce_i32(input: &str) -> Option<i32> {
    input.trim().parse::<i32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_capability() {
        assert!(ComponentType::Section.is_container());
        assert!(ComponentType::MultiColumn.is_container());
        assert!(!ComponentType::Text.is_container());
        assert!(!ComponentType::Gallery.is_container());
    }

    #[test]
    fn test_new_container_has_empty_children() {
        let section = Component::new(ComponentType::Section);
        assert!(section.children().is_some_and(|c| c.is_empty()));

        let text = Component::new(ComponentType::Text);
        assert!(text.children().is_none());
    }

    #[test]
    fn test_find_nested() {
        let leaf = Component::new(ComponentType::Text);
        let leaf_id = leaf.id;
        let inner = Component::container(ComponentType::MultiColumn, vec![leaf]).unwrap();
        let outer = Component::container(ComponentType::Section, vec![inner]).unwrap();

        assert!(outer.contains(leaf_id));
        assert_eq!(outer.find(leaf_id).unwrap().id, leaf_id);
        assert!(!outer.contains(Uuid::new_v4()));
    }

    #[test]
    fn test_with_fresh_ids_disjoint_and_isomorphic() {
        let mut original = Component::container(
            ComponentType::Section,
            vec![Component::new(ComponentType::Text), Component::new(ComponentType::Button)],
        )
        .unwrap();
        original.name = Some("hero".to_string());

        let clone = original.with_fresh_ids();

        let mut original_ids = Vec::new();
        original.collect_ids(&mut original_ids);
        let mut clone_ids = Vec::new();
        clone.collect_ids(&mut clone_ids);

        assert_eq!(original_ids.len(), clone_ids.len());
        for id in &clone_ids {
            assert!(!original_ids.contains(id));
        }
        assert_eq!(clone.name.as_deref(), Some("hero"));
        assert_eq!(
            clone.children().unwrap().len(),
            original.children().unwrap().len()
        );
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(coerce_u32("12"), Some(12));
        assert_eq!(coerce_u32(" 3 "), Some(3));
        assert_eq!(coerce_u32("12px"), None);
        assert_eq!(coerce_u32("abc"), None);
        assert_eq!(coerce_i32("-2"), Some(-2));
        assert_eq!(coerce_i32("auto"), None);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut c = Component::new(ComponentType::Button);
        if let ComponentKind::Button { label, .. } = &mut c.kind {
            *label = "Buy now".to_string();
        }
        c.layout.desktop.width = Some("320px".to_string());

        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"Button\""));
        let back: Component = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
