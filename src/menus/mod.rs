//! Declarative context-menu model
//!
//! Entries are registered once; visibility is recomputed against the
//! right-click target every time the menu opens.

use log::warn;

pub type MenuHandler = Box<dyn Fn() + Send + Sync>;

/// What the user right-clicked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetContext {
    Image,
    Audio,
    Video,
    Other,
}

/// Contexts an entry declares itself visible in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuContext {
    All,
    Image,
    Audio,
    Video,
}

impl MenuContext {
    fn matches(self, target: TargetContext) -> bool {
        match self {
            Self::All => true,
            Self::Image => target == TargetContext::Image,
            Self::Audio => target == TargetContext::Audio,
            Self::Video => target == TargetContext::Video,
        }
    }
}

pub enum MenuEntryKind {
    Item { title: String },
    Separator,
    Submenu { id: String, title: String },
}

/// One declaratively registered menu entry. Titles double as item ids for
/// click dispatch, matching the host menu API.
pub struct MenuEntry {
    pub kind: MenuEntryKind,
    pub parent_id: Option<String>,
    pub contexts: Vec<MenuContext>,
    pub enabled: bool,
    handler: Option<MenuHandler>,
}

impl MenuEntry {
    pub fn item(title: impl Into<String>) -> Self {
        Self {
            kind: MenuEntryKind::Item {
                title: title.into(),
            },
            parent_id: None,
            contexts: vec![MenuContext::All],
            enabled: true,
            handler: None,
        }
    }

    pub fn separator() -> Self {
        Self {
            kind: MenuEntryKind::Separator,
            parent_id: None,
            contexts: vec![MenuContext::All],
            enabled: true,
            handler: None,
        }
    }

    pub fn submenu(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: MenuEntryKind::Submenu {
                id: id.into(),
                title: title.into(),
            },
            parent_id: None,
            contexts: vec![MenuContext::All],
            enabled: true,
            handler: None,
        }
    }

    pub fn contexts(mut self, contexts: Vec<MenuContext>) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn child_of(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn on_click(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    fn title(&self) -> Option<&str> {
        match &self.kind {
            MenuEntryKind::Item { title } | MenuEntryKind::Submenu { title, .. } => Some(title),
            MenuEntryKind::Separator => None,
        }
    }

    /// An entry restricted to specific contexts is hidden unless the
    /// target's context is among them.
    fn visible_for(&self, target: TargetContext) -> bool {
        self.contexts.iter().any(|c| c.matches(target))
    }
}

/// The declarative entry list behind the native menu.
#[derive(Default)]
pub struct ContextMenuRegistry {
    entries: Vec<MenuEntry>,
    populated: bool,
}

impl ContextMenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one entry; order of registration is display order.
    pub fn create(&mut self, entry: MenuEntry) {
        self.entries.push(entry);
    }

    /// Tear everything down; the next open repopulates from scratch.
    pub fn remove_all(&mut self) {
        self.entries.clear();
        self.populated = false;
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Build the native menu tree once per population cycle.
    pub fn build_tree(&mut self, label: impl Into<String>) -> MenuTree {
        self.populated = true;
        MenuTree::build(&self.entries, label.into())
    }

    /// Titles visible for this right-click target, recomputed per open.
    pub fn visible_titles(&self, target: TargetContext) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.visible_for(target))
            .filter_map(|entry| entry.title())
            .collect()
    }

    /// Dispatch a click on the item with this title. Returns false when no
    /// such item (or no handler) is registered.
    pub fn click(&self, title: &str) -> bool {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.title() == Some(title));
        match entry.and_then(|e| e.handler.as_ref()) {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

/// Renderable menu tree with submenu nesting resolved.
#[derive(Debug, PartialEq, Eq)]
pub struct MenuTree {
    pub label: String,
    pub items: Vec<MenuNode>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MenuNode {
    Item { title: String, enabled: bool },
    Separator,
    Submenu {
        id: String,
        title: String,
        children: Vec<MenuNode>,
    },
}

impl MenuTree {
    fn build(entries: &[MenuEntry], label: String) -> Self {
        let mut items: Vec<MenuNode> = Vec::new();

        for entry in entries {
            let node = match &entry.kind {
                MenuEntryKind::Item { title } => MenuNode::Item {
                    title: title.clone(),
                    enabled: entry.enabled,
                },
                MenuEntryKind::Separator => MenuNode::Separator,
                MenuEntryKind::Submenu { id, title } => MenuNode::Submenu {
                    id: id.clone(),
                    title: title.clone(),
                    children: Vec::new(),
                },
            };

            match &entry.parent_id {
                Some(parent_id) => match find_submenu(&mut items, parent_id) {
                    Some(children) => children.push(node),
                    None => warn!("menu entry references unknown submenu '{}'", parent_id),
                },
                None => items.push(node),
            }
        }

        Self { label, items }
    }
}

fn find_submenu<'a>(items: &'a mut [MenuNode], id: &str) -> Option<&'a mut Vec<MenuNode>> {
    items.iter_mut().find_map(|node| match node {
        MenuNode::Submenu {
            id: node_id,
            children,
            ..
        } if node_id == id => Some(children),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample_registry() -> ContextMenuRegistry {
        let mut registry = ContextMenuRegistry::new();
        registry.create(MenuEntry::item("Block element"));
        registry.create(
            MenuEntry::item("Block image").contexts(vec![MenuContext::Image]),
        );
        registry.create(MenuEntry::separator());
        registry.create(MenuEntry::submenu("settings", "Settings"));
        registry.create(MenuEntry::item("Open log").child_of("settings"));
        registry
    }

    #[test]
    fn test_visibility_per_target_context() {
        let registry = sample_registry();
        assert_eq!(
            registry.visible_titles(TargetContext::Image),
            vec!["Block element", "Block image", "Settings", "Open log"]
        );
        // Restricted entries hide on targets outside their contexts.
        assert_eq!(
            registry.visible_titles(TargetContext::Other),
            vec!["Block element", "Settings", "Open log"]
        );
    }

    #[test]
    fn test_tree_nests_submenu_children() {
        let mut registry = sample_registry();
        let tree = registry.build_tree("Filter");
        assert!(registry.is_populated());
        assert_eq!(tree.items.len(), 4);
        match &tree.items[3] {
            MenuNode::Submenu { id, children, .. } => {
                assert_eq!(id, "settings");
                assert_eq!(
                    children[0],
                    MenuNode::Item {
                        title: "Open log".to_string(),
                        enabled: true,
                    }
                );
            }
            other => panic!("expected submenu, got {:?}", other),
        }
    }

    #[test]
    fn test_remove_all_resets_population() {
        let mut registry = sample_registry();
        registry.build_tree("Filter");
        registry.remove_all();
        assert!(!registry.is_populated());
        assert!(registry.visible_titles(TargetContext::Image).is_empty());
    }

    #[test]
    fn test_click_dispatch() {
        let clicks = Arc::new(AtomicUsize::new(0));
        let counter = clicks.clone();
        let mut registry = ContextMenuRegistry::new();
        registry.create(MenuEntry::item("Pause filtering").on_click(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(registry.click("Pause filtering"));
        assert!(!registry.click("Nonexistent"));
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }
}
