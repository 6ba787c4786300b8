//! Object store shared by every parse call of a run.
//!
//! Root nodes are keyed by `(kind, name)`. Categories and extensions wait in
//! a separate pending map until [`Store::finalize`] moves them under their
//! base interface, so the outcome does not depend on file order.

use crate::error::Diagnostic;
use crate::model::{EntityKind, Node, NodeKey, Resolution, SourceLocation};
use crate::parser::merge;
use std::collections::BTreeMap;

/// Identity of a category or extension before it is resolved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CategoryKey {
    pub base_class: String,
    pub key: NodeKey,
}

/// Handle to a node that can receive members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerRef {
    Root(NodeKey),
    Pending(CategoryKey),
}

#[derive(Debug, Default)]
pub struct Store {
    roots: BTreeMap<NodeKey, Node>,
    pending: BTreeMap<CategoryKey, Node>,
    diagnostics: Vec<Diagnostic>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a top-level node.
    pub fn insert_root(&mut self, node: Node) -> ContainerRef {
        let key = node.key();
        let location = node.location.clone();
        let conflicts = merge::insert_or_merge(&mut self.roots, node);
        self.report_conflicts(conflicts, &location);
        ContainerRef::Root(key)
    }

    /// Insert a category or extension provisionally, to be resolved against
    /// `base_class` when the run is finalized.
    pub fn insert_category(&mut self, base_class: &str, node: Node) -> ContainerRef {
        let location = node.location.clone();
        let key = CategoryKey {
            base_class: base_class.to_string(),
            key: node.key(),
        };
        let conflicts = match self.pending.remove(&key) {
            Some(existing) => {
                let merged = merge::merge_nodes(existing, node);
                self.pending.insert(key.clone(), merged.node);
                merged.conflicts
            }
            None => {
                self.pending.insert(key.clone(), node);
                Vec::new()
            }
        };
        self.report_conflicts(conflicts, &location);
        ContainerRef::Pending(key)
    }

    /// Insert or merge a member under `container`. Returns false when the
    /// container does not exist.
    pub fn insert_child(&mut self, container: &ContainerRef, mut node: Node) -> bool {
        let location = node.location.clone();
        let Some(parent) = self.container_mut(container) else {
            return false;
        };
        node.parent = Some(parent.key());
        let conflicts = merge::insert_or_merge(&mut parent.children, node);
        self.report_conflicts(conflicts, &location);
        true
    }

    pub fn container(&self, container: &ContainerRef) -> Option<&Node> {
        match container {
            ContainerRef::Root(key) => self.roots.get(key),
            ContainerRef::Pending(key) => self.pending.get(key),
        }
    }

    fn container_mut(&mut self, container: &ContainerRef) -> Option<&mut Node> {
        match container {
            ContainerRef::Root(key) => self.roots.get_mut(key),
            ContainerRef::Pending(key) => self.pending.get_mut(key),
        }
    }

    /// Move every pending category under its base interface. Categories whose
    /// base class is unknown stay pending, marked unresolved, with a warning.
    /// Returns the number of unresolved categories.
    pub fn finalize(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut unresolved = 0;
        for (key, mut node) in pending {
            let base = NodeKey::new(EntityKind::Interface, key.base_class.as_str());
            match self.roots.get_mut(&base) {
                Some(interface) => {
                    node.resolution = Some(Resolution::Resolved);
                    node.parent = Some(base);
                    let location = node.location.clone();
                    let conflicts = merge::insert_or_merge(&mut interface.children, node);
                    self.report_conflicts(conflicts, &location);
                }
                None => {
                    if node.resolution != Some(Resolution::Unresolved) {
                        self.diagnostics.push(Diagnostic::warning(
                            Some(node.location.clone()),
                            format!(
                                "{} extends unknown class {}",
                                node.display_name(),
                                key.base_class
                            ),
                        ));
                    }
                    node.resolution = Some(Resolution::Unresolved);
                    self.pending.insert(key, node);
                    unresolved += 1;
                }
            }
        }
        tracing::debug!(
            "finalized store: {} roots, {} unresolved categories",
            self.roots.len(),
            unresolved
        );
        unresolved
    }

    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.roots.values()
    }

    pub fn root(&self, kind: EntityKind, name: &str) -> Option<&Node> {
        self.roots.get(&NodeKey::new(kind, name))
    }

    /// Categories and extensions not (yet) attached to a base interface.
    pub fn unresolved(&self) -> impl Iterator<Item = &Node> {
        self.pending.values()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn report_conflicts(&mut self, conflicts: Vec<String>, location: &SourceLocation) {
        for conflict in conflicts {
            self.diagnostics
                .push(Diagnostic::warning(Some(location.clone()), conflict));
        }
    }

    /// Number of root and pending nodes.
    pub fn len(&self) -> usize {
        self.roots.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every node without documentation, in key order.
    pub fn undocumented(&self) -> Vec<&Node> {
        fn walk<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
            if !node.is_documented() {
                out.push(node);
            }
            for child in node.children.values() {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        for node in self.roots.values().chain(self.pending.values()) {
            walk(node, &mut out);
        }
        out
    }

    /// Remove undocumented nodes. A container survives while anything
    /// inside it is documented. Returns the number of nodes removed.
    pub fn prune_undocumented(&mut self, keep_objects: bool, keep_members: bool) -> usize {
        let mut removed = prune(&mut self.roots, keep_objects, keep_members);
        for node in self.pending.values_mut() {
            removed += prune(&mut node.children, keep_objects, keep_members);
        }
        let before = self.pending.len();
        self.pending
            .retain(|_, node| keeps(node, keep_objects, keep_members));
        removed + before - self.pending.len()
    }
}

fn prune(siblings: &mut BTreeMap<NodeKey, Node>, keep_objects: bool, keep_members: bool) -> usize {
    let mut removed = 0;
    for node in siblings.values_mut() {
        removed += prune(&mut node.children, keep_objects, keep_members);
    }
    let before = siblings.len();
    siblings.retain(|_, node| keeps(node, keep_objects, keep_members));
    removed + before - siblings.len()
}

fn keeps(node: &Node, keep_objects: bool, keep_members: bool) -> bool {
    if node.kind.is_member() {
        keep_members || node.is_documented()
    } else {
        keep_objects || documented_within(node)
    }
}

fn documented_within(node: &Node) -> bool {
    node.is_documented() || node.children.values().any(documented_within)
}
