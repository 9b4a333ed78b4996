/**
 * Morph Engine
 *
 * Patches a live `Document` subtree in place until it matches a freshly
 * rendered `Node`, touching as little as possible:
 *
 * - Children are diffed by key (tag plus `key` attribute for elements,
 *   content for text). Unchanged runs keep their nodes.
 * - Removed nodes are pooled by key; an equal-keyed node appearing anywhere
 *   in the new sequence takes the pooled node back, so identity (and focus)
 *   survives reordering. Leftovers are discarded unless the removal guard
 *   vetoes it.
 * - Kept and moved elements get their attributes reconciled, then the
 *   engine recurses into them, unless the live element carries the skip
 *   attribute.
 *
 * During live updates the attributes in `preserve_attributes` are left as
 * the user last set them.
 */

use crate::client::dom::{Document, Node, NodeData, NodeId, KEY_ATTRIBUTE};
use crate::client::morph::diff::diff;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Attributes holding form-control state a refresh must not clobber
pub const DEFAULT_PRESERVED_ATTRIBUTES: &[&str] = &["value", "checked", "open", "disabled", "selected"];

/// Attribute opting an element's subtree out of morphing
pub const DEFAULT_SKIP_ATTRIBUTE: &str = "data-skip-morph";

/// Returns `true` to keep a node the diff wants removed
pub type RemoveGuard = Arc<dyn Fn(&Document, NodeId) -> bool + Send + Sync>;

/// Sibling identity used by the diff
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Element { tag: String, key: Option<String> },
    Text(String),
}

impl NodeKey {
    pub fn of_node(node: &Node) -> Self {
        match node {
            Node::Element(element) => NodeKey::Element {
                tag: element.tag.clone(),
                key: element.attribute(KEY_ATTRIBUTE).map(str::to_string),
            },
            Node::Text(text) => NodeKey::Text(text.clone()),
        }
    }

    /// Key of a live node; `None` if `id` is not alive
    pub fn of_live(document: &Document, id: NodeId) -> Option<Self> {
        match document.data(id)? {
            NodeData::Element { tag, .. } => Some(NodeKey::Element {
                tag: tag.clone(),
                key: document.attribute(id, KEY_ATTRIBUTE).map(str::to_string),
            }),
            NodeData::Text(text) => Some(NodeKey::Text(text.clone())),
        }
    }
}

#[derive(Clone)]
pub struct MorphOptions {
    /// Incremental push onto a page the user may be interacting with
    pub live_update: bool,
    /// Left untouched while `live_update` is set
    pub preserve_attributes: HashSet<String>,
    pub skip_attribute: String,
    pub remove_guard: Option<RemoveGuard>,
}

impl Default for MorphOptions {
    fn default() -> Self {
        Self {
            live_update: true,
            preserve_attributes: DEFAULT_PRESERVED_ATTRIBUTES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            skip_attribute: DEFAULT_SKIP_ATTRIBUTE.to_string(),
            remove_guard: None,
        }
    }
}

impl MorphOptions {
    /// Options for a full reload: every attribute is reconciled
    pub fn full() -> Self {
        Self {
            live_update: false,
            ..Self::default()
        }
    }

    pub fn with_remove_guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&Document, NodeId) -> bool + Send + Sync + 'static,
    {
        self.remove_guard = Some(Arc::new(guard));
        self
    }

    fn preserves(&self, name: &str) -> bool {
        self.live_update && self.preserve_attributes.contains(name)
    }

    fn vetoes_removal(&self, document: &Document, id: NodeId) -> bool {
        self.remove_guard
            .as_ref()
            .map(|guard| guard(document, id))
            .unwrap_or(false)
    }
}

impl fmt::Debug for MorphOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MorphOptions")
            .field("live_update", &self.live_update)
            .field("preserve_attributes", &self.preserve_attributes)
            .field("skip_attribute", &self.skip_attribute)
            .field("remove_guard", &self.remove_guard.is_some())
            .finish()
    }
}

/// What a morph changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MorphStats {
    pub attributes_set: usize,
    pub attributes_removed: usize,
    pub nodes_inserted: usize,
    pub nodes_removed: usize,
    pub nodes_moved: usize,
    pub nodes_replaced: usize,
}

impl MorphStats {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Morph the live subtree at `live` into `fresh`
///
/// If the two roots have different keys the live subtree is replaced
/// wholesale; the replacement's id is then the document root if `live` was.
pub fn morph(document: &mut Document, live: NodeId, fresh: &Node, options: &MorphOptions) -> MorphStats {
    let mut stats = MorphStats::default();
    match NodeKey::of_live(document, live) {
        Some(key) if key == NodeKey::of_node(fresh) => {
            morph_node(document, live, fresh, options, &mut stats);
        }
        Some(_) => {
            document.replace(live, fresh);
            stats.nodes_replaced += 1;
        }
        None => {}
    }
    stats
}

/// `live` and `fresh` share a key
fn morph_node(
    document: &mut Document,
    live: NodeId,
    fresh: &Node,
    options: &MorphOptions,
    stats: &mut MorphStats,
) {
    let Node::Element(element) = fresh else {
        return;
    };
    let opted_out = document.attribute(live, &options.skip_attribute).is_some();
    reconcile_attributes(document, live, &element.attributes, options, stats);
    if !opted_out {
        morph_children(document, live, &element.children, options, stats);
    }
}

fn reconcile_attributes(
    document: &mut Document,
    live: NodeId,
    fresh: &[(String, String)],
    options: &MorphOptions,
    stats: &mut MorphStats,
) {
    let current = document.attributes(live).to_vec();
    let live_value = |name: &str| current.iter().find(|(n, _)| n == name).map(|(_, v)| v);

    let mut next = Vec::with_capacity(fresh.len());
    for (name, value) in fresh {
        if options.preserves(name) {
            if let Some(kept) = live_value(name) {
                next.push((name.clone(), kept.clone()));
            }
            continue;
        }
        if live_value(name) != Some(value) {
            stats.attributes_set += 1;
        }
        next.push((name.clone(), value.clone()));
    }
    for (name, value) in &current {
        if fresh.iter().any(|(n, _)| n == name) {
            continue;
        }
        if options.preserves(name) {
            next.push((name.clone(), value.clone()));
        } else {
            stats.attributes_removed += 1;
        }
    }

    if next != current {
        document.replace_attributes(live, next);
    }
}

fn morph_children(
    document: &mut Document,
    parent: NodeId,
    fresh: &[Node],
    options: &MorphOptions,
    stats: &mut MorphStats,
) {
    let live: Vec<NodeId> = document.children(parent).to_vec();
    let live_keys: Vec<NodeKey> = live
        .iter()
        .filter_map(|id| NodeKey::of_live(document, *id))
        .collect();
    let fresh_keys: Vec<NodeKey> = fresh.iter().map(NodeKey::of_node).collect();
    let units = diff(&live_keys, &fresh_keys);
    if units.is_empty() {
        for (id, node) in live.iter().zip(fresh) {
            morph_node(document, *id, node, options, stats);
        }
        return;
    }

    // Removed nodes become move candidates unless the guard holds them in place
    let mut pool: HashMap<&NodeKey, VecDeque<NodeId>> = HashMap::new();
    let mut held: HashSet<NodeId> = HashSet::new();
    for unit in &units {
        for index in unit.from.clone() {
            let id = live[index];
            if options.vetoes_removal(document, id) {
                held.insert(id);
            } else {
                pool.entry(&live_keys[index]).or_default().push_back(id);
            }
        }
    }

    let mut children = Vec::with_capacity(fresh.len() + held.len());
    let mut matched: Vec<(NodeId, &Node)> = Vec::with_capacity(fresh.len());
    let (mut i, mut j) = (0, 0);
    for unit in &units {
        for (id, node) in live[i..unit.from.start].iter().zip(&fresh[j..unit.to.start]) {
            children.push(*id);
            matched.push((*id, node));
        }
        children.extend(live[unit.from.clone()].iter().filter(|id| held.contains(*id)));

        for index in unit.to.clone() {
            let node = &fresh[index];
            match pool.get_mut(&fresh_keys[index]).and_then(VecDeque::pop_front) {
                Some(id) => {
                    stats.nodes_moved += 1;
                    children.push(id);
                    matched.push((id, node));
                }
                None => {
                    stats.nodes_inserted += 1;
                    children.push(document.create(node));
                }
            }
        }
        i = unit.from.end;
        j = unit.to.end;
    }
    for (id, node) in live[i..].iter().zip(&fresh[j..]) {
        children.push(*id);
        matched.push((*id, node));
    }

    document.set_children(parent, children);
    for id in pool.into_values().flatten() {
        stats.nodes_removed += 1;
        document.discard(id);
    }

    for (id, node) in matched {
        morph_node(document, id, node, options, stats);
    }
}
