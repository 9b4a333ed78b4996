/**
 * Live Document
 *
 * Arena-backed mutable tree standing in for the browser DOM. Nodes are
 * addressed by `NodeId`; an id stays valid, and keeps naming the same node,
 * for as long as the node is not discarded, no matter how often it is
 * detached and re-inserted. That stable identity is what the morph engine
 * preserves across reorders, and what focus hangs off.
 *
 * Slots of discarded nodes go on a free list and are reused by later
 * inserts. Each `NodeId` carries the generation of its slot, so an id kept
 * past its node's discard never resolves to the node that took the slot.
 */

use crate::client::dom::node::{Element, Node, KEY_ATTRIBUTE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

impl NodeData {
    fn of(node: &Node) -> Self {
        match node {
            Node::Text(text) => NodeData::Text(text.clone()),
            Node::Element(element) => NodeData::Element {
                tag: element.tag.clone(),
                attributes: element.attributes.clone(),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    generation: u32,
    alive: bool,
}

#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    focus: Option<NodeId>,
}

impl Document {
    /// Build a document whose root is a copy of `node`
    pub fn from_node(node: &Node) -> Self {
        let mut document = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            focus: None,
        };
        document.root = document.create(node);
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.alive && slot.generation == id.generation)
    }

    fn slot_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.alive && slot.generation == id.generation)
    }

    /// Number of arena slots, live or free
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn allocate(&mut self, data: NodeData, parent: Option<NodeId>) -> NodeId {
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index) {
                slot.generation = slot.generation.wrapping_add(1);
                slot.data = data;
                slot.parent = parent;
                slot.children.clear();
                slot.alive = true;
                return NodeId {
                    index,
                    generation: slot.generation,
                };
            }
        }
        self.slots.push(Slot {
            data,
            parent,
            children: Vec::new(),
            generation: 0,
            alive: true,
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.slot(id).map(|slot| &slot.data)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).and_then(|slot| slot.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slot(id).map(|slot| slot.children.as_slice()).unwrap_or(&[])
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match self.data(id) {
            Some(NodeData::Element { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute; returns whether anything changed
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let Some(NodeData::Element { attributes, .. }) = self.slot_mut(id).map(|slot| &mut slot.data)
        else {
            return false;
        };
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) if slot.1 == value => false,
            Some(slot) => {
                slot.1 = value.to_string();
                true
            }
            None => {
                attributes.push((name.to_string(), value.to_string()));
                true
            }
        }
    }

    /// Remove an attribute; returns whether it was present
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        let Some(NodeData::Element { attributes, .. }) = self.slot_mut(id).map(|slot| &mut slot.data)
        else {
            return false;
        };
        let before = attributes.len();
        attributes.retain(|(n, _)| n != name);
        attributes.len() != before
    }

    pub(crate) fn replace_attributes(&mut self, id: NodeId, next: Vec<(String, String)>) {
        if let Some(NodeData::Element { attributes, .. }) = self.slot_mut(id).map(|slot| &mut slot.data) {
            *attributes = next;
        }
    }

    /// Copy `node` into the arena as a detached subtree
    pub fn create(&mut self, node: &Node) -> NodeId {
        let root = self.allocate(NodeData::of(node), None);
        let mut pending = vec![(root, node)];
        while let Some((id, node)) = pending.pop() {
            let Node::Element(element) = node else {
                continue;
            };
            let mut children = Vec::with_capacity(element.children.len());
            for child in &element.children {
                let child_id = self.allocate(NodeData::of(child), Some(id));
                children.push(child_id);
                pending.push((child_id, child));
            }
            if let Some(slot) = self.slot_mut(id) {
                slot.children = children;
            }
        }
        root
    }

    /// Detach `id` from its parent; the subtree stays alive
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(slot) = self.slot_mut(parent) {
            slot.children.retain(|child| *child != id);
        }
        if let Some(slot) = self.slot_mut(id) {
            slot.parent = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) || parent == child {
            return;
        }
        self.detach(child);
        if let Some(slot) = self.slot_mut(parent) {
            let index = index.min(slot.children.len());
            slot.children.insert(index, child);
        }
        if let Some(slot) = self.slot_mut(child) {
            slot.parent = Some(parent);
        }
    }

    /// Replace the child list of `parent` with `children`, in order
    ///
    /// Children dropped from the list are detached, not discarded.
    pub(crate) fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        let previous = self.children(parent).to_vec();
        for child in previous {
            if let Some(slot) = self.slot_mut(child) {
                slot.parent = None;
            }
        }
        for child in &children {
            self.detach(*child);
            if let Some(slot) = self.slot_mut(*child) {
                slot.parent = Some(parent);
            }
        }
        if let Some(slot) = self.slot_mut(parent) {
            slot.children = children;
        }
    }

    /// Free a subtree; focus inside it is lost
    pub fn discard(&mut self, id: NodeId) {
        self.detach(id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(slot) = self.slot_mut(next) else {
                continue;
            };
            slot.alive = false;
            slot.parent = None;
            slot.data = NodeData::Text(String::new());
            stack.append(&mut slot.children);
            self.free.push(next.index);
            if self.focus == Some(next) {
                self.focus = None;
            }
        }
    }

    /// Put `node` in place of `id`, discarding the old subtree
    pub fn replace(&mut self, id: NodeId, node: &Node) -> NodeId {
        let replacement = self.create(node);
        match self.parent(id) {
            Some(parent) => {
                let index = self
                    .children(parent)
                    .iter()
                    .position(|child| *child == id)
                    .unwrap_or(0);
                self.discard(id);
                self.insert_child(parent, index, replacement);
            }
            None => {
                if id == self.root {
                    self.root = replacement;
                }
                self.discard(id);
            }
        }
        replacement
    }

    pub fn focus(&mut self, id: NodeId) {
        if self.contains(id) {
            self.focus = Some(id);
        }
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focus
    }

    /// First element, in document order, whose attribute `name` equals `value`
    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.attribute(*id, name) == Some(value))
    }

    /// First element with a `key` attribute equal to `key`
    pub fn find_by_key(&self, key: &str) -> Option<NodeId> {
        self.find_by_attribute(KEY_ATTRIBUTE, key)
    }

    /// `id` and everything below it, in document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if !self.contains(next) {
                continue;
            }
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Copy a subtree back out as an owned `Node`
    pub fn to_node(&self, id: NodeId) -> Option<Node> {
        match self.data(id)? {
            NodeData::Text(text) => Some(Node::Text(text.clone())),
            NodeData::Element { tag, attributes } => Some(Node::Element(Element {
                tag: tag.clone(),
                attributes: attributes.clone(),
                children: self
                    .children(id)
                    .iter()
                    .filter_map(|child| self.to_node(*child))
                    .collect(),
            })),
        }
    }

    pub fn to_html(&self) -> String {
        self.to_node(self.root).map(|node| node.to_html()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> Node {
        Element::new("ul")
            .child(Element::new("li").attr("key", "a").text("A"))
            .child(Element::new("li").attr("key", "b").text("B"))
            .into()
    }

    #[test]
    fn test_round_trip() {
        let node = list();
        let document = Document::from_node(&node);
        assert_eq!(document.to_node(document.root()), Some(node));
    }

    #[test]
    fn test_reinsert_keeps_identity() {
        let mut document = Document::from_node(&list());
        let root = document.root();
        let b = document.find_by_key("b").unwrap();
        document.focus(b);

        document.insert_child(root, 0, b);
        assert_eq!(document.children(root)[0], b);
        assert_eq!(document.focused(), Some(b));
        assert_eq!(document.parent(b), Some(root));
    }

    #[test]
    fn test_discard_clears_focus() {
        let mut document = Document::from_node(&list());
        let a = document.find_by_key("a").unwrap();
        let text = document.children(a)[0];
        document.focus(text);

        document.discard(a);
        assert!(!document.contains(a));
        assert!(!document.contains(text));
        assert_eq!(document.focused(), None);
        assert_eq!(document.children(document.root()).len(), 1);
    }

    #[test]
    fn test_replace_root() {
        let mut document = Document::from_node(&list());
        let old_root = document.root();
        let new_root = document.replace(old_root, &Element::new("ol").into());
        assert_eq!(document.root(), new_root);
        assert_eq!(document.tag(new_root), Some("ol"));
        assert!(!document.contains(old_root));
    }

    #[test]
    fn test_discarded_slots_are_reused() {
        let mut document = Document::from_node(&list());
        let root = document.root();
        let slots = document.slot_count();

        for round in 0..100 {
            let a = document.find_by_key("a").unwrap();
            document.discard(a);
            let fresh = document.create(&Element::new("li").attr("key", "a").text(round.to_string()).into());
            document.insert_child(root, 0, fresh);
        }
        assert_eq!(document.slot_count(), slots);
        assert_eq!(document.descendants(root).len(), 5);
    }

    #[test]
    fn test_stale_id_does_not_resolve_to_reused_slot() {
        let mut document = Document::from_node(&list());
        let a = document.find_by_key("a").unwrap();
        document.discard(a);
        let fresh = document.create(&Element::new("p").into());

        assert!(!document.contains(a));
        assert_ne!(fresh, a);
        assert_eq!(document.tag(a), None);
        assert_eq!(document.tag(fresh), Some("p"));
        document.focus(a);
        assert_eq!(document.focused(), None);
    }

    #[test]
    fn test_create_handles_deep_nesting() {
        let mut node: Node = Element::new("span").into();
        for _ in 0..10_000 {
            node = Element::new("div").child(node).into();
        }
        let mut document = Document::from_node(&Node::Text(String::new()));
        let id = document.create(&node);
        assert_eq!(document.descendants(id).len(), 10_001);
        document.discard(id);
        assert!(!document.contains(id));
        // dropping an owned tree this deep recurses once per level
        std::mem::forget(node);
    }

    #[test]
    fn test_attribute_mutations_report_changes() {
        let mut document = Document::from_node(&list());
        let a = document.find_by_key("a").unwrap();
        assert!(document.set_attribute(a, "class", "x"));
        assert!(!document.set_attribute(a, "class", "x"));
        assert!(document.remove_attribute(a, "class"));
        assert!(!document.remove_attribute(a, "class"));
    }
}
