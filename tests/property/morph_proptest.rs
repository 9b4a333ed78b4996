//! Property-based tests for the morph engine

use live_updates::client::dom::{Document, Element, Node};
use live_updates::client::{morph, MorphOptions};
use proptest::prelude::*;
use proptest::sample::select;

const TAGS: &[&str] = &["div", "p", "ul", "li", "span"];
const KEYS: &[&str] = &["a", "b", "c", "d"];
const ATTRIBUTES: &[&str] = &["class", "id", "title", "value", "open"];

fn attributes() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map(select(ATTRIBUTES), "[a-c]{0,2}", 0..3)
        .prop_map(|map| map.into_iter().map(|(name, value)| (name.to_string(), value)).collect())
}

fn element(tag: &str, mut attributes: Vec<(String, String)>, key: Option<&str>, children: Vec<Node>) -> Node {
    if let Some(key) = key {
        attributes.push(("key".to_string(), key.to_string()));
    }
    Node::Element(Element {
        tag: tag.to_string(),
        attributes,
        children,
    })
}

fn tree() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        "[a-c]{1,2}".prop_map(Node::Text),
        (select(TAGS), attributes(), prop::option::of(select(KEYS)))
            .prop_map(|(tag, attributes, key)| element(tag, attributes, key, Vec::new())),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        (
            select(TAGS),
            attributes(),
            prop::option::of(select(KEYS)),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(tag, attributes, key, children)| element(tag, attributes, key, children))
    })
}

fn page() -> impl Strategy<Value = Node> {
    prop::collection::vec(tree(), 0..5).prop_map(|children| element("html", Vec::new(), None, children))
}

fn morphed(live: &Node, fresh: &Node, options: &MorphOptions) -> (Document, bool) {
    let mut document = Document::from_node(live);
    let root = document.root();
    let stats = morph(&mut document, root, fresh, options);
    (document, stats.is_noop())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_morph_converges(live in page(), fresh in page()) {
        let (document, _) = morphed(&live, &fresh, &MorphOptions::full());
        prop_assert_eq!(document.to_node(document.root()), Some(fresh));
    }

    #[test]
    fn test_successive_pushes_converge(first in page(), pushes in prop::collection::vec(page(), 1..4)) {
        let mut document = Document::from_node(&first);
        for push in &pushes {
            let root = document.root();
            morph(&mut document, root, push, &MorphOptions::full());
        }
        prop_assert_eq!(document.to_node(document.root()), pushes.last().cloned());
    }

    #[test]
    fn test_morph_onto_identical_copy_is_noop(live in page()) {
        for options in [MorphOptions::default(), MorphOptions::full()] {
            let (document, noop) = morphed(&live, &live, &options);
            prop_assert!(noop);
            prop_assert_eq!(document.to_node(document.root()), Some(live.clone()));
        }
    }

    #[test]
    fn test_keyed_reorder_preserves_identity(
        order in Just((0..8).collect::<Vec<usize>>()).prop_shuffle(),
        focused in 0usize..8,
    ) {
        let list = |order: &[usize]| {
            let items = order
                .iter()
                .map(|i| {
                    let key = format!("item-{}", i);
                    element("li", Vec::new(), Some(key.as_str()), vec![Node::Text(i.to_string())])
                })
                .collect();
            element("ul", Vec::new(), None, items)
        };
        let mut document = Document::from_node(&list(&(0..8).collect::<Vec<_>>()));
        let before: Vec<_> = (0..8)
            .map(|i| document.find_by_key(&format!("item-{}", i)).unwrap())
            .collect();
        document.focus(before[focused]);

        let root = document.root();
        let stats = morph(&mut document, root, &list(&order), &MorphOptions::default());

        prop_assert_eq!(stats.nodes_inserted, 0);
        prop_assert_eq!(stats.nodes_removed, 0);
        prop_assert_eq!(document.focused(), Some(before[focused]));
        for (i, id) in before.iter().enumerate() {
            prop_assert_eq!(document.find_by_key(&format!("item-{}", i)), Some(*id));
        }
        prop_assert_eq!(document.to_node(root), Some(list(&order)));
    }
}
