use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A forest of tags ordered by name. Each tag maps to its own sub-hierarchy.
pub type TagTree = BTreeMap<String, TagNode>;

/// A position in the hierarchy. Scraped fragments only ever produce
/// branches; scalar payloads can show up in persisted trees, and two sources
/// disagreeing on one are kept side by side instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagNode {
    Branch(TagTree),
    Value(String),
    Conflict(Vec<String>),
}

impl TagNode {
    pub fn empty() -> TagNode {
        TagNode::Branch(TagTree::new())
    }

    pub fn children(&self) -> Option<&TagTree> {
        match self {
            TagNode::Branch(children) => Some(children),
            _ => None,
        }
    }
}

/// One row of a scraped hierarchy page: the anchor text (if it could be
/// extracted) and its 1-based nesting depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentRow {
    pub anchor: Option<String>,
    pub depth: usize,
}

// the source hierarchy is capped at three meaningful levels
const MAX_DEPTH: usize = 4;

/// Rebuilds one fragment's tree from its pre-order row walk. Rows at depth
/// four or deeper are discarded; a row without anchor text is skipped
/// without disturbing the ancestor stack; a child arriving before any root
/// attaches at the current stack top (or becomes a root itself).
pub fn parse_fragment(rows: &[FragmentRow]) -> TagTree {
    let mut tree = TagTree::new();
    let mut stack: Vec<String> = Vec::new();

    for row in rows {
        if row.depth == 0 || row.depth >= MAX_DEPTH {
            continue;
        }
        let Some(tag) = row.anchor.as_deref() else { continue };
        while stack.len() + 1 > row.depth {
            stack.pop();
        }
        subtree_mut(&mut tree, &stack).insert(tag.to_string(), TagNode::empty());
        stack.push(tag.to_string());
    }

    tree
}

fn subtree_mut<'t>(tree: &'t mut TagTree, path: &[String]) -> &'t mut TagTree {
    let mut current = tree;
    for name in path {
        let node = current
            .entry(name.clone())
            .or_insert_with(TagNode::empty);
        if node.children().is_none() {
            *node = TagNode::empty();
        }
        current = match node {
            TagNode::Branch(children) => children,
            _ => unreachable!("node was just normalized to a branch"),
        };
    }
    current
}

/// Recursively merges `source` into `target`. Colliding branches merge
/// child-wise; colliding scalar payloads are preserved as a conflict when
/// they differ; a branch outranks a stray scalar from the other source.
pub fn merge_into(target: &mut TagTree, source: TagTree) {
    for (name, node) in source {
        match target.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(node);
            }
            Entry::Occupied(mut slot) => merge_nodes(slot.get_mut(), node),
        }
    }
}

fn merge_nodes(existing: &mut TagNode, incoming: TagNode) {
    use TagNode::{Branch, Conflict, Value};

    let current = std::mem::replace(existing, TagNode::empty());
    *existing = match (current, incoming) {
        (Branch(mut target), Branch(source)) => {
            merge_into(&mut target, source);
            Branch(target)
        }
        (Branch(target), Value(_) | Conflict(_)) => Branch(target),
        (Value(_) | Conflict(_), Branch(source)) => Branch(source),
        (Value(a), Value(b)) => {
            if a == b {
                Value(a)
            } else {
                Conflict(vec![a, b])
            }
        }
        (Conflict(mut seen), Value(b)) => {
            if !seen.contains(&b) {
                seen.push(b);
            }
            Conflict(seen)
        }
        (Value(a), Conflict(mut incoming_values)) => {
            if !incoming_values.contains(&a) {
                incoming_values.insert(0, a);
            }
            Conflict(incoming_values)
        }
        (Conflict(mut seen), Conflict(values)) => {
            for value in values {
                if !seen.contains(&value) {
                    seen.push(value);
                }
            }
            Conflict(seen)
        }
    };
}

/// Removes tags that the merge left at more than one depth, keeping only the
/// deepest occurrence of each. One pass can strand duplicates that earlier
/// deletions uncover, so the pass repeats until the tree stops changing.
pub fn dedup_to_fixed_point(mut tree: TagTree) -> TagTree {
    loop {
        let next = dedup_pass(&tree);
        if next == tree {
            return tree;
        }
        tree = next;
    }
}

fn dedup_pass(tree: &TagTree) -> TagTree {
    let mut depths: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
    record_depths(tree, 0, &mut depths);
    prune(tree, 0, &depths)
}

fn record_depths<'t>(
    tree: &'t TagTree,
    depth: usize,
    depths: &mut BTreeMap<&'t str, BTreeSet<usize>>,
) {
    for (name, node) in tree {
        depths.entry(name.as_str()).or_default().insert(depth);
        if let TagNode::Branch(children) = node {
            record_depths(children, depth + 1, depths);
        }
    }
}

fn prune(tree: &TagTree, depth: usize, depths: &BTreeMap<&str, BTreeSet<usize>>) -> TagTree {
    let mut kept = TagTree::new();
    for (name, node) in tree {
        if let Some(seen) = depths.get(name.as_str()) {
            // a tag recorded at several depths survives only at the deepest
            if seen.len() > 1 && seen.last() != Some(&depth) {
                continue;
            }
        }
        let node = match node {
            TagNode::Branch(children) => TagNode::Branch(prune(children, depth + 1, depths)),
            other => other.clone(),
        };
        kept.insert(name.clone(), node);
    }
    kept
}

/// Merges every fragment into one hierarchy and cleans up cross-fragment
/// duplicates. The result is ordered by tag name at every level.
pub fn build_hierarchy(fragments: &[Vec<FragmentRow>]) -> TagTree {
    let mut combined = TagTree::new();
    for rows in fragments {
        merge_into(&mut combined, parse_fragment(rows));
    }
    dedup_to_fixed_point(combined)
}

/// Prunes the hierarchy down to tags that appear in `all_tags` or have a
/// descendant that does. Pure: identical inputs give identical output,
/// child order included.
pub fn filter_hierarchy(tree: &TagTree, all_tags: &BTreeSet<String>) -> TagTree {
    let mut filtered = TagTree::new();
    for (name, node) in tree {
        match node.children() {
            Some(children) => {
                let kept = filter_hierarchy(children, all_tags);
                if all_tags.contains(name) || !kept.is_empty() {
                    filtered.insert(name.clone(), TagNode::Branch(kept));
                }
            }
            None => {
                if all_tags.contains(name) {
                    filtered.insert(name.clone(), node.clone());
                }
            }
        }
    }
    filtered
}

/// The full descendant closure of `tag`, not counting the tag itself. The
/// tag may sit anywhere in the forest; equal-depth duplicates that survive
/// dedup all contribute their children; an unknown tag has no descendants.
pub fn descendants(tag: &str, tree: &TagTree) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect_descendants(tag, tree, &mut found);
    found
}

fn collect_descendants(tag: &str, tree: &TagTree, out: &mut BTreeSet<String>) {
    for (name, node) in tree {
        let Some(children) = node.children() else { continue };
        if name == tag {
            collect_names(children, out);
        }
        collect_descendants(tag, children, out);
    }
}

fn collect_names(tree: &TagTree, out: &mut BTreeSet<String>) {
    for (name, node) in tree {
        out.insert(name.clone());
        if let TagNode::Branch(children) = node {
            collect_names(children, out);
        }
    }
}

/// Resolves a user's selection for one card: a checked tag matches when the
/// tag itself or any of its descendants appears in the card's tag set. The
/// result contains the checked tags that matched, never their descendants.
pub fn matching_tags(
    checked: &BTreeSet<String>,
    tree: &TagTree,
    card_tags: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut matched = BTreeSet::new();
    for tag in checked {
        let mut related = descendants(tag, tree);
        related.insert(tag.clone());
        if related.iter().any(|candidate| card_tags.contains(candidate)) {
            matched.insert(tag.clone());
        }
    }
    matched
}
