//! Queue based traversal over a [`DependencyTree`].
//!
//! Children of the node just visited are spliced onto the front of the queue, in name order.
//! Traversal is breadth first across the start node's children but descends into each subtree
//! before moving on to the next sibling. Anything sensitive to which candidate is seen first relies on this.

use std::collections::{HashSet, VecDeque};

use petgraph::prelude::*;

use super::{DependencyNode, DependencyTree};
use crate::endpoint::Endpoint;

/// Returned by a walk visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
	Descend,
	/// Don't enqueue this node's children. Queued work continues.
	Prune,
}

/// Identity used for de-duplication.
#[derive(Debug, PartialEq, Eq, Hash)]
enum WalkKey {
	Endpoint(Endpoint),
	Triple(String, String, String),
}

impl WalkKey {
	fn of(node: &DependencyNode) -> Self {
		match &node.endpoint {
			Some(e) => WalkKey::Endpoint(e.clone()),
			None => WalkKey::Triple(node.name.clone(), node.source.clone(), node.target.clone()),
		}
	}
}

#[derive(Default)]
struct Seen {
	keys: HashSet<WalkKey>,
	nodes: HashSet<NodeIndex>,
}

impl Seen {
	/// Returns true the first time a node or its identity is offered.
	fn insert(&mut self, index: NodeIndex, node: &DependencyNode) -> bool {
		let fresh_key = self.keys.insert(WalkKey::of(node));
		let fresh_node = self.nodes.insert(index);
		fresh_key && fresh_node
	}
}

/// Visits every node reachable from `from`, excluding `from` itself.
///
/// # Parameters
/// - `from` - Node whose dependencies are walked, usually the root.
/// - `dedupe` - Skip nodes whose endpoint (or name, source and target) was already queued in this walk.
/// Without it shared subtrees are visited once per path and cycles are only broken by [`WalkControl::Prune`].
/// - `visit` - Called with the node and its effective name, see [`DependencyNode::effective_name`].
pub fn walk<F>(tree: &DependencyTree, from: NodeIndex, dedupe: bool, mut visit: F)
where F: FnMut(NodeIndex, &DependencyNode, &str) -> WalkControl
{
	let mut seen = Seen::default();
	let mut queue = VecDeque::<NodeIndex>::new();

	for (_, child) in tree.dependencies(from) {
		if !dedupe || seen.insert(child, &tree[child]) {
			queue.push_back(child);
		}
	}

	while let Some(index) = queue.pop_front() {
		let node = &tree[index];
		if visit(index, node, node.effective_name()) == WalkControl::Prune {
			continue;
		}

		let children: Vec<_> = tree.dependencies(index)
			.into_iter()
			.map(|(_, child)| child)
			.filter(|child| !dedupe || seen.insert(*child, &tree[*child]))
			.collect();

		for child in children.into_iter().rev() {
			queue.push_front(child);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn node(name: &str, target: &str) -> DependencyNode {
		DependencyNode { name: name.into(), source: name.into(), target: target.into(), ..Default::default() }
	}

	/// root -> {b, c}, b -> d, c -> d'
	fn diamond(shared: bool) -> DependencyTree {
		let mut tree = DependencyTree::new(node("app", "*"));
		let root = tree.root;
		let b = tree.add_node(node("b", "*"));
		let c = tree.add_node(node("c", "*"));
		let d = tree.add_node(node("d", "~1.0.0"));
		let d2 = if shared { d } else { tree.add_node(node("d", "~1.0.0")) };
		tree.set_dependency(root, "b", b);
		tree.set_dependency(root, "c", c);
		tree.set_dependency(b, "d", d);
		tree.set_dependency(c, "d", d2);
		tree
	}

	fn visited(tree: &DependencyTree, dedupe: bool) -> Vec<String> {
		let mut names = Vec::new();
		walk(tree, tree.root, dedupe, |_, _, name| {
			names.push(name.to_string());
			WalkControl::Descend
		});
		names
	}

	#[test]
	fn diamond_visits_shared_node_once() {
		assert_eq!(visited(&diamond(true), true), ["b", "d", "c"]);
	}

	#[test]
	fn diamond_dedupes_equal_triples() {
		assert_eq!(visited(&diamond(false), true), ["b", "d", "c"]);
	}

	#[test]
	fn without_dedupe_every_path_is_walked() {
		assert_eq!(visited(&diamond(true), false), ["b", "d", "c", "d"]);
	}

	#[test]
	fn prune_skips_subtree_only() {
		let tree = diamond(false);
		let mut names = Vec::new();
		walk(&tree, tree.root, false, |_, _, name| {
			names.push(name.to_string());
			if name == "b" { WalkControl::Prune } else { WalkControl::Descend }
		});
		assert_eq!(names, ["b", "c", "d"]);
	}

	#[test]
	fn cycles_terminate_with_dedupe() {
		let mut tree = DependencyTree::new(node("app", "*"));
		let root = tree.root;
		let a = tree.add_node(node("a", "*"));
		let b = tree.add_node(node("b", "*"));
		tree.set_dependency(root, "a", a);
		tree.set_dependency(a, "b", b);
		tree.set_dependency(b, "a", a);
		assert_eq!(visited(&tree, true), ["a", "b"]);
	}

	#[test]
	fn endpoint_identity_wins_over_triple() {
		let mut tree = DependencyTree::new(node("app", "*"));
		let root = tree.root;
		let mut x = node("x", "*");
		x.endpoint = Some(Endpoint::new("x", "x", "*"));
		let mut y = node("x", "*");
		y.endpoint = Some(Endpoint::new("alias", "x", "*"));
		let x = tree.add_node(x);
		let y = tree.add_node(y);
		tree.set_dependency(root, "x", x);
		tree.set_dependency(root, "alias", y);
		assert_eq!(visited(&tree, true), ["alias", "x"]);
	}
}
