//! Filtering repeated requests before they reach the resolver.
//!
//! Only requests that are fully identical collapse. Two requests for the same package at different targets
//! are both kept so the conflict surfaces during election.

use petgraph::prelude::*;

use crate::endpoint::Endpoint;
use crate::tree::DependencyTree;

/// Checks if two endpoints request exactly the same thing.
///
/// Named endpoints compare by name, anonymous ones by source. A named and an anonymous endpoint are never
/// considered the same request, even when they would resolve to the same package.
pub fn is_same_request(a: &Endpoint, b: &Endpoint) -> bool {
	let same_package = match (a.has_name(), b.has_name()) {
		(true, true) => a.name == b.name && a.source == b.source,
		(false, false) => a.source == b.source,
		_ => false,
	};
	same_package && a.target == b.target
}

fn unique_by<T: Clone>(items: &[T], same: impl Fn(&T, &T) -> bool) -> Vec<T> {
	let mut kept = Vec::<T>::with_capacity(items.len());
	for item in items {
		if !kept.iter().any(|k| same(k, item)) {
			kept.push(item.clone());
		}
	}
	kept
}

/// Removes later endpoints identical to an earlier one, preserving order.
pub fn make_unique(endpoints: &[Endpoint]) -> Vec<Endpoint> {
	unique_by(endpoints, is_same_request)
}

/// [`make_unique`] over tree nodes. The same node listed twice is always a duplicate.
pub fn make_unique_nodes(tree: &DependencyTree, nodes: &[NodeIndex]) -> Vec<NodeIndex> {
	unique_by(nodes, |a, b| a == b || is_same_request(&tree[*a].endpoint(), &tree[*b].endpoint()))
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::tree::DependencyNode;

	fn ep(name: &str, source: &str, target: &str) -> Endpoint { Endpoint::new(name, source, target) }

	#[test]
	fn identical_requests_collapse() {
		let unique = make_unique(&[ep("a", "a", "~1.0.0"), ep("b", "b", "*"), ep("a", "a", "~1.0.0")]);
		assert_eq!(unique, [ep("a", "a", "~1.0.0"), ep("b", "b", "*")]);
	}

	#[test]
	fn different_targets_are_kept() {
		let unique = make_unique(&[ep("a", "a", "~1.0.0"), ep("a", "a", "~2.0.0")]);
		assert_eq!(unique.len(), 2);
	}

	#[test]
	fn anonymous_compare_by_source() {
		assert_eq!(make_unique(&[ep("", "a", "*"), ep("", "a", "*")]).len(), 1);
		assert_eq!(make_unique(&[ep("", "a", "*"), ep("", "b", "*")]).len(), 2);
	}

	#[test]
	fn named_and_anonymous_are_kept() {
		assert_eq!(make_unique(&[ep("a", "a", "*"), ep("", "a", "*")]).len(), 2);
	}

	#[test]
	fn nodes_dedupe_by_identity_and_endpoint() {
		let mut tree = DependencyTree::new(DependencyNode::default());
		let a = tree.add_node(DependencyNode::from_endpoint(&ep("a", "a", "*")));
		let a2 = tree.add_node(DependencyNode::from_endpoint(&ep("a", "a", "*")));
		let b = tree.add_node(DependencyNode::from_endpoint(&ep("a", "a", "1.0.0")));
		assert_eq!(make_unique_nodes(&tree, &[a, a, a2, b]), [a, b]);
	}
}
