//! The dependency tree shared by the project analyser and the resolver.
//!
//! Nodes live in a single arena ([`StableDiGraph`]) and are addressed by [`NodeIndex`], so cycles are representable.
//! An edge `a -> b` weighted with a name means `b` is `a.dependencies[name]`.
//! The reverse relation, `dependants`, is a plain lookup table on each node and never an edge.

use std::collections::BTreeMap;
use std::path::PathBuf;

use petgraph::prelude::*;
pub use petgraph::stable_graph::NodeIndex;

use crate::endpoint::Endpoint;
use crate::metadata::PackageMetadata;

pub mod walk;
pub use walk::{walk, WalkControl};

#[derive(Debug, Default, Clone)]
pub struct DependencyNode {
	pub name: String,
	pub source: String,
	pub target: String,
	/// The endpoint this node was explicitly requested with, if any.
	pub endpoint: Option<Endpoint>,
	pub pkg_meta: Option<PackageMetadata>,
	/// Where the package lives on disk.
	pub canonical_dir: Option<PathBuf>,
	/// Owner name to owner node. Only used for reporting and tie breaks.
	pub dependants: BTreeMap<String, NodeIndex>,

	/// The project itself.
	pub root: bool,
	/// Declared but not installed.
	pub missing: bool,
	/// Installed, but at a target the declaration can't accept.
	pub incompatible: bool,
	/// Installed and acceptable, but the declared source changed.
	pub different: bool,
	/// Installed but not reachable from the manifest.
	pub extraneous: bool,
	/// A symbolic reference to a development copy.
	pub linked: bool,
	/// Freshly requested by the user in this run.
	pub newly: bool,
	/// Can't be overridden by an automatic election or manifest resolution.
	pub unresolvable: bool,
	/// The target must not be rewritten to a tilde pin after resolution.
	pub untargetable: bool,
	/// The target before it was pinned, see [`untargetable`](Self::untargetable).
	pub original_target: Option<String>,
}

impl DependencyNode {
	pub fn from_endpoint(endpoint: &Endpoint) -> Self {
		DependencyNode {
			name: endpoint.name.clone(),
			source: endpoint.source.clone(),
			target: endpoint.target.clone(),
			..Default::default()
		}
	}

	/// A freshly requested endpoint, see [`newly`](Self::newly).
	pub fn requested(endpoint: Endpoint) -> Self {
		DependencyNode {
			newly: true,
			unresolvable: true,
			endpoint: Some(endpoint.clone()),
			..Self::from_endpoint(&endpoint)
		}
	}

	pub fn endpoint(&self) -> Endpoint {
		Endpoint::new(self.name.clone(), self.source.clone(), self.target.clone())
	}

	/// Overwrites name, source and target with a freshly decomposed declaration.
	pub fn overlay(&mut self, endpoint: &Endpoint) {
		self.name = endpoint.name.clone();
		self.source = endpoint.source.clone();
		self.target = endpoint.target.clone();
	}

	/// The name the node was asked for under, which may differ from the name the package calls itself.
	pub fn effective_name(&self) -> &str {
		match &self.endpoint {
			Some(e) if e.has_name() => &e.name,
			_ => &self.name,
		}
	}

	pub fn version(&self) -> Option<&str> {
		self.pkg_meta.as_ref().and_then(|m| m.version.as_deref())
	}

	pub fn semver(&self) -> Option<semver::Version> {
		self.pkg_meta.as_ref().and_then(PackageMetadata::semver)
	}

	pub fn release(&self) -> Option<&str> {
		self.pkg_meta.as_ref().and_then(PackageMetadata::release)
	}

	/// Short human readable description used in logs and reports.
	pub fn describe(&self) -> String {
		match self.version() {
			Some(v) => format!("{}#{} ({})", self.name, self.target, v),
			None => format!("{}#{}", self.name, self.target),
		}
	}
}

#[derive(Debug, Clone)]
pub struct DependencyTree {
	pub graph: StableDiGraph<DependencyNode, String>,
	pub root: NodeIndex,
}

impl DependencyTree {
	pub fn new(root: DependencyNode) -> Self {
		let mut graph = StableDiGraph::<DependencyNode, String>::default();
		let root = graph.add_node(DependencyNode { root: true, ..root });
		Self { graph, root }
	}

	pub fn add_node(&mut self, node: DependencyNode) -> NodeIndex {
		self.graph.add_node(node)
	}

	pub fn root_node(&self) -> &DependencyNode {
		&self.graph[self.root]
	}

	/// `parent.dependencies[name]`
	pub fn dependency(&self, parent: NodeIndex, name: &str) -> Option<NodeIndex> {
		self.graph
			.edges_directed(parent, Outgoing)
			.find(|e| e.weight() == name)
			.map(|e| e.target())
	}

	/// Direct dependencies of `parent` ordered by name.
	pub fn dependencies(&self, parent: NodeIndex) -> Vec<(&str, NodeIndex)> {
		let mut deps: Vec<_> = self.graph
			.edges_directed(parent, Outgoing)
			.map(|e| (e.weight().as_str(), e.target()))
			.collect();
		deps.sort_by(|a, b| a.0.cmp(b.0));
		deps
	}

	/// Sets `parent.dependencies[name] = child`, replacing any previous entry under that name.
	pub fn set_dependency(&mut self, parent: NodeIndex, name: &str, child: NodeIndex) {
		let existing: Vec<_> = self.graph
			.edges_directed(parent, Outgoing)
			.filter(|e| e.weight() == name)
			.map(|e| e.id())
			.collect();
		for id in existing {
			self.graph.remove_edge(id);
		}
		self.graph.add_edge(parent, child, name.to_string());
	}

	/// Records `owner` under `node.dependants`, keyed by the owner's name.
	pub fn add_dependant(&mut self, node: NodeIndex, owner: NodeIndex) {
		let owner_name = self.graph[owner].name.clone();
		self.graph[node].dependants.insert(owner_name, owner);
	}

	/// Points every dependant of `from` at `to` instead, used when two nodes turn out to be the same request.
	pub fn redirect(&mut self, from: NodeIndex, to: NodeIndex) {
		if from == to {
			return;
		}

		let incoming: Vec<_> = self.graph
			.edges_directed(from, Incoming)
			.map(|e| (e.source(), e.weight().clone()))
			.collect();
		for (parent, name) in incoming {
			self.set_dependency(parent, &name, to);
		}

		let dependants = std::mem::take(&mut self.graph[from].dependants);
		let (newly, unresolvable) = (self.graph[from].newly, self.graph[from].unresolvable);
		let endpoint = self.graph[from].endpoint.clone();
		let node = &mut self.graph[to];
		node.dependants.extend(dependants);
		node.newly |= newly;
		node.unresolvable |= unresolvable;
		if node.endpoint.is_none() {
			node.endpoint = endpoint;
		}
	}

	pub fn dependant_count(&self, node: NodeIndex) -> usize {
		self.graph[node].dependants.len()
	}
}

impl std::ops::Index<NodeIndex> for DependencyTree {
	type Output = DependencyNode;
	fn index(&self, index: NodeIndex) -> &Self::Output {
		&self.graph[index]
	}
}

impl std::ops::IndexMut<NodeIndex> for DependencyTree {
	fn index_mut(&mut self, index: NodeIndex) -> &mut Self::Output {
		&mut self.graph[index]
	}
}
