//! The outcome of a resolve, queried by whatever installs the packages.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use petgraph::graphmap::DiGraphMap;
use petgraph::prelude::*;

use crate::endpoint::{self, Endpoint};
use crate::fetch::FetchError;
use crate::metadata::{DependencyMap, PackageMetadata};
use crate::tree::{DependencyNode, DependencyTree};

/// Who required a conflicting candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependantInfo {
	pub name: String,
	pub endpoint: Endpoint,
	pub version: Option<String>,
	pub root: bool,
}

impl DependantInfo {
	pub fn of(node: &DependencyNode) -> Self {
		DependantInfo {
			name: node.name.clone(),
			endpoint: node.endpoint(),
			version: node.version().map(str::to_string),
			root: node.root,
		}
	}
}

#[derive(Debug, Clone)]
pub struct ConflictCandidate {
	pub endpoint: Endpoint,
	pub version: Option<String>,
	pub release: Option<String>,
	/// Explicitly requested this run, no override applies.
	pub unresolvable: bool,
	/// Sorted by name.
	pub dependants: Vec<DependantInfo>,
}

/// A package whose candidates could not be reconciled.
///
/// Candidates are ordered best first: highest version, then most dependants.
#[derive(Debug, Clone)]
pub struct ConflictReport {
	pub name: String,
	pub candidates: Vec<ConflictCandidate>,
	/// A manifest resolution existed but did not settle the conflict.
	pub override_ignored: Option<String>,
}

impl std::fmt::Display for ConflictReport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		writeln!(f, "Unable to find a suitable version for {}, please choose one:", self.name)?;
		for (i, candidate) in self.candidates.iter().enumerate() {
			let resolved = candidate.version.as_deref().or(candidate.release.as_deref()).unwrap_or("?");
			let dependants = candidate.dependants.iter()
				.map(|d| match &d.version {
					Some(v) => format!("{}#{}", d.name, v),
					None => d.name.clone(),
				})
				.collect::<Vec<_>>()
				.join(", ");
			write!(f, "    {}) {} which resolved to {}", i + 1, endpoint::compose(&candidate.endpoint), resolved)?;
			if !dependants.is_empty() {
				write!(f, " and is required by {}", dependants)?;
			}
			writeln!(f)?;
		}
		if let Some(resolution) = &self.override_ignored {
			writeln!(f, "The resolution {} was not applied.", resolution)?;
		}
		Ok(())
	}
}

/// A fetch that failed without aborting the resolve.
#[derive(Debug, Clone)]
pub struct FetchFailure {
	pub endpoint: Endpoint,
	/// Names of the packages that required it.
	pub dependants: Vec<String>,
	pub error: FetchError,
}

impl std::fmt::Display for FetchFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}: {}", endpoint::compose(&self.endpoint), self.error)?;
		if !self.dependants.is_empty() {
			write!(f, " (required by {})", self.dependants.join(", "))?;
		}
		Ok(())
	}
}

pub enum ResolverStatus<'a> {
	/// Every name has a single elected candidate.
	Converged,
	/// Some names need an explicit choice before installing.
	ConflictReported(&'a [ConflictReport]),
}

/// Elected candidate per package name.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionPlan<'a> {
	tree: &'a DependencyTree,
	elected: &'a BTreeMap<String, NodeIndex>,
}

impl<'a> ResolutionPlan<'a> {
	pub fn get(&self, name: &str) -> Option<&'a DependencyNode> {
		let tree = self.tree;
		self.elected.get(name).map(move |i| &tree[*i])
	}

	pub fn version(&self, name: &str) -> Option<&'a str> {
		self.get(name).and_then(DependencyNode::version)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.elected.contains_key(name)
	}

	pub fn len(&self) -> usize {
		self.elected.len()
	}

	pub fn is_empty(&self) -> bool {
		self.elected.is_empty()
	}

	/// Name ordered.
	pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a DependencyNode)> + 'a {
		let tree = self.tree;
		self.elected.iter().map(move |(n, i)| (n.as_str(), &tree[*i]))
	}
}

#[derive(Debug)]
pub struct ResolverFinalized {
	tree: DependencyTree,
	elected: BTreeMap<String, NodeIndex>,
	conflicts: Vec<ConflictReport>,
	conflicted: BTreeSet<String>,
	resolutions: DependencyMap,
	failures: Vec<FetchFailure>,
	installed: BTreeMap<String, PackageMetadata>,
}

impl ResolverFinalized {
	pub(super) fn new(
		mut tree: DependencyTree,
		elected: BTreeMap<String, NodeIndex>,
		conflicts: Vec<ConflictReport>,
		conflicted: BTreeSet<String>,
		resolutions: DependencyMap,
		failures: Vec<FetchFailure>,
		installed: BTreeMap<String, PackageMetadata>,
	) -> Self {
		for index in elected.values() {
			let node = &mut tree[*index];
			if node.newly {
				if let Some(meta) = node.pkg_meta.as_mut() {
					meta.direct = true;
				}
			}
		}

		Self { tree, elected, conflicts, conflicted, resolutions, failures, installed }
	}

	pub fn status(&self) -> ResolverStatus<'_> {
		if self.conflicts.is_empty() {
			ResolverStatus::Converged
		} else {
			ResolverStatus::ConflictReported(&self.conflicts)
		}
	}

	pub fn plan(&self) -> ResolutionPlan<'_> {
		ResolutionPlan { tree: &self.tree, elected: &self.elected }
	}

	pub fn conflicts(&self) -> &[ConflictReport] {
		&self.conflicts
	}

	/// Failures for packages nothing at the project root depended on directly.
	pub fn failures(&self) -> &[FetchFailure] {
		&self.failures
	}

	/// Manifest resolutions still relevant, including ones stored by forcing the latest version.
	pub fn resolutions(&self) -> &DependencyMap {
		&self.resolutions
	}

	pub fn tree(&self) -> &DependencyTree {
		&self.tree
	}

	pub fn into_tree(self) -> DependencyTree {
		self.tree
	}

	/// Names of elected packages that actually have to be written to `components_dir`.
	///
	/// # Parameters
	/// - `force` - Include packages already installed at the same release.
	pub fn install_set(&self, components_dir: &Path, force: bool) -> Vec<String> {
		self.elected.iter()
			.filter(|(name, index)| {
				let node = &self.tree[**index];
				if node.linked {
					return false;
				}
				if node.canonical_dir.as_deref() == Some(components_dir.join(name).as_path()) {
					return false;
				}
				let same_release = self.installed.get(*name).is_some_and(|m| m.release().is_some() && m.release() == node.release());
				force || !same_release
			})
			.map(|(name, _)| name.clone())
			.collect()
	}

	/// Elected names ordered so that dependencies come before their dependants.
	///
	/// Packages in a cycle are kept together, in name order.
	pub fn install_order(&self) -> Vec<String> {
		let mut graph = DiGraphMap::<&str, ()>::new();
		for name in self.elected.keys() {
			graph.add_node(name.as_str());
		}

		for (name, index) in &self.elected {
			for (_, child) in self.tree.dependencies(*index) {
				let dep = self.tree[child].name.as_str();
				if let Some((dep, _)) = self.elected.get_key_value(dep) {
					if dep != name {
						graph.add_edge(name.as_str(), dep.as_str(), ());
					}
				}
			}
		}

		/* Components come out in reverse topological order, dependencies first */
		petgraph::algo::tarjan_scc(&graph)
			.into_iter()
			.flat_map(|mut component| {
				component.sort_unstable();
				component
			})
			.map(str::to_string)
			.collect()
	}

	/// Manifest dependency entries for every explicitly requested package that was elected.
	///
	/// # Errors
	/// [`Error::Endpoint`](crate::Error::Endpoint) if a requested package never got a name.
	pub fn manifest_entries(&self) -> crate::Result<DependencyMap> {
		let mut entries = DependencyMap::new();
		for index in self.elected.values() {
			let node = &self.tree[*index];
			if !node.newly {
				continue;
			}
			let requested = Endpoint::new(node.effective_name(), node.source.clone(), node.target.clone());
			let (key, value) = endpoint::compose_to_json(&requested)?;
			entries.insert(key, value);
		}
		Ok(entries)
	}

	/// Names conflicted during the resolve, settled or not.
	pub fn conflicted(&self) -> &BTreeSet<String> {
		&self.conflicted
	}
}
