use std::collections::{BTreeMap, BTreeSet, HashSet};

use petgraph::prelude::*;

use super::ResolverProcessor;
use super::processing_resolver::ResolverSettings;
use super::unique::make_unique_nodes;
use crate::metadata::{DependencyMap, PackageMetadata};
use crate::tree::DependencyTree;

/// Collects what the resolver starts from.
///
/// All nodes handed over must live in the given tree.
pub struct ResolverBuilder {
	tree: DependencyTree,
	targets: Vec<NodeIndex>,
	resolved: BTreeMap<String, NodeIndex>,
	incompatibles: Vec<NodeIndex>,
	installed: BTreeMap<String, PackageMetadata>,
	resolutions: DependencyMap,
	settings: ResolverSettings,
	keep_wildcards: bool,
}

impl ResolverBuilder {
	pub fn new(tree: DependencyTree) -> Self {
		Self {
			tree,
			targets: Default::default(),
			resolved: Default::default(),
			incompatibles: Default::default(),
			installed: Default::default(),
			resolutions: Default::default(),
			settings: Default::default(),
			keep_wildcards: false,
		}
	}

	/// Nodes that still need fetching.
	pub fn add_targets(mut self, targets: impl IntoIterator<Item = NodeIndex>) -> Self {
		self.targets.extend(targets);
		self
	}

	/// Nodes already satisfied on disk, by name.
	pub fn add_resolved(mut self, resolved: impl IntoIterator<Item = (String, NodeIndex)>) -> Self {
		self.resolved.extend(resolved);
		self
	}

	/// Nodes declared at a target the installed package can't satisfy.
	pub fn add_incompatibles(mut self, incompatibles: impl IntoIterator<Item = NodeIndex>) -> Self {
		self.incompatibles.extend(incompatibles);
		self
	}

	/// Metadata of everything installed, by name.
	pub fn installed(mut self, installed: impl IntoIterator<Item = (String, PackageMetadata)>) -> Self {
		self.installed.extend(installed);
		self
	}

	pub fn resolutions(mut self, resolutions: DependencyMap) -> Self {
		self.resolutions = resolutions;
		self
	}

	/// Takes concurrency, retries, the compatibility check and `force_latest` from `options`.
	pub fn options(mut self, options: &crate::BowererRsOptions) -> Self {
		self.settings = ResolverSettings::from(options);
		self
	}

	pub fn force_latest(mut self, force_latest: bool) -> Self {
		self.settings.force_latest = force_latest;
		self
	}

	/// Leaves fresh wildcard requests at `*` instead of pinning them to a tilde range of what they resolved to.
	pub fn keep_wildcards(mut self, keep: bool) -> Self {
		self.keep_wildcards = keep;
		self
	}

	pub fn build(self) -> ResolverProcessor {
		let keep_wildcards = self.keep_wildcards;
		let mut tree = self.tree;

		let target_names: HashSet<String> = self.targets.iter().map(|t| tree[*t].name.clone()).collect();
		let mut targets = self.targets;
		for target in &targets {
			/* Fresh requests are sticky */
			let node = &mut tree[*target];
			node.unresolvable = node.newly;
			node.untargetable |= keep_wildcards && node.newly;
		}

		let mut installed = BTreeMap::<String, PackageMetadata>::new();
		let mut resolved = BTreeMap::<String, Vec<NodeIndex>>::new();
		for (name, index) in self.resolved {
			if let Some(meta) = &tree[index].pkg_meta {
				installed.insert(name.clone(), meta.clone());
			}
			resolved.insert(name, vec![index]);
		}
		installed.extend(self.installed);

		let mut incompatibles = BTreeMap::<String, Vec<NodeIndex>>::new();
		let mut conflicted = BTreeSet::<String>::new();
		for index in make_unique_nodes(&tree, &self.incompatibles) {
			let name = tree[index].name.clone();
			incompatibles.entry(name.clone()).or_default().push(index);

			/* Keeps any resolution for this name from being pruned */
			conflicted.insert(name.clone());

			if !target_names.contains(&name) && !resolved.contains_key(&name) {
				targets.push(index);
			}
		}

		let targets = make_unique_nodes(&tree, &targets);
		log::debug!("Configured resolver with {} targets, {} resolved, {} incompatible", targets.len(), resolved.len(), incompatibles.len());

		ResolverProcessor::new(tree, targets, resolved, installed, incompatibles, conflicted, self.resolutions, self.settings)
	}
}
