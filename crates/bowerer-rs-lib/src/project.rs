//! A project on disk: its manifest, its components directory and the resolve that ties them together.

use std::collections::BTreeMap;
use std::sync::Arc;

use petgraph::prelude::*;

use crate::endpoint::Endpoint;
use crate::fetch::PackageFetcher;
use crate::installed::{self, InstalledMap};
use crate::manifest::{self, ManifestFile};
use crate::relationship_resolver::{make_unique, ResolverBuilder, ResolverFinalized};
use crate::tree::{self, DependencyNode, DependencyTree, WalkControl};

mod analyse;
pub use analyse::{analyse, ProjectAnalysis};

/// Nodes of an analysed tree grouped by what the resolver has to do with them.
#[derive(Debug, Default, Clone)]
pub struct Buckets {
	/// Missing, changed, or forced. Need fetching.
	pub targets: Vec<NodeIndex>,
	/// Already satisfied on disk, by effective name.
	pub resolved: BTreeMap<String, NodeIndex>,
	/// Declared at a target the installed package can't satisfy.
	pub incompatibles: Vec<NodeIndex>,
}

/// Sorts every node of `tree` into [`Buckets`] with a single deduplicating walk.
///
/// # Parameters
/// - `force` - Treat every node as a target.
pub fn bucket(tree: &DependencyTree, force: bool) -> Buckets {
	let mut buckets = Buckets::default();
	tree::walk(tree, tree.root, true, |index, node, name| {
		if node.incompatible {
			buckets.incompatibles.push(index);
		} else if node.missing || node.different || force {
			buckets.targets.push(index);
		} else {
			buckets.resolved.insert(name.to_string(), index);
		}
		WalkControl::Descend
	});
	buckets
}

pub struct Project {
	options: crate::BowererRsOptions,
	manifest: Option<ManifestFile>,
	installed: InstalledMap,
}

impl Project {
	pub fn new(options: crate::BowererRsOptions) -> Self {
		Self {
			options,
			manifest: None,
			installed: Default::default(),
		}
	}

	pub fn options(&self) -> &crate::BowererRsOptions {
		&self.options
	}

	/// The manifest read by the last [`analyse`](Self::analyse).
	pub fn manifest(&self) -> Option<&ManifestFile> {
		self.manifest.as_ref()
	}

	/// Reads the manifest and components directory and builds the classified tree.
	///
	/// # Errors
	/// - [`Error::Manifest`](crate::Error::Manifest) when the manifest is unusable,
	/// or absent while dummy manifests are disallowed.
	/// - [`Error::IO`](crate::Error::IO) when the components directory can't be read.
	/// - [`Error::Endpoint`](crate::Error::Endpoint) when a declaration can't be parsed.
	pub fn analyse(&mut self) -> crate::Result<ProjectAnalysis> {
		let cwd = self.options.cwd().to_path_buf();
		let manifest = manifest::read_manifest(&cwd, self.options.allow_dummy_manifest())?;

		let components_dir = self.options.components_dir();
		let installed = installed::gather_installed(&components_dir)?;
		let linked = installed::gather_linked(&components_dir)?;
		log::info!("Found {} installed and {} linked packages in {}", installed.len(), linked.len(), components_dir.display());

		let analysis = analyse(&manifest.manifest, &cwd, installed.clone(), linked, self.options.production())?;
		self.manifest = Some(manifest);
		self.installed = installed;
		Ok(analysis)
	}

	/// Resolves the project along with `endpoints`, explicitly requested packages.
	///
	/// # Errors
	/// - [`Error::NoManifest`](crate::Error::NoManifest) when there is neither a manifest nor any endpoint.
	/// - [`Error::Fetch`](crate::Error::Fetch) when a package required by the project can't be fetched.
	/// - Anything from [`analyse`](Self::analyse).
	pub async fn install(&mut self, endpoints: Vec<Endpoint>, fetcher: Arc<dyn PackageFetcher>) -> crate::Result<ResolverFinalized> {
		let ProjectAnalysis { manifest, mut tree, .. } = self.analyse()?;
		if self.manifest.as_ref().map_or(true, ManifestFile::is_dummy) && endpoints.is_empty() {
			return Err(crate::Error::NoManifest);
		}

		let mut buckets = bucket(&tree, self.options.force());

		let root = tree.root;
		let root_name = tree.root_node().name.clone();
		for endpoint in make_unique(&endpoints) {
			log::debug!("Requested {}", endpoint);
			let mut node = DependencyNode::requested(endpoint);
			node.dependants.insert(root_name.clone(), root);
			buckets.targets.push(tree.add_node(node));
		}

		let installed = self.installed.iter().map(|(name, record)| (name.clone(), record.pkg_meta.clone()));

		let processor = ResolverBuilder::new(tree)
			.options(&self.options)
			.add_targets(buckets.targets)
			.add_resolved(buckets.resolved)
			.add_incompatibles(buckets.incompatibles)
			.installed(installed)
			.resolutions(manifest.resolutions.clone())
			.build();

		processor.resolve(fetcher).await
	}
}
