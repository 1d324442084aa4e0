//! Fetch rounds, run until no target is left, followed by election.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use petgraph::prelude::*;
use tokio::task::JoinSet;

use super::election::{self, Election, ElectionPolicy};
use super::finalized_resolver::{FetchFailure, ResolverFinalized};
use crate::config::CompatibilityCheck;
use crate::endpoint::{self, Endpoint};
use crate::fetch::{self, FetchError, FetchedCandidate, PackageFetcher, RetryPolicy};
use crate::metadata::{DependencyMap, PackageMetadata};
use crate::tree::{DependencyNode, DependencyTree};
use crate::version;

#[derive(Debug, Clone)]
pub(super) struct ResolverSettings {
	pub concurrency: usize,
	pub retry: RetryPolicy,
	pub check: CompatibilityCheck,
	pub force_latest: bool,
}

impl Default for ResolverSettings {
	fn default() -> Self {
		Self::from(&crate::BowererRsOptions::default())
	}
}

impl From<&crate::BowererRsOptions> for ResolverSettings {
	fn from(options: &crate::BowererRsOptions) -> Self {
		ResolverSettings {
			concurrency: options.fetch_concurrency().max(1),
			retry: options.retry_policy(),
			check: options.compatibility_check(),
			force_latest: options.force_latest(),
		}
	}
}

/// Identity of a request for single flight purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FetchKey {
	name: String,
	source: String,
	target: String,
}

impl From<&DependencyNode> for FetchKey {
	fn from(node: &DependencyNode) -> Self {
		FetchKey { name: node.name.clone(), source: node.source.clone(), target: node.target.clone() }
	}
}

/// Guesses a package name from its source, the last path segment without `.git`.
pub fn guess_name(source: &str) -> String {
	let trimmed = source.trim_end_matches(['/', '\\']);
	let last = trimmed.rsplit(['/', '\\', ':']).next().unwrap_or(trimmed);
	let name = last.strip_suffix(".git").unwrap_or(last);
	if name.is_empty() { source.to_string() } else { name.to_string() }
}

/// Drives fetch rounds until every target is resolved, then elects one candidate per name.
///
/// Fetches run concurrently on a [`JoinSet`] bounded by the configured concurrency.
/// Their results are merged one at a time on the calling task, which alone owns the resolution state.
///
/// # Failures
/// A fetch that fails for a target the project root requires directly aborts the resolve.
/// Other failures are collected and reported with the final result.
#[derive(Debug)]
pub struct ResolverProcessor {
	tree: DependencyTree,
	targets: VecDeque<NodeIndex>,
	/// Candidates by name, possibly several before election.
	resolved: BTreeMap<String, Vec<NodeIndex>>,
	installed: BTreeMap<String, PackageMetadata>,
	/// Requests waiting for their name to resolve before being fetched.
	incompatibles: BTreeMap<String, Vec<NodeIndex>>,
	conflicted: BTreeSet<String>,
	resolutions: DependencyMap,

	/// Queued or in flight.
	pending: HashMap<FetchKey, NodeIndex>,
	failures: Vec<FetchFailure>,

	settings: ResolverSettings,
}

impl ResolverProcessor {
	#[allow(clippy::too_many_arguments)]
	pub(super) fn new(
		tree: DependencyTree,
		targets: Vec<NodeIndex>,
		resolved: BTreeMap<String, Vec<NodeIndex>>,
		installed: BTreeMap<String, PackageMetadata>,
		incompatibles: BTreeMap<String, Vec<NodeIndex>>,
		conflicted: BTreeSet<String>,
		resolutions: DependencyMap,
		settings: ResolverSettings,
	) -> Self {
		let mut processor = ResolverProcessor {
			tree,
			targets: Default::default(),
			resolved,
			installed,
			incompatibles,
			conflicted,
			resolutions,
			pending: Default::default(),
			failures: Default::default(),
			settings,
		};
		for target in targets {
			processor.enqueue(target);
		}
		processor
	}

	pub fn tree(&self) -> &DependencyTree {
		&self.tree
	}

	/// Targets not yet dispatched.
	pub fn queued(&self) -> usize {
		self.targets.len()
	}

	/// Queues `index` for fetching, or folds it into an identical request already queued or in flight.
	fn enqueue(&mut self, index: NodeIndex) {
		let key = FetchKey::from(&self.tree[index]);
		match self.pending.get(&key) {
			Some(&existing) if existing != index => {
				log::trace!("Joining pending fetch of {}", self.tree[existing].describe());
				self.tree.redirect(index, existing);
			},
			Some(_) => {},
			None => {
				self.pending.insert(key, index);
				self.targets.push_back(index);
			},
		}
	}

	fn is_root_critical(&self, index: NodeIndex) -> bool {
		let node = &self.tree[index];
		node.newly || node.dependants.values().any(|d| self.tree[*d].root)
	}

	/// Runs fetch rounds to a fixed point and elects the result.
	///
	/// # Errors
	/// - [`Error::Fetch`](crate::Error::Fetch) when a target required by the root can't be fetched.
	/// - [`Error::Task`](crate::Error::Task) when a fetch task panics.
	pub async fn resolve(mut self, fetcher: Arc<dyn PackageFetcher>) -> crate::Result<ResolverFinalized> {
		let mut tasks = JoinSet::<(NodeIndex, Result<Vec<FetchedCandidate>, FetchError>)>::new();

		loop {
			while tasks.len() < self.settings.concurrency {
				let Some(index) = self.targets.pop_front() else { break };
				let endpoint = self.tree[index].endpoint();
				let fetcher = fetcher.clone();
				let policy = self.settings.retry;

				log::debug!("Fetching {}", endpoint);
				tasks.spawn(async move {
					let result = fetch::fetch_with_retry(fetcher.as_ref(), &endpoint, policy).await;
					(index, result)
				});
			}

			let Some(joined) = tasks.join_next().await else { break };
			let (index, result) = joined.map_err(|e| crate::Error::Task(e.to_string()))?;

			if let Err(e) = self.merge(index, result) {
				tasks.abort_all();
				return Err(e);
			}
		}

		Ok(self.finish())
	}

	/// Applies one fetch result to the resolution state.
	fn merge(&mut self, index: NodeIndex, result: Result<Vec<FetchedCandidate>, FetchError>) -> crate::Result<()> {
		self.pending.remove(&FetchKey::from(&self.tree[index]));

		let candidates = match result {
			Ok(candidates) => candidates,
			Err(error) => return self.fail(index, error),
		};

		let mut siblings = Vec::<NodeIndex>::new();
		for (i, candidate) in candidates.into_iter().enumerate() {
			let at = if i == 0 {
				index
			} else {
				let copy = DependencyNode { pkg_meta: None, canonical_dir: None, ..self.tree[index].clone() };
				self.tree.add_node(copy)
			};
			self.stamp(at, candidate);
			siblings.push(at);
		}

		for at in siblings {
			self.accept(at);
		}

		Ok(())
	}

	fn fail(&mut self, index: NodeIndex, error: FetchError) -> crate::Result<()> {
		let node = &self.tree[index];
		if self.is_root_critical(index) {
			log::error!("Failed to fetch {}: {}", node.describe(), error);
			let name = if node.name.is_empty() { node.source.clone() } else { node.name.clone() };
			return Err(crate::Error::Fetch { name, source: error });
		}

		log::warn!("Failed to fetch {}: {}", node.describe(), error);
		self.failures.push(FetchFailure {
			endpoint: node.endpoint(),
			dependants: node.dependants.keys().cloned().collect(),
			error,
		});
		Ok(())
	}

	/// Records where a candidate came from and what it was resolved for.
	fn stamp(&mut self, index: NodeIndex, candidate: FetchedCandidate) {
		let node = &mut self.tree[index];
		let mut meta = candidate.pkg_meta;

		if meta.source.is_none() {
			meta.source = Some(node.source.clone());
		}
		meta.target = Some(node.target.clone());
		meta.original_source = Some(node.source.clone());

		if node.name.is_empty() {
			node.name = if meta.name.is_empty() { guess_name(&node.source) } else { meta.name.clone() };
		}

		node.pkg_meta = Some(meta);
		node.canonical_dir = candidate.canonical_dir;
	}

	fn accept(&mut self, index: NodeIndex) {
		let name = self.tree[index].name.clone();
		log::debug!("Resolved {}", self.tree[index].describe());
		self.resolved.entry(name.clone()).or_default().push(index);

		let dependencies = self.tree[index].pkg_meta.as_ref().map(|m| m.dependencies.clone()).unwrap_or_default();
		for (dep_name, declaration) in dependencies {
			match endpoint::decompose_from_json(&dep_name, &declaration) {
				Ok(endpoint) => self.discover(index, endpoint),
				Err(e) => {
					log::warn!("Invalid dependency {}: {} declared by {}", dep_name, declaration, name);
					self.failures.push(FetchFailure {
						endpoint: Endpoint::new(dep_name, String::new(), declaration),
						dependants: vec![name.clone()],
						error: FetchError::Fatal(e.to_string()),
					});
				},
			}
		}

		if let Some(incompatibles) = self.incompatibles.remove(&name) {
			for incompatible in incompatibles {
				let target = &self.tree[incompatible].target;
				let already_resolved = self.resolved.get(&name).is_some_and(|c| c.iter().any(|r| &self.tree[*r].target == target));
				let in_flight = self.pending.contains_key(&FetchKey::from(&self.tree[incompatible]));
				if !already_resolved && !in_flight {
					self.enqueue(incompatible);
				}
			}
		}
	}

	/// Links a dependency of `parent` to an existing candidate or request, or queues a new one.
	fn discover(&mut self, parent: NodeIndex, endpoint: Endpoint) {
		let name = endpoint.name.clone();

		let reusable = self.resolved.get(&name).and_then(|candidates| {
			candidates.iter().copied().find(|c| {
				let node = &self.tree[*c];
				node.target == endpoint.target || node.version().is_some_and(|v| version::satisfies(v, &endpoint.target))
			})
		});
		let existing = reusable.or_else(|| {
			self.pending.get(&FetchKey { name: name.clone(), source: endpoint.source.clone(), target: endpoint.target.clone() }).copied()
		});

		if let Some(existing) = existing {
			self.tree.set_dependency(parent, &name, existing);
			self.tree.add_dependant(existing, parent);
			return;
		}

		let node = DependencyNode {
			unresolvable: self.tree[parent].unresolvable,
			..DependencyNode::from_endpoint(&endpoint)
		};
		let index = self.tree.add_node(node);
		self.tree.set_dependency(parent, &name, index);
		self.tree.add_dependant(index, parent);
		self.enqueue(index);
	}

	/// Elects a candidate for every resolved name.
	fn finish(mut self) -> ResolverFinalized {
		/* Only left when the name was already satisfied on disk, the installed copy stays */
		for (name, dropped) in std::mem::take(&mut self.incompatibles) {
			for index in dropped {
				let node = &self.tree[index];
				let owners = node.dependants.keys().cloned().collect::<Vec<_>>().join(", ");
				log::warn!("Keeping installed {} although {} requires {}", name, owners, node.target);
			}
		}

		let mut elected = BTreeMap::<String, NodeIndex>::new();
		let mut conflicts = Vec::new();

		let names: Vec<_> = self.resolved.keys().cloned().collect();
		for name in names {
			let candidates = self.resolved[&name].clone();
			let (semvers, non_semvers) = election::dissect(&mut self.tree, &candidates);

			let policy = ElectionPolicy {
				resolution: self.resolutions.get(&name).cloned(),
				force_latest: self.settings.force_latest,
				check: self.settings.check,
			};

			match election::elect_suitable(&self.tree, &name, &semvers, &non_semvers, &policy) {
				Election::Suitable(pick) => {
					elected.insert(name, pick);
				},
				Election::Settled { pick, store_resolution } => {
					self.conflicted.insert(name.clone());
					if let Some(resolution) = store_resolution {
						self.resolutions.insert(name.clone(), resolution);
					}
					elected.insert(name, pick);
				},
				Election::Conflict(report) => {
					log::info!("Conflict on {} between {} candidates", name, report.candidates.len());
					self.conflicted.insert(name);
					conflicts.push(report);
				},
			}
		}

		/* Resolutions for names that never conflicted are stale */
		let conflicted = &self.conflicted;
		self.resolutions.retain(|name, _| conflicted.contains(name));

		ResolverFinalized::new(self.tree, elected, conflicts, self.conflicted, self.resolutions, self.failures, self.installed)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test] fn guesses_from_url() { assert_eq!(guess_name("git://github.com/jquery/jquery.git"), "jquery") }
	#[test] fn guesses_from_shorthand() { assert_eq!(guess_name("twbs/bootstrap"), "bootstrap") }
	#[test] fn guesses_from_ssh() { assert_eq!(guess_name("git@example.com:foo.git"), "foo") }
	#[test] fn guesses_from_path() { assert_eq!(guess_name("/home/me/pkg/"), "pkg") }
	#[test] fn guesses_plain_name() { assert_eq!(guess_name("jquery"), "jquery") }
}
