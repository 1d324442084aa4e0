//! Choosing one candidate per package name once fetching has settled.

use std::cmp::Ordering;

use petgraph::prelude::*;

use super::finalized_resolver::{ConflictCandidate, ConflictReport, DependantInfo};
use crate::config::CompatibilityCheck;
use crate::endpoint;
use crate::tree::DependencyTree;
use crate::version;

/// Knobs consulted when candidates conflict.
#[derive(Debug, Default, Clone)]
pub struct ElectionPolicy {
	/// Manifest declared override for this name.
	pub resolution: Option<String>,
	pub force_latest: bool,
	pub check: CompatibilityCheck,
}

#[derive(Debug)]
pub enum Election {
	/// The candidates agree, `name` is not conflicted.
	Suitable(NodeIndex),
	/// The candidates conflict but an override or `force_latest` picked one.
	Settled {
		pick: NodeIndex,
		/// Resolution to record for the name, set when forced to the latest.
		store_resolution: Option<String>,
	},
	/// Needs an explicit choice.
	Conflict(ConflictReport),
}

/// Splits the candidates of one name into semver and non semver ones.
///
/// Semver candidates are sorted highest first, a wildcard request losing ties to a pinned one
/// and a fresh request winning ties against everything else.
/// Fresh wildcard requests are pinned to a tilde range of the version they resolved to.
pub fn dissect(tree: &mut DependencyTree, candidates: &[NodeIndex]) -> (Vec<NodeIndex>, Vec<NodeIndex>) {
	let (mut semvers, non_semvers): (Vec<_>, Vec<_>) = candidates.iter().copied().partition(|c| tree[*c].semver().is_some());

	semvers.sort_by(|a, b| {
		let (a, b) = (&tree[*a], &tree[*b]);
		match (a.semver(), b.semver()) {
			(Some(va), Some(vb)) => version::compare(&vb, &va),
			_ => Ordering::Equal,
		}
		.then_with(|| endpoint::is_wildcard(&a.target).cmp(&endpoint::is_wildcard(&b.target)))
		/* An explicit request wins an otherwise even tie, whatever order the fetches finished in */
		.then_with(|| b.newly.cmp(&a.newly))
	});

	for index in &semvers {
		let node = &mut tree[*index];
		if node.newly && endpoint::is_wildcard(&node.target) && !node.untargetable {
			if let Some(version) = node.version().map(str::to_string) {
				log::debug!("Pinning {} to ~{}", node.name, version);
				node.original_target = Some(std::mem::replace(&mut node.target, format!("~{version}")));
			}
		}
	}

	(semvers, non_semvers)
}

fn satisfies_target(tree: &DependencyTree, subject: NodeIndex, other: NodeIndex) -> bool {
	tree[subject].version().is_some_and(|v| version::satisfies(v, &tree[other].target))
}

/// First semver candidate compatible with the rest, according to `check`.
fn find_compatible(tree: &DependencyTree, semvers: &[NodeIndex], check: CompatibilityCheck) -> Option<NodeIndex> {
	if semvers.len() == 1 {
		return semvers.first().copied();
	}

	semvers.iter().copied().find(|subject| {
		let mut others = semvers.iter().copied().filter(|o| o != subject);
		match check {
			CompatibilityCheck::Pairwise => others.all(|o| satisfies_target(tree, *subject, o)),
			CompatibilityCheck::Witness => others.any(|o| satisfies_target(tree, *subject, o) || satisfies_target(tree, o, *subject)),
		}
	})
}

/// Versioned before unversioned, highest version first, then the most depended upon.
fn compare_picks(tree: &DependencyTree, a: NodeIndex, b: NodeIndex) -> Ordering {
	let by_version = match (tree[a].semver(), tree[b].semver()) {
		(Some(va), Some(vb)) => version::compare(&vb, &va),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	};
	by_version.then_with(|| tree.dependant_count(b).cmp(&tree.dependant_count(a)))
}

fn report(tree: &DependencyTree, name: &str, picks: &[NodeIndex]) -> ConflictReport {
	ConflictReport {
		name: name.to_string(),
		candidates: picks.iter().map(|pick| {
			let node = &tree[*pick];
			ConflictCandidate {
				endpoint: node.endpoint(),
				version: node.version().map(str::to_string),
				release: node.release().map(str::to_string),
				unresolvable: node.unresolvable,
				dependants: node.dependants.values().map(|d| DependantInfo::of(&tree[*d])).collect(),
			}
		}).collect(),
		override_ignored: None,
	}
}

/// Picks the candidate matching a manifest resolution.
///
/// A range elects the first pick within it, anything else the first pick released or requested as exactly that.
fn find_resolution(tree: &DependencyTree, picks: &[NodeIndex], resolution: &str) -> Option<NodeIndex> {
	if version::is_valid_range(resolution) {
		picks.iter().copied().find(|p| tree[*p].version().is_some_and(|v| version::satisfies(v, resolution)))
	} else {
		picks.iter().copied().find(|p| tree[*p].release() == Some(resolution) || tree[*p].target == resolution)
	}
}

/// Elects a single candidate for `name` or reports the conflict.
///
/// # Parameters
/// - `semvers`, `non_semvers` - As returned by [`dissect`].
/// - `policy` - Override and tie break settings for this name.
pub fn elect_suitable(tree: &DependencyTree, name: &str, semvers: &[NodeIndex], non_semvers: &[NodeIndex], policy: &ElectionPolicy) -> Election {
	let mut picks = Vec::<NodeIndex>::new();

	if !semvers.is_empty() && !non_semvers.is_empty() {
		/* Mixed kinds can't be compared */
		picks.extend(semvers);
		picks.extend(non_semvers);
	} else if !non_semvers.is_empty() {
		if let [only] = non_semvers {
			return Election::Suitable(*only);
		}
		picks.extend(non_semvers);
	} else {
		if let Some(suitable) = find_compatible(tree, semvers, policy.check) {
			return Election::Suitable(suitable);
		}
		picks.extend(semvers);
	}

	picks.sort_by(|a, b| compare_picks(tree, *a, *b));
	let mut conflict = report(tree, name, &picks);
	let unresolvable = picks.iter().any(|p| tree[*p].unresolvable);

	if let Some(resolution) = &policy.resolution {
		if unresolvable {
			log::info!("Ignoring resolution {}#{} as a candidate was explicitly requested", name, resolution);
			conflict.override_ignored = Some(resolution.clone());
			return Election::Conflict(conflict);
		}

		if let Some(pick) = find_resolution(tree, &picks, resolution) {
			log::info!("Resolved conflict on {} to {} using the manifest resolution", name, tree[pick].describe());
			return Election::Settled { pick, store_resolution: None };
		}

		/* Falls through so force_latest still gets a say */
		log::warn!("Unable to find a candidate for {} matching the resolution {}", name, resolution);
		conflict.override_ignored = Some(resolution.clone());
	}

	if policy.force_latest && !unresolvable {
		if let Some(&pick) = picks.first() {
			let node = &tree[pick];
			let resolution = if endpoint::is_wildcard(&node.target) {
				node.release().unwrap_or("*").to_string()
			} else {
				node.target.clone()
			};
			log::info!("Forced resolution of {} to {}", name, resolution);
			return Election::Settled { pick, store_resolution: Some(resolution) };
		}
	}

	Election::Conflict(conflict)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::metadata::PackageMetadata;
	use crate::tree::DependencyNode;

	struct Fixture {
		tree: DependencyTree,
	}

	impl Fixture {
		fn new() -> Self {
			Fixture { tree: DependencyTree::new(DependencyNode { name: "app".into(), ..Default::default() }) }
		}

		fn candidate(&mut self, target: &str, version: Option<&str>, dependants: usize) -> NodeIndex {
			let node = self.tree.add_node(DependencyNode {
				name: "foo".into(),
				source: "foo".into(),
				target: target.into(),
				pkg_meta: Some(PackageMetadata { name: "foo".into(), version: version.map(str::to_string), ..Default::default() }),
				..Default::default()
			});
			for i in 0..dependants {
				let owner = self.tree.add_node(DependencyNode { name: format!("owner-{target}-{i}"), ..Default::default() });
				self.tree.add_dependant(node, owner);
			}
			node
		}

		fn elect(&mut self, candidates: &[NodeIndex], policy: &ElectionPolicy) -> Election {
			let (semvers, non_semvers) = dissect(&mut self.tree, candidates);
			elect_suitable(&self.tree, "foo", &semvers, &non_semvers, policy)
		}
	}

	#[test]
	fn version_beats_dependant_count() {
		let mut f = Fixture::new();
		let low = f.candidate("~1.2.0", Some("1.2.0"), 3);
		let high = f.candidate("~1.5.0", Some("1.5.0"), 1);
		match f.elect(&[low, high], &ElectionPolicy::default()) {
			Election::Conflict(report) => {
				let versions: Vec<_> = report.candidates.iter().map(|c| c.version.as_deref()).collect();
				assert_eq!(versions, [Some("1.5.0"), Some("1.2.0")]);
				assert_eq!(report.candidates[1].dependants.len(), 3);
			},
			other => panic!("expected a conflict, got {other:?}"),
		}
	}

	#[test]
	fn single_non_semver_is_suitable() {
		let mut f = Fixture::new();
		let branch = f.candidate("my-branch", None, 1);
		assert!(matches!(f.elect(&[branch], &ElectionPolicy::default()), Election::Suitable(i) if i == branch));
	}

	#[test]
	fn mixed_kinds_conflict() {
		let mut f = Fixture::new();
		let a = f.candidate("~1.0.0", Some("1.0.0"), 1);
		let b = f.candidate("my-branch", None, 1);
		match f.elect(&[a, b], &ElectionPolicy::default()) {
			Election::Conflict(report) => assert_eq!(report.candidates[1].version, None),
			other => panic!("expected a conflict, got {other:?}"),
		}
	}

	#[test]
	fn compatible_candidates_elect_highest() {
		let mut f = Fixture::new();
		let a = f.candidate("^1.0.0", Some("1.1.0"), 1);
		let b = f.candidate("^1.2.0", Some("1.4.0"), 1);
		assert!(matches!(f.elect(&[a, b], &ElectionPolicy::default()), Election::Suitable(i) if i == b));
	}

	#[test]
	fn pairwise_catches_three_way_conflicts() {
		let mut f = Fixture::new();
		let a = f.candidate(">=1.0.0 <1.5.0", Some("1.4.0"), 1);
		let b = f.candidate(">=1.3.0", Some("2.0.0"), 1);
		let c = f.candidate("^2.0.0", Some("2.0.0"), 1);
		let candidates = [a, b, c];

		assert!(matches!(f.elect(&candidates, &ElectionPolicy::default()), Election::Conflict(_)));
		let witness = ElectionPolicy { check: CompatibilityCheck::Witness, ..Default::default() };
		assert!(matches!(f.elect(&candidates, &witness), Election::Suitable(_)));
	}

	#[test]
	fn newly_wildcard_is_pinned() {
		let mut f = Fixture::new();
		let a = f.candidate("*", Some("2.1.0"), 0);
		f.tree[a].newly = true;
		f.elect(&[a], &ElectionPolicy::default());
		assert_eq!(f.tree[a].target, "~2.1.0");
		assert_eq!(f.tree[a].original_target.as_deref(), Some("*"));
	}

	#[test]
	fn wildcard_loses_version_ties() {
		let mut f = Fixture::new();
		let wild = f.candidate("*", Some("1.0.0"), 0);
		let pinned = f.candidate("1.0.0", Some("1.0.0"), 0);
		let (semvers, _) = dissect(&mut f.tree, &[wild, pinned]);
		assert_eq!(semvers, [pinned, wild]);
	}

	#[test]
	fn resolution_applies_without_fresh_requests() {
		let mut f = Fixture::new();
		let low = f.candidate("~1.2.0", Some("1.2.0"), 3);
		let high = f.candidate("~1.5.0", Some("1.5.0"), 1);
		let policy = ElectionPolicy { resolution: Some("1.5.0".into()), ..Default::default() };
		assert!(matches!(f.elect(&[low, high], &policy), Election::Settled { pick, store_resolution: None } if pick == high));
	}

	#[test]
	fn resolution_ignored_with_fresh_request() {
		let mut f = Fixture::new();
		let low = f.candidate("~1.2.0", Some("1.2.0"), 3);
		let high = f.candidate("~1.5.0", Some("1.5.0"), 1);
		f.tree[low].newly = true;
		f.tree[low].unresolvable = true;
		let policy = ElectionPolicy { resolution: Some("1.5.0".into()), ..Default::default() };
		match f.elect(&[low, high], &policy) {
			Election::Conflict(report) => assert_eq!(report.override_ignored.as_deref(), Some("1.5.0")),
			other => panic!("expected a conflict, got {other:?}"),
		}
	}

	#[test]
	fn resolution_matches_branch_release() {
		let mut f = Fixture::new();
		let a = f.candidate("dev", None, 1);
		let b = f.candidate("next", None, 1);
		let policy = ElectionPolicy { resolution: Some("next".into()), ..Default::default() };
		assert!(matches!(f.elect(&[a, b], &policy), Election::Settled { pick, .. } if pick == b));
	}

	#[test]
	fn force_latest_stores_resolution() {
		let mut f = Fixture::new();
		let low = f.candidate("~1.2.0", Some("1.2.0"), 3);
		let high = f.candidate("~1.5.0", Some("1.5.0"), 1);
		let policy = ElectionPolicy { force_latest: true, ..Default::default() };
		match f.elect(&[low, high], &policy) {
			Election::Settled { pick, store_resolution } => {
				assert_eq!(pick, high);
				assert_eq!(store_resolution.as_deref(), Some("~1.5.0"));
			},
			other => panic!("expected a forced election, got {other:?}"),
		}
	}

	fn report_targets(election: Election) -> Vec<String> {
		match election {
			Election::Conflict(report) => report.candidates.into_iter().map(|c| c.endpoint.target).collect(),
			other => panic!("expected a conflict, got {other:?}"),
		}
	}

	#[test]
	fn dependant_count_breaks_ties_between_branches() {
		let mut f = Fixture::new();
		let a = f.candidate("branch-a", None, 1);
		let b = f.candidate("branch-b", None, 3);
		assert_eq!(report_targets(f.elect(&[a, b], &ElectionPolicy::default())), ["branch-b", "branch-a"]);
	}

	#[test]
	fn versioned_pick_before_unversioned() {
		let mut f = Fixture::new();
		let branch = f.candidate("my-branch", None, 5);
		let versioned = f.candidate("~1.0.0", Some("1.0.0"), 1);
		assert_eq!(report_targets(f.elect(&[branch, versioned], &ElectionPolicy::default())), ["~1.0.0", "my-branch"]);
	}

	#[test]
	fn fresh_request_wins_even_tie() {
		let mut f = Fixture::new();
		let declared = f.candidate("~2.0.0", Some("2.0.1"), 1);
		let requested = f.candidate("~2.0.0", Some("2.0.1"), 1);
		f.tree[requested].newly = true;
		let (semvers, _) = dissect(&mut f.tree, &[declared, requested]);
		assert_eq!(semvers, [requested, declared]);
		assert!(matches!(f.elect(&[declared, requested], &ElectionPolicy::default()), Election::Suitable(i) if i == requested));
	}

	#[test]
	fn unmatched_resolution_falls_back_to_force_latest() {
		let mut f = Fixture::new();
		let low = f.candidate("~1.2.0", Some("1.2.0"), 3);
		let high = f.candidate("~1.5.0", Some("1.5.0"), 1);
		let policy = ElectionPolicy { resolution: Some("~3.0.0".into()), force_latest: true, ..Default::default() };
		match f.elect(&[low, high], &policy) {
			Election::Settled { pick, store_resolution } => {
				assert_eq!(pick, high);
				assert_eq!(store_resolution.as_deref(), Some("~1.5.0"));
			},
			other => panic!("expected a forced election, got {other:?}"),
		}

		let policy = ElectionPolicy { resolution: Some("~3.0.0".into()), ..Default::default() };
		match f.elect(&[low, high], &policy) {
			Election::Conflict(report) => assert_eq!(report.override_ignored.as_deref(), Some("~3.0.0")),
			other => panic!("expected a conflict, got {other:?}"),
		}
	}
}
