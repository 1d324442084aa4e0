//! Semantic version comparison and range matching.
//!
//! Targets in manifests use npm style ranges (`~1.2.0`, `>=1.0.0 <2.0.0`, `1.x || 2.x`, `1.0 - 1.4`).
//! These are translated to [`semver::VersionReq`] comparator sets, one per `||` alternative.
//!
//! Versions that don't parse are never compared, callers branch on [`parse_version`] first.

use std::cmp::Ordering;

use semver::{Version, VersionReq};

/// Parses a version, tolerating a leading `v` or `=`.
pub fn parse_version(text: &str) -> Option<Version> {
	let text = text.trim();
	let text = text.strip_prefix('=').unwrap_or(text).trim_start();
	let text = text.strip_prefix('v').unwrap_or(text);
	Version::parse(text).ok()
}

pub fn compare(lhs: &Version, rhs: &Version) -> Ordering {
	lhs.cmp(rhs)
}

/// A union of comparator sets. A version satisfies the range if it matches any alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
	alternatives: Vec<VersionReq>,
}

impl Range {
	pub fn any() -> Self {
		Range { alternatives: vec![VersionReq::STAR] }
	}

	/// Returns `None` when `text` is not a valid range, e.g. a branch name or commit hash.
	pub fn parse(text: &str) -> Option<Range> {
		let text = text.trim();
		if crate::endpoint::is_wildcard(text) {
			return Some(Range::any());
		}

		let alternatives = text
			.split("||")
			.map(|alt| translate_comparator_set(alt.trim()).and_then(|req| VersionReq::parse(&req).ok()))
			.collect::<Option<Vec<_>>>()?;

		Some(Range { alternatives })
	}

	pub fn matches(&self, version: &Version) -> bool {
		self.alternatives.iter().any(|req| req.matches(version))
	}
}

/// Rewrites one npm comparator set into the comma separated form `semver` understands.
fn translate_comparator_set(set: &str) -> Option<String> {
	if set.is_empty() || set == "*" {
		return Some("*".to_string());
	}

	/* Hyphen ranges, `1.0.0 - 2.0.0` */
	if let Some((low, high)) = set.split_once(" - ") {
		return Some(format!(">={}, <={}", strip_v(low.trim()), strip_v(high.trim())));
	}

	let mut comparators = Vec::<String>::new();
	let mut pending_op: Option<&str> = None;

	for token in set.split_whitespace() {
		/* `>= 1.0.0` is written with a space between operator and version */
		if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
			pending_op = Some(token);
			continue;
		}

		let (op, version) = match pending_op.take() {
			Some(op) => (op, token),
			None => split_operator(token),
		};
		let version = strip_v(version);
		if version.is_empty() {
			return None;
		}

		/* A bare version is exact in npm. `=1.5` still covers the whole minor, same as npm's `1.5` */
		let is_wild = version.contains(['x', 'X', '*']);
		let op = match op {
			"" | "=" | "==" if is_wild => "",
			"" | "==" => "=",
			op => op,
		};

		comparators.push(format!("{op}{version}"));
	}

	if pending_op.is_some() || comparators.is_empty() {
		return None;
	}

	Some(comparators.join(", "))
}

fn split_operator(token: &str) -> (&str, &str) {
	let idx = token.find(|c: char| !matches!(c, '<' | '>' | '=' | '~' | '^')).unwrap_or(token.len());
	token.split_at(idx)
}

fn strip_v(version: &str) -> &str {
	version.strip_prefix('v').unwrap_or(version)
}

pub fn is_valid_range(text: &str) -> bool {
	Range::parse(text).is_some()
}

/// Checks if `version` falls within `range`. False when either fails to parse.
pub fn satisfies(version: &str, range: &str) -> bool {
	match (parse_version(version), Range::parse(range)) {
		(Some(version), Some(range)) => range.matches(&version),
		_ => false,
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test] fn version_tolerates_prefix() { assert_eq!(parse_version("v1.2.3"), parse_version("1.2.3")) }
	#[test] fn version_rejects_branch() { assert!(parse_version("master").is_none()) }
	#[test] fn compare_orders_numerically() { assert_eq!(compare(&parse_version("1.2.10").unwrap(), &parse_version("1.2.9").unwrap()), Ordering::Greater) }

	#[test] fn tilde_range() { assert!(satisfies("2.0.5", "~2.0.0") && !satisfies("2.1.0", "~2.0.0")) }
	#[test] fn caret_range() { assert!(satisfies("1.9.0", "^1.2.0") && !satisfies("2.0.0", "^1.2.0")) }
	#[test] fn bare_version_is_exact() { assert!(satisfies("1.5.0", "1.5.0") && !satisfies("1.5.1", "1.5.0")) }
	#[test] fn partial_version_covers_minor() { assert!(satisfies("1.5.7", "1.5") && !satisfies("1.6.0", "1.5")) }
	#[test] fn x_wildcard() { assert!(satisfies("1.4.2", "1.x") && !satisfies("2.0.0", "1.x")) }
	#[test] fn space_separated_set() { assert!(satisfies("1.5.0", ">=1.0.0 <2.0.0") && !satisfies("2.0.0", ">=1.0.0 <2.0.0")) }
	#[test] fn detached_operator() { assert!(satisfies("1.5.0", ">= 1.0.0 < 2.0.0")) }
	#[test] fn hyphen_range() { assert!(satisfies("1.4.0", "1.0.0 - 1.4.0") && !satisfies("1.4.1", "1.0.0 - 1.4.0")) }
	#[test] fn alternatives() { assert!(satisfies("3.1.0", "~1.0.0 || ^3.0.0") && !satisfies("2.0.0", "~1.0.0 || ^3.0.0")) }
	#[test] fn wildcards_match_anything() { assert!(satisfies("0.0.1", "*") && satisfies("9.9.9", "latest") && satisfies("1.0.0", "")) }
	#[test] fn branch_is_not_a_range() { assert!(!is_valid_range("my-branch") && !satisfies("1.0.0", "my-branch")) }
	#[test] fn commit_is_not_a_range() { assert!(!is_valid_range("3dc50c62fe2d2d01afc58e7ad42236a35acff4d8")) }
	#[test] fn unparsable_version_never_satisfies() { assert!(!satisfies("master", "*")) }
}
