//! Package metadata as stored in manifests and installed package sidecars.
//!
//! The resolver stamps a handful of underscore prefixed fields onto fetched metadata,
//! they are kept as typed fields while everything else passes through untouched in `extra`.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize, Deserializer};

/// Declared dependencies, name to declaration string (`"~1.0.0"`, `"owner/pkg#v2"`, ...).
pub type DependencyMap = BTreeMap<String, String>;

/// A project manifest has the same shape as any other package metadata.
pub type Manifest = PackageMetadata;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
	#[serde(default)]
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(default, deserialize_with = "deserialize_dependency_map", skip_serializing_if = "BTreeMap::is_empty")]
	pub dependencies: DependencyMap,
	#[serde(default, rename = "devDependencies", deserialize_with = "deserialize_dependency_map", skip_serializing_if = "BTreeMap::is_empty")]
	pub dev_dependencies: DependencyMap,
	/// Manifest declared conflict resolutions, name to target override.
	#[serde(default, deserialize_with = "deserialize_dependency_map", skip_serializing_if = "BTreeMap::is_empty")]
	pub resolutions: DependencyMap,

	/// Where the package was actually fetched from.
	#[serde(default, rename = "_source", skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
	/// The source as declared, before any shorthand expansion.
	#[serde(default, rename = "_originalSource", skip_serializing_if = "Option::is_none")]
	pub original_source: Option<String>,
	/// The target the package was resolved for.
	#[serde(default, rename = "_target", skip_serializing_if = "Option::is_none")]
	pub target: Option<String>,
	/// Concrete release identifier, a version, tag or commit.
	#[serde(default, rename = "_release", skip_serializing_if = "Option::is_none")]
	pub release: Option<String>,
	/// Set when the package is only installed because it was explicitly requested.
	#[serde(default, rename = "_direct", skip_serializing_if = "std::ops::Not::not")]
	pub direct: bool,

	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageMetadata {
	pub fn named(name: impl Into<String>) -> Self {
		PackageMetadata { name: name.into(), ..Default::default() }
	}

	/// Parsed semantic version, `None` for non-semver resolutions such as branches.
	pub fn semver(&self) -> Option<semver::Version> {
		self.version.as_deref().and_then(crate::version::parse_version)
	}

	/// The concrete release, falling back to the version and then the resolved target.
	pub fn release(&self) -> Option<&str> {
		self.release.as_deref()
			.or(self.version.as_deref())
			.or(self.target.as_deref())
	}

	/// Declared dependencies under `section`.
	pub fn section(&self, section: DependencySection) -> &DependencyMap {
		match section {
			DependencySection::Dependencies => &self.dependencies,
			DependencySection::Dev => &self.dev_dependencies,
		}
	}
}

/// Which manifest section a dependency was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencySection {
	Dependencies,
	Dev,
}

/// Accepts either `{"name": "declaration"}` or `["name", ...]`, the latter meaning any version.
fn deserialize_dependency_map<'de, D>(deserializer: D) -> Result<DependencyMap, D::Error>
where D: Deserializer<'de>
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum MapOrList {
		Map(BTreeMap<String, String>),
		List(Vec<String>),
		Null(()),
	}

	Ok(match MapOrList::deserialize(deserializer)? {
		MapOrList::Map(m) => m,
		MapOrList::List(l) => l.into_iter().map(|name| (name, "*".to_string())).collect(),
		MapOrList::Null(()) => DependencyMap::new(),
	})
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn reads_resolver_fields() {
		let meta: PackageMetadata = serde_json::from_str(r#"{
			"name": "jquery", "version": "2.1.0", "main": "dist/jquery.js",
			"_source": "git://github.com/jquery/jquery.git", "_target": "~2.1.0", "_direct": true
		}"#).unwrap();
		assert_eq!(meta.target.as_deref(), Some("~2.1.0"));
		assert!(meta.direct);
		assert_eq!(meta.extra["main"], "dist/jquery.js");
		assert_eq!(meta.release(), Some("2.1.0"));
	}

	#[test]
	fn dependency_list_is_normalized() {
		let meta: PackageMetadata = serde_json::from_str(r#"{"name": "a", "dependencies": ["b", "c"]}"#).unwrap();
		assert_eq!(meta.dependencies.get("b").map(String::as_str), Some("*"));
		assert_eq!(meta.dependencies.len(), 2);
	}

	#[test]
	fn round_trips_extra_fields() {
		let meta: PackageMetadata = serde_json::from_str(r#"{"name": "a", "homepage": "http://a"}"#).unwrap();
		let text = serde_json::to_string(&meta).unwrap();
		assert!(text.contains("homepage") && !text.contains("_direct"));
	}

	#[test] fn branch_version_is_not_semver() { assert!(PackageMetadata { version: Some("master".into()), ..Default::default() }.semver().is_none()) }
}
