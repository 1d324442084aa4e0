use std::collections::HashMap;

use super::{FetchError, FetchedCandidate, PackageFetcher};
use crate::endpoint::Endpoint;
use crate::metadata::PackageMetadata;

/// A registry held entirely in memory, name to published releases.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
	packages: HashMap<String, Vec<PackageMetadata>>,
}

impl MemoryRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Publishes a release under its own name.
	pub fn publish(&mut self, release: PackageMetadata) {
		self.packages.entry(release.name.clone()).or_default().push(release);
	}

	pub fn with(mut self, release: PackageMetadata) -> Self {
		self.publish(release);
		self
	}

	/// Publishes `name@version` with the given dependencies.
	pub fn with_version<'a>(self, name: &str, version: &str, dependencies: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
		self.with(PackageMetadata {
			name: name.to_string(),
			version: Some(version.to_string()),
			dependencies: dependencies.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
			..Default::default()
		})
	}

	pub fn releases(&self, name: &str) -> &[PackageMetadata] {
		self.packages.get(name).map_or(&[], Vec::as_slice)
	}
}

#[async_trait::async_trait]
impl PackageFetcher for MemoryRegistry {
	async fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<FetchedCandidate>, FetchError> {
		let releases = self.releases(super::registry_key(endpoint));
		Ok(super::select_release(releases, &endpoint.target)
			.map(|i| FetchedCandidate::from(releases[i].clone()))
			.into_iter()
			.collect())
	}
}
