use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{FetchError, FetchedCandidate, PackageFetcher};
use crate::endpoint::Endpoint;
use crate::manifest::{self, ManifestError, MANIFEST_FILE};
use crate::metadata::PackageMetadata;

/// A registry laid out on disk as `<root>/<name>/<release>/bower.json`.
///
/// A release directory name is used as `_release` when the manifest doesn't set one.
#[derive(Debug, Clone)]
pub struct DirectoryRegistry {
	root: PathBuf,
}

impl DirectoryRegistry {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}
}

fn read_releases(package_dir: &Path) -> Result<Vec<(PackageMetadata, PathBuf)>, FetchError> {
	let mut releases = Vec::new();
	if !package_dir.is_dir() {
		return Ok(releases);
	}

	for entry in WalkDir::new(package_dir).min_depth(1).max_depth(1).sort_by_file_name() {
		let entry = entry.map_err(|e| FetchError::Transient(e.to_string()))?;
		let manifest_path = entry.path().join(MANIFEST_FILE);
		if !entry.file_type().is_dir() || !manifest_path.is_file() {
			continue;
		}

		let mut meta = manifest::read_metadata_file(&manifest_path).map_err(|e| match e {
			ManifestError::Unreadable { .. } => FetchError::Transient(e.to_string()),
			e => FetchError::Fatal(e.to_string()),
		})?;
		if meta.release.is_none() {
			meta.release = entry.file_name().to_str().map(str::to_string);
		}
		releases.push((meta, entry.path().to_path_buf()));
	}

	Ok(releases)
}

#[async_trait::async_trait]
impl PackageFetcher for DirectoryRegistry {
	async fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<FetchedCandidate>, FetchError> {
		let package_dir = self.root.join(super::registry_key(endpoint));
		let target = endpoint.target.clone();

		log::debug!("Looking up {} in {}", endpoint, package_dir.display());
		tokio::task::spawn_blocking(move || -> Result<Vec<FetchedCandidate>, FetchError> {
			let (metas, dirs): (Vec<_>, Vec<_>) = read_releases(&package_dir)?.into_iter().unzip();

			let Some(index) = super::select_release(&metas, &target) else {
				return Ok(Vec::new());
			};
			let (mut pkg_meta, dir) = (metas[index].clone(), dirs[index].clone());
			pkg_meta.source.get_or_insert_with(|| dir.to_string_lossy().into_owned());

			Ok(vec![FetchedCandidate { pkg_meta, canonical_dir: Some(dir) }])
		})
		.await
		.map_err(|e| FetchError::Fatal(e.to_string()))?
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn publish(root: &Path, name: &str, release: &str, manifest: &str) {
		let dir = root.join(name).join(release);
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
	}

	#[tokio::test]
	async fn selects_from_disk() {
		let root = tempfile::tempdir().unwrap();
		publish(root.path(), "foo", "1.0.0", r#"{"name": "foo", "version": "1.0.0"}"#);
		publish(root.path(), "foo", "1.1.0", r#"{"name": "foo", "version": "1.1.0"}"#);
		publish(root.path(), "foo", "next", r#"{"name": "foo"}"#);

		let registry = DirectoryRegistry::new(root.path());
		let found = registry.fetch(&Endpoint::new("foo", "foo", "~1.0.0")).await.unwrap();
		assert_eq!(found[0].pkg_meta.version.as_deref(), Some("1.0.0"));
		assert_eq!(found[0].canonical_dir.as_deref(), Some(root.path().join("foo").join("1.0.0").as_path()));

		let found = registry.fetch(&Endpoint::new("foo", "foo", "next")).await.unwrap();
		assert_eq!(found[0].pkg_meta.release.as_deref(), Some("next"));

		assert!(registry.fetch(&Endpoint::new("bar", "bar", "*")).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn malformed_release_is_fatal() {
		let root = tempfile::tempdir().unwrap();
		publish(root.path(), "foo", "1.0.0", "{");
		let registry = DirectoryRegistry::new(root.path());
		assert!(matches!(registry.fetch(&Endpoint::new("foo", "foo", "*")).await, Err(FetchError::Fatal(_))));
	}
}
