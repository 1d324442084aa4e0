//! Locating and reading a project's manifest.
//!
//! Candidates are probed in order: `bower.json`, then the legacy `component.json` and `.bower.json`.
//! `component.json` is shared with component(1), files carrying its keys are not ours and are skipped.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::metadata::Manifest;

pub const MANIFEST_FILE: &str = "bower.json";
pub const LEGACY_COMPONENT_FILE: &str = "component.json";
/// Also the name of the metadata sidecar written into every installed package.
pub const HIDDEN_MANIFEST_FILE: &str = ".bower.json";

const COMPONENT1_KEYS: [&str; 5] = ["repo", "development", "remotes", "paths", "local"];

#[derive(Debug, Error)]
pub enum ManifestError {
	#[error("no manifest found in {0}")]
	NotFound(PathBuf),
	#[error("could not read {path}: {source}")]
	Unreadable {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("malformed manifest {path}: {source}")]
	Malformed {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
	#[error("manifest {0} has no name")]
	MissingName(PathBuf),
}

/// A manifest along with where it came from.
#[derive(Debug, Clone)]
pub struct ManifestFile {
	pub manifest: Manifest,
	/// `None` when the manifest was synthesized.
	pub path: Option<PathBuf>,
	/// Read from one of the legacy filenames.
	pub deprecated: bool,
}

impl ManifestFile {
	pub fn is_dummy(&self) -> bool {
		self.path.is_none()
	}
}

/// Reads and validates a single manifest file.
///
/// # Errors
/// - [`ManifestError::Unreadable`] when the file can't be read.
/// - [`ManifestError::Malformed`] when the contents are not a manifest object.
/// - [`ManifestError::MissingName`] when `name` is absent or blank.
pub fn read_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
	let path = path.as_ref();
	let manifest = read_metadata_file(path)?;
	if manifest.name.trim().is_empty() {
		return Err(ManifestError::MissingName(path.to_path_buf()));
	}
	Ok(manifest)
}

fn read_value(path: &Path) -> Result<serde_json::Value, ManifestError> {
	let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Unreadable { path: path.to_path_buf(), source })?;
	serde_json::from_str(&text).map_err(|source| ManifestError::Malformed { path: path.to_path_buf(), source })
}

/// Reads package metadata without requiring a name, as found in installed package sidecars.
pub fn read_metadata_file(path: &Path) -> Result<Manifest, ManifestError> {
	let value = read_value(path)?;
	serde_json::from_value(value).map_err(|source| ManifestError::Malformed { path: path.to_path_buf(), source })
}

fn is_component1(value: &serde_json::Value) -> bool {
	value.as_object().is_some_and(|o| COMPONENT1_KEYS.iter().any(|k| o.contains_key(*k)))
}

/// Finds the manifest file within `dir`, returning its path and whether it is a legacy name.
pub fn find_manifest(dir: impl AsRef<Path>) -> Result<Option<(PathBuf, bool)>, ManifestError> {
	let dir = dir.as_ref();

	let modern = dir.join(MANIFEST_FILE);
	if modern.is_file() {
		return Ok(Some((modern, false)));
	}

	let component = dir.join(LEGACY_COMPONENT_FILE);
	if component.is_file() {
		if is_component1(&read_value(&component)?) {
			log::debug!("Ignoring component(1) manifest {}", component.display());
		} else {
			return Ok(Some((component, true)));
		}
	}

	let hidden = dir.join(HIDDEN_MANIFEST_FILE);
	if hidden.is_file() {
		return Ok(Some((hidden, true)));
	}

	Ok(None)
}

/// Reads the manifest of the project rooted at `dir`.
///
/// # Parameters
/// - `dir` - Project root to probe.
/// - `allow_dummy` - When no manifest exists synthesize one named after `dir` instead of failing.
///
/// # Errors
/// Any [`ManifestError`], [`NotFound`](ManifestError::NotFound) only when `allow_dummy` is false.
pub fn read_manifest(dir: impl AsRef<Path>, allow_dummy: bool) -> Result<ManifestFile, ManifestError> {
	let dir = dir.as_ref();

	match find_manifest(dir)? {
		Some((path, deprecated)) => {
			if deprecated {
				log::warn!("Deprecated file is used: {}", path.display());
			}
			let manifest = read_manifest_file(&path)?;
			Ok(ManifestFile { manifest, path: Some(path), deprecated })
		},
		None if allow_dummy => {
			log::debug!("No manifest in {}, using a dummy", dir.display());
			Ok(ManifestFile { manifest: dummy_manifest(dir), path: None, deprecated: false })
		},
		None => Err(ManifestError::NotFound(dir.to_path_buf())),
	}
}

/// A manifest containing nothing but a name derived from `dir`.
pub fn dummy_manifest(dir: &Path) -> Manifest {
	let name = dir.file_name()
		.and_then(|n| n.to_str())
		.filter(|n| !n.is_empty())
		.unwrap_or("root");
	Manifest::named(name)
}

/// Reads package metadata from a directory, falling back to a dummy named after it.
///
/// Used for linked packages where a missing or broken manifest shouldn't hide the link.
pub fn read_package_dir(dir: &Path) -> Manifest {
	match find_manifest(dir).and_then(|found| found.map(|(path, _)| read_metadata_file(&path)).transpose()) {
		Ok(Some(mut meta)) => {
			if meta.name.trim().is_empty() {
				meta.name = dummy_manifest(dir).name;
			}
			meta
		},
		Ok(None) => dummy_manifest(dir),
		Err(e) => {
			log::warn!("Failed to read package metadata in {}: {}", dir.display(), e);
			dummy_manifest(dir)
		},
	}
}
