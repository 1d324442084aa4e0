//! Records of packages already present in the components directory.
//!
//! Every installed package carries a `.bower.json` sidecar holding its metadata and the resolver fields
//! it was installed with. Symlinked directories are development copies and are read as linked packages.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::manifest::{self, HIDDEN_MANIFEST_FILE};
use crate::metadata::PackageMetadata;
use crate::tree::DependencyNode;

#[derive(Debug, Clone)]
pub struct InstalledRecord {
	pub name: String,
	pub source: String,
	pub target: String,
	pub canonical_dir: PathBuf,
	pub pkg_meta: PackageMetadata,
	pub linked: bool,
}

/// Package name to record. Names are the directory names within the components directory.
pub type InstalledMap = BTreeMap<String, InstalledRecord>;

impl From<InstalledRecord> for DependencyNode {
	fn from(record: InstalledRecord) -> Self {
		DependencyNode {
			name: record.name,
			source: record.source,
			target: record.target,
			pkg_meta: Some(record.pkg_meta),
			canonical_dir: Some(record.canonical_dir),
			linked: record.linked,
			..Default::default()
		}
	}
}

fn entries(components_dir: &Path) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
	WalkDir::new(components_dir)
		.min_depth(1)
		.max_depth(1)
		.sort_by_file_name()
		.into_iter()
}

fn dir_name(path: &Path) -> Option<String> {
	path.file_name().and_then(|n| n.to_str()).map(str::to_string)
}

/// Reads the sidecar of every package installed in `components_dir`.
///
/// A missing directory means nothing is installed.
///
/// # Errors
/// - [`Error::IO`](crate::Error::IO) when the directory can't be listed.
/// - [`Error::Manifest`](crate::Error::Manifest) when a sidecar is unreadable.
pub fn gather_installed(components_dir: &Path) -> crate::Result<InstalledMap> {
	let mut installed = InstalledMap::new();
	if !components_dir.is_dir() {
		return Ok(installed);
	}

	for entry in entries(components_dir) {
		let entry = entry.map_err(std::io::Error::from)?;
		if !entry.file_type().is_dir() {
			continue;
		}

		let sidecar = entry.path().join(HIDDEN_MANIFEST_FILE);
		if !sidecar.is_file() {
			continue;
		}
		let Some(name) = dir_name(entry.path()) else { continue };

		let pkg_meta = manifest::read_metadata_file(&sidecar)?;
		log::trace!("Found installed package {} in {}", name, entry.path().display());

		installed.insert(name.clone(), InstalledRecord {
			name,
			source: pkg_meta.original_source.clone().or_else(|| pkg_meta.source.clone()).unwrap_or_default(),
			target: pkg_meta.target.clone().unwrap_or_else(|| "*".to_string()),
			canonical_dir: entry.path().to_path_buf(),
			pkg_meta,
			linked: false,
		});
	}

	Ok(installed)
}

/// Reads every symlinked package in `components_dir`.
///
/// Linked packages are always treated as directly requested and accept any target.
///
/// # Errors
/// [`Error::IO`](crate::Error::IO) when the directory can't be listed.
pub fn gather_linked(components_dir: &Path) -> crate::Result<InstalledMap> {
	let mut linked = InstalledMap::new();
	if !components_dir.is_dir() {
		return Ok(linked);
	}

	for entry in entries(components_dir) {
		let entry = entry.map_err(std::io::Error::from)?;
		/* `is_dir` follows the link */
		if !entry.path_is_symlink() || !entry.path().is_dir() {
			continue;
		}
		let Some(name) = dir_name(entry.path()) else { continue };

		let mut pkg_meta = manifest::read_package_dir(entry.path());
		pkg_meta.direct = true;
		log::trace!("Found linked package {} at {}", name, entry.path().display());

		linked.insert(name.clone(), InstalledRecord {
			name,
			source: entry.path().to_string_lossy().into_owned(),
			target: "*".to_string(),
			canonical_dir: entry.path().to_path_buf(),
			pkg_meta,
			linked: true,
		});
	}

	Ok(linked)
}

#[cfg(test)]
mod test {
	use super::*;

	fn install(components: &Path, name: &str, sidecar: &str) {
		let dir = components.join(name);
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join(HIDDEN_MANIFEST_FILE), sidecar).unwrap();
	}

	#[test]
	fn missing_directory_is_empty() {
		let dir = tempfile::tempdir().unwrap();
		assert!(gather_installed(&dir.path().join("nope")).unwrap().is_empty());
		assert!(gather_linked(&dir.path().join("nope")).unwrap().is_empty());
	}

	#[test]
	fn reads_sidecars() {
		let dir = tempfile::tempdir().unwrap();
		install(dir.path(), "jquery", r#"{"name": "jquery", "version": "2.0.3", "_source": "git://a/jquery.git", "_originalSource": "jquery", "_target": "~2.0.0"}"#);
		install(dir.path(), "underscore", r#"{"name": "underscore", "_source": "git://a/underscore.git", "_target": "master"}"#);
		std::fs::create_dir_all(dir.path().join("not-a-package")).unwrap();

		let installed = gather_installed(dir.path()).unwrap();
		assert_eq!(installed.len(), 2);
		assert_eq!(installed["jquery"].source, "jquery");
		assert_eq!(installed["jquery"].target, "~2.0.0");
		assert_eq!(installed["underscore"].source, "git://a/underscore.git");
		assert!(!installed["jquery"].linked);
	}

	#[test]
	fn broken_sidecar_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		install(dir.path(), "broken", "{");
		assert!(matches!(gather_installed(dir.path()), Err(crate::Error::Manifest(_))));
	}

	#[cfg(unix)]
	#[test]
	fn reads_links() {
		let dir = tempfile::tempdir().unwrap();
		let dev = tempfile::tempdir().unwrap();
		std::fs::write(dev.path().join(manifest::MANIFEST_FILE), r#"{"name": "devpkg", "version": "0.1.0"}"#).unwrap();
		let components = dir.path().join("bower_components");
		std::fs::create_dir_all(&components).unwrap();
		std::os::unix::fs::symlink(dev.path(), components.join("devpkg")).unwrap();

		let linked = gather_linked(&components).unwrap();
		let record = &linked["devpkg"];
		assert!(record.linked && record.pkg_meta.direct);
		assert_eq!(record.target, "*");
		assert!(gather_installed(&components).unwrap().is_empty());
	}
}
