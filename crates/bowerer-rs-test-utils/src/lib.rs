//! Various helper functions for testing
//!
//! functions in this module should use results and not use any panics to avoid confusion in callers

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bowerer_rs::fetch::{FetchError, FetchedCandidate, PackageFetcher};
use bowerer_rs::{BowererRsOptions, Endpoint, PackageMetadata};

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FixtureError>;

/// A throwaway project directory, removed when dropped.
pub struct ProjectFixture {
	dir: tempfile::TempDir,
}

impl ProjectFixture {
	/// Creates a project with `manifest` written to `bower.json`.
	pub fn new(manifest: serde_json::Value) -> Result<Self> {
		let fixture = Self::without_manifest()?;
		write_json(&fixture.path().join("bower.json"), &manifest)?;
		Ok(fixture)
	}

	pub fn without_manifest() -> Result<Self> {
		Ok(Self { dir: tempfile::tempdir()? })
	}

	pub fn path(&self) -> &Path {
		self.dir.path()
	}

	pub fn components_dir(&self) -> PathBuf {
		self.path().join("bower_components")
	}

	/// Default options rooted at the fixture with no retry delay.
	pub fn options(&self) -> BowererRsOptions {
		let mut options = BowererRsOptions::for_project(self.path());
		options.set_retry_backoff(std::time::Duration::ZERO);
		options
	}

	/// Places an installed package in the components directory with `sidecar` as its `.bower.json`.
	pub fn install(&self, name: &str, sidecar: serde_json::Value) -> Result<PathBuf> {
		let dir = self.components_dir().join(name);
		std::fs::create_dir_all(&dir)?;
		write_json(&dir.join(".bower.json"), &sidecar)?;
		Ok(dir)
	}

	/// Creates a package outside the components directory and symlinks it in as `name`.
	///
	/// # Parameters
	/// - `manifest` - Written as the linked package's `bower.json`.
	#[cfg(unix)]
	pub fn link(&self, name: &str, manifest: serde_json::Value) -> Result<PathBuf> {
		let target = self.path().join("linked").join(name);
		std::fs::create_dir_all(&target)?;
		write_json(&target.join("bower.json"), &manifest)?;

		std::fs::create_dir_all(self.components_dir())?;
		let link = self.components_dir().join(name);
		std::os::unix::fs::symlink(&target, &link)?;
		Ok(link)
	}
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
	std::fs::write(path, serde_json::to_vec_pretty(value)?)?;
	Ok(())
}

/// A package as a fetcher would return it.
pub fn package<'a>(name: &str, version: &str, dependencies: impl IntoIterator<Item = (&'a str, &'a str)>) -> PackageMetadata {
	PackageMetadata {
		name: name.to_string(),
		version: Some(version.to_string()),
		dependencies: dependencies.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
		..Default::default()
	}
}

#[derive(Default)]
struct Canned {
	candidates: Vec<PackageMetadata>,
	failure: Option<FetchError>,
	/// Transient failures left before answering.
	flaky: u32,
	calls: u32,
}

/// Fetcher returning fixed candidates by name regardless of target, counting every call.
///
/// Anonymous endpoints are looked up by source.
#[derive(Default)]
pub struct StaticFetcher {
	canned: Mutex<HashMap<String, Canned>>,
}

impl StaticFetcher {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(self, release: PackageMetadata) -> Self {
		if let Ok(mut canned) = self.canned.lock() {
			canned.entry(release.name.clone()).or_default().candidates.push(release);
		}
		self
	}

	/// Every fetch of `name` fails with `error`.
	pub fn failing(self, name: &str, error: FetchError) -> Self {
		if let Ok(mut canned) = self.canned.lock() {
			canned.entry(name.to_string()).or_default().failure = Some(error);
		}
		self
	}

	/// The first `times` fetches of `name` fail transiently.
	pub fn flaky(self, name: &str, times: u32) -> Self {
		if let Ok(mut canned) = self.canned.lock() {
			canned.entry(name.to_string()).or_default().flaky = times;
		}
		self
	}

	/// Number of fetches made for `name` so far.
	pub fn calls(&self, name: &str) -> u32 {
		self.canned.lock()
			.ok()
			.and_then(|c| c.get(name).map(|c| c.calls))
			.unwrap_or(0)
	}
}

#[async_trait::async_trait]
impl PackageFetcher for StaticFetcher {
	async fn fetch(&self, endpoint: &Endpoint) -> std::result::Result<Vec<FetchedCandidate>, FetchError> {
		let key = if endpoint.name.is_empty() { &endpoint.source } else { &endpoint.name };
		let mut canned = self.canned.lock().map_err(|e| FetchError::Fatal(e.to_string()))?;
		let entry = canned.entry(key.clone()).or_default();
		entry.calls += 1;

		if entry.flaky > 0 {
			entry.flaky -= 1;
			return Err(FetchError::Transient(format!("{} is flaky", key)));
		}
		if let Some(e) = &entry.failure {
			return Err(e.clone());
		}
		Ok(entry.candidates.iter().cloned().map(FetchedCandidate::from).collect())
	}
}
