use std::path::{Path, PathBuf};
use std::time::Duration;

/// How all-semver candidates for one name are checked for compatibility before declaring a conflict.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CompatibilityCheck {
	/// A candidate is elected only if its version satisfies the target of every other candidate.
	#[default] Pairwise,
	/// A candidate is elected if at least one other candidate is compatible with it in either direction.
	/// Cheaper but misses three way conflicts.
	Witness,
}

#[derive(Debug, Clone)]
pub struct BowererRsOptions {
	cwd: PathBuf,
	directory: String,
	cache_dir: PathBuf,

	production: bool,
	force: bool,
	force_latest: bool,
	allow_dummy_manifest: bool,

	fetch_concurrency: usize,
	fetch_timeout: Duration,
	fetch_retries: u32,
	retry_backoff: Duration,
	compatibility_check: CompatibilityCheck,
}

fn home_dir() -> PathBuf {
	std::env::var_os("HOME")
		.map(PathBuf::from)
		.unwrap_or_else(std::env::temp_dir)
}

impl Default for BowererRsOptions {
	fn default() -> Self {
		Self {
			cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
			directory: "bower_components".to_string(),
			cache_dir: {
				#[cfg(target_os = "windows")]
				let path = std::env::var_os("LOCALAPPDATA").map(PathBuf::from).unwrap_or_else(home_dir);

				#[cfg(not(target_os = "windows"))]
				let path = if let Some(e) = std::env::var_os("XDG_CACHE_HOME") {
					PathBuf::from(e)
				} else {
					home_dir().join(".cache")
				};

				path.join("bowerer-rs")
			},
			production: false,
			force: false,
			force_latest: false,
			allow_dummy_manifest: true,
			fetch_concurrency: 5,
			fetch_timeout: Duration::from_secs(30),
			fetch_retries: 2,
			retry_backoff: Duration::from_millis(500),
			compatibility_check: CompatibilityCheck::default(),
		}
	}
}

impl BowererRsOptions {
	/// Options rooted at a project directory, everything else default.
	pub fn for_project(cwd: impl Into<PathBuf>) -> Self {
		Self { cwd: cwd.into(), ..Default::default() }
	}

	pub fn cwd(&self) -> &Path {
		&self.cwd
	}
	pub fn set_cwd(&mut self, cwd: PathBuf) {
		self.cwd = cwd;
	}

	/// Name of the install directory inside the project.
	pub fn directory(&self) -> &str {
		&self.directory
	}
	pub fn set_directory(&mut self, directory: impl Into<String>) {
		self.directory = directory.into();
	}

	/// Absolute path of the install directory.
	pub fn components_dir(&self) -> PathBuf {
		self.cwd.join(&self.directory)
	}

	pub fn cache_dir(&self) -> &Path {
		&self.cache_dir
	}
	/// returns if the directory is valid or not.
	pub fn set_cache_dir(&mut self, cache_dir: PathBuf) -> bool {
		if cache_dir.is_dir() {
			self.cache_dir = cache_dir;
			true
		} else {
			false
		}
	}

	/// When set devDependencies are ignored.
	pub fn production(&self) -> bool {
		self.production
	}
	pub fn set_production(&mut self, production: bool) {
		self.production = production;
	}

	/// When set every dependency is resolved again, even if satisfied on disk.
	pub fn force(&self) -> bool {
		self.force
	}
	pub fn set_force(&mut self, force: bool) {
		self.force = force;
	}

	/// When set conflicts are settled by electing the highest version.
	pub fn force_latest(&self) -> bool {
		self.force_latest
	}
	pub fn set_force_latest(&mut self, force_latest: bool) {
		self.force_latest = force_latest;
	}

	pub fn allow_dummy_manifest(&self) -> bool {
		self.allow_dummy_manifest
	}
	pub fn set_allow_dummy_manifest(&mut self, allow: bool) {
		self.allow_dummy_manifest = allow;
	}

	/// Maximum number of fetches in flight at once.
	pub fn fetch_concurrency(&self) -> usize {
		self.fetch_concurrency
	}
	pub fn set_fetch_concurrency(&mut self, concurrency: usize) {
		self.fetch_concurrency = concurrency.max(1);
	}

	pub fn fetch_timeout(&self) -> Duration {
		self.fetch_timeout
	}
	pub fn set_fetch_timeout(&mut self, timeout: Duration) {
		self.fetch_timeout = timeout;
	}

	/// Retries after the first attempt for timeouts and transient failures.
	pub fn fetch_retries(&self) -> u32 {
		self.fetch_retries
	}
	pub fn set_fetch_retries(&mut self, retries: u32) {
		self.fetch_retries = retries;
	}

	pub fn retry_backoff(&self) -> Duration {
		self.retry_backoff
	}
	pub fn set_retry_backoff(&mut self, backoff: Duration) {
		self.retry_backoff = backoff;
	}

	pub fn compatibility_check(&self) -> CompatibilityCheck {
		self.compatibility_check
	}
	pub fn set_compatibility_check(&mut self, check: CompatibilityCheck) {
		self.compatibility_check = check;
	}

	pub fn retry_policy(&self) -> crate::fetch::RetryPolicy {
		crate::fetch::RetryPolicy {
			timeout: self.fetch_timeout,
			retries: self.fetch_retries,
			backoff: self.retry_backoff,
		}
	}
}
