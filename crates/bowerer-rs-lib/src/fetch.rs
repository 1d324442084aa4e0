//! Retrieving candidate package metadata for an endpoint.
//!
//! The transport (registries, git hosts, archives) lives behind [`PackageFetcher`].
//! The resolver only ever calls it through [`fetch_with_retry`].

use std::path::PathBuf;
use std::time::Duration;

use crate::endpoint::{self, Endpoint};
use crate::metadata::PackageMetadata;
use crate::version::{self, Range};

mod memory;
pub use memory::MemoryRegistry;
mod directory;
pub use directory::DirectoryRegistry;

/// A concrete package proposed to satisfy an endpoint.
#[derive(Debug, Clone)]
pub struct FetchedCandidate {
	pub pkg_meta: PackageMetadata,
	/// Where the fetched package contents live, if they were materialized.
	pub canonical_dir: Option<PathBuf>,
}

impl From<PackageMetadata> for FetchedCandidate {
	fn from(pkg_meta: PackageMetadata) -> Self {
		FetchedCandidate { pkg_meta, canonical_dir: None }
	}
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
	/// Nothing matching the endpoint exists.
	#[error("no package matches {0}")]
	NotFound(String),
	#[error("timed out after {0:?}")]
	Timeout(Duration),
	/// Failure worth trying again, a dropped connection or a busy host.
	#[error("transient failure: {0}")]
	Transient(String),
	#[error("{0}")]
	Fatal(String),
	#[error("gave up after {attempts} attempts: {last}")]
	Exhausted {
		attempts: u32,
		last: Box<FetchError>,
	},
}

impl FetchError {
	pub fn is_retryable(&self) -> bool {
		matches!(self, FetchError::Timeout(_) | FetchError::Transient(_))
	}
}

/// Source of package metadata.
///
/// Implementations must be safe to call concurrently, the resolver keeps several fetches in flight.
#[async_trait::async_trait]
pub trait PackageFetcher: Send + Sync {
	/// Returns the candidates for `endpoint`. An empty list is treated as [`FetchError::NotFound`].
	async fn fetch(&self, endpoint: &Endpoint) -> Result<Vec<FetchedCandidate>, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Limit for a single attempt.
	pub timeout: Duration,
	/// Attempts after the first one.
	pub retries: u32,
	/// Multiplied by the attempt number between attempts.
	pub backoff: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		RetryPolicy {
			timeout: Duration::from_secs(30),
			retries: 2,
			backoff: Duration::from_millis(500),
		}
	}
}

/// Fetches `endpoint`, retrying timeouts and transient failures.
///
/// # Errors
/// - [`FetchError::NotFound`] when the fetcher returned no candidates.
/// - [`FetchError::Exhausted`] once retryable failures use up `policy.retries`.
/// - Any non retryable error from the fetcher, immediately.
pub async fn fetch_with_retry(fetcher: &dyn PackageFetcher, endpoint: &Endpoint, policy: RetryPolicy) -> Result<Vec<FetchedCandidate>, FetchError> {
	let mut attempt = 0u32;
	loop {
		attempt += 1;

		let result = match tokio::time::timeout(policy.timeout, fetcher.fetch(endpoint)).await {
			Ok(result) => result,
			Err(_) => Err(FetchError::Timeout(policy.timeout)),
		};

		match result {
			Ok(candidates) if candidates.is_empty() => return Err(FetchError::NotFound(endpoint.to_string())),
			Ok(candidates) => return Ok(candidates),
			Err(e) if e.is_retryable() => {
				if attempt > policy.retries {
					return Err(FetchError::Exhausted { attempts: attempt, last: Box::new(e) });
				}
				log::warn!("Fetching {} failed on attempt {}, retrying: {}", endpoint, attempt, e);
				tokio::time::sleep(policy.backoff * attempt).await;
			},
			Err(e) => return Err(e),
		}
	}
}

/// Key a registry files an endpoint under, the source unless it is a locator.
pub(crate) fn registry_key(endpoint: &Endpoint) -> &str {
	if endpoint.source.is_empty() || endpoint::looks_like_source(&endpoint.source) {
		&endpoint.name
	} else {
		&endpoint.source
	}
}

/// Picks the release a registry should answer `target` with, returning its index.
///
/// - wildcard: the highest version.
/// - range: the highest version within it.
/// - anything else: the release (tag, branch, commit) equal to it.
pub(crate) fn select_release(releases: &[PackageMetadata], target: &str) -> Option<usize> {
	let versioned = || releases.iter()
		.enumerate()
		.filter_map(|(i, r)| r.semver().map(|v| (v, i)));

	if endpoint::is_wildcard(target) {
		return versioned()
			.max_by(|a, b| version::compare(&a.0, &b.0))
			.map(|(_, i)| i)
			.or_else(|| releases.len().checked_sub(1));
	}

	if let Some(range) = Range::parse(target) {
		let best = versioned()
			.filter(|(v, _)| range.matches(v))
			.max_by(|a, b| version::compare(&a.0, &b.0))
			.map(|(_, i)| i);
		if best.is_some() {
			return best;
		}
	}

	releases.iter().position(|r| r.release() == Some(target))
}
