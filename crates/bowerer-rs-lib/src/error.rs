//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("endpoint error: {0}")]
	Endpoint(#[from] crate::endpoint::EndpointError),
	#[error("manifest error: {0}")]
	Manifest(#[from] crate::manifest::ManifestError),
	/// A package required by the project root could not be fetched.
	#[error("failed to fetch {name}: {source}")]
	Fetch {
		name: String,
		#[source]
		source: crate::fetch::FetchError,
	},
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	/// A fetch task panicked or was cancelled before reporting back.
	#[error("fetch task failed: {0}")]
	Task(String),
	#[error("no manifest present and no endpoints requested")]
	NoManifest,
}
