pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::BowererRsOptions;
pub use config::CompatibilityCheck;

pub mod endpoint;
pub use endpoint::Endpoint;
pub mod version;
pub mod metadata;
pub use metadata::{Manifest, PackageMetadata};
pub mod manifest;

pub mod tree;
pub mod installed;
pub mod fetch;
pub use fetch::PackageFetcher;

pub mod relationship_resolver;
pub use relationship_resolver::{ResolverBuilder, ResolverFinalized, ResolverStatus};

pub mod project;
pub use project::Project;
