//! Turning requested and declared packages into one elected version per package name.
//!
//! # Usage
//! 1. Create a [`ResolverBuilder`] over the analysed [`DependencyTree`](crate::tree::DependencyTree).
//! 1. Hand it the targets, resolved and incompatible nodes, usually from [`crate::project::bucket`].
//! 1. [`ResolverBuilder::build()`] to get a [`ResolverProcessor`].
//! 1. [`ResolverProcessor::resolve()`] with a [`PackageFetcher`](crate::fetch::PackageFetcher) to run fetch rounds until nothing is left to fetch.
//! 1. Query the returned [`ResolverFinalized`], [`ResolverFinalized::status()`] tells if any conflict needs a decision.

mod resolver_builder;
pub use resolver_builder::ResolverBuilder;
mod processing_resolver;
pub use processing_resolver::ResolverProcessor;
pub use processing_resolver::guess_name;
mod finalized_resolver;
pub use finalized_resolver::*;

pub mod election;
pub mod unique;
pub use unique::make_unique;
