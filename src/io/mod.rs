//! Input collaborators

pub mod dem;

pub use dem::{CachedDemSource, DemReader, DemSource, InMemoryDemSource};
