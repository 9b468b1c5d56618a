//! On-disk persistence for datasets.
//!
//! A dataset lives in two files that are always written together: a vector
//! file and a metadata sidecar. Every write goes to a temporary file in the
//! destination directory and is published with a rename, so a crash never
//! leaves a truncated file behind.

mod atomic;
pub mod dataset;
pub mod metadata;
mod ordered;
pub mod vectors;

pub use dataset::DatasetStore;
pub use metadata::MetadataStore;
pub use vectors::{KeyedVectorStore, VectorStore};
