//! Similarity search for glimpse.
//!
//! Ranks the stored photo embeddings against a query vector by cosine
//! similarity. Vectors are unit length, so the score is a dot product.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod engine;
pub mod error;
pub mod template;

pub use engine::{QueryEngine, SearchHit};
pub use error::{SearchError, SearchResult};
pub use template::QueryTemplate;
