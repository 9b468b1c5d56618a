pub mod dataset;
pub mod layout;
pub mod record;
pub mod vector;

pub use dataset::{Dataset, IndexEntry};
pub use layout::StoreLayout;
pub use record::{append_query, CatalogRecord};
pub use vector::{Vector, UNIT_TOLERANCE};
