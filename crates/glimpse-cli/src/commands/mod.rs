pub mod config;
pub mod ingest;
pub mod search;
pub mod status;

pub use ingest::run_ingest;
pub use search::run_search;
pub use status::show_status;
