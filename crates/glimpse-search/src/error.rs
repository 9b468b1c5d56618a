use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query has {actual} components but the corpus has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid query template: {0}")]
    Template(String),

    #[error("search shard panicked")]
    ShardPanicked,

    #[error(transparent)]
    Store(#[from] glimpse_core::Error),
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;
