use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the media catalog.
///
/// Records are unique by `id` within a catalog snapshot. Catalog order
/// defines the position of an entry in the positional store layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Stable catalog identifier (e.g. the Unsplash photo id).
    pub id: String,

    /// Location of the source image.
    pub source_url: String,
}

impl CatalogRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
        }
    }
}

impl fmt::Display for CatalogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.source_url)
    }
}

/// Append a query string (e.g. image resize parameters) to a URL.
///
/// An empty `query` leaves the URL untouched. A URL that already carries a
/// query string is extended with `&`.
#[must_use]
pub fn append_query(url: &str, query: &str) -> String {
    let query = query.trim_start_matches(['?', '&']);
    if query.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{url}&{query}")
    } else {
        format!("{url}?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_display() {
        let record = CatalogRecord::new("abc", "https://images.example.com/abc");
        assert_eq!(record.to_string(), "abc (https://images.example.com/abc)");
    }

    #[test]
    fn test_append_query() {
        assert_eq!(
            append_query("https://img.example.com/p", "w=512&q=90"),
            "https://img.example.com/p?w=512&q=90"
        );
        assert_eq!(
            append_query("https://img.example.com/p?ixid=1", "?w=512"),
            "https://img.example.com/p?ixid=1&w=512"
        );
        assert_eq!(
            append_query("https://img.example.com/p", ""),
            "https://img.example.com/p"
        );
    }
}
