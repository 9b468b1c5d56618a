use std::fmt;
use std::str::FromStr;

use crate::error::{SearchError, SearchResult};

const PLACEHOLDER: &str = "{text}";

/// Wraps free-text queries before they are embedded, e.g. `photo of {text}`.
///
/// CLIP scores captions better than bare keywords, so a query like "dog"
/// is sent as "photo of dog".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate(String);

impl QueryTemplate {
    /// # Errors
    /// Returns [`SearchError::Template`] if `template` has no `{text}`.
    pub fn new(template: impl Into<String>) -> SearchResult<Self> {
        let template = template.into();
        if !template.contains(PLACEHOLDER) {
            return Err(SearchError::Template(format!(
                "'{template}' has no {PLACEHOLDER} placeholder"
            )));
        }
        Ok(Self(template))
    }

    /// The template that passes text through untouched.
    #[must_use]
    pub fn identity() -> Self {
        Self(PLACEHOLDER.to_string())
    }

    #[must_use]
    pub fn render(&self, text: &str) -> String {
        self.0.replace(PLACEHOLDER, text.trim())
    }
}

impl Default for QueryTemplate {
    fn default() -> Self {
        Self("photo of {text}".to_string())
    }
}

impl FromStr for QueryTemplate {
    type Err = SearchError;

    fn from_str(s: &str) -> SearchResult<Self> {
        Self::new(s)
    }
}

impl fmt::Display for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
