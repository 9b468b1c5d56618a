use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// On-disk layout of a dataset.
///
/// Exactly one layout is used per data directory; the two are never mixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreLayout {
    /// Headerless little-endian `f32` blocks plus a JSON array of
    /// `{id, url}`; entry identity is the array position.
    #[default]
    Positional,

    /// JSON objects keyed by catalog id, for both vectors and metadata.
    Keyed,
}

impl StoreLayout {
    /// Default vector file name for this layout.
    #[must_use]
    pub const fn vectors_file_name(self) -> &'static str {
        match self {
            Self::Positional => "embeddings.bin",
            Self::Keyed => "embeddings.json",
        }
    }

    /// Default metadata file name for this layout.
    #[must_use]
    pub const fn metadata_file_name(self) -> &'static str {
        match self {
            Self::Positional => "photos.json",
            Self::Keyed => "photo_index.json",
        }
    }
}

impl fmt::Display for StoreLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional => write!(f, "positional"),
            Self::Keyed => write!(f, "keyed"),
        }
    }
}

impl FromStr for StoreLayout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positional" => Ok(Self::Positional),
            "keyed" => Ok(Self::Keyed),
            other => Err(Error::InvalidData(format!(
                "unknown store layout '{other}' (expected 'positional' or 'keyed')"
            ))),
        }
    }
}
