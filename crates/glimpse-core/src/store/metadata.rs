//! Metadata sidecar for the vector store.
//!
//! Positional layout: a JSON array of `{"id", "url"}` objects, index `i`
//! describing vector `i`. Keyed layout: a JSON object
//! `{"<id>": {"url": ...}}`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{CatalogRecord, StoreLayout};
use crate::store::atomic::write_atomic;
use crate::store::ordered::{merge_by_key, to_json_object, OrderedMap};

#[derive(Debug, Serialize, Deserialize)]
struct PositionalRow<'a> {
    #[serde(borrow)]
    id: std::borrow::Cow<'a, str>,
    #[serde(borrow)]
    url: std::borrow::Cow<'a, str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct KeyedRow<'a> {
    #[serde(borrow)]
    url: std::borrow::Cow<'a, str>,
}

/// Catalog metadata aligned with a vector store.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
    layout: StoreLayout,
}

impl MetadataStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, layout: StoreLayout) -> Self {
        Self {
            path: path.into(),
            layout,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn layout(&self) -> StoreLayout {
        self.layout
    }

    /// Read records in file order. A missing file reads as empty.
    pub fn read(&self) -> Result<Vec<CatalogRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let records = match self.layout {
            StoreLayout::Positional => serde_json::from_slice::<Vec<PositionalRow>>(&bytes)?
                .into_iter()
                .map(|row| CatalogRecord::new(row.id, row.url))
                .collect(),
            StoreLayout::Keyed => {
                let OrderedMap(pairs) = serde_json::from_slice::<OrderedMap<KeyedRow>>(&bytes)?;
                pairs
                    .into_iter()
                    .map(|(id, row)| CatalogRecord::new(id, row.url))
                    .collect()
            }
        };
        Ok(records)
    }

    /// Atomically replace the sidecar with `records`, in order.
    pub fn write<'a, I>(&self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a CatalogRecord>,
    {
        let bytes = match self.layout {
            StoreLayout::Positional => {
                let rows: Vec<PositionalRow> = records
                    .into_iter()
                    .map(|r| PositionalRow {
                        id: r.id.as_str().into(),
                        url: r.source_url.as_str().into(),
                    })
                    .collect();
                serde_json::to_vec(&rows)?
            }
            StoreLayout::Keyed => to_json_object(records.into_iter().map(|r| {
                (
                    r.id.as_str(),
                    KeyedRow {
                        url: r.source_url.as_str().into(),
                    },
                )
            }))?,
        };
        write_atomic(&self.path, &bytes)
    }

    /// Merge-on-load: known ids get their URL replaced in place, new ids
    /// are appended, and the whole file is written back.
    pub fn merge<'a, I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a CatalogRecord>,
    {
        let existing: Vec<(String, String)> = self
            .read()?
            .into_iter()
            .map(|r| (r.id, r.source_url))
            .collect();
        let incoming = records
            .into_iter()
            .map(|r| (r.id.clone(), r.source_url.clone()));
        let merged: Vec<CatalogRecord> = merge_by_key(existing, incoming)
            .into_iter()
            .map(|(id, url)| CatalogRecord::new(id, url))
            .collect();
        self.write(&merged)?;
        Ok(merged.len())
    }
}
