use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{Dataset, IndexEntry, StoreLayout};
use crate::store::{KeyedVectorStore, MetadataStore, VectorStore};

/// A vector file and its metadata sidecar, read and written as one dataset.
///
/// Saves write the vector file first and the metadata second, each
/// published atomically. A crash between the two renames can leave the
/// files describing different entry sets; [`DatasetStore::load`] recovers
/// from that:
///
/// - positional: every save writes a prefix extension of the previous
///   save, so the longer side is truncated to the shorter one;
/// - keyed: only ids present on both sides are kept.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    layout: StoreLayout,
    dimension: usize,
    vectors_path: PathBuf,
    metadata_path: PathBuf,
}

impl DatasetStore {
    #[must_use]
    pub fn new(
        layout: StoreLayout,
        dimension: usize,
        vectors_path: impl Into<PathBuf>,
        metadata_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            layout,
            dimension,
            vectors_path: vectors_path.into(),
            metadata_path: metadata_path.into(),
        }
    }

    /// Use the layout's default file names inside `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>, layout: StoreLayout, dimension: usize) -> Self {
        let dir = dir.as_ref();
        Self::new(
            layout,
            dimension,
            dir.join(layout.vectors_file_name()),
            dir.join(layout.metadata_file_name()),
        )
    }

    #[must_use]
    pub fn layout(&self) -> StoreLayout {
        self.layout
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn vectors_path(&self) -> &Path {
        &self.vectors_path
    }

    #[must_use]
    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// Whether anything has been persisted yet.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.vectors_path.exists() || self.metadata_path.exists()
    }

    fn metadata(&self) -> MetadataStore {
        MetadataStore::new(&self.metadata_path, self.layout)
    }

    /// Load the persisted dataset. Missing files load as an empty dataset.
    ///
    /// # Errors
    /// Returns [`crate::Error::CorruptStore`] for an undecodable vector file
    /// and propagates I/O and JSON errors.
    pub fn load(&self) -> Result<Dataset> {
        let records = self.metadata().read()?;
        let mut dataset = Dataset::new(self.dimension);

        match self.layout {
            StoreLayout::Positional => {
                let vectors = VectorStore::new(&self.vectors_path, self.dimension).read()?;
                if vectors.len() != records.len() {
                    log::warn!(
                        "{} holds {} vectors but {} holds {} records; keeping the first {}",
                        self.vectors_path.display(),
                        vectors.len(),
                        self.metadata_path.display(),
                        records.len(),
                        vectors.len().min(records.len())
                    );
                }
                for (record, vector) in records.into_iter().zip(vectors) {
                    dataset.insert(IndexEntry::new(record, vector))?;
                }
            }
            StoreLayout::Keyed => {
                let mut vectors: HashMap<String, _> = KeyedVectorStore::new(
                    &self.vectors_path,
                    self.dimension,
                )
                .read()?
                .into_iter()
                .collect();

                for record in records {
                    match vectors.remove(&record.id) {
                        Some(vector) => {
                            dataset.insert(IndexEntry::new(record, vector))?;
                        }
                        None => log::warn!(
                            "Dropping '{}': metadata present but no vector in {}",
                            record.id,
                            self.vectors_path.display()
                        ),
                    }
                }
                if !vectors.is_empty() {
                    log::warn!(
                        "Dropping {} vectors with no metadata in {}",
                        vectors.len(),
                        self.metadata_path.display()
                    );
                }
            }
        }

        log::debug!(
            "Loaded {} entries ({} layout, dimension {})",
            dataset.len(),
            self.layout,
            self.dimension
        );
        Ok(dataset)
    }

    /// Persist `dataset`: vectors first, then metadata.
    ///
    /// The keyed layout merges into whatever is already on disk; the
    /// positional layout rewrites both files in dataset order.
    ///
    /// # Errors
    /// Propagates dimension, I/O and JSON errors. Nothing is published for
    /// a file whose write failed.
    pub fn save(&self, dataset: &Dataset) -> Result<()> {
        match self.layout {
            StoreLayout::Positional => {
                VectorStore::new(&self.vectors_path, self.dimension)
                    .write(dataset.iter().map(|e| &e.vector))?;
                self.metadata().write(dataset.iter().map(|e| &e.record))?;
            }
            StoreLayout::Keyed => {
                KeyedVectorStore::new(&self.vectors_path, self.dimension)
                    .merge(dataset.iter().map(|e| (e.id(), &e.vector)))?;
                self.metadata().merge(dataset.iter().map(|e| &e.record))?;
            }
        }
        Ok(())
    }
}
