//! Vector persistence.
//!
//! [`VectorStore`] is the positional layout: a flat run of `D` little-endian
//! `f32` values per entry, no header, so the entry count is
//! `file_size / (D * 4)`. [`KeyedVectorStore`] is a JSON object mapping
//! catalog id to its `D` floats.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::Vector;
use crate::store::atomic::write_atomic;
use crate::store::ordered::{merge_by_key, to_json_object, OrderedMap};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Position of the first NaN or infinite component, if any.
fn non_finite(vector: &Vector) -> Option<usize> {
    vector.as_slice().iter().position(|v| !v.is_finite())
}

/// Positional binary vector store.
#[derive(Debug, Clone)]
pub struct VectorStore {
    path: PathBuf,
    dimension: usize,
}

impl VectorStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            path: path.into(),
            dimension,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn block_len(&self) -> usize {
        self.dimension * F32_BYTES
    }

    /// Atomically replace the store with `vectors`, in order.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if any vector has the wrong
    /// length, or an I/O error if the file cannot be published.
    pub fn write<'a, I>(&self, vectors: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Vector>,
    {
        let mut bytes = Vec::new();
        for vector in vectors {
            if vector.dimension() != self.dimension {
                return Err(Error::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.dimension(),
                });
            }
            bytes.reserve(self.block_len());
            for value in vector.as_slice() {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        write_atomic(&self.path, &bytes)
    }

    /// Read every vector in file order. A missing file reads as empty.
    ///
    /// # Errors
    /// Returns [`Error::CorruptStore`] if the file size is not a whole
    /// number of `D * 4` byte blocks, or if any component is NaN or
    /// infinite.
    pub fn read(&self) -> Result<Vec<Vector>> {
        if self.dimension == 0 {
            return Err(Error::InvalidData(
                "vector dimension must be positive".to_string(),
            ));
        }

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let block = self.block_len();
        if bytes.len() % block != 0 {
            return Err(Error::CorruptStore {
                path: self.path.clone(),
                reason: format!(
                    "{} bytes is not a multiple of {} ({} x {} bytes)",
                    bytes.len(),
                    block,
                    self.dimension,
                    F32_BYTES
                ),
            });
        }

        let vectors: Vec<Vector> = bytes
            .chunks_exact(block)
            .map(|chunk| {
                Vector::new(
                    chunk
                        .chunks_exact(F32_BYTES)
                        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .collect(),
                )
            })
            .collect();

        for (entry, vector) in vectors.iter().enumerate() {
            if let Some(component) = non_finite(vector) {
                return Err(Error::CorruptStore {
                    path: self.path.clone(),
                    reason: format!("entry {entry} has a non-finite component at {component}"),
                });
            }
        }
        Ok(vectors)
    }

    /// Number of entries, derived from the file size alone.
    ///
    /// # Errors
    /// Same corruption rule as [`VectorStore::read`].
    pub fn count(&self) -> Result<usize> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() as usize,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let block = self.block_len();
        if block == 0 || size % block != 0 {
            return Err(Error::CorruptStore {
                path: self.path.clone(),
                reason: format!("{size} bytes is not a multiple of {block}"),
            });
        }
        Ok(size / block)
    }
}

/// Id-keyed JSON vector store.
#[derive(Debug, Clone)]
pub struct KeyedVectorStore {
    path: PathBuf,
    dimension: usize,
}

impl KeyedVectorStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            path: path.into(),
            dimension,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read `(id, vector)` pairs in file order. A missing file reads as empty.
    ///
    /// # Errors
    /// Returns [`Error::CorruptStore`] if any vector has the wrong length
    /// or a non-finite component.
    pub fn read(&self) -> Result<Vec<(String, Vector)>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let OrderedMap(pairs) = serde_json::from_slice::<OrderedMap<Vector>>(&bytes)?;
        if let Some((id, vector)) = pairs
            .iter()
            .find(|(_, v)| v.dimension() != self.dimension)
        {
            return Err(Error::CorruptStore {
                path: self.path.clone(),
                reason: format!(
                    "vector for '{id}' has {} components, expected {}",
                    vector.dimension(),
                    self.dimension
                ),
            });
        }
        if let Some((id, component)) = pairs
            .iter()
            .find_map(|(id, v)| non_finite(v).map(|c| (id, c)))
        {
            return Err(Error::CorruptStore {
                path: self.path.clone(),
                reason: format!("vector for '{id}' has a non-finite component at {component}"),
            });
        }
        Ok(pairs)
    }

    /// Atomically replace the store with `entries`, in order.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] on a wrong-length vector.
    pub fn write<'a, I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a Vector)>,
    {
        let entries: Vec<(&str, &Vector)> = entries.into_iter().collect();
        if let Some((_, vector)) = entries
            .iter()
            .find(|(_, v)| v.dimension() != self.dimension)
        {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.dimension(),
            });
        }
        write_atomic(&self.path, &to_json_object(entries)?)
    }

    /// Merge-on-load: read the existing map, overwrite or add `entries`,
    /// and write the whole file back.
    ///
    /// # Errors
    /// Propagates read, dimension, and write errors.
    pub fn merge<'a, I>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a Vector)>,
    {
        let incoming = entries
            .into_iter()
            .map(|(id, vector)| (id.to_string(), vector.clone()));
        let merged = merge_by_key(self.read()?, incoming);
        self.write(merged.iter().map(|(id, v)| (id.as_str(), v)))?;
        Ok(merged.len())
    }
}
