//! Catalog source: streams [`CatalogRecord`]s out of a delimited file.
//!
//! The file must have a header row naming the id and URL columns. Rows that
//! are short, unparseable, blank in a required column, or repeat an id
//! already seen are skipped with a warning; the run goes on. An I/O error
//! while reading ends the stream and is kept on the reader, since the rest
//! of the catalog can no longer be seen.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use glimpse_core::model::CatalogRecord;
use serde::Deserialize;

use crate::error::{IngestError, IngestResult};

/// Column layout of a catalog file.
///
/// Defaults match the Unsplash Lite dataset (`photos.tsv000`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogFormat {
    pub delimiter: char,
    pub id_column: String,
    pub url_column: String,
    /// Honour `"` quoting. Off by default: TSV descriptions contain bare quotes.
    pub quoting: bool,
}

impl Default for CatalogFormat {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            id_column: "photo_id".to_string(),
            url_column: "photo_image_url".to_string(),
            quoting: false,
        }
    }
}

impl CatalogFormat {
    pub(crate) fn delimiter_byte(&self) -> IngestResult<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                IngestError::Config(format!(
                    "catalog delimiter {:?} must be a single ASCII character",
                    self.delimiter
                ))
            })
    }
}

/// Opens catalogs of one [`CatalogFormat`].
#[derive(Debug, Clone, Default)]
pub struct CatalogSource {
    format: CatalogFormat,
}

impl CatalogSource {
    #[must_use]
    pub fn new(format: CatalogFormat) -> Self {
        Self { format }
    }

    /// Open the catalog at `path` for streaming.
    ///
    /// # Errors
    /// Returns [`IngestError::CatalogRead`] if the file cannot be opened or
    /// its header lacks a required column.
    pub fn read(&self, path: &Path) -> IngestResult<CatalogReader<File>> {
        let file = File::open(path).map_err(|e| IngestError::CatalogRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.read_from(file, path)
    }

    /// Stream a catalog from any reader; `origin` is used in messages only.
    pub fn read_from<R: Read>(&self, reader: R, origin: &Path) -> IngestResult<CatalogReader<R>> {
        let catalog_err = |message: String| IngestError::CatalogRead {
            path: origin.to_path_buf(),
            message,
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.format.delimiter_byte()?)
            .quoting(self.format.quoting)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| catalog_err(format!("unreadable header: {e}")))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| catalog_err(format!("missing column '{name}'")))
        };
        let id_idx = column(&self.format.id_column)?;
        let url_idx = column(&self.format.url_column)?;

        log::debug!(
            "Catalog {}: id column {}, url column {}",
            origin.display(),
            id_idx,
            url_idx
        );

        Ok(CatalogReader {
            rows: csv_reader.into_records(),
            origin: origin.to_path_buf(),
            id_idx,
            url_idx,
            seen: HashSet::new(),
            skipped: 0,
            error: None,
        })
    }
}

/// Iterator over the valid records of one catalog.
pub struct CatalogReader<R> {
    rows: csv::StringRecordsIntoIter<R>,
    origin: PathBuf,
    id_idx: usize,
    url_idx: usize,
    seen: HashSet<String>,
    skipped: usize,
    error: Option<IngestError>,
}

impl<R> fmt::Debug for CatalogReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogReader")
            .field("origin", &self.origin)
            .field("id_idx", &self.id_idx)
            .field("url_idx", &self.url_idx)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}

impl<R> CatalogReader<R> {
    /// Rows skipped so far (malformed or duplicate).
    pub fn skipped_rows(&self) -> usize {
        self.skipped
    }

    /// The read error that ended the stream early, if any.
    pub fn take_error(&mut self) -> Option<IngestError> {
        self.error.take()
    }

    fn skip(&mut self, line: Option<u64>, reason: &str) {
        self.skipped += 1;
        log::warn!(
            "Skipping catalog row {} in {}: {}",
            line.map_or_else(|| "?".to_string(), |l| l.to_string()),
            self.origin.display(),
            reason
        );
    }
}

impl<R: Read> Iterator for CatalogReader<R> {
    type Item = CatalogRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.error.is_some() {
                return None;
            }
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                    log::error!("Reading {} failed: {}", self.origin.display(), e);
                    self.error = Some(IngestError::CatalogRead {
                        path: self.origin.clone(),
                        message: e.to_string(),
                    });
                    return None;
                }
                Err(e) => {
                    let line = e.position().map(|p| p.line());
                    self.skip(line, &e.to_string());
                    continue;
                }
            };
            let line = row.position().map(|p| p.line());

            let field = |idx: usize| row.get(idx).map(str::trim).filter(|s| !s.is_empty());
            let (Some(id), Some(url)) = (field(self.id_idx), field(self.url_idx)) else {
                self.skip(line, "missing id or url");
                continue;
            };

            if !self.seen.insert(id.to_string()) {
                let reason = format!("duplicate id '{id}'");
                self.skip(line, &reason);
                continue;
            }

            return Some(CatalogRecord::new(id, url));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "photo_id\tphoto_url\tphoto_image_url\tphoto_description\n";

    fn read_all(data: &str) -> (Vec<CatalogRecord>, usize) {
        let source = CatalogSource::default();
        let mut reader = source
            .read_from(data.as_bytes(), Path::new("photos.tsv"))
            .unwrap();
        let records: Vec<_> = reader.by_ref().collect();
        (records, reader.skipped_rows())
    }

    #[test]
    fn test_reads_unsplash_layout() {
        let data = format!(
            "{HEADER}aaa\thttps://unsplash.com/photos/aaa\thttps://images.unsplash.com/photo-aaa\ta \"quoted\" cat\n"
        );
        let (records, skipped) = read_all(&data);
        assert_eq!(
            records,
            vec![CatalogRecord::new(
                "aaa",
                "https://images.unsplash.com/photo-aaa"
            )]
        );
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_skips_malformed_rows() {
        let mut data = HEADER.to_string();
        for i in 0..10 {
            if i == 4 {
                data.push_str("broken-row-without-columns\n");
            } else {
                data.push_str(&format!("p{i}\tpage\thttps://img.example.com/p{i}\t\n"));
            }
        }

        let (records, skipped) = read_all(&data);
        assert_eq!(records.len(), 9);
        assert_eq!(skipped, 1);
        assert_eq!(records[4].id, "p5");
    }

    #[test]
    fn test_skips_blank_fields_and_duplicates() {
        let data = format!(
            "{HEADER}a\tpage\thttps://img.example.com/a\t\n\tpage\thttps://img.example.com/x\t\nb\tpage\t  \t\na\tpage\thttps://img.example.com/a2\t\n"
        );
        let (records, skipped) = read_all(&data);
        assert_eq!(records.len(), 1);
        assert_eq!(skipped, 3);
    }

    #[test]
    fn test_empty_catalog() {
        let (records, skipped) = read_all(HEADER);
        assert!(records.is_empty());
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let source = CatalogSource::default();
        let result = source.read_from("id\turl\n".as_bytes(), Path::new("photos.tsv"));
        assert!(matches!(result, Err(IngestError::CatalogRead { .. })));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let source = CatalogSource::default();
        let result = source.read(&temp_dir.path().join("nope.tsv"));
        assert!(matches!(result, Err(IngestError::CatalogRead { .. })));
    }

    /// Yields `data`, then fails every further read.
    struct FailingReader {
        data: std::io::Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(std::io::Error::other("input/output error")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_read_error_ends_stream_with_error() {
        let reader = FailingReader {
            data: std::io::Cursor::new(HEADER.as_bytes().to_vec()),
        };
        let mut catalog = CatalogSource::default()
            .read_from(reader, Path::new("photos.tsv"))
            .unwrap();

        assert_eq!(catalog.by_ref().count(), 0);
        assert_eq!(catalog.skipped_rows(), 0);
        assert!(matches!(
            catalog.take_error(),
            Some(IngestError::CatalogRead { .. })
        ));
        assert!(catalog.next().is_none());
    }

    #[test]
    fn test_debug_omits_csv_internals() {
        let reader = CatalogSource::default()
            .read_from(HEADER.as_bytes(), Path::new("photos.tsv"))
            .unwrap();
        let debug = format!("{reader:?}");
        assert!(debug.contains("photos.tsv"));
        assert!(debug.contains("skipped"));
    }

    #[test]
    fn test_custom_csv_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.csv");
        std::fs::write(&path, "url,id\nhttps://img.example.com/1,one\n").unwrap();

        let source = CatalogSource::new(CatalogFormat {
            delimiter: ',',
            id_column: "id".to_string(),
            url_column: "url".to_string(),
            quoting: true,
        });
        let records: Vec<_> = source.read(&path).unwrap().collect();
        assert_eq!(records, vec![CatalogRecord::new("one", "https://img.example.com/1")]);
    }
}
