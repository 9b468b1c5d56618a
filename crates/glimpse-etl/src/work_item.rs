use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use treadle::WorkItem;
use uuid::Uuid;

use glimpse_core::model::StoreLayout;

use crate::config::Config;

/// One ingestion target: a catalog file feeding a dataset store.
///
/// This is the treadle `WorkItem` handed to the ingest workflow. The id is
/// derived from the catalog path, layout and data directory, so repeated
/// runs over the same target share one row in the state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogJob {
    id: String,
    /// Catalog being ingested.
    pub catalog_path: PathBuf,
    /// Layout of the target store.
    pub layout: StoreLayout,
    /// Directory of the target store.
    pub data_dir: PathBuf,
}

impl CatalogJob {
    #[must_use]
    pub fn new(catalog_path: PathBuf, layout: StoreLayout, data_dir: PathBuf) -> Self {
        let key = format!("{}|{layout}|{}", catalog_path.display(), data_dir.display());
        let id = format!("ingest-{}", Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()));
        Self {
            id,
            catalog_path,
            layout,
            data_dir,
        }
    }

    /// The job for the catalog and store named by `config`.
    #[must_use]
    pub fn for_config(config: &Config) -> Self {
        Self::new(config.catalog_path.clone(), config.layout, config.data_dir.clone())
    }
}

impl WorkItem for CatalogJob {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CatalogJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.catalog_path.display(),
            self.data_dir.display(),
            self.layout
        )
    }
}
