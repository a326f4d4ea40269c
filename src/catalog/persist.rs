//! Catalog file
//!
//! `catalog.json` holds every table record plus the next table id. It is
//! replaced atomically: write a temp file, fsync, rename over the old one.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

use super::TableDescriptor;

/// Current catalog file format version
pub(crate) const CATALOG_VERSION: u32 = 1;

/// On-disk form of the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CatalogFile {
    pub version: u32,
    /// Id handed to the next created table; ids are never reused
    pub next_table_id: u64,
    pub tables: BTreeMap<String, TableDescriptor>,
}

impl Default for CatalogFile {
    fn default() -> Self {
        Self {
            version: CATALOG_VERSION,
            next_table_id: 1,
            tables: BTreeMap::new(),
        }
    }
}

impl CatalogFile {
    /// Load the catalog, or an empty one if the file does not exist yet
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&content)?;
        if file.version != CATALOG_VERSION {
            return Err(StoreError::Serialization(format!(
                "unsupported catalog version {}",
                file.version
            )));
        }
        Ok(file)
    }

    /// Replace the file at `path` with this catalog
    pub fn store(&self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;

        let mut file = File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        if let Some(dir) = path.parent() {
            if let Ok(handle) = File::open(dir) {
                let _ = handle.sync_all();
            }
        }
        Ok(())
    }
}
