//! Work-item persistence as a JSON document

use crate::error::{Error, Result};
use crate::types::WorkItem;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// On-disk schema version
pub const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    items: Vec<WorkItem>,
}

/// JSON file holding every tracked work item
#[derive(Debug, Clone)]
pub struct WorkItemStore {
    path: PathBuf,
}

impl WorkItemStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{data_dir}/shiptrack/work_items.json`
    pub fn default_location() -> Result<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| Error::Config("no per-user data directory".to_string()))?;
        Ok(Self::new(base.join("shiptrack").join("work_items.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all items; a missing file is an empty list and an unknown
    /// schema version is skipped, never migrated
    pub fn load(&self) -> Result<Vec<WorkItem>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let file: StoreFile = serde_json::from_str(&text).map_err(|e| {
            Error::Config(format!("{} is not a work-item store: {}", self.path.display(), e))
        })?;
        if file.version != STORE_VERSION {
            warn!(
                path = %self.path.display(),
                found = file.version,
                expected = STORE_VERSION,
                "Ignoring work items with unknown schema version"
            );
            return Ok(Vec::new());
        }
        Ok(file.items)
    }

    /// Replace the file atomically (write to a sibling, then rename)
    pub fn save(&self, items: &[WorkItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&StoreFile {
            version: STORE_VERSION,
            items: items.to_vec(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
