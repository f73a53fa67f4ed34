//! Durable key/value persistence for session cookies.
//!
//! The store keeps one JSON file mapping host -> set of `"name=value"`
//! strings. Every save fully replaces the prior contents; there is no
//! partial merge. A missing or unreadable file is treated as an empty
//! table so the application never fails to start over corrupt state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Cookie store file name in the data directory
const STORE_FILE: &str = "cookies.json";

/// Host -> set of `"name=value"` entries as persisted on disk.
pub type StoredCookies = BTreeMap<String, BTreeSet<String>>;

pub struct CredentialStore {
    data_dir: PathBuf,
}

impl CredentialStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Persist the full cookie table, replacing any prior contents.
    pub fn save(&self, entries: &StoredCookies) -> Result<()> {
        let path = self.store_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create cookie store directory")?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&path, contents).context("Failed to write cookie store")?;
        Ok(())
    }

    /// Load all persisted entries.
    ///
    /// Never fails: a missing file yields an empty table, and an unreadable
    /// or unparseable file is logged and discarded.
    pub fn load_all(&self) -> StoredCookies {
        let path = self.store_path();
        if !path.exists() {
            return StoredCookies::new();
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to read cookie store, starting empty");
                return StoredCookies::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Cookie store is corrupt, starting empty");
                StoredCookies::new()
            }
        }
    }

    /// Remove the persisted table entirely (a subsequent load is empty).
    pub fn clear(&self) -> Result<()> {
        let path = self.store_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove cookie store")?;
        }
        Ok(())
    }

    fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }
}
