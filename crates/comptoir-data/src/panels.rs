//! Optional persistence of panel message ids.
//!
//! When configured, the registry writes `{ "<scope key>": "<message id>" }`
//! after every change so a restart does not depend on the history scan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use comptoir_core::error::Result;
use comptoir_core::models::{MessageId, PanelScope};
use tracing::warn;

use crate::store::write_atomic;

/// File-backed map of scope → last known panel message.
#[derive(Debug, Clone)]
pub struct PanelRefStore {
    path: PathBuf,
}

impl PanelRefStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored ids. A missing or unreadable file yields an empty map;
    /// unknown scope keys are dropped with a warning.
    pub fn load(&self) -> BTreeMap<PanelScope, MessageId> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return BTreeMap::new();
        };

        let raw: BTreeMap<String, String> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    error = %e,
                    path = %self.path.display(),
                    "failed to parse panel file; ignoring it"
                );
                return BTreeMap::new();
            }
        };

        raw.into_iter()
            .filter_map(|(key, id)| match PanelScope::from_key(&key) {
                Some(scope) => Some((scope, MessageId(id))),
                None => {
                    warn!(key = %key, path = %self.path.display(), "unknown scope in panel file");
                    None
                }
            })
            .collect()
    }

    /// Overwrite the file with `refs`.
    pub fn save(&self, refs: &BTreeMap<PanelScope, MessageId>) -> Result<()> {
        let raw: BTreeMap<&str, &str> = refs
            .iter()
            .map(|(scope, id)| (scope.key(), id.0.as_str()))
            .collect();
        let json = serde_json::to_string_pretty(&raw)?;
        write_atomic(&self.path, &json)
    }
}
