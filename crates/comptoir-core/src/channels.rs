//! Explicit scope → channel mapping.
//!
//! Loaded once at startup from `channels.json`:
//!
//! ```json
//! {
//!   "global": "1180000000000000001",
//!   "districts": {
//!     "Méhumide": "1180000000000000002",
//!     "haut-quartier": "1180000000000000005"
//!   }
//! }
//! ```
//!
//! District keys may be labels or slugs. Every scope must be mapped.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ComptoirError, Result};
use crate::models::{ChannelId, District, PanelScope};

/// Raw on-disk shape of the channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub global: Option<String>,
    #[serde(default)]
    pub districts: BTreeMap<String, String>,
}

/// Validated mapping from every [`PanelScope`] to its channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    channels: BTreeMap<PanelScope, ChannelId>,
}

impl ChannelMap {
    /// Read and validate the channel file at `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ComptoirError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ChannelConfig = serde_json::from_str(&content)?;
        let map = Self::resolve(&config)?;
        tracing::debug!(path = %path.display(), scopes = map.channels.len(), "channel map loaded");
        Ok(map)
    }

    /// Validate `config`: every scope mapped exactly once to a numeric id, no
    /// unknown district keys.
    pub fn resolve(config: &ChannelConfig) -> Result<Self> {
        let mut channels = BTreeMap::new();

        let global = config
            .global
            .as_deref()
            .ok_or_else(|| ComptoirError::Config("no channel configured for global".into()))?;
        channels.insert(PanelScope::Global, parse_channel_id("global", global)?);

        for (key, id) in &config.districts {
            let district: District = key
                .parse()
                .map_err(|_| ComptoirError::Config(format!("unknown district in channel map: {key}")))?;
            let scope = PanelScope::District(district);
            if channels.insert(scope, parse_channel_id(key, id)?).is_some() {
                return Err(ComptoirError::Config(format!(
                    "district {district} mapped more than once"
                )));
            }
        }

        let missing: Vec<&str> = District::ALL
            .into_iter()
            .filter(|d| !channels.contains_key(&PanelScope::District(*d)))
            .map(District::label)
            .collect();
        if !missing.is_empty() {
            return Err(ComptoirError::Config(format!(
                "no channel configured for: {}",
                missing.join(", ")
            )));
        }

        Ok(Self { channels })
    }

    pub fn get(&self, scope: PanelScope) -> Option<&ChannelId> {
        self.channels.get(&scope)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PanelScope, &ChannelId)> {
        self.channels.iter().map(|(scope, id)| (*scope, id))
    }

    /// Build a map from explicit pairs without completeness checks.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (PanelScope, ChannelId)>) -> Self {
        Self {
            channels: pairs.into_iter().collect(),
        }
    }
}

fn parse_channel_id(key: &str, raw: &str) -> Result<ChannelId> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(ComptoirError::Config(format!(
            "channel id for {key} must be numeric, got {raw:?}"
        )));
    }
    Ok(ChannelId(raw.to_string()))
}
