//! Snapshot persistence.
//!
//! The snapshot lives in a single pretty-printed JSON document:
//!
//! ```json
//! {
//!   "Haut quartier": { "Humeur": 0, "Tension": 3, "Activité": 0, "Menaces": 0, "note": "Grève" },
//!   ...
//! }
//! ```
//!
//! It is rewritten in full on every save. Loading never fails: a missing file
//! yields defaults, a malformed one is discarded and replaced by defaults.

use std::path::{Path, PathBuf};

use comptoir_core::error::{ComptoirError, Result};
use comptoir_core::models::{District, Gauge, StateSnapshot, MAX_GAUGE};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Key of the optional note inside a district object.
pub const NOTE_KEY: &str = "note";

// ── SchemaReport ──────────────────────────────────────────────────────────────

/// What schema completion had to do while reading a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// `district/gauge` pairs that were missing and inserted at zero.
    pub filled: Vec<String>,
    /// `district/gauge` pairs whose value was outside `[0, MAX]`.
    pub clamped: Vec<String>,
    /// Keys that are neither a known district, a known gauge nor the note.
    pub legacy_keys: Vec<String>,
}

impl SchemaReport {
    /// `true` when the document on disk differs from the completed snapshot.
    pub fn needs_rewrite(&self) -> bool {
        !self.filled.is_empty() || !self.clamped.is_empty()
    }

    fn log(&self, path: &Path) {
        if !self.filled.is_empty() {
            info!(path = %path.display(), keys = ?self.filled, "missing gauges initialised to 0");
        }
        if !self.clamped.is_empty() {
            warn!(path = %path.display(), keys = ?self.clamped, "out-of-range gauges clamped");
        }
        if !self.legacy_keys.is_empty() {
            warn!(
                path = %path.display(),
                keys = ?self.legacy_keys,
                "unrecognised keys in snapshot; kept as-is"
            );
        }
    }
}

// ── Document conversion ───────────────────────────────────────────────────────

/// Serialise `snapshot` into its on-disk document, legacy keys included.
pub fn snapshot_to_document(snapshot: &StateSnapshot) -> Value {
    let mut root: Map<String, Value> = snapshot
        .legacy_districts
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for (district, state) in snapshot.iter() {
        let mut entry: Map<String, Value> = state
            .legacy
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for gauge in Gauge::ALL {
            entry.insert(gauge.label().to_string(), Value::from(state.gauge(gauge)));
        }
        if let Some(note) = &state.note {
            entry.insert(NOTE_KEY.to_string(), Value::from(note.as_str()));
        }
        root.insert(district.label().to_string(), Value::Object(entry));
    }

    Value::Object(root)
}

/// Parse and complete a snapshot document.
///
/// Returns `Err(reason)` when the document has the wrong shape; the caller
/// treats that as corruption.
pub fn snapshot_from_document(
    doc: &Value,
) -> std::result::Result<(StateSnapshot, SchemaReport), String> {
    let root = doc
        .as_object()
        .ok_or_else(|| "expected an object at the top level".to_string())?;

    let mut snapshot = StateSnapshot::new();
    let mut report = SchemaReport::default();

    for (key, value) in root {
        let Some(district) = District::ALL.into_iter().find(|d| d.label() == key) else {
            report.legacy_keys.push(key.clone());
            snapshot.legacy_districts.insert(key.clone(), value.clone());
            continue;
        };

        let entry = value
            .as_object()
            .ok_or_else(|| format!("district {key} is not an object"))?;
        read_district(district, entry, &mut snapshot, &mut report)?;
    }

    Ok((snapshot, report))
}

fn read_district(
    district: District,
    entry: &Map<String, Value>,
    snapshot: &mut StateSnapshot,
    report: &mut SchemaReport,
) -> std::result::Result<(), String> {
    for gauge in Gauge::ALL {
        let pair = format!("{}/{}", district.label(), gauge.label());
        match entry.get(gauge.label()) {
            None => report.filled.push(pair),
            Some(raw) => {
                let value = raw
                    .as_i64()
                    .ok_or_else(|| format!("{pair} is not an integer: {raw}"))?;
                let clamped = u8::try_from(value.clamp(0, i64::from(MAX_GAUGE)))
                    .unwrap_or(MAX_GAUGE);
                if i64::from(clamped) != value {
                    report.clamped.push(pair);
                }
                snapshot.set_gauge(district, gauge, clamped);
            }
        }
    }

    match entry.get(NOTE_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::String(note)) => snapshot.set_note(district, Some(note.clone())),
        Some(other) => {
            return Err(format!(
                "note of {} is not a string: {other}",
                district.label()
            ))
        }
    }

    for (key, value) in entry {
        let known = key == NOTE_KEY || Gauge::ALL.iter().any(|g| g.label() == key);
        if !known {
            report
                .legacy_keys
                .push(format!("{}/{}", district.label(), key));
            snapshot
                .district_mut(district)
                .legacy
                .insert(key.clone(), value.clone());
        }
    }

    Ok(())
}

// ── StateStore ────────────────────────────────────────────────────────────────

/// Load/save of the snapshot file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return a complete snapshot.
    ///
    /// - No file: defaults, persisted immediately.
    /// - Malformed file: warning, defaults persisted over it.
    /// - Incomplete file: missing gauges filled with 0 and the completed
    ///   snapshot persisted.
    ///
    /// Persist failures are logged; the returned snapshot is valid regardless.
    pub fn load(&self) -> StateSnapshot {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no snapshot found; starting from defaults");
                return self.reset_to_defaults();
            }
            Err(e) => {
                return self.recover(ComptoirError::FileRead {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let parsed = serde_json::from_str::<Value>(&content)
            .map_err(|e| e.to_string())
            .and_then(|doc| snapshot_from_document(&doc));

        match parsed {
            Ok((snapshot, report)) => {
                report.log(&self.path);
                if report.needs_rewrite() {
                    self.save_logged(&snapshot);
                }
                debug!(path = %self.path.display(), "snapshot loaded");
                snapshot
            }
            Err(reason) => self.recover(ComptoirError::CorruptState {
                path: self.path.clone(),
                reason,
            }),
        }
    }

    /// Overwrite the snapshot file with `snapshot`.
    ///
    /// Writes to a sibling temp file then renames it into place, so a failed
    /// write never leaves a truncated snapshot behind.
    pub fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(&snapshot_to_document(snapshot))?;
        write_atomic(&self.path, &json)
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn recover(&self, error: ComptoirError) -> StateSnapshot {
        warn!(error = %error, "discarding unreadable snapshot; resetting to defaults");
        self.reset_to_defaults()
    }

    fn reset_to_defaults(&self) -> StateSnapshot {
        let snapshot = StateSnapshot::new();
        self.save_logged(&snapshot);
        snapshot
    }

    fn save_logged(&self, snapshot: &StateSnapshot) {
        if let Err(e) = self.save(snapshot) {
            warn!(error = %e, "failed to persist snapshot");
        }
    }
}

/// Write `content` to `path` through a temp file and a rename, creating
/// parent directories as needed.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let write_err = |source| ComptoirError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, content).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
