use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ComptoirError;

/// Upper bound of every gauge. Values live in `[0, MAX_GAUGE]`.
pub const MAX_GAUGE: u8 = 5;

/// Longest note accepted from an update, in characters. Six of these still
/// fit the global panel inside Discord's 6000-character embed limit.
pub const MAX_NOTE_CHARS: usize = 500;

// ── District ──────────────────────────────────────────────────────────────────

/// The districts tracked by the comptoir, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum District {
    Mehumide,
    PointeDuCrochet,
    VoieDuMarin,
    HautQuartier,
    MarcheDesAlizees,
    PortPrincipal,
}

impl District {
    /// Every district, in display order.
    pub const ALL: [District; 6] = [
        District::Mehumide,
        District::PointeDuCrochet,
        District::VoieDuMarin,
        District::HautQuartier,
        District::MarcheDesAlizees,
        District::PortPrincipal,
    ];

    /// Display label. Also the stable id used as key in the snapshot file.
    pub fn label(self) -> &'static str {
        match self {
            District::Mehumide => "Méhumide",
            District::PointeDuCrochet => "Pointe du Crochet",
            District::VoieDuMarin => "Voie du Marin",
            District::HautQuartier => "Haut quartier",
            District::MarcheDesAlizees => "Marché des Alizées",
            District::PortPrincipal => "Port principal",
        }
    }

    /// ASCII kebab-case spelling accepted on the command line.
    pub fn slug(self) -> &'static str {
        match self {
            District::Mehumide => "mehumide",
            District::PointeDuCrochet => "pointe-du-crochet",
            District::VoieDuMarin => "voie-du-marin",
            District::HautQuartier => "haut-quartier",
            District::MarcheDesAlizees => "marche-des-alizees",
            District::PortPrincipal => "port-principal",
        }
    }

    /// Position of the district in [`District::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for District {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for District {
    type Err = ComptoirError;

    /// Accepts the label (case-insensitive) or the slug.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        District::ALL
            .into_iter()
            .find(|d| d.label().to_lowercase() == wanted || d.slug() == wanted)
            .ok_or_else(|| ComptoirError::UnknownDistrict(s.to_string()))
    }
}

// ── Gauge ─────────────────────────────────────────────────────────────────────

/// The recognised gauges of a district, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gauge {
    Humeur,
    Tension,
    Activite,
    Menaces,
}

/// Number of recognised gauges.
pub const GAUGE_COUNT: usize = 4;

impl Gauge {
    /// Every gauge, in display order.
    pub const ALL: [Gauge; GAUGE_COUNT] =
        [Gauge::Humeur, Gauge::Tension, Gauge::Activite, Gauge::Menaces];

    /// Display label, also the key used in the snapshot file.
    pub fn label(self) -> &'static str {
        match self {
            Gauge::Humeur => "Humeur",
            Gauge::Tension => "Tension",
            Gauge::Activite => "Activité",
            Gauge::Menaces => "Menaces",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Gauge::Humeur => "humeur",
            Gauge::Tension => "tension",
            Gauge::Activite => "activite",
            Gauge::Menaces => "menaces",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gauge {
    type Err = ComptoirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Gauge::ALL
            .into_iter()
            .find(|g| g.label().to_lowercase() == wanted || g.slug() == wanted)
            .ok_or_else(|| ComptoirError::UnknownGauge(s.to_string()))
    }
}

/// Check that `value` is a legal gauge value.
pub fn validate_gauge_value(value: i64) -> Result<u8, ComptoirError> {
    u8::try_from(value)
        .ok()
        .filter(|v| *v <= MAX_GAUGE)
        .ok_or(ComptoirError::ValueOutOfRange {
            value,
            max: MAX_GAUGE,
        })
}

/// Check that an update's note fits in a panel. Length is counted after
/// trimming, the way the note is stored.
pub fn validate_note(note: &str) -> Result<(), ComptoirError> {
    let len = note.trim().chars().count();
    if len > MAX_NOTE_CHARS {
        return Err(ComptoirError::NoteTooLong {
            len,
            max: MAX_NOTE_CHARS,
        });
    }
    Ok(())
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Gauges and note of one district.
///
/// Every recognised gauge always has a slot, so a complete schema is a
/// property of the type rather than something to check at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistrictState {
    /// Gauge values indexed by [`Gauge::index`].
    pub gauges: [u8; GAUGE_COUNT],
    /// Free-text event note, last write wins.
    pub note: Option<String>,
    /// Keys found on disk that are not recognised gauges. Kept verbatim.
    pub legacy: BTreeMap<String, Value>,
}

impl DistrictState {
    pub fn gauge(&self, gauge: Gauge) -> u8 {
        self.gauges[gauge.index()]
    }
}

/// Complete state of every district.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    districts: [DistrictState; 6],
    /// Top-level entries of the snapshot file that name no known district.
    pub legacy_districts: BTreeMap<String, Value>,
}

impl StateSnapshot {
    /// All gauges at zero, no notes.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn district(&self, district: District) -> &DistrictState {
        &self.districts[district.index()]
    }

    pub fn district_mut(&mut self, district: District) -> &mut DistrictState {
        &mut self.districts[district.index()]
    }

    pub fn gauge(&self, district: District, gauge: Gauge) -> u8 {
        self.district(district).gauge(gauge)
    }

    /// Set one gauge, saturating at [`MAX_GAUGE`].
    pub fn set_gauge(&mut self, district: District, gauge: Gauge, value: u8) {
        self.district_mut(district).gauges[gauge.index()] = value.min(MAX_GAUGE);
    }

    pub fn note(&self, district: District) -> Option<&str> {
        self.district(district).note.as_deref()
    }

    /// Overwrite the note. A blank note clears it.
    pub fn set_note(&mut self, district: District, note: Option<String>) {
        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.district_mut(district).note = note;
    }

    /// Districts and their state, in display order.
    pub fn iter(&self) -> impl Iterator<Item = (District, &DistrictState)> {
        District::ALL
            .into_iter()
            .map(move |d| (d, &self.districts[d.index()]))
    }
}

// ── Platform identifiers ──────────────────────────────────────────────────────

/// Identifier of a channel on the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

/// Identifier of a message on the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        ChannelId(s.to_string())
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(s.to_string())
    }
}

// ── Panels ────────────────────────────────────────────────────────────────────

/// What a panel shows: the global overview or a single district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PanelScope {
    Global,
    District(District),
}

impl PanelScope {
    /// Every scope: the global panel first, then each district.
    pub fn all() -> Vec<PanelScope> {
        std::iter::once(PanelScope::Global)
            .chain(District::ALL.into_iter().map(PanelScope::District))
            .collect()
    }

    /// Key used for this scope in the channel and registry files.
    pub fn key(self) -> &'static str {
        match self {
            PanelScope::Global => "global",
            PanelScope::District(d) => d.label(),
        }
    }

    /// Inverse of [`PanelScope::key`]; district slugs are accepted too.
    pub fn from_key(key: &str) -> Option<PanelScope> {
        if key.eq_ignore_ascii_case("global") {
            return Some(PanelScope::Global);
        }
        key.parse::<District>().ok().map(PanelScope::District)
    }
}

impl fmt::Display for PanelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Last known location of a scope's panel.
///
/// `message_id == None` means the panel has not been materialised yet; a
/// `Some` id may point at a message that was deleted on the platform since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRef {
    pub channel_id: ChannelId,
    pub message_id: Option<MessageId>,
}

impl PanelRef {
    pub fn empty(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            message_id: None,
        }
    }

    pub fn is_materialised(&self) -> bool {
        self.message_id.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_district_parse_label_and_slug() {
        assert_eq!(
            "Haut quartier".parse::<District>().unwrap(),
            District::HautQuartier
        );
        assert_eq!(
            "haut-quartier".parse::<District>().unwrap(),
            District::HautQuartier
        );
        assert_eq!(
            "MARCHÉ DES ALIZÉES".parse::<District>().unwrap(),
            District::MarcheDesAlizees
        );
        assert!("Quartier fantôme".parse::<District>().is_err());
    }

    #[test]
    fn test_gauge_parse() {
        assert_eq!("Activité".parse::<Gauge>().unwrap(), Gauge::Activite);
        assert_eq!("activite".parse::<Gauge>().unwrap(), Gauge::Activite);
        assert_eq!("tension".parse::<Gauge>().unwrap(), Gauge::Tension);
        let err = "Moral".parse::<Gauge>().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_gauge_value_bounds() {
        assert_eq!(validate_gauge_value(0).unwrap(), 0);
        assert_eq!(validate_gauge_value(5).unwrap(), 5);
        assert!(validate_gauge_value(-1).is_err());
        assert!(validate_gauge_value(6).is_err());
        assert!(validate_gauge_value(256).is_err());
    }

    #[test]
    fn test_validate_note_length() {
        assert!(validate_note("Brume épaisse").is_ok());
        assert!(validate_note(&"é".repeat(MAX_NOTE_CHARS)).is_ok());
        // Surrounding whitespace is trimmed before storage, so it does not count.
        assert!(validate_note(&format!("  {}  ", "a".repeat(MAX_NOTE_CHARS))).is_ok());

        let err = validate_note(&"a".repeat(MAX_NOTE_CHARS + 1)).unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(err, ComptoirError::NoteTooLong { len: 501, max: 500 }));
    }

    #[test]
    fn test_default_snapshot_is_zeroed() {
        let snap = StateSnapshot::new();
        for (district, state) in snap.iter() {
            assert!(state.note.is_none(), "{district} has a note");
            for gauge in Gauge::ALL {
                assert_eq!(snap.gauge(district, gauge), 0);
            }
        }
    }

    #[test]
    fn test_set_gauge_touches_single_pair() {
        let mut snap = StateSnapshot::new();
        snap.set_gauge(District::HautQuartier, Gauge::Tension, 3);

        for (district, _) in snap.iter() {
            for gauge in Gauge::ALL {
                let expected = if district == District::HautQuartier && gauge == Gauge::Tension {
                    3
                } else {
                    0
                };
                assert_eq!(snap.gauge(district, gauge), expected);
            }
        }
    }

    #[test]
    fn test_set_gauge_saturates() {
        let mut snap = StateSnapshot::new();
        snap.set_gauge(District::Mehumide, Gauge::Menaces, 200);
        assert_eq!(snap.gauge(District::Mehumide, Gauge::Menaces), MAX_GAUGE);
    }

    #[test]
    fn test_set_note_blank_clears() {
        let mut snap = StateSnapshot::new();
        snap.set_note(District::VoieDuMarin, Some("Rixe au port".to_string()));
        assert_eq!(snap.note(District::VoieDuMarin), Some("Rixe au port"));

        snap.set_note(District::VoieDuMarin, Some("   ".to_string()));
        assert_eq!(snap.note(District::VoieDuMarin), None);
    }

    #[test]
    fn test_panel_scope_keys_round_trip() {
        for scope in PanelScope::all() {
            assert_eq!(PanelScope::from_key(scope.key()), Some(scope));
        }
        assert_eq!(
            PanelScope::from_key("port-principal"),
            Some(PanelScope::District(District::PortPrincipal))
        );
        assert_eq!(PanelScope::from_key("nowhere"), None);
    }

    #[test]
    fn test_panel_scope_all_global_first() {
        let scopes = PanelScope::all();
        assert_eq!(scopes.len(), 7);
        assert_eq!(scopes[0], PanelScope::Global);
    }

    #[test]
    fn test_panel_ref_empty() {
        let panel = PanelRef::empty(ChannelId::from("42"));
        assert!(!panel.is_materialised());
        assert_eq!(panel.channel_id.to_string(), "42");
    }
}
