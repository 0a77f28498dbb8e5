//! Pure rendering of snapshots into panel content.
//!
//! Nothing in here touches the network or the disk, so every panel can be
//! checked against golden output.

use serde::Serialize;

use crate::models::{District, Gauge, PanelScope, StateSnapshot, MAX_GAUGE, MAX_NOTE_CHARS};

/// Glyph for a filled gauge cell.
pub const FILLED_GLYPH: char = '■';
/// Glyph for an empty gauge cell.
pub const EMPTY_GLYPH: char = '□';

/// Embed colour of the global panel (gold).
pub const GLOBAL_COLOUR: u32 = 0xF1_C4_0F;
/// Embed colour of district panels (blurple).
pub const DISTRICT_COLOUR: u32 = 0x58_65_F2;

const GLOBAL_TITLE: &str = "État des quartiers de Boralus";
const GLOBAL_DESCRIPTION: &str = "Panneau général des jauges du Comptoir.";
const GLOBAL_FOOTER: &str = "Utilisez /comptoir pour mettre à jour les jauges.";
const DISTRICT_FOOTER: &str = "Mise à jour via /comptoir.";

/// Render a gauge as a fixed-width bar followed by `value/max`.
///
/// `value` is clamped to `[0, max]` first, so out-of-range input saturates.
///
/// # Examples
///
/// ```
/// use comptoir_core::render::render_gauge;
///
/// assert_eq!(render_gauge(3, 5), "■■■□□ 3/5");
/// assert_eq!(render_gauge(-3, 5), "□□□□□ 0/5");
/// assert_eq!(render_gauge(9, 5), "■■■■■ 5/5");
/// ```
pub fn render_gauge(value: i64, max: u8) -> String {
    let value = value.clamp(0, i64::from(max)) as usize;
    let max = usize::from(max);

    let mut bar: String = std::iter::repeat_n(FILLED_GLYPH, value).collect();
    bar.extend(std::iter::repeat_n(EMPTY_GLYPH, max - value));
    format!("{bar} {value}/{max}")
}

/// Cut a note to [`MAX_NOTE_CHARS`]. Updates are validated against the same
/// limit, but a hand-edited snapshot file is not.
fn clip_note(note: &str) -> String {
    match note.char_indices().nth(MAX_NOTE_CHARS) {
        Some((byte_idx, _)) => {
            let mut cut: String = note[..byte_idx].chars().take(MAX_NOTE_CHARS - 1).collect();
            cut.push('…');
            cut
        }
        None => note.to_string(),
    }
}

/// One named block of a panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl PanelField {
    fn block(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: false,
        }
    }
}

/// Structured content of one panel, independent of any transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelContent {
    pub title: String,
    pub description: Option<String>,
    pub colour: u32,
    pub fields: Vec<PanelField>,
    pub footer: Option<String>,
}

impl PanelContent {
    /// Plain-text rendition used by the `show` command and in logs.
    pub fn to_text(&self) -> String {
        let mut out = format!("== {} ==\n", self.title);
        if let Some(description) = &self.description {
            out.push_str(description);
            out.push('\n');
        }
        for field in &self.fields {
            out.push('\n');
            out.push_str(&field.name);
            out.push('\n');
            out.push_str(field.value.trim_end());
            out.push('\n');
        }
        if let Some(footer) = &self.footer {
            out.push('\n');
            out.push_str(footer);
            out.push('\n');
        }
        out
    }
}

/// Title of a scope's panel. Also the marker used to recognise a panel in
/// channel history after a restart.
pub fn panel_title(scope: PanelScope) -> String {
    match scope {
        PanelScope::Global => GLOBAL_TITLE.to_string(),
        PanelScope::District(district) => format!("Quartier : {}", district.label()),
    }
}

/// Build the panel for `scope` from `snapshot`.
pub fn render_panel(scope: PanelScope, snapshot: &StateSnapshot) -> PanelContent {
    match scope {
        PanelScope::Global => render_global(snapshot),
        PanelScope::District(district) => render_district(district, snapshot),
    }
}

fn render_global(snapshot: &StateSnapshot) -> PanelContent {
    let fields = snapshot
        .iter()
        .map(|(district, state)| {
            let mut text: String = Gauge::ALL
                .into_iter()
                .map(|gauge| {
                    format!(
                        "**{} :** {}\n",
                        gauge.label(),
                        render_gauge(i64::from(state.gauge(gauge)), MAX_GAUGE)
                    )
                })
                .collect();
            if let Some(note) = &state.note {
                text.push_str(&format!("**Note :** {}\n", clip_note(note)));
            }
            PanelField::block(district.label(), text)
        })
        .collect();

    PanelContent {
        title: panel_title(PanelScope::Global),
        description: Some(GLOBAL_DESCRIPTION.to_string()),
        colour: GLOBAL_COLOUR,
        fields,
        footer: Some(GLOBAL_FOOTER.to_string()),
    }
}

fn render_district(district: District, snapshot: &StateSnapshot) -> PanelContent {
    let state = snapshot.district(district);
    let mut fields: Vec<PanelField> = Gauge::ALL
        .into_iter()
        .map(|gauge| {
            PanelField::block(
                gauge.label(),
                render_gauge(i64::from(state.gauge(gauge)), MAX_GAUGE),
            )
        })
        .collect();
    if let Some(note) = &state.note {
        fields.push(PanelField::block("Note", clip_note(note)));
    }

    PanelContent {
        title: panel_title(PanelScope::District(district)),
        description: None,
        colour: DISTRICT_COLOUR,
        fields,
        footer: Some(DISTRICT_FOOTER.to_string()),
    }
}

/// Confirmation text returned to whoever requested an update.
pub fn render_acknowledgement(district: District, gauge: Gauge, value: u8) -> String {
    format!(
        "✨ **Jauge mise à jour !**\nQuartier **{}** – **{}** → {}",
        district.label(),
        gauge.label(),
        render_gauge(i64::from(value), MAX_GAUGE)
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
