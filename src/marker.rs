use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::MarkerConfig;
use crate::geometry::PathGeometry;
use crate::model::{Connection, MarkerKind};
use crate::render::escape_xml;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub color: String,
    pub label: String,
}

impl LegendEntry {
    pub fn new(color: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            color: color.into(),
            label: label.into(),
        }
    }
}

/// Marker kind to color/label mapping supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Legend {
    entries: BTreeMap<MarkerKind, LegendEntry>,
}

impl Legend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relationship legend used when no legend is configured.
    pub fn relational() -> Self {
        Self::new()
            .with(MarkerKind::Triangle, LegendEntry::new("#4A90E2", "One to one"))
            .with(MarkerKind::Rectangle, LegendEntry::new("#7B61FF", "One to many"))
            .with(MarkerKind::Circle, LegendEntry::new("#2BB673", "Many to many"))
            .with(MarkerKind::Hexagon, LegendEntry::new("#F5A623", "Enum reference"))
    }

    pub fn with(mut self, kind: MarkerKind, entry: LegendEntry) -> Self {
        self.insert(kind, entry);
        self
    }

    pub fn insert(&mut self, kind: MarkerKind, entry: LegendEntry) {
        self.entries.insert(kind, entry);
    }

    pub fn get(&self, kind: MarkerKind) -> Option<&LegendEntry> {
        self.entries.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MarkerKind, &LegendEntry)> {
        self.entries.iter().map(|(kind, entry)| (*kind, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The four fixed marker glyphs. Each is drawn in a 26×18 box whose origin
/// sits on the box's left edge at half height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Glyph {
    Triangle,
    Rectangle,
    Circle,
    Hexagon,
}

impl Glyph {
    pub fn for_marker(kind: MarkerKind) -> Option<Self> {
        match kind {
            MarkerKind::Triangle => Some(Self::Triangle),
            MarkerKind::Rectangle => Some(Self::Rectangle),
            MarkerKind::Circle => Some(Self::Circle),
            MarkerKind::Hexagon => Some(Self::Hexagon),
            MarkerKind::Unknown => None,
        }
    }

    pub fn svg(self, color: &str) -> String {
        let color = escape_xml(color);
        match self {
            Self::Triangle => triangle_svg(&color),
            Self::Rectangle => rectangle_svg(&color),
            Self::Circle => circle_svg(&color),
            Self::Hexagon => hexagon_svg(&color),
        }
    }
}

fn triangle_svg(color: &str) -> String {
    format!("<polygon points=\"13,-9 25,9 1,9\" fill=\"{color}\" stroke=\"{color}\" stroke-width=\"1\"/>")
}

fn rectangle_svg(color: &str) -> String {
    format!(
        "<rect x=\"3\" y=\"-8\" width=\"20\" height=\"16\" rx=\"2\" ry=\"2\" fill=\"{color}\" stroke=\"{color}\" stroke-width=\"1\"/>"
    )
}

fn circle_svg(color: &str) -> String {
    format!("<circle cx=\"13\" cy=\"0\" r=\"9\" fill=\"{color}\" stroke=\"{color}\" stroke-width=\"1\"/>")
}

fn hexagon_svg(color: &str) -> String {
    format!(
        "<polygon points=\"22,0 17.5,7.79 8.5,7.79 4,0 8.5,-7.79 17.5,-7.79\" fill=\"{color}\" stroke=\"{color}\" stroke-width=\"1\"/>"
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMarker {
    pub kind: MarkerKind,
    pub glyph: Glyph,
    pub color: String,
    /// Origin of the glyph group.
    pub x: f32,
    pub y: f32,
}

impl ResolvedMarker {
    pub fn svg(&self) -> String {
        format!(
            "<g transform=\"translate({:.2}, {:.2})\">{}</g>",
            self.x,
            self.y,
            self.glyph.svg(&self.color)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelPlacement {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
}

/// Picks the glyph and color for a connection's marker. Connections without
/// a drawable path, without a marker or with an unknown kind yield nothing.
pub fn resolve_marker(
    connection: &Connection,
    path: &PathGeometry,
    legend: &Legend,
    config: &MarkerConfig,
) -> Option<ResolvedMarker> {
    if path.is_empty() {
        return None;
    }
    let kind = connection.marker?;
    let glyph = Glyph::for_marker(kind)?;
    let color = legend
        .get(kind)
        .map(|entry| entry.color.clone())
        .unwrap_or_else(|| config.fallback_color.clone());
    let (x, y) = glyph_origin(path, config);
    Some(ResolvedMarker {
        kind,
        glyph,
        color,
        x,
        y,
    })
}

pub fn resolve_label(
    connection: &Connection,
    path: &PathGeometry,
    config: &MarkerConfig,
) -> Option<LabelPlacement> {
    if path.is_empty() {
        return None;
    }
    let text = connection.label.as_deref().filter(|text| !text.is_empty())?;
    let (x, y) = glyph_origin(path, config);
    Some(LabelPlacement {
        text: text.to_string(),
        x: x + config.label_dx,
        y: y + config.label_dy,
        font_size: config.label_font_size,
    })
}

fn glyph_origin(path: &PathGeometry, config: &MarkerConfig) -> (f32, f32) {
    (path.mid_x + config.offset_x, path.mid_y)
}
