use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

/// Width of an average glyph relative to the font size when no font resolves.
const FALLBACK_CHAR_RATIO: f32 = 0.56;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Advance width of `text` in pixels. Falls back to a per-character estimate
/// when no system font matches (always the case under wasm).
pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> f32 {
    if text.is_empty() || font_size <= 0.0 {
        return 0.0;
    }
    TEXT_MEASURER
        .lock()
        .ok()
        .and_then(|mut measurer| measurer.measure(text, font_size, font_family))
        .unwrap_or_else(|| estimate_width(text, font_size))
}

pub fn estimate_width(text: &str, font_size: f32) -> f32 {
    text.chars().filter(|ch| *ch != '\n').count() as f32 * font_size * FALLBACK_CHAR_RATIO
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<FaceMetrics>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let key = normalize_family_key(font_family);
        if !self.faces.contains_key(&key) {
            let metrics = self.load(font_family);
            if metrics.is_none() {
                tracing::debug!(family = %key, "no font face found, estimating text widths");
            }
            self.faces.insert(key.clone(), metrics);
        }
        let metrics = self.faces.get(&key)?.as_ref()?;
        Some(metrics.width(text, font_size))
    }

    fn load(&mut self, font_family: &str) -> Option<FaceMetrics> {
        let names: Vec<&str> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\''))
            .filter(|part| !part.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .copied()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "monospace" | "ui-monospace" => Family::Monospace,
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => Family::SansSerif,
                _ => Family::Name(name),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let id = self.db.query(&Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        })?;
        self.db
            .with_face_data(id, |data, index| {
                Face::parse(data, index).ok().map(|face| FaceMetrics::from_face(&face))
            })
            .flatten()
    }
}

/// Advances of the printable ASCII range, which covers column and table names.
struct FaceMetrics {
    units_per_em: f32,
    ascii_advances: [u16; 128],
    average_advance: f32,
}

impl FaceMetrics {
    fn from_face(face: &Face<'_>) -> Self {
        let mut ascii_advances = [0u16; 128];
        let mut total = 0u32;
        let mut counted = 0u32;
        for byte in 0u8..=127 {
            let Some(glyph) = face.glyph_index(byte as char) else {
                continue;
            };
            let advance = face.glyph_hor_advance(glyph).unwrap_or(0);
            ascii_advances[byte as usize] = advance;
            if byte.is_ascii_alphanumeric() && advance > 0 {
                total += advance as u32;
                counted += 1;
            }
        }
        let units_per_em = face.units_per_em().max(1) as f32;
        let average_advance = if counted == 0 {
            units_per_em * FALLBACK_CHAR_RATIO
        } else {
            total as f32 / counted as f32
        };
        Self {
            units_per_em,
            ascii_advances,
            average_advance,
        }
    }

    fn width(&self, text: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em;
        text.chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| {
                let advance = if ch.is_ascii() {
                    self.ascii_advances[ch as usize]
                } else {
                    0
                };
                if advance == 0 {
                    self.average_advance * scale
                } else {
                    advance as f32 * scale
                }
            })
            .sum()
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}
