//! Where block bounding boxes come from.
//!
//! The model never stores rendered geometry. The render adapter owns a side
//! table keyed by block key and the layout engine reads it through
//! [`MeasurementSource`].

use std::collections::HashMap;

use crate::config::BlockLayoutConfig;
use crate::geometry::Rect;
use crate::model::{Block, Rename};
use crate::text_metrics::measure_text_width;
use crate::theme::Theme;

pub trait MeasurementSource {
    /// Current box of the block stored under `key`, or `None` before first paint.
    fn measure(&self, key: &str, block: &Block) -> Option<Rect>;

    /// Blocks were re-keyed by a reconciliation.
    fn rekey(&mut self, _renames: &[Rename]) {}

    /// A block was dragged by `(dx, dy)`.
    fn translate(&mut self, _key: &str, _dx: f32, _dy: f32) {}

    /// A block was deleted.
    fn forget(&mut self, _key: &str) {}
}

/// Last measured rectangles reported by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureTable {
    rects: HashMap<String, Rect>,
}

impl MeasureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: impl Into<String>, rect: Rect) {
        self.rects.insert(key.into(), rect);
    }

    pub fn get(&self, key: &str) -> Option<&Rect> {
        self.rects.get(key)
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

impl FromIterator<(String, Rect)> for MeasureTable {
    fn from_iter<I: IntoIterator<Item = (String, Rect)>>(iter: I) -> Self {
        Self {
            rects: iter.into_iter().collect(),
        }
    }
}

impl MeasurementSource for MeasureTable {
    fn measure(&self, key: &str, _block: &Block) -> Option<Rect> {
        self.rects.get(key).copied()
    }

    fn rekey(&mut self, renames: &[Rename]) {
        // Take every moved entry out first so swapped keys do not clobber each other.
        let moved: Vec<(String, Rect)> = renames
            .iter()
            .filter_map(|rename| {
                self.rects
                    .remove(&rename.from)
                    .map(|rect| (rename.to.clone(), rect))
            })
            .collect();
        self.rects.extend(moved);
    }

    fn translate(&mut self, key: &str, dx: f32, dy: f32) {
        if let Some(rect) = self.rects.get_mut(key) {
            *rect = rect.translate(dx, dy);
        }
    }

    fn forget(&mut self, key: &str) {
        self.rects.remove(key);
    }
}

/// Headless stand-in for the DOM: derives a box from the block's position,
/// row count and text widths.
#[derive(Debug, Clone)]
pub struct EstimatedLayout {
    block: BlockLayoutConfig,
    font_family: String,
    font_size: f32,
}

impl EstimatedLayout {
    pub fn new(block: &BlockLayoutConfig, theme: &Theme) -> Self {
        Self {
            block: block.clone(),
            font_family: theme.font_family.clone(),
            font_size: theme.font_size,
        }
    }

    pub fn width(&self, block: &Block) -> f32 {
        let widest = std::iter::once(block.id.as_str())
            .chain(block.rows.iter().map(|row| row.id.as_str()))
            .map(|text| measure_text_width(text, self.font_size, &self.font_family))
            .fold(0.0f32, f32::max);
        (widest + self.block.padding_x * 2.0).clamp(self.block.min_width, self.block.max_width)
    }

    /// One band per row plus the half bands of header and footer.
    pub fn height(&self, block: &Block) -> f32 {
        (block.rows.len() + 1) as f32 * self.block.row_height
    }
}

impl MeasurementSource for EstimatedLayout {
    fn measure(&self, _key: &str, block: &Block) -> Option<Rect> {
        Some(Rect::new(
            block.position.left,
            block.position.top,
            self.width(block),
            self.height(block),
        ))
    }
}

/// Reads `primary` first and falls back to `fallback` for blocks it has not seen.
#[derive(Debug, Clone)]
pub struct Layered<P, F> {
    pub primary: P,
    pub fallback: F,
}

impl<P: MeasurementSource, F: MeasurementSource> MeasurementSource for Layered<P, F> {
    fn measure(&self, key: &str, block: &Block) -> Option<Rect> {
        self.primary
            .measure(key, block)
            .or_else(|| self.fallback.measure(key, block))
    }

    fn rekey(&mut self, renames: &[Rename]) {
        self.primary.rekey(renames);
        self.fallback.rekey(renames);
    }

    fn translate(&mut self, key: &str, dx: f32, dy: f32) {
        self.primary.translate(key, dx, dy);
        self.fallback.translate(key, dx, dy);
    }

    fn forget(&mut self, key: &str) {
        self.primary.forget(key);
        self.fallback.forget(key);
    }
}
