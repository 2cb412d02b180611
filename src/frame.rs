use serde::Serialize;

use crate::controller::{ContextMenu, EditorPanel};
use crate::geometry::{PathGeometry, Rect};
use crate::marker::{LabelPlacement, ResolvedMarker};
use crate::model::Block;

/// Snapshot of the canvas handed to a renderer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub blocks: Vec<BlockFrame>,
    pub connections: Vec<ConnectionFrame>,
    pub context_menu: ContextMenu,
    pub editor: EditorPanel,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockFrame {
    pub key: String,
    pub block: Block,
    /// `None` until the block has been measured.
    pub rect: Option<Rect>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionFrame {
    pub index: usize,
    pub from: String,
    pub to: String,
    pub path: PathGeometry,
    pub marker: Option<ResolvedMarker>,
    pub label: Option<LabelPlacement>,
}

impl Frame {
    /// Union of every measured block box, or `None` when nothing is measured.
    pub fn bounds(&self) -> Option<Rect> {
        let mut rects = self.blocks.iter().filter_map(|block| block.rect);
        let first = rects.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) =
            (first.x, first.y, first.right(), first.bottom());
        for rect in rects {
            min_x = min_x.min(rect.x);
            min_y = min_y.min(rect.y);
            max_x = max_x.max(rect.right());
            max_y = max_y.max(rect.bottom());
        }
        Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    pub fn block(&self, key: &str) -> Option<&BlockFrame> {
        self.blocks.iter().find(|block| block.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockType, Position};

    fn block_frame(key: &str, rect: Option<Rect>) -> BlockFrame {
        BlockFrame {
            key: key.to_string(),
            block: Block::new(key, BlockType::Table, Position::default()),
            rect,
        }
    }

    #[test]
    fn bounds_cover_measured_blocks_only() {
        let frame = Frame {
            blocks: vec![
                block_frame("a", Some(Rect::new(10.0, 20.0, 100.0, 50.0))),
                block_frame("b", None),
                block_frame("c", Some(Rect::new(-5.0, 100.0, 20.0, 20.0))),
            ],
            connections: Vec::new(),
            context_menu: ContextMenu::Closed,
            editor: EditorPanel::Closed,
        };
        assert_eq!(frame.bounds(), Some(Rect::new(-5.0, 20.0, 115.0, 100.0)));
        assert!(frame.block("b").unwrap().rect.is_none());
    }

    #[test]
    fn empty_frame_has_no_bounds() {
        let frame = Frame {
            blocks: vec![block_frame("a", None)],
            connections: Vec::new(),
            context_menu: ContextMenu::Closed,
            editor: EditorPanel::Closed,
        };
        assert_eq!(frame.bounds(), None);
    }
}
