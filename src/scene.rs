//! JSON5 scene files: a diagram plus optional measured boxes.
//!
//! ```json5
//! {
//!   blocks: [
//!     { key: "users", id: "users", type: "table", position: { top: 0, left: 0 },
//!       rows: [{ id: "id", data: { type: "PK" } }] },
//!   ],
//!   connections: [{ block1Id: "users", fromRow: 0, block2Id: "Role", toRow: 0, marker: "Hexagon" }],
//!   measured: { users: { x: 0, y: 0, width: 180, height: 104 } },
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::measure::MeasureTable;
use crate::model::{Block, Connection, Diagram};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub blocks: Vec<SceneBlock>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Host measured boxes by block key.
    #[serde(default)]
    pub measured: BTreeMap<String, Rect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneBlock {
    /// Storage key; defaults to the block id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub block: Block,
}

impl Scene {
    /// Builds the diagram, keeping block order. Connections are taken as
    /// written; dangling ones are skipped when paths are computed.
    pub fn into_parts(self) -> anyhow::Result<(Diagram, MeasureTable)> {
        let mut blocks = IndexMap::with_capacity(self.blocks.len());
        for entry in self.blocks {
            let key = entry.key.unwrap_or_else(|| entry.block.id.clone());
            if blocks.contains_key(&key) {
                anyhow::bail!("duplicate block key `{key}` in scene");
            }
            blocks.insert(key, entry.block);
        }
        let measure = self.measured.into_iter().collect();
        Ok((Diagram::from_parts(blocks, self.connections), measure))
    }

    pub fn from_diagram(diagram: &Diagram) -> Self {
        Self {
            blocks: diagram
                .blocks()
                .map(|(key, block)| SceneBlock {
                    key: (key != block.id).then(|| key.to_string()),
                    block: block.clone(),
                })
                .collect(),
            connections: diagram.connections().to_vec(),
            measured: BTreeMap::new(),
        }
    }
}

pub fn parse_scene(source: &str) -> anyhow::Result<(Diagram, MeasureTable)> {
    let scene: Scene = json5::from_str(source).context("invalid scene file")?;
    let (diagram, measure) = scene.into_parts()?;
    tracing::debug!(
        blocks = diagram.block_count(),
        connections = diagram.connections().len(),
        measured = measure.len(),
        "loaded scene"
    );
    Ok((diagram, measure))
}

pub fn load_scene(path: &Path) -> anyhow::Result<(Diagram, MeasureTable)> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scene {}", path.display()))?;
    parse_scene(&source)
}
