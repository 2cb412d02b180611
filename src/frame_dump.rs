use crate::frame::Frame;
use crate::model::Reconciliation;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flat JSON view of a frame, used by the CLI's `json` output and by tests
/// that compare routed geometry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDump {
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<BlockDump>,
    pub connections: Vec<ConnectionDump>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<Reconciliation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDump {
    pub key: String,
    pub id: String,
    pub kind: String,
    pub rows: Vec<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDump {
    pub from: String,
    pub to: String,
    pub d: String,
    pub mid: [f32; 2],
    pub marker: Option<String>,
    pub marker_color: Option<String>,
    pub label: Option<String>,
}

impl FrameDump {
    pub fn from_frame(frame: &Frame) -> Self {
        let blocks = frame
            .blocks
            .iter()
            .map(|entry| BlockDump {
                key: entry.key.clone(),
                id: entry.block.id.clone(),
                kind: entry.block.kind.as_str().to_string(),
                rows: entry.block.rows.iter().map(|row| row.id.clone()).collect(),
                x: entry.rect.map(|rect| rect.x),
                y: entry.rect.map(|rect| rect.y),
                width: entry.rect.map(|rect| rect.width),
                height: entry.rect.map(|rect| rect.height),
            })
            .collect();

        let connections = frame
            .connections
            .iter()
            .map(|conn| ConnectionDump {
                from: conn.from.clone(),
                to: conn.to.clone(),
                d: conn.path.d.clone(),
                mid: [conn.path.mid_x, conn.path.mid_y],
                marker: conn.marker.as_ref().map(|marker| marker.kind.to_string()),
                marker_color: conn.marker.as_ref().map(|marker| marker.color.clone()),
                label: conn.label.as_ref().map(|label| label.text.clone()),
            })
            .collect();

        let (width, height) = frame
            .bounds()
            .map(|bounds| (bounds.right().max(0.0), bounds.bottom().max(0.0)))
            .unwrap_or((0.0, 0.0));

        FrameDump {
            width,
            height,
            blocks,
            connections,
            reconciliation: None,
        }
    }

    pub fn with_reconciliation(mut self, reconciliation: Option<Reconciliation>) -> Self {
        self.reconciliation = reconciliation;
        self
    }
}

pub fn write_frame_dump(path: &Path, dump: &FrameDump) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, dump)?;
    Ok(())
}
