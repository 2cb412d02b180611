//! Event handlers of the editor canvas.
//!
//! Every handler mutates the diagram first and recomputes connector paths
//! afterwards, so a recompute always observes the finished mutation. Handlers
//! take `&mut self`; the borrow checker rules out a second handler running in
//! the middle of reconciliation.

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::error::{EditorError, Result};
use crate::frame::{BlockFrame, ConnectionFrame, Frame};
use crate::geometry::{PathGeometry, Rect, compute_path};
use crate::marker::{Legend, resolve_label, resolve_marker};
use crate::measure::MeasurementSource;
use crate::model::{
    BlockFactory, BlockType, ConflictPolicy, DefaultBlockFactory, Diagram, Position, Reconciliation,
    Row,
};

/// Prefix of the synthetic keys given to blocks created from the context menu.
pub const NEW_BLOCK_KEY_PREFIX: &str = "new-block";

/// Slide-in editor visibility.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum EditorPanel {
    #[default]
    Closed,
    #[serde(rename_all = "camelCase")]
    OpenForBlock { block_id: String },
    #[serde(rename_all = "camelCase")]
    OpenForRow { block_id: String, row_index: usize },
}

impl EditorPanel {
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Selection handed to the external block/row editors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorData {
    pub block_id: String,
    pub row_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorTarget<'a> {
    Block(&'a str),
    Row(&'a str, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ContextMenu {
    #[default]
    Closed,
    Open { x: f32, y: f32 },
}

impl ContextMenu {
    pub fn anchor(&self) -> Option<(f32, f32)> {
        match *self {
            Self::Closed => None,
            Self::Open { x, y } => Some((x, y)),
        }
    }
}

/// Path of the connection at `index` in the diagram's connection list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionPath {
    pub index: usize,
    pub geometry: PathGeometry,
}

pub struct EditorController {
    diagram: Diagram,
    config: LayoutConfig,
    factory: Box<dyn BlockFactory>,
    panel: EditorPanel,
    editor_data: Option<EditorData>,
    menu: ContextMenu,
    paths: Vec<ConnectionPath>,
    created_blocks: usize,
}

impl EditorController {
    pub fn new(diagram: Diagram, config: LayoutConfig) -> Self {
        Self {
            diagram,
            config,
            factory: Box::new(DefaultBlockFactory),
            panel: EditorPanel::Closed,
            editor_data: None,
            menu: ContextMenu::Closed,
            paths: Vec::new(),
            created_blocks: 0,
        }
    }

    pub fn with_factory(mut self, factory: Box<dyn BlockFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.config.conflict_policy = policy;
        self
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn into_diagram(self) -> Diagram {
        self.diagram
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn paths(&self) -> &[ConnectionPath] {
        &self.paths
    }

    pub fn path_for(&self, connection_index: usize) -> Option<&PathGeometry> {
        self.paths
            .iter()
            .find(|path| path.index == connection_index)
            .map(|path| &path.geometry)
    }

    pub fn panel(&self) -> &EditorPanel {
        &self.panel
    }

    pub fn editor_data(&self) -> Option<&EditorData> {
        self.editor_data.as_ref()
    }

    pub fn context_menu(&self) -> ContextMenu {
        self.menu
    }

    // ── Geometry ────────────────────────────────────────────────────────

    /// Recomputes every connector from the boxes `measure` reports now.
    /// Connections to blocks that no longer exist contribute no path.
    pub fn recompute(&mut self, measure: &dyn MeasurementSource) -> &[ConnectionPath] {
        let connections = self.diagram.connections();
        let mut paths = Vec::with_capacity(connections.len());
        let mut skipped = 0usize;
        for (index, connection) in connections.iter().enumerate() {
            let (Some(from), Some(to)) = (
                self.diagram.block(&connection.block1_id),
                self.diagram.block(&connection.block2_id),
            ) else {
                tracing::debug!(
                    index,
                    from = %connection.block1_id,
                    to = %connection.block2_id,
                    "skipping connection to missing block"
                );
                skipped += 1;
                continue;
            };
            let rect1 = measure.measure(&connection.block1_id, from);
            let rect2 = measure.measure(&connection.block2_id, to);
            let geometry = compute_path(
                rect1.as_ref(),
                rect2.as_ref(),
                connection.from_row,
                connection.to_row,
                from.rows.len(),
                to.rows.len(),
                &self.config.routing,
            );
            paths.push(ConnectionPath { index, geometry });
        }
        tracing::debug!(paths = paths.len(), skipped, "recomputed connection paths");
        self.paths = paths;
        &self.paths
    }

    // ── Drag & rows ─────────────────────────────────────────────────────

    /// Moves a block and reroutes every connection.
    pub fn drag_block(
        &mut self,
        key: &str,
        position: Position,
        measure: &mut dyn MeasurementSource,
    ) -> Result<()> {
        let previous = self.diagram.update_position(key, position)?;
        measure.translate(key, position.left - previous.left, position.top - previous.top);
        self.recompute(measure);
        Ok(())
    }

    /// Appends a placeholder row to a table block. Enum options are edited
    /// through the block editor instead.
    pub fn add_row(&mut self, key: &str, measure: &mut dyn MeasurementSource) -> Result<usize> {
        let block = self
            .diagram
            .block(key)
            .ok_or_else(|| EditorError::UnknownBlock(key.to_string()))?;
        if block.kind == BlockType::Enum {
            return Err(EditorError::RowsNotEditable(key.to_string()));
        }
        let index = self.diagram.add_row(key)?;
        self.recompute(measure);
        Ok(index)
    }

    pub fn update_row(
        &mut self,
        key: &str,
        index: usize,
        row: Row,
        measure: &mut dyn MeasurementSource,
    ) -> Result<()> {
        self.diagram.update_row(key, index, row)?;
        self.recompute(measure);
        Ok(())
    }

    pub fn remove_row(
        &mut self,
        key: &str,
        index: usize,
        measure: &mut dyn MeasurementSource,
    ) -> Result<Row> {
        let row = self.diagram.remove_row(key, index)?;
        self.recompute(measure);
        Ok(row)
    }

    /// Property edit from the block editor; storage is re-keyed on close.
    pub fn set_block_id(&mut self, key: &str, id: impl Into<String>) -> Result<()> {
        self.diagram.set_block_id(key, id)
    }

    pub fn set_block_type(
        &mut self,
        key: &str,
        kind: BlockType,
        measure: &mut dyn MeasurementSource,
    ) -> Result<()> {
        self.diagram.set_block_type(key, kind)?;
        self.recompute(measure);
        Ok(())
    }

    /// Deleting the block under edit closes the editor through
    /// [`close_editor`](Self::close_editor), so identity is committed as on
    /// any other close.
    pub fn delete_block(
        &mut self,
        key: &str,
        measure: &mut dyn MeasurementSource,
    ) -> Result<Option<Reconciliation>> {
        self.diagram.delete_block(key)?;
        measure.forget(key);
        let editing = self
            .editor_data
            .as_ref()
            .is_some_and(|data| data.block_id == key);
        if editing {
            return Ok(self.close_editor(measure));
        }
        self.recompute(measure);
        Ok(None)
    }

    pub fn add_connection(
        &mut self,
        connection: crate::model::Connection,
        measure: &mut dyn MeasurementSource,
    ) -> Result<()> {
        self.diagram.add_connection(connection)?;
        self.recompute(measure);
        Ok(())
    }

    // ── Editor panel ────────────────────────────────────────────────────

    /// Opens the editor on `target`, or closes it when it is already open.
    /// Returns the reconciliation when the toggle closed the panel.
    pub fn toggle_editor(
        &mut self,
        target: EditorTarget<'_>,
        measure: &mut dyn MeasurementSource,
    ) -> Result<Option<Reconciliation>> {
        if self.panel.is_open() {
            return Ok(self.close_editor(measure));
        }
        let (panel, data) = match target {
            EditorTarget::Block(key) => {
                self.require_block(key)?;
                (
                    EditorPanel::OpenForBlock {
                        block_id: key.to_string(),
                    },
                    EditorData {
                        block_id: key.to_string(),
                        row_index: None,
                    },
                )
            }
            EditorTarget::Row(key, row_index) => {
                let len = self.require_block(key)?.rows.len();
                if row_index >= len {
                    return Err(EditorError::RowOutOfRange {
                        block: key.to_string(),
                        row: row_index,
                        len,
                    });
                }
                (
                    EditorPanel::OpenForRow {
                        block_id: key.to_string(),
                        row_index,
                    },
                    EditorData {
                        block_id: key.to_string(),
                        row_index: Some(row_index),
                    },
                )
            }
        };
        tracing::debug!(?panel, "editor opened");
        self.panel = panel;
        self.editor_data = Some(data);
        Ok(None)
    }

    /// Header pencil click.
    pub fn click_block_header(
        &mut self,
        key: &str,
        measure: &mut dyn MeasurementSource,
    ) -> Result<Option<Reconciliation>> {
        self.toggle_editor(EditorTarget::Block(key), measure)
    }

    /// Row click. Primary key columns of tables are not editable from the
    /// canvas and the click is ignored.
    pub fn click_row(
        &mut self,
        key: &str,
        row_index: usize,
        measure: &mut dyn MeasurementSource,
    ) -> Result<Option<Reconciliation>> {
        let block = self.require_block(key)?;
        let locked = block.kind == BlockType::Table
            && block
                .rows
                .get(row_index)
                .is_some_and(|row| row.is_primary_key());
        if locked {
            tracing::debug!(block = key, row_index, "ignoring click on primary key row");
            return Ok(None);
        }
        self.toggle_editor(EditorTarget::Row(key, row_index), measure)
    }

    /// Click on the option summary line of an enum block.
    pub fn click_enum_options(
        &mut self,
        key: &str,
        measure: &mut dyn MeasurementSource,
    ) -> Result<Option<Reconciliation>> {
        self.toggle_editor(EditorTarget::Block(key), measure)
    }

    /// Closes the editor, re-keys blocks to their ids, rewrites connection
    /// references and reroutes, as one step. Closing a closed editor does
    /// nothing and returns `None`.
    pub fn close_editor(&mut self, measure: &mut dyn MeasurementSource) -> Option<Reconciliation> {
        if !self.panel.is_open() {
            return None;
        }
        self.panel = EditorPanel::Closed;
        self.editor_data = None;
        Some(self.commit_identity(measure))
    }

    /// Re-keys blocks to their ids, rewrites connection references, moves
    /// measured boxes along and reroutes. `close_editor` runs this; hosts
    /// that load stale scenes can run it directly.
    pub fn commit_identity(&mut self, measure: &mut dyn MeasurementSource) -> Reconciliation {
        let reconciliation = self.diagram.reconcile_identity(self.config.conflict_policy);
        let rewritten = self.diagram.rewrite_connections(&reconciliation);
        measure.rekey(&reconciliation.renames);
        for key in &reconciliation.dropped {
            measure.forget(key);
        }
        tracing::debug!(
            renames = reconciliation.renames.len(),
            conflicts = reconciliation.conflicts.len(),
            rewritten,
            "identity committed"
        );
        self.recompute(measure);
        reconciliation
    }

    // ── Context menu ────────────────────────────────────────────────────

    /// Right click inside the canvas. Client coordinates are shifted by the
    /// page scroll and lifted so the menu opens above the cursor.
    pub fn open_context_menu(&mut self, client_x: f32, client_y: f32, scroll_x: f32, scroll_y: f32) {
        let x = client_x + scroll_x;
        let y = client_y + scroll_y - self.config.context_menu.offset_y;
        self.menu = ContextMenu::Open { x, y };
    }

    pub fn close_context_menu(&mut self) {
        self.menu = ContextMenu::Closed;
    }

    pub fn context_menu_bounds(&self) -> Option<Rect> {
        self.menu.anchor().map(|(x, y)| {
            Rect::new(
                x,
                y,
                self.config.context_menu.width,
                self.config.context_menu.height,
            )
        })
    }

    /// Pointer down anywhere on the page; closes the menu when outside it.
    /// Returns whether the menu was closed.
    pub fn pointer_down(&mut self, x: f32, y: f32) -> bool {
        match self.context_menu_bounds() {
            Some(bounds) if !bounds.contains(x, y) => {
                self.close_context_menu();
                true
            }
            _ => false,
        }
    }

    /// "Add Block" / "Add Options": creates a block at the menu anchor and
    /// closes the menu. Returns the new block's key, or `None` when no menu
    /// is open.
    pub fn add_block(
        &mut self,
        kind: BlockType,
        measure: &mut dyn MeasurementSource,
    ) -> Result<Option<String>> {
        let Some((x, y)) = self.menu.anchor() else {
            return Ok(None);
        };
        let key = self.next_block_key(kind);
        self.diagram
            .create_block(kind, x, y, &key, self.factory.as_ref())?;
        tracing::debug!(block = %key, kind = kind.as_str(), x, y, "created block");
        self.close_context_menu();
        self.recompute(measure);
        Ok(Some(key))
    }

    // ── Frame ───────────────────────────────────────────────────────────

    /// Everything the render adapter needs for one frame.
    pub fn frame(&self, measure: &dyn MeasurementSource, legend: &Legend) -> Frame {
        let blocks = self
            .diagram
            .blocks()
            .map(|(key, block)| BlockFrame {
                key: key.to_string(),
                rect: measure.measure(key, block),
                block: block.clone(),
            })
            .collect();
        let connections = self
            .paths
            .iter()
            .filter_map(|path| {
                let connection = self.diagram.connections().get(path.index)?;
                Some(ConnectionFrame {
                    index: path.index,
                    from: connection.block1_id.clone(),
                    to: connection.block2_id.clone(),
                    marker: resolve_marker(connection, &path.geometry, legend, &self.config.marker),
                    label: resolve_label(connection, &path.geometry, &self.config.marker),
                    path: path.geometry.clone(),
                })
            })
            .collect();
        Frame {
            blocks,
            connections,
            context_menu: self.menu,
            editor: self.panel.clone(),
        }
    }

    fn next_block_key(&mut self, kind: BlockType) -> String {
        loop {
            self.created_blocks += 1;
            let key = format!(
                "{NEW_BLOCK_KEY_PREFIX}-{}-{}",
                kind.as_str(),
                self.created_blocks
            );
            if !self.diagram.contains_block(&key) {
                return key;
            }
        }
    }

    fn require_block(&self, key: &str) -> Result<&crate::model::Block> {
        self.diagram
            .block(key)
            .ok_or_else(|| EditorError::UnknownBlock(key.to_string()))
    }
}
