use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EditorError, Result};

/// Id given to rows appended through "Add new row" until the row editor renames them.
pub const NEW_ROW_ID: &str = "new-row";
/// Option created together with a fresh enum block.
pub const DEFAULT_ENUM_OPTION: &str = "OPTION_1";
/// Row attribute holding the column type.
pub const COLUMN_TYPE_KEY: &str = "type";
/// Column type value marking a primary key.
pub const PRIMARY_KEY_TYPE: &str = "PK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Table,
    Enum,
}

impl BlockType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Enum => "enum",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub top: f32,
    pub left: f32,
}

impl Position {
    pub fn new(left: f32, top: f32) -> Self {
        Self { top, left }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Row {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn placeholder() -> Self {
        Self::new(NEW_ROW_ID)
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn column_type(&self) -> Option<&str> {
        self.data.get(COLUMN_TYPE_KEY).map(String::as_str)
    }

    pub fn is_primary_key(&self) -> bool {
        self.column_type() == Some(PRIMARY_KEY_TYPE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: BlockType, position: Position) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Row>) -> Self {
        self.rows.extend(rows);
        self
    }
}

/// Relationship kind drawn at a connection's midpoint.
///
/// Kinds this build does not know about survive deserialization as
/// [`MarkerKind::Unknown`] and render nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerKind {
    Triangle,
    Rectangle,
    Circle,
    Hexagon,
    Unknown,
}

impl MarkerKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Triangle" | "triangle" => Self::Triangle,
            "Rectangle" | "rectangle" => Self::Rectangle,
            "Circle" | "circle" => Self::Circle,
            "Hexagon" | "hexagon" => Self::Hexagon,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Triangle => "Triangle",
            Self::Rectangle => "Rectangle",
            Self::Circle => "Circle",
            Self::Hexagon => "Hexagon",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MarkerKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MarkerKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// Link between row `from_row` of `block1_id` and row `to_row` of `block2_id`.
///
/// Blocks are referenced by storage key, rows by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub block1_id: String,
    pub from_row: usize,
    pub block2_id: String,
    pub to_row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<MarkerKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Connection {
    pub fn new(
        block1_id: impl Into<String>,
        from_row: usize,
        block2_id: impl Into<String>,
        to_row: usize,
    ) -> Self {
        Self {
            block1_id: block1_id.into(),
            from_row,
            block2_id: block2_id.into(),
            to_row,
            marker: None,
            label: None,
        }
    }

    pub fn with_marker(mut self, marker: MarkerKind) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn touches(&self, key: &str) -> bool {
        self.block1_id == key || self.block2_id == key
    }
}

/// Builds the block placed by the context menu. Hosts replace it to seed
/// their own default columns.
pub trait BlockFactory {
    fn create_block(&self, kind: BlockType, left: f32, top: f32, key: &str) -> Block;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBlockFactory;

impl BlockFactory for DefaultBlockFactory {
    fn create_block(&self, kind: BlockType, left: f32, top: f32, key: &str) -> Block {
        let block = Block::new(key, kind, Position::new(left, top));
        match kind {
            BlockType::Table => block,
            BlockType::Enum => block.with_rows([Row::new(DEFAULT_ENUM_OPTION)]),
        }
    }
}

/// What happens when several blocks claim the same id during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Contenders keep their current keys; nothing is overwritten.
    #[default]
    Reject,
    /// The last contender in storage order takes the id and the others are dropped.
    LastWriteWins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityConflict {
    pub id: String,
    pub contenders: Vec<String>,
    pub winner: Option<String>,
}

/// Outcome of [`Diagram::reconcile_identity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub renames: Vec<Rename>,
    pub conflicts: Vec<IdentityConflict>,
    pub dropped: Vec<String>,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.renames.is_empty() && self.conflicts.is_empty() && self.dropped.is_empty()
    }

    pub fn renamed(&self, key: &str) -> Option<&str> {
        self.renames
            .iter()
            .find(|rename| rename.from == key)
            .map(|rename| rename.to.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagram {
    blocks: IndexMap<String, Block>,
    connections: Vec<Connection>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts host supplied collections as they are; connections are not validated.
    pub fn from_parts(blocks: IndexMap<String, Block>, connections: Vec<Connection>) -> Self {
        Self {
            blocks,
            connections,
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&str, &Block)> {
        self.blocks.iter().map(|(key, block)| (key.as_str(), block))
    }

    pub fn block(&self, key: &str) -> Option<&Block> {
        self.blocks.get(key)
    }

    pub fn contains_block(&self, key: &str) -> bool {
        self.blocks.contains_key(key)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Row count used for anchoring; a missing block counts as empty.
    pub fn row_count(&self, key: &str) -> usize {
        self.blocks.get(key).map_or(0, |block| block.rows.len())
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn insert_block(&mut self, key: impl Into<String>, block: Block) -> Result<()> {
        let key = key.into();
        if self.blocks.contains_key(&key) {
            return Err(EditorError::DuplicateKey(key));
        }
        self.blocks.insert(key, block);
        Ok(())
    }

    pub fn create_block(
        &mut self,
        kind: BlockType,
        left: f32,
        top: f32,
        key: &str,
        factory: &dyn BlockFactory,
    ) -> Result<&Block> {
        if self.blocks.contains_key(key) {
            return Err(EditorError::DuplicateKey(key.to_string()));
        }
        let block = factory.create_block(kind, left, top, key);
        let (index, _) = self.blocks.insert_full(key.to_string(), block);
        Ok(&self.blocks[index])
    }

    /// Appends a placeholder row and returns its index.
    pub fn add_row(&mut self, key: &str) -> Result<usize> {
        let block = self.block_mut(key)?;
        block.rows.push(Row::placeholder());
        Ok(block.rows.len() - 1)
    }

    pub fn update_position(&mut self, key: &str, position: Position) -> Result<Position> {
        let block = self.block_mut(key)?;
        Ok(std::mem::replace(&mut block.position, position))
    }

    pub fn set_block_id(&mut self, key: &str, id: impl Into<String>) -> Result<()> {
        self.block_mut(key)?.id = id.into();
        Ok(())
    }

    pub fn set_block_type(&mut self, key: &str, kind: BlockType) -> Result<()> {
        self.block_mut(key)?.kind = kind;
        Ok(())
    }

    pub fn update_row(&mut self, key: &str, index: usize, row: Row) -> Result<()> {
        let block = self.block_mut(key)?;
        let len = block.rows.len();
        let slot = block
            .rows
            .get_mut(index)
            .ok_or_else(|| EditorError::RowOutOfRange {
                block: key.to_string(),
                row: index,
                len,
            })?;
        *slot = row;
        Ok(())
    }

    /// Removes a row. Connections anchored on it are dropped and those on
    /// later rows of the same block move up by one.
    pub fn remove_row(&mut self, key: &str, index: usize) -> Result<Row> {
        let block = self.block_mut(key)?;
        let len = block.rows.len();
        if index >= len {
            return Err(EditorError::RowOutOfRange {
                block: key.to_string(),
                row: index,
                len,
            });
        }
        let row = block.rows.remove(index);
        self.connections.retain(|connection| {
            !(connection.block1_id == key && connection.from_row == index
                || connection.block2_id == key && connection.to_row == index)
        });
        for connection in &mut self.connections {
            if connection.block1_id == key && connection.from_row > index {
                connection.from_row -= 1;
            }
            if connection.block2_id == key && connection.to_row > index {
                connection.to_row -= 1;
            }
        }
        Ok(row)
    }

    /// Removes a block together with every connection touching it.
    pub fn delete_block(&mut self, key: &str) -> Result<Block> {
        let block = self
            .blocks
            .shift_remove(key)
            .ok_or_else(|| EditorError::UnknownBlock(key.to_string()))?;
        let before = self.connections.len();
        self.connections.retain(|connection| !connection.touches(key));
        tracing::debug!(
            block = key,
            dropped = before - self.connections.len(),
            "deleted block"
        );
        Ok(block)
    }

    pub fn add_connection(&mut self, connection: Connection) -> Result<()> {
        self.check_row(&connection.block1_id, connection.from_row)?;
        self.check_row(&connection.block2_id, connection.to_row)?;
        self.connections.push(connection);
        Ok(())
    }

    pub fn remove_connection(&mut self, index: usize) -> Option<Connection> {
        (index < self.connections.len()).then(|| self.connections.remove(index))
    }

    /// Re-keys every block so that its storage key equals its `id`.
    ///
    /// The full plan is settled before storage is touched, so callers see
    /// either the old key set or the new one. Connections are left alone;
    /// pass the result to [`Diagram::rewrite_connections`].
    pub fn reconcile_identity(&mut self, policy: ConflictPolicy) -> Reconciliation {
        let keys: Vec<String> = self.blocks.keys().cloned().collect();
        let mut targets: Vec<String> = self.blocks.values().map(|block| block.id.clone()).collect();
        let mut dropped = vec![false; keys.len()];
        let mut conflicts = Vec::new();

        match policy {
            ConflictPolicy::Reject => loop {
                let contested = contested_targets(&targets, &dropped);
                if contested.is_empty() {
                    break;
                }
                // Every contested group holds at least one block that wants to
                // move, so each pass pins one more block and the loop ends.
                for (id, members) in contested {
                    let winner = members.iter().copied().find(|&idx| keys[idx] == targets[idx]);
                    for &idx in &members {
                        targets[idx] = keys[idx].clone();
                    }
                    conflicts.push(IdentityConflict {
                        id,
                        contenders: members.iter().map(|&idx| keys[idx].clone()).collect(),
                        winner: winner.map(|idx| keys[idx].clone()),
                    });
                }
            },
            ConflictPolicy::LastWriteWins => {
                for (id, members) in contested_targets(&targets, &dropped) {
                    let Some((&last, losers)) = members.split_last() else {
                        continue;
                    };
                    for &idx in losers {
                        dropped[idx] = true;
                    }
                    conflicts.push(IdentityConflict {
                        id,
                        contenders: members.iter().map(|&idx| keys[idx].clone()).collect(),
                        winner: Some(keys[last].clone()),
                    });
                }
            }
        }

        let mut rekeyed = IndexMap::with_capacity(self.blocks.len());
        let mut reconciliation = Reconciliation {
            conflicts,
            ..Reconciliation::default()
        };
        for (idx, (key, block)) in std::mem::take(&mut self.blocks).into_iter().enumerate() {
            if dropped[idx] {
                reconciliation.dropped.push(key);
                continue;
            }
            let target = std::mem::take(&mut targets[idx]);
            if target != key {
                reconciliation.renames.push(Rename {
                    from: key,
                    to: target.clone(),
                });
            }
            rekeyed.insert(target, block);
        }
        self.blocks = rekeyed;

        for conflict in &reconciliation.conflicts {
            tracing::warn!(
                id = %conflict.id,
                contenders = ?conflict.contenders,
                winner = ?conflict.winner,
                ?policy,
                "blocks share an id"
            );
        }
        reconciliation
    }

    /// Points connections at the keys chosen by a reconciliation and drops
    /// connections to blocks it discarded. Returns the number of rewritten
    /// references.
    pub fn rewrite_connections(&mut self, reconciliation: &Reconciliation) -> usize {
        let renames: HashMap<&str, &str> = reconciliation
            .renames
            .iter()
            .map(|rename| (rename.from.as_str(), rename.to.as_str()))
            .collect();
        let dropped: HashSet<&str> = reconciliation.dropped.iter().map(String::as_str).collect();

        self.connections.retain(|connection| {
            !dropped.contains(connection.block1_id.as_str())
                && !dropped.contains(connection.block2_id.as_str())
        });

        let mut rewritten = 0;
        for connection in &mut self.connections {
            if let Some(to) = renames.get(connection.block1_id.as_str()) {
                connection.block1_id = to.to_string();
                rewritten += 1;
            }
            if let Some(to) = renames.get(connection.block2_id.as_str()) {
                connection.block2_id = to.to_string();
                rewritten += 1;
            }
        }
        rewritten
    }

    fn block_mut(&mut self, key: &str) -> Result<&mut Block> {
        self.blocks
            .get_mut(key)
            .ok_or_else(|| EditorError::UnknownBlock(key.to_string()))
    }

    fn check_row(&self, key: &str, row: usize) -> Result<()> {
        let block = self
            .blocks
            .get(key)
            .ok_or_else(|| EditorError::UnknownBlock(key.to_string()))?;
        if row >= block.rows.len() {
            return Err(EditorError::RowOutOfRange {
                block: key.to_string(),
                row,
                len: block.rows.len(),
            });
        }
        Ok(())
    }
}

/// Targets claimed by more than one live block, in storage order.
fn contested_targets(targets: &[String], dropped: &[bool]) -> Vec<(String, Vec<usize>)> {
    let mut claims: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (idx, target) in targets.iter().enumerate() {
        if !dropped[idx] {
            claims.entry(target.as_str()).or_default().push(idx);
        }
    }
    claims
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(id, members)| (id.to_string(), members))
        .collect()
}
