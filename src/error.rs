use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("unknown block `{0}`")]
    UnknownBlock(String),
    #[error("a block is already stored under `{0}`")]
    DuplicateKey(String),
    #[error("row {row} is out of range for block `{block}` ({len} rows)")]
    RowOutOfRange {
        block: String,
        row: usize,
        len: usize,
    },
    #[error("rows of enum block `{0}` are edited through the block editor")]
    RowsNotEditable(String),
    #[error("editor is busy handling another event")]
    Busy,
}

pub type Result<T> = std::result::Result<T, EditorError>;
