use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read task cache {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write task cache {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Task cache {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Task cache {} has unsupported version {found} (expected {expected})", path.display())]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("Failed to encode task cache: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Board {0} has no cached tasks. Run `tasks fetch` first")]
    BoardNotCached(String),

    #[error("Task {local_id} not found on board {board_id}")]
    TaskNotFound { board_id: String, local_id: u32 },

    #[error("Local ID {local_id} points at missing task {remote_id}; clear the cache and fetch again")]
    DanglingLocalId { local_id: u32, remote_id: String },

    #[error("Local ID {local_id} is already assigned to {existing}, refusing to reassign it to {incoming}")]
    LocalIdCollision {
        local_id: u32,
        existing: String,
        incoming: String,
    },

    #[error("Item {remote_id} claims local ID 0; local IDs start at 1")]
    InvalidLocalId { remote_id: String },

    #[error("No local IDs left on this board; clear the cache and fetch again")]
    LocalIdsExhausted,

    #[error("Task {local_id} belongs to item {expected}, not {found}")]
    RemoteIdMismatch {
        local_id: u32,
        expected: String,
        found: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid filter type: {0}. Valid types: status, priority, type, sprint, user_name, user_email")]
    UnknownDimension(String),

    #[error("Invalid list type: {0}. Valid types: whitelist, blacklist")]
    UnknownListKind(String),

    #[error("User information not available. Run `user info` first")]
    NoCurrentUser,

    #[error("Current sprint not set. Run `config set-sprint-id <sprint-id>` first")]
    NoCurrentSprint,
}
