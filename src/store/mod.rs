pub mod board;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::cache_dir;
use crate::error::StoreError;
use crate::model::item::{Item, User};
use crate::model::task::Task;

pub use board::{BoardCache, MergeReport};

const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    boards: BTreeMap<String, BoardCache>,
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            boards: BTreeMap::new(),
        }
    }
}

/// Per-board task cache persisted as a single JSON document.
///
/// Loaded once when opened; every mutation writes the whole file back
/// before returning.
pub struct TaskStore {
    path: PathBuf,
    data: CacheFile,
}

pub fn default_cache_path() -> PathBuf {
    cache_dir().join("tasks.json")
}

impl TaskStore {
    /// Open the store at `path`. A missing file is an empty store; a
    /// malformed one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = load(&path)?;
        tracing::debug!(path = %path.display(), boards = data.boards.len(), "Loaded task cache");
        Ok(Self { path, data })
    }

    fn save(&self) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(&self.data)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        tracing::debug!(path = %self.path.display(), "Saved task cache");
        Ok(())
    }

    fn board(&self, board_id: &str) -> Result<&BoardCache, StoreError> {
        self.data
            .boards
            .get(board_id)
            .ok_or_else(|| StoreError::BoardNotCached(board_id.to_string()))
    }

    /// Apply `f` to a copy of the board and commit it only if `f` succeeds,
    /// so a failed merge never reaches memory or disk.
    fn mutate_board<T>(
        &mut self,
        board_id: &str,
        f: impl FnOnce(&mut BoardCache) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut board = self.data.boards.get(board_id).cloned().unwrap_or_default();
        let out = f(&mut board)?;
        self.data.boards.insert(board_id.to_string(), board);
        self.save()?;
        Ok(out)
    }

    /// Replace the board with an authoritative full fetch.
    pub fn store_full_fetch(
        &mut self,
        board_id: &str,
        tasks: Vec<Task>,
        raw_items: Vec<Item>,
    ) -> Result<(), StoreError> {
        let count = tasks.len();
        let mut board = BoardCache::from_full_fetch(tasks, raw_items)?;
        if let Some(previous) = self.data.boards.get(board_id) {
            board.users = previous.users.clone();
        }
        self.data.boards.insert(board_id.to_string(), board);
        self.save()?;
        tracing::info!(board_id, count, "Stored full board fetch");
        Ok(())
    }

    /// Merge a sprint-scoped fetch, keeping local IDs of known tasks.
    pub fn merge_sprint_fetch(
        &mut self,
        board_id: &str,
        tasks: Vec<Task>,
        raw_items: Vec<Item>,
    ) -> Result<MergeReport, StoreError> {
        let report = self.mutate_board(board_id, |board| board.merge(tasks, raw_items))?;
        tracing::info!(
            board_id,
            updated = report.updated,
            inserted = report.inserted,
            "Merged sprint fetch"
        );
        Ok(report)
    }

    /// Add or refresh a single task, returning its local ID.
    pub fn insert_task(&mut self, board_id: &str, task: Task) -> Result<u32, StoreError> {
        let remote_id = task.id.clone();
        self.mutate_board(board_id, |board| {
            board.merge(vec![task], Vec::new())?;
            board
                .local_id_of(&remote_id)
                .ok_or_else(|| StoreError::DanglingLocalId {
                    local_id: 0,
                    remote_id: remote_id.clone(),
                })
        })
    }

    pub fn get_by_local_id(
        &self,
        board_id: &str,
        local_id: u32,
    ) -> Result<(&Task, DateTime<Utc>), StoreError> {
        let board = self.board(board_id)?;
        match board.get(local_id) {
            Some(task) => Ok((task?, board.refreshed_at)),
            None => Err(StoreError::TaskNotFound {
                board_id: board_id.to_string(),
                local_id,
            }),
        }
    }

    /// Replace the payload for an existing local ID; the ID itself is kept.
    pub fn update_by_local_id(
        &mut self,
        board_id: &str,
        local_id: u32,
        task: Task,
    ) -> Result<(), StoreError> {
        self.replace_task(board_id, local_id, task, None)
    }

    /// Like [`update_by_local_id`](Self::update_by_local_id), also storing
    /// the raw item the task was mapped from.
    pub fn update_item_by_local_id(
        &mut self,
        board_id: &str,
        local_id: u32,
        task: Task,
        item: Item,
    ) -> Result<(), StoreError> {
        self.replace_task(board_id, local_id, task, Some(item))
    }

    fn replace_task(
        &mut self,
        board_id: &str,
        local_id: u32,
        task: Task,
        item: Option<Item>,
    ) -> Result<(), StoreError> {
        self.board(board_id)?;
        let board_key = board_id.to_string();
        self.mutate_board(board_id, |board| match board.replace(local_id, task, item)? {
            Some(()) => Ok(()),
            None => Err(StoreError::TaskNotFound {
                board_id: board_key,
                local_id,
            }),
        })
    }

    pub fn get_all(
        &self,
        board_id: &str,
    ) -> Result<(&BTreeMap<String, Task>, DateTime<Utc>), StoreError> {
        let board = self.board(board_id)?;
        Ok((&board.tasks, board.refreshed_at))
    }

    /// Drop everything cached for `board_id`. Returns false if nothing was cached.
    pub fn clear(&mut self, board_id: &str) -> Result<bool, StoreError> {
        let existed = self.data.boards.remove(board_id).is_some();
        self.save()?;
        Ok(existed)
    }

    pub fn store_users(&mut self, board_id: &str, users: Vec<User>) -> Result<(), StoreError> {
        self.mutate_board(board_id, |board| {
            for user in users {
                board.users.insert(user.id.clone(), user);
            }
            Ok(())
        })
    }

    pub fn users(&self, board_id: &str) -> Result<Vec<&User>, StoreError> {
        Ok(self.board(board_id)?.users.values().collect())
    }

    pub fn sprints(&self, board_id: &str) -> Result<&[String], StoreError> {
        Ok(&self.board(board_id)?.sprints)
    }
}

fn load(path: &Path) -> Result<CacheFile, StoreError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheFile::default()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let data: CacheFile = serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    if data.version != CACHE_VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: data.version,
            expected: CACHE_VERSION,
        });
    }
    Ok(data)
}
