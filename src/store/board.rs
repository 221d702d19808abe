use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::StoreError;
use crate::model::item::{Item, User};
use crate::model::task::Task;

/// Cached state for one board.
///
/// `local_ids` and `tasks` are kept in lockstep: every task has exactly one
/// local ID and a local ID, once handed out, only ever names one remote ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardCache {
    pub tasks: BTreeMap<String, Task>,
    pub local_ids: BTreeMap<u32, String>,
    #[serde(default)]
    pub raw_items: BTreeMap<String, Item>,
    #[serde(default)]
    pub users: BTreeMap<String, User>,
    #[serde(default)]
    pub sprints: Vec<String>,
    /// Highest local ID ever handed out, so freed IDs are not reissued.
    #[serde(default)]
    pub high_water: u32,
    pub refreshed_at: DateTime<Utc>,
}

/// Outcome of merging a sprint fetch into a board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub updated: usize,
    pub inserted: usize,
}

impl BoardCache {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            local_ids: BTreeMap::new(),
            raw_items: BTreeMap::new(),
            users: BTreeMap::new(),
            sprints: Vec::new(),
            high_water: 0,
            refreshed_at: Utc::now(),
        }
    }

    /// Build a board from an authoritative full fetch.
    ///
    /// Tasks get local IDs in input order (`position + 1`), unless they
    /// carry one already. A remote ID repeated in the input keeps the first
    /// local ID it received.
    pub fn from_full_fetch(tasks: Vec<Task>, raw_items: Vec<Item>) -> Result<Self, StoreError> {
        let mut board = Self::new();
        let mut by_remote: HashMap<String, u32> = HashMap::new();

        // Reserve pre-assigned IDs before handing out positional ones.
        for task in &tasks {
            if let Some(local_id) = task.local_id {
                if by_remote.contains_key(&task.id) {
                    continue;
                }
                board.bind(local_id, &task.id)?;
                by_remote.insert(task.id.clone(), local_id);
            }
        }

        for (position, mut task) in tasks.into_iter().enumerate() {
            let local_id = match by_remote.get(&task.id) {
                Some(local_id) => *local_id,
                None => {
                    let candidate = position as u32 + 1;
                    let local_id = if board.local_ids.contains_key(&candidate) {
                        board.next_local_id()?
                    } else {
                        candidate
                    };
                    board.bind(local_id, &task.id)?;
                    by_remote.insert(task.id.clone(), local_id);
                    local_id
                }
            };
            task.local_id = Some(local_id);
            board.tasks.insert(task.id.clone(), task);
        }

        board.absorb_raw_items(raw_items);
        board.collect_sprints();
        board.check_integrity()?;
        Ok(board)
    }

    /// Fold a sprint-scoped fetch into this board.
    ///
    /// Known remote IDs keep their local ID and take the incoming fields;
    /// unknown ones get `max + 1`. Merging the same input twice is a no-op
    /// apart from the refresh timestamp.
    pub fn merge(&mut self, tasks: Vec<Task>, raw_items: Vec<Item>) -> Result<MergeReport, StoreError> {
        let mut by_remote: HashMap<String, u32> = self
            .local_ids
            .iter()
            .map(|(local_id, remote_id)| (remote_id.clone(), *local_id))
            .collect();

        let mut report = MergeReport::default();
        for mut task in tasks {
            let local_id = match by_remote.get(&task.id) {
                Some(local_id) => {
                    report.updated += 1;
                    *local_id
                }
                None => {
                    let local_id = self.next_local_id()?;
                    self.bind(local_id, &task.id)?;
                    by_remote.insert(task.id.clone(), local_id);
                    report.inserted += 1;
                    local_id
                }
            };
            task.local_id = Some(local_id);
            self.tasks.insert(task.id.clone(), task);
        }

        self.absorb_raw_items(raw_items);
        self.collect_sprints();
        self.refreshed_at = Utc::now();
        self.check_integrity()?;
        Ok(report)
    }

    pub fn get(&self, local_id: u32) -> Option<Result<&Task, StoreError>> {
        let remote_id = self.local_ids.get(&local_id)?;
        Some(
            self.tasks
                .get(remote_id)
                .ok_or_else(|| StoreError::DanglingLocalId {
                    local_id,
                    remote_id: remote_id.clone(),
                }),
        )
    }

    /// Replace the payload behind `local_id`, along with its raw item when
    /// one is given. The remote ID must not change.
    pub fn replace(
        &mut self,
        local_id: u32,
        mut task: Task,
        raw_item: Option<Item>,
    ) -> Result<Option<()>, StoreError> {
        let Some(remote_id) = self.local_ids.get(&local_id) else {
            return Ok(None);
        };
        if *remote_id != task.id {
            return Err(StoreError::RemoteIdMismatch {
                local_id,
                expected: remote_id.clone(),
                found: task.id,
            });
        }
        task.local_id = Some(local_id);
        self.tasks.insert(task.id.clone(), task);
        self.absorb_raw_items(raw_item.into_iter().collect());
        self.collect_sprints();
        Ok(Some(()))
    }

    pub fn local_id_of(&self, remote_id: &str) -> Option<u32> {
        self.tasks.get(remote_id).and_then(|t| t.local_id)
    }

    /// One past the highest local ID ever handed out on this board.
    pub fn next_local_id(&self) -> Result<u32, StoreError> {
        let max = self.local_ids.keys().next_back().copied().unwrap_or(0);
        max.max(self.high_water)
            .checked_add(1)
            .ok_or(StoreError::LocalIdsExhausted)
    }

    fn bind(&mut self, local_id: u32, remote_id: &str) -> Result<(), StoreError> {
        if local_id == 0 {
            return Err(StoreError::InvalidLocalId {
                remote_id: remote_id.to_string(),
            });
        }
        match self.local_ids.get(&local_id) {
            Some(existing) if existing != remote_id => Err(StoreError::LocalIdCollision {
                local_id,
                existing: existing.clone(),
                incoming: remote_id.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.local_ids.insert(local_id, remote_id.to_string());
                self.high_water = self.high_water.max(local_id);
                Ok(())
            }
        }
    }

    fn absorb_raw_items(&mut self, raw_items: Vec<Item>) {
        for item in raw_items {
            self.raw_items.insert(item.id.clone(), item);
        }
    }

    fn collect_sprints(&mut self) {
        let known: BTreeSet<String> = self
            .tasks
            .values()
            .map(|t| t.sprint.clone())
            .filter(|s| !s.is_empty())
            .collect();
        self.sprints = known.into_iter().collect();
    }

    /// The index must be a bijection onto the task map.
    pub fn check_integrity(&self) -> Result<(), StoreError> {
        for (local_id, remote_id) in &self.local_ids {
            match self.tasks.get(remote_id) {
                Some(task) if task.local_id == Some(*local_id) => {}
                Some(task) => {
                    return Err(StoreError::LocalIdCollision {
                        local_id: *local_id,
                        existing: remote_id.clone(),
                        incoming: format!("{} (claims local ID {:?})", task.id, task.local_id),
                    })
                }
                None => {
                    return Err(StoreError::DanglingLocalId {
                        local_id: *local_id,
                        remote_id: remote_id.clone(),
                    })
                }
            }
        }
        if self.local_ids.len() != self.tasks.len() {
            let indexed: BTreeSet<&String> = self.local_ids.values().collect();
            if let Some(orphan) = self.tasks.keys().find(|id| !indexed.contains(id)) {
                return Err(StoreError::LocalIdCollision {
                    local_id: self.tasks[orphan].local_id.unwrap_or_default(),
                    existing: orphan.clone(),
                    incoming: "a task missing from the index".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for BoardCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: &str) -> Task {
        let mut task = Task::new(id, format!("Task {id}"));
        task.status = status.into();
        task
    }

    fn index(board: &BoardCache) -> Vec<(u32, &str)> {
        board
            .local_ids
            .iter()
            .map(|(l, r)| (*l, r.as_str()))
            .collect()
    }

    #[test]
    fn full_fetch_assigns_ids_in_input_order() {
        let board =
            BoardCache::from_full_fetch(vec![task("r1", "Done"), task("r2", "Stuck")], vec![])
                .unwrap();
        assert_eq!(index(&board), vec![(1, "r1"), (2, "r2")]);
        assert_eq!(board.tasks["r2"].local_id, Some(2));
        board.check_integrity().unwrap();
    }

    #[test]
    fn full_fetch_respects_preassigned_ids() {
        let mut pinned = task("r2", "Done");
        pinned.local_id = Some(1);
        let board = BoardCache::from_full_fetch(vec![task("r1", "Done"), pinned], vec![]).unwrap();
        // r1 would take 1 positionally, but 1 is reserved for r2.
        assert_eq!(index(&board), vec![(1, "r2"), (2, "r1")]);
        board.check_integrity().unwrap();
    }

    #[test]
    fn full_fetch_rejects_conflicting_preassigned_ids() {
        let mut a = task("a", "");
        a.local_id = Some(5);
        let mut b = task("b", "");
        b.local_id = Some(5);
        let err = BoardCache::from_full_fetch(vec![a, b], vec![]).unwrap_err();
        assert!(matches!(err, StoreError::LocalIdCollision { local_id: 5, .. }));
    }

    #[test]
    fn full_fetch_preassigned_id_wins_over_earlier_duplicate() {
        let mut pinned = task("r1", "Stuck");
        pinned.local_id = Some(7);
        let board =
            BoardCache::from_full_fetch(vec![task("r1", "Done"), pinned], vec![]).unwrap();
        assert_eq!(index(&board), vec![(7, "r1")]);
        assert_eq!(board.tasks["r1"].status.as_str(), "Stuck");
    }

    #[test]
    fn full_fetch_collapses_duplicate_remote_ids() {
        let board = BoardCache::from_full_fetch(
            vec![task("r1", "Done"), task("r2", ""), task("r1", "Stuck")],
            vec![],
        )
        .unwrap();
        assert_eq!(index(&board), vec![(1, "r1"), (2, "r2")]);
        assert_eq!(board.tasks["r1"].status.as_str(), "Stuck");
        board.check_integrity().unwrap();
    }

    #[test]
    fn merge_keeps_existing_ids_and_appends_new_ones() {
        let mut board =
            BoardCache::from_full_fetch(vec![task("r1", "Done"), task("r2", "Stuck")], vec![])
                .unwrap();

        let report = board
            .merge(vec![task("r1", "In Progress"), task("r3", "Done")], vec![])
            .unwrap();

        assert_eq!(report, MergeReport { updated: 1, inserted: 1 });
        assert_eq!(index(&board), vec![(1, "r1"), (2, "r2"), (3, "r3")]);
        assert_eq!(board.tasks["r1"].status.as_str(), "In Progress");
        assert_eq!(board.tasks["r1"].local_id, Some(1));
        assert_eq!(board.tasks["r2"].status.as_str(), "Stuck");
        assert_eq!(board.tasks["r3"].local_id, Some(3));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut board = BoardCache::from_full_fetch(vec![task("r1", "Done")], vec![]).unwrap();
        let sprint = vec![task("r1", "Stuck"), task("r9", "Done"), task("r7", "")];

        board.merge(sprint.clone(), vec![]).unwrap();
        let mut once = board.clone();

        let report = board.merge(sprint, vec![]).unwrap();
        assert_eq!(report, MergeReport { updated: 3, inserted: 0 });

        once.refreshed_at = board.refreshed_at;
        assert_eq!(board, once);
    }

    #[test]
    fn merge_into_empty_board_starts_at_one() {
        let mut board = BoardCache::new();
        board.merge(vec![task("x", ""), task("y", "")], vec![]).unwrap();
        assert_eq!(index(&board), vec![(1, "x"), (2, "y")]);
    }

    #[test]
    fn merge_ignores_incoming_local_ids() {
        let mut board = BoardCache::from_full_fetch(vec![task("r1", "")], vec![]).unwrap();
        let mut stale = task("r1", "Done");
        stale.local_id = Some(42);
        let mut fresh = task("r2", "");
        fresh.local_id = Some(1);
        board.merge(vec![stale, fresh], vec![]).unwrap();
        assert_eq!(index(&board), vec![(1, "r1"), (2, "r2")]);
        board.check_integrity().unwrap();
    }

    #[test]
    fn new_ids_never_reuse_gaps() {
        let mut board = BoardCache::from_full_fetch(
            vec![task("a", ""), task("b", ""), task("c", "")],
            vec![],
        )
        .unwrap();
        // Simulate a removal leaving a gap at 2.
        board.local_ids.remove(&2);
        board.tasks.remove("b");
        board.merge(vec![task("d", "")], vec![]).unwrap();
        assert_eq!(index(&board), vec![(1, "a"), (3, "c"), (4, "d")]);

        // Freeing the highest ID does not make it available again.
        board.local_ids.remove(&4);
        board.tasks.remove("d");
        board.merge(vec![task("e", "")], vec![]).unwrap();
        assert_eq!(board.local_id_of("e"), Some(5));
    }

    #[test]
    fn merge_records_sprint_labels_and_raw_items() {
        let mut board = BoardCache::new();
        let mut t = task("r1", "");
        t.sprint = "Sprint 7".into();
        let raw = Item {
            id: "r1".into(),
            name: "Task r1".into(),
            column_values: vec![],
            updated_at: None,
        };
        board.merge(vec![t, task("r2", "")], vec![raw]).unwrap();
        assert_eq!(board.sprints, vec!["Sprint 7"]);
        assert!(board.raw_items.contains_key("r1"));
    }

    #[test]
    fn get_reports_dangling_index_entries() {
        let mut board = BoardCache::from_full_fetch(vec![task("r1", "")], vec![]).unwrap();
        assert_eq!(board.get(1).unwrap().unwrap().id, "r1");
        assert!(board.get(2).is_none());

        board.tasks.remove("r1");
        assert!(matches!(
            board.get(1),
            Some(Err(StoreError::DanglingLocalId { local_id: 1, .. }))
        ));
        assert!(board.check_integrity().is_err());
    }

    #[test]
    fn replace_keeps_local_id_and_rejects_other_items() {
        let mut board =
            BoardCache::from_full_fetch(vec![task("r1", ""), task("r2", "")], vec![]).unwrap();

        let updated = task("r2", "Done");
        assert_eq!(board.replace(2, updated, None).unwrap(), Some(()));
        assert_eq!(board.tasks["r2"].status.as_str(), "Done");
        assert_eq!(board.tasks["r2"].local_id, Some(2));

        assert!(matches!(
            board.replace(1, task("r2", ""), None),
            Err(StoreError::RemoteIdMismatch { local_id: 1, .. })
        ));
        assert_eq!(board.replace(9, task("r9", ""), None).unwrap(), None);
    }

    #[test]
    fn replace_refreshes_sprints_and_raw_item() {
        let mut first = task("r1", "");
        first.sprint = "Sprint 1".into();
        let mut board = BoardCache::from_full_fetch(vec![first], vec![]).unwrap();
        assert_eq!(board.sprints, vec!["Sprint 1"]);

        let mut moved = task("r1", "");
        moved.sprint = "Sprint 2".into();
        let raw = Item {
            id: "r1".into(),
            name: "Task r1".into(),
            column_values: vec![],
            updated_at: None,
        };
        board.replace(1, moved, Some(raw)).unwrap();
        assert_eq!(board.sprints, vec!["Sprint 2"]);
        assert!(board.raw_items.contains_key("r1"));
    }

    #[test]
    fn pinned_zero_local_id_is_rejected() {
        let mut zero = task("r1", "");
        zero.local_id = Some(0);
        let err = BoardCache::from_full_fetch(vec![zero], vec![]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidLocalId { .. }));
    }

    #[test]
    fn exhausted_local_ids_are_an_error_not_an_overflow() {
        let mut last = task("r1", "");
        last.local_id = Some(u32::MAX);
        let mut board = BoardCache::from_full_fetch(vec![last], vec![]).unwrap();
        assert!(matches!(board.next_local_id(), Err(StoreError::LocalIdsExhausted)));

        let before = board.clone();
        let err = board.merge(vec![task("r2", "")], vec![]).unwrap_err();
        assert!(matches!(err, StoreError::LocalIdsExhausted));
        assert_eq!(board.local_ids, before.local_ids);
    }
}
