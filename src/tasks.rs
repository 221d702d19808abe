//! Command pipelines: remote fetch, mapping, cache, filter and order
//! composed for each task command.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::filter::Filters;
use crate::mapping::{owner_value, ColumnMapper, ColumnRole, TaskEdits};
use crate::model::item::User;
use crate::model::task::Task;
use crate::ordering::ordered;
use crate::providers::BoardApi;
use crate::store::{MergeReport, TaskStore};

/// Replace the board cache with every item on the board.
pub async fn fetch_board_tasks(
    api: &dyn BoardApi,
    store: &mut TaskStore,
    mapper: &ColumnMapper,
    board_id: &str,
) -> Result<usize> {
    let board = api
        .fetch_board(board_id)
        .await
        .context("Failed to fetch board")?;
    let items = api.fetch_board_items(board_id).await?;
    let tasks = mapper.to_tasks(&items, &board.columns);
    let count = tasks.len();
    store.store_full_fetch(board_id, tasks, items)?;
    Ok(count)
}

/// Merge the configured sprint's items into the main board cache.
pub async fn fetch_sprint_tasks(
    api: &dyn BoardApi,
    store: &mut TaskStore,
    mapper: &ColumnMapper,
    config: &AppConfig,
) -> Result<MergeReport> {
    let board_id = config.require_board_id()?;
    let sprint_id = config.require_sprint_id()?;
    let sprint_board = config.sprint_board();

    let board = api
        .fetch_board(sprint_board)
        .await
        .context("Failed to fetch sprint board")?;
    let items = api.fetch_sprint_items(sprint_board, sprint_id).await?;
    let tasks = mapper.to_tasks(&items, &board.columns);
    Ok(store.merge_sprint_fetch(board_id, tasks, items)?)
}

/// Cached tasks that pass `filters`, in display order.
pub fn visible_tasks(
    store: &TaskStore,
    board_id: &str,
    filters: &Filters,
) -> Result<(Vec<Task>, DateTime<Utc>)> {
    let (tasks, refreshed_at) = store.get_all(board_id)?;
    let mut tasks: Vec<Task> = tasks.values().cloned().collect();
    tasks.sort_by_key(|t| t.local_id);
    Ok((ordered(filters.apply(tasks)), refreshed_at))
}

pub fn show_task(store: &TaskStore, board_id: &str, local_id: u32) -> Result<(Task, DateTime<Utc>)> {
    let (task, refreshed_at) = store.get_by_local_id(board_id, local_id)?;
    Ok((task.clone(), refreshed_at))
}

/// Write `edits` to the item behind `local_id`, then refresh the cached
/// copy from the service. The local ID does not change.
pub async fn edit_task(
    api: &dyn BoardApi,
    store: &mut TaskStore,
    mapper: &ColumnMapper,
    board_id: &str,
    local_id: u32,
    edits: &TaskEdits,
) -> Result<Task> {
    if edits.is_empty() {
        bail!("Nothing to update. Pass at least one of -status, -priority, -type");
    }
    let (task, _) = show_task(store, board_id, local_id)?;

    let board = api
        .fetch_board(board_id)
        .await
        .context("Failed to fetch board")?;
    let values = edits.to_column_values(mapper, &board.columns);
    if values.is_empty() {
        bail!("None of the requested fields have a matching column on board {board_id}");
    }
    api.update_item_columns(board_id, &task.id, &values).await?;

    // The remote change has landed; a failed re-fetch must not lose it.
    match api.fetch_item(&task.id).await {
        Ok(item) => {
            let updated = mapper.to_task(&item, &board.columns);
            store.update_item_by_local_id(board_id, local_id, updated, item)?;
        }
        Err(e) => {
            tracing::warn!(
                board_id,
                local_id,
                error = %format!("{e:#}"),
                "Task updated but re-fetch failed, applying edits to cached copy"
            );
            let mut updated = task.clone();
            edits.apply_to(&mut updated);
            store.update_by_local_id(board_id, local_id, updated)?;
        }
    }
    tracing::info!(board_id, local_id, item_id = %task.id, "Updated task");
    Ok(show_task(store, board_id, local_id)?.0)
}

/// Create an item, assign it to `owner` when the board has a people
/// column, and add it to the cache under a fresh local ID.
pub async fn create_task(
    api: &dyn BoardApi,
    store: &mut TaskStore,
    mapper: &ColumnMapper,
    board_id: &str,
    name: &str,
    edits: &TaskEdits,
    owner: Option<&User>,
) -> Result<(u32, Task)> {
    if name.trim().is_empty() {
        bail!("Task name must not be empty");
    }
    let board = api
        .fetch_board(board_id)
        .await
        .context("Failed to fetch board")?;
    let mut values = edits.to_column_values(mapper, &board.columns);
    if let Some(owner) = owner {
        match mapper.find_column(&board.columns, ColumnRole::Person) {
            Some(column) => {
                values.insert(column.id.clone(), owner_value(&owner.id));
            }
            None => tracing::warn!(board_id, "No people column on board, task left unassigned"),
        }
    }

    let item_id = api.create_item(board_id, name, &values).await?;
    let item = api
        .fetch_item(&item_id)
        .await
        .context("Failed to fetch created task")?;
    let local_id = store.insert_task(board_id, mapper.to_task(&item, &board.columns))?;
    tracing::info!(board_id, local_id, %item_id, "Created task");
    Ok((local_id, show_task(store, board_id, local_id)?.0))
}

/// Record `user` on the board cache if the board has been fetched.
pub fn remember_user(store: &mut TaskStore, board_id: &str, user: &User) -> Result<()> {
    if board_id.is_empty() || store.get_all(board_id).is_err() {
        return Ok(());
    }
    store.store_users(board_id, vec![user.clone()])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::filter::{FilterDimension, ListKind};
    use crate::providers::tests::MockApi;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> TaskStore {
        TaskStore::open(dir.path().join("tasks.json")).unwrap()
    }

    fn mock() -> MockApi {
        MockApi::new("B1")
            .with_item("r1", "Write docs", "Done")
            .with_item("r2", "Fix login", "Stuck")
    }

    fn ids(tasks: &[Task]) -> Vec<u32> {
        tasks.iter().filter_map(|t| t.local_id).collect()
    }

    #[tokio::test]
    async fn full_fetch_populates_cache_in_board_order() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let api = mock();

        let count = fetch_board_tasks(&api, &mut store, &ColumnMapper::default(), "B1")
            .await
            .unwrap();
        assert_eq!(count, 2);

        let (task, _) = show_task(&store, "B1", 2).unwrap();
        assert_eq!(task.id, "r2");
        assert_eq!(task.status.as_str(), "Stuck");
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_alone() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let api = MockApi::new("B1").with_failure();

        assert!(fetch_board_tasks(&api, &mut store, &ColumnMapper::default(), "B1")
            .await
            .is_err());
        assert!(matches!(
            store.get_all("B1").unwrap_err(),
            StoreError::BoardNotCached(_)
        ));
    }

    #[tokio::test]
    async fn sprint_fetch_merges_into_main_board() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mapper = ColumnMapper::default();
        let api = mock().with_sprint("sprint_7", &["r1", "r3"]);
        fetch_board_tasks(&api, &mut store, &mapper, "B1").await.unwrap();

        api.items
            .lock()
            .unwrap()
            .push(crate::providers::tests::item("r3", "New work", &[("status", "Done")]));
        api.set_status("r1", "In Progress");

        let config = AppConfig {
            board_id: "B1".into(),
            sprint_id: "sprint_7".into(),
            ..AppConfig::default()
        };
        let report = fetch_sprint_tasks(&api, &mut store, &mapper, &config)
            .await
            .unwrap();
        assert_eq!(report, MergeReport { updated: 1, inserted: 1 });

        assert_eq!(show_task(&store, "B1", 1).unwrap().0.status.as_str(), "In Progress");
        assert_eq!(show_task(&store, "B1", 2).unwrap().0.status.as_str(), "Stuck");
        assert_eq!(show_task(&store, "B1", 3).unwrap().0.id, "r3");

        // Same sprint again: nothing new.
        let report = fetch_sprint_tasks(&api, &mut store, &mapper, &config)
            .await
            .unwrap();
        assert_eq!(report, MergeReport { updated: 2, inserted: 0 });
    }

    #[tokio::test]
    async fn sprint_fetch_requires_sprint_id() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let config = AppConfig {
            board_id: "B1".into(),
            ..AppConfig::default()
        };
        assert!(fetch_sprint_tasks(&mock(), &mut store, &ColumnMapper::default(), &config)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn visible_tasks_filters_then_orders() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let api = mock()
            .with_item("r3", "Triage", "Removed")
            .with_item("r4", "Review", "In Progress");
        fetch_board_tasks(&api, &mut store, &ColumnMapper::default(), "B1")
            .await
            .unwrap();

        let (tasks, _) = visible_tasks(&store, "B1", &Filters::default()).unwrap();
        assert_eq!(ids(&tasks), vec![1, 4, 2, 3]);

        let mut filters = Filters::default();
        filters.add(FilterDimension::Status, ListKind::Blacklist, "removed");
        filters.add(FilterDimension::Status, ListKind::Blacklist, "done");
        let (tasks, _) = visible_tasks(&store, "B1", &filters).unwrap();
        assert_eq!(ids(&tasks), vec![4, 2]);
    }

    #[tokio::test]
    async fn edit_updates_remote_and_cache_keeping_local_id() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mapper = ColumnMapper::default();
        let api = mock();
        fetch_board_tasks(&api, &mut store, &mapper, "B1").await.unwrap();

        let edits = TaskEdits {
            status: Some("Done".into()),
            priority: Some("High".into()),
            ..TaskEdits::default()
        };
        let task = edit_task(&api, &mut store, &mapper, "B1", 2, &edits)
            .await
            .unwrap();
        assert_eq!(task.local_id, Some(2));
        assert_eq!(task.status.as_str(), "Done");
        assert_eq!(task.priority.as_str(), "High");

        let updates = api.updates.lock().unwrap();
        assert_eq!(updates[0].0, "r2");
        assert_eq!(updates[0].1["status"]["label"], "Done");

        let reopened = open_store(&dir);
        assert_eq!(show_task(&reopened, "B1", 2).unwrap().0.status.as_str(), "Done");
    }

    #[tokio::test]
    async fn edit_keeps_remote_change_when_refetch_fails() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mapper = ColumnMapper::default();
        let api = mock();
        fetch_board_tasks(&api, &mut store, &mapper, "B1").await.unwrap();

        let api = api.with_item_fetch_failure();
        let edits = TaskEdits {
            status: Some("Done".into()),
            ..TaskEdits::default()
        };
        let task = edit_task(&api, &mut store, &mapper, "B1", 2, &edits)
            .await
            .unwrap();
        assert_eq!(task.status.as_str(), "Done");
        assert_eq!(task.name, "Fix login");
        assert_eq!(api.updates.lock().unwrap().len(), 1);

        let reopened = open_store(&dir);
        assert_eq!(show_task(&reopened, "B1", 2).unwrap().0.status.as_str(), "Done");
    }

    #[tokio::test]
    async fn edit_unknown_local_id_makes_no_remote_call() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mapper = ColumnMapper::default();
        let api = mock();
        fetch_board_tasks(&api, &mut store, &mapper, "B1").await.unwrap();

        let edits = TaskEdits {
            status: Some("Done".into()),
            ..TaskEdits::default()
        };
        assert!(edit_task(&api, &mut store, &mapper, "B1", 9, &edits)
            .await
            .is_err());
        assert!(edit_task(&api, &mut store, &mapper, "B1", 1, &TaskEdits::default())
            .await
            .is_err());
        assert!(api.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_assigns_next_local_id_and_owner() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let mapper = ColumnMapper::default();
        let api = mock();
        fetch_board_tasks(&api, &mut store, &mapper, "B1").await.unwrap();

        let edits = TaskEdits {
            kind: Some("Bug".into()),
            ..TaskEdits::default()
        };
        let owner = api.user.clone();
        let (local_id, task) = create_task(
            &api,
            &mut store,
            &mapper,
            "B1",
            "Crash on save",
            &edits,
            Some(&owner),
        )
        .await
        .unwrap();

        assert_eq!(local_id, 3);
        assert_eq!(task.name, "Crash on save");
        assert_eq!(task.kind.as_str(), "Bug");

        let created = api.created.lock().unwrap();
        let values = &created[0].1;
        assert_eq!(values["task_owner"]["personsAndTeams"][0]["id"], 77);
        assert_eq!(values["task_type"]["label"], "Bug");
    }

    #[tokio::test]
    async fn create_on_uncached_board_starts_at_one() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let api = MockApi::new("B1");
        let (local_id, _) = create_task(
            &api,
            &mut store,
            &ColumnMapper::default(),
            "B1",
            "First",
            &TaskEdits::default(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(local_id, 1);
    }

    #[tokio::test]
    async fn remember_user_only_touches_cached_boards() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        let api = mock();
        let user = api.fetch_current_user().await.unwrap();

        remember_user(&mut store, "B1", &user).unwrap();
        assert!(store.get_all("B1").is_err());

        fetch_board_tasks(&api, &mut store, &ColumnMapper::default(), "B1")
            .await
            .unwrap();
        remember_user(&mut store, "B1", &user).unwrap();
        assert_eq!(store.users("B1").unwrap()[0].email, "ada@example.com");
    }
}
