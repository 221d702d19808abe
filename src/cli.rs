use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::config::{self, AppConfig};
use crate::filter::{FilterDimension, ListKind};
use crate::mapping::{ColumnMapper, TaskEdits};
use crate::output;
use crate::providers::{BoardApi, MondayClient};
use crate::store::{self, TaskStore};
use crate::tasks;

/// Command line split into positional words and `-flag value` pairs.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub positional: Vec<String>,
    pub flags: Vec<(String, String)>,
}

/// Re-join words of a quoted value that arrived split, e.g. `"in` `progress"`.
pub fn join_quoted(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut open: Option<(char, Vec<String>)> = None;

    for arg in args {
        if let Some((quote, mut parts)) = open.take() {
            if let Some(last) = arg.strip_suffix(quote) {
                parts.push(last.to_string());
                out.push(parts.join(" "));
            } else {
                parts.push(arg.clone());
                open = Some((quote, parts));
            }
            continue;
        }
        let quote = match arg.chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                out.push(arg.clone());
                continue;
            }
        };
        let body = &arg[quote.len_utf8()..];
        match body.strip_suffix(quote) {
            Some(inner) => out.push(inner.to_string()),
            None => open = Some((quote, vec![body.to_string()])),
        }
    }
    // Unterminated quote: keep what we have.
    if let Some((_, parts)) = open {
        out.push(parts.join(" "));
    }
    out
}

fn is_flag(arg: &str) -> bool {
    arg.len() > 1 && arg.starts_with('-') && !arg[1..].starts_with(|c: char| c.is_ascii_digit())
}

pub fn parse_args(args: &[String]) -> Result<ParsedArgs> {
    let args = join_quoted(args);
    let mut parsed = ParsedArgs::default();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        if is_flag(arg) {
            i += 1;
            match args.get(i) {
                Some(value) if !is_flag(value) => {
                    parsed.flags.push((arg.clone(), value.clone()));
                }
                _ => bail!("Missing value for {arg} flag"),
            }
        } else {
            parsed.positional.push(arg.clone());
        }
        i += 1;
    }
    Ok(parsed)
}

pub fn status_value(input: &str) -> Option<&'static str> {
    match input.to_lowercase().as_str() {
        "done" | "d" => Some("Done"),
        "in progress" | "p" => Some("In Progress"),
        "stuck" | "s" => Some("Stuck"),
        "waiting for review" | "r" => Some("Waiting for review"),
        "ready for testing" | "t" => Some("Ready for testing"),
        "removed" | "rm" => Some("Removed"),
        _ => None,
    }
}

pub fn priority_value(input: &str) -> Option<&'static str> {
    match input.to_lowercase().as_str() {
        "critical" | "c" => Some("Critical"),
        "high" | "h" => Some("High"),
        "medium" | "m" => Some("Medium"),
        "low" | "l" => Some("Low"),
        _ => None,
    }
}

pub fn type_value(input: &str) -> Option<&'static str> {
    match input.to_lowercase().as_str() {
        "bug" | "b" => Some("Bug"),
        "feature" | "f" => Some("Feature"),
        "test" | "t" => Some("Test"),
        "security" | "s" => Some("Security"),
        "quality" | "q" => Some("Quality"),
        _ => None,
    }
}

/// Validate every `-status/-priority/-type` flag up front.
pub fn parse_edits(flags: &[(String, String)]) -> Result<TaskEdits> {
    let mut edits = TaskEdits::default();
    for (flag, value) in flags {
        match flag.trim_start_matches('-') {
            "status" | "s" => {
                let Some(status) = status_value(value) else {
                    bail!("Invalid status: {value}\nValid values: done(d), in progress(p), stuck(s), waiting for review(r), ready for testing(t), removed(rm)");
                };
                edits.status = Some(status.to_string());
            }
            "priority" | "p" => {
                let Some(priority) = priority_value(value) else {
                    bail!("Invalid priority: {value}\nValid values: critical(c), high(h), medium(m), low(l)");
                };
                edits.priority = Some(priority.to_string());
            }
            "type" | "t" => {
                let Some(kind) = type_value(value) else {
                    bail!("Invalid type: {value}\nValid values: bug(b), feature(f), test(t), security(s), quality(q)");
                };
                edits.kind = Some(kind.to_string());
            }
            _ => bail!("Unknown flag: {flag}"),
        }
    }
    Ok(edits)
}

pub fn parse_local_id(input: &str) -> Result<u32> {
    match input.parse::<u32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => bail!("Invalid task ID: {input}. Task IDs are the numbers shown by `tasks list`"),
    }
}

fn parse_filter_target(dimension: &str, list: &str) -> Result<(FilterDimension, ListKind)> {
    Ok((dimension.parse()?, list.parse()?))
}

/// One invocation's state: config, cache location and API client.
pub struct Session {
    pub config: AppConfig,
    config_path: PathBuf,
    store_path: PathBuf,
    api: Option<Box<dyn BoardApi>>,
    mapper: ColumnMapper,
}

impl Session {
    pub fn load() -> Result<Self> {
        let config_path = config::config_path();
        let config = config::load_from(&config_path)?;
        Ok(Self::new(config, config_path, store::default_cache_path()))
    }

    pub fn new(config: AppConfig, config_path: PathBuf, store_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
            store_path,
            api: None,
            mapper: ColumnMapper::default(),
        }
    }

    pub fn with_api(mut self, api: Box<dyn BoardApi>) -> Self {
        self.api = Some(api);
        self
    }

    fn api(&mut self) -> Result<&dyn BoardApi> {
        if self.api.is_none() {
            let client = MondayClient::new(
                self.config.require_api_key()?.to_string(),
                self.config.base_url.clone(),
                self.config.timeout(),
            )?;
            self.api = Some(Box::new(client));
        }
        match self.api.as_deref() {
            Some(api) => Ok(api),
            None => bail!("API client unavailable"),
        }
    }

    fn open_store(&self) -> Result<TaskStore> {
        Ok(TaskStore::open(&self.store_path)?)
    }

    fn save_config(&self) -> Result<()> {
        self.config.save_to(&self.config_path)
    }

    pub async fn run(&mut self, args: &[String]) -> Result<()> {
        let parsed = parse_args(args)?;
        let words: Vec<&str> = parsed.positional.iter().map(String::as_str).collect();
        let (command, rest) = match words.split_first() {
            Some((command, rest)) => (*command, rest),
            None => {
                print_help();
                return Ok(());
            }
        };
        if !parsed.flags.is_empty() && !matches!(command, "task" | "t") {
            bail!("Flags are only accepted by `task edit` and `task create`");
        }

        match command {
            "help" | "h" => {
                print_help();
                Ok(())
            }
            "tasks" | "ts" => self.tasks_command(rest).await,
            "task" | "t" => self.task_command(rest, &parsed.flags).await,
            "user" | "u" => self.user_command(rest).await,
            "config" | "cfg" => self.config_command(rest).await,
            other => bail!("Unknown command: {other}. Run `monday help` for usage"),
        }
    }

    async fn tasks_command(&mut self, args: &[&str]) -> Result<()> {
        match args {
            ["fetch" | "f"] => {
                let board_id = self.config.require_board_id()?.to_string();
                println!("🔍 Fetching tasks in board {board_id}...");
                let mut store = self.open_store()?;
                let mapper = self.mapper.clone();
                let count =
                    tasks::fetch_board_tasks(self.api()?, &mut store, &mapper, &board_id).await?;
                println!("💾 Cached {count} tasks\n");
                self.print_tasks(&store)
            }
            ["sprint", "fetch" | "f"] => {
                self.config.require_board_id()?;
                let sprint_id = self.config.require_sprint_id()?.to_string();
                println!("🔍 Fetching sprint {sprint_id}...");
                let mut store = self.open_store()?;
                let mapper = self.mapper.clone();
                let config = self.config.clone();
                let report =
                    tasks::fetch_sprint_tasks(self.api()?, &mut store, &mapper, &config).await?;
                println!(
                    "💾 Merged sprint: {} updated, {} new\n",
                    report.updated, report.inserted
                );
                self.print_tasks(&store)
            }
            ["list" | "ls"] => {
                let store = self.open_store()?;
                self.print_tasks(&store)
            }
            ["sprints"] => {
                let store = self.open_store()?;
                let sprints = store.sprints(self.config.require_board_id()?)?;
                if sprints.is_empty() {
                    println!("No sprint labels on cached tasks");
                }
                for sprint in sprints {
                    println!("  {sprint}");
                }
                Ok(())
            }
            ["users"] => {
                let store = self.open_store()?;
                for user in store.users(self.config.require_board_id()?)? {
                    println!("  {} <{}> ({})", user.name, user.email, user.id);
                }
                Ok(())
            }
            ["clear"] => {
                let board_id = self.config.require_board_id()?;
                let mut store = self.open_store()?;
                if store.clear(board_id)? {
                    println!("✅ Cleared cached tasks for board {board_id}");
                } else {
                    println!("Nothing cached for board {board_id}");
                }
                Ok(())
            }
            _ => {
                print_tasks_help();
                Ok(())
            }
        }
    }

    fn print_tasks(&self, store: &TaskStore) -> Result<()> {
        let board_id = self.config.require_board_id()?;
        let (tasks, refreshed_at) = tasks::visible_tasks(store, board_id, &self.config.filters)?;
        println!("{}", output::cached_at("Tasks", refreshed_at));
        println!("{}", output::task_list(&tasks));
        Ok(())
    }

    async fn task_command(&mut self, args: &[&str], flags: &[(String, String)]) -> Result<()> {
        match args {
            ["show" | "s", id] => {
                let local_id = parse_local_id(id)?;
                let store = self.open_store()?;
                let (task, refreshed_at) =
                    tasks::show_task(&store, self.config.require_board_id()?, local_id)?;
                println!("{}", output::cached_at("Task", refreshed_at));
                println!("{}", output::task_detail(&task));
                Ok(())
            }
            ["edit" | "e", id] => {
                let local_id = parse_local_id(id)?;
                let edits = parse_edits(flags)?;
                if edits.is_empty() {
                    bail!("No fields to update. Pass at least one of -status, -priority, -type");
                }
                let board_id = self.config.require_board_id()?.to_string();
                let mut store = self.open_store()?;
                let mapper = self.mapper.clone();
                let task =
                    tasks::edit_task(self.api()?, &mut store, &mapper, &board_id, local_id, &edits)
                        .await?;
                println!("✅ Task {local_id} updated");
                println!("{}", output::task_line(&task));
                Ok(())
            }
            ["create" | "c", name @ ..] if !name.is_empty() => {
                let name = name.join(" ");
                let edits = parse_edits(flags)?;
                let board_id = self.config.require_board_id()?.to_string();
                let owner = self.config.user.clone();
                if owner.is_none() {
                    tracing::warn!("No user info configured, task will be unassigned");
                }
                let mut store = self.open_store()?;
                let mapper = self.mapper.clone();
                println!("Creating task: {name}");
                let (local_id, task) = tasks::create_task(
                    self.api()?,
                    &mut store,
                    &mapper,
                    &board_id,
                    &name,
                    &edits,
                    owner.as_ref(),
                )
                .await?;
                println!("✅ Task {} created with ID {local_id}", task.name);
                println!("{}", output::task_line(&task));
                Ok(())
            }
            _ => {
                if !flags.is_empty() {
                    bail!("Flags are only accepted by `task edit` and `task create`");
                }
                print_task_help();
                Ok(())
            }
        }
    }

    async fn user_command(&mut self, args: &[&str]) -> Result<()> {
        match args {
            ["info" | "i"] => {
                println!("🔍 Fetching user information...");
                self.refresh_user().await?;
                Ok(())
            }
            _ => {
                println!("User Commands:");
                println!("  user info (i)   Fetch and save the current user");
                Ok(())
            }
        }
    }

    async fn refresh_user(&mut self) -> Result<()> {
        let user = self
            .api()?
            .fetch_current_user()
            .await
            .context("Failed to fetch user info")?;
        self.config.user = Some(user.clone());
        self.save_config()?;
        if !self.config.board_id.is_empty() {
            let mut store = self.open_store()?;
            tasks::remember_user(&mut store, &self.config.board_id, &user)?;
        }
        println!("💾 User information saved to configuration\n");
        println!("{}", output::user_info(&user));
        Ok(())
    }

    async fn config_command(&mut self, args: &[&str]) -> Result<()> {
        match args {
            ["set-api-key" | "key", key] => {
                self.config.api_key = key.to_string();
                self.api = None;
                self.save_config()?;
                println!("API key set");
                println!("🔍 Fetching user information...");
                if let Err(e) = self.refresh_user().await {
                    eprintln!("❌ {e:#}");
                    println!("You can run `user info` later to fetch user information");
                }
                Ok(())
            }
            ["set-board-id" | "board", id] => {
                self.config.board_id = id.to_string();
                self.save_config()?;
                println!("✅ Board ID set to {id}");
                Ok(())
            }
            ["set-sprint-id" | "sprint", id] => {
                self.config.sprint_id = id.to_string();
                self.save_config()?;
                println!("✅ Sprint ID set to {id}");
                Ok(())
            }
            ["set-sprint-board-id" | "sprint-board", id] => {
                self.config.sprint_board_id = id.to_string();
                self.save_config()?;
                println!("✅ Sprint board ID set to {id}");
                Ok(())
            }
            ["show" | "s"] => {
                println!("{}", output::config_summary(&self.config));
                Ok(())
            }
            ["add-filter" | "addf", dimension, list, value @ ..] if !value.is_empty() => {
                let (dimension, list) = parse_filter_target(dimension, list)?;
                let value = value.join(" ");
                if self.config.filters.add(dimension, list, &value) {
                    self.save_config()?;
                    println!("✅ Added '{value}' to {dimension} {list}");
                } else {
                    println!("'{value}' is already in {dimension} {list}");
                }
                Ok(())
            }
            ["remove-filter" | "remf", dimension, list, value @ ..] if !value.is_empty() => {
                let (dimension, list) = parse_filter_target(dimension, list)?;
                let value = value.join(" ");
                if self.config.filters.remove(dimension, list, &value) {
                    self.save_config()?;
                    println!("✅ Removed '{value}' from {dimension} {list}");
                } else {
                    println!("'{value}' is not in {dimension} {list}");
                }
                Ok(())
            }
            ["clear-filter" | "clrf", dimension, list] => {
                let (dimension, list) = parse_filter_target(dimension, list)?;
                self.config.filters.clear(dimension, list);
                self.save_config()?;
                println!("✅ Cleared {dimension} {list}");
                Ok(())
            }
            ["list-filters" | "listf"] => {
                println!("{}", output::filter_listing(&self.config.filters));
                Ok(())
            }
            ["clear-all-filters" | "clearallf"] => {
                self.config.filters.clear_all();
                self.save_config()?;
                println!("✅ Cleared all filters");
                Ok(())
            }
            ["filter-to-me" | "me"] => {
                self.config.filter_to_me()?;
                self.save_config()?;
                println!("✅ Showing only tasks assigned to you");
                Ok(())
            }
            ["add-me" | "addme"] => {
                self.config.add_me()?;
                self.save_config()?;
                println!("✅ Added you to the user whitelist");
                Ok(())
            }
            ["remove-me" | "removeme"] => {
                self.config.remove_me()?;
                self.save_config()?;
                println!("✅ Removed you from the user whitelist");
                Ok(())
            }
            ["filter-to-sprint", label @ ..] => {
                let label = (!label.is_empty()).then(|| label.join(" "));
                self.config.filter_to_sprint(label.as_deref())?;
                self.save_config()?;
                println!("✅ Showing only tasks in the current sprint");
                Ok(())
            }
            _ => {
                print_config_help();
                Ok(())
            }
        }
    }
}

pub async fn run(args: &[String]) -> Result<()> {
    Session::load()?.run(args).await
}

pub fn print_help() {
    println!("monday: task management for monday.com boards\n");
    println!("USAGE:");
    println!("  monday <command> [args]\n");
    println!("COMMANDS:");
    println!("  tasks (ts)     List and fetch board tasks");
    println!("  task (t)       Show, edit or create a single task");
    println!("  user (u)       Current user information");
    println!("  config (cfg)   Manage configuration and filters");
    println!("  help (h)       Show this help");
    println!();
    print_tasks_help();
    println!();
    print_task_help();
    println!();
    print_config_help();
}

fn print_tasks_help() {
    println!("TASKS:");
    println!("  tasks list (ls)           Show cached tasks, filtered and sorted");
    println!("  tasks fetch (f)           Fetch every task on the board");
    println!("  tasks sprint fetch (f)    Fetch the current sprint and merge it in");
    println!("  tasks sprints             Sprint labels seen on cached tasks");
    println!("  tasks users               Users recorded for the board");
    println!("  tasks clear               Drop the cached tasks");
}

fn print_task_help() {
    println!("TASK:");
    println!("  task show (s) <id>              Show a cached task");
    println!("  task edit (e) <id> [flags]      Update status, priority or type");
    println!("  task create (c) <name> [flags]  Create a task assigned to you");
    println!("  FLAGS:");
    println!("    -status, -s <status>      done(d), in progress(p), stuck(s), waiting for review(r), ready for testing(t), removed(rm)");
    println!("    -priority, -p <priority>  critical(c), high(h), medium(m), low(l)");
    println!("    -type, -t <type>          bug(b), feature(f), test(t), security(s), quality(q)");
}

fn print_config_help() {
    println!("CONFIG:");
    println!("  config set-api-key (key) <key>");
    println!("  config set-board-id (board) <id>");
    println!("  config set-sprint-id (sprint) <group-id>");
    println!("  config set-sprint-board-id (sprint-board) <id>");
    println!("  config show (s)");
    println!("  config add-filter (addf) <type> <whitelist|blacklist> <value>");
    println!("  config remove-filter (remf) <type> <whitelist|blacklist> <value>");
    println!("  config clear-filter (clrf) <type> <whitelist|blacklist>");
    println!("  config list-filters (listf)");
    println!("  config clear-all-filters (clearallf)");
    println!("  config filter-to-me (me)      Show only your tasks");
    println!("  config add-me (addme)         Add yourself to the user whitelist");
    println!("  config remove-me (removeme)   Remove yourself from the user whitelist");
    println!("  config filter-to-sprint [label]");
    println!("  Filter types: status, priority, type, sprint, user_name, user_email");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::MockApi;
    use tempfile::TempDir;

    fn args(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    fn session(dir: &TempDir, api: MockApi) -> Session {
        let config = AppConfig {
            api_key: "test-key".into(),
            board_id: "B1".into(),
            ..AppConfig::default()
        };
        Session::new(
            config,
            dir.path().join("config.toml"),
            dir.path().join("tasks.json"),
        )
        .with_api(Box::new(api))
    }

    #[test]
    fn parse_positional_and_flags() {
        let parsed = parse_args(&args(&["task", "edit", "3", "-s", "d", "--priority", "h"])).unwrap();
        assert_eq!(parsed.positional, vec!["task", "edit", "3"]);
        assert_eq!(
            parsed.flags,
            vec![
                ("-s".to_string(), "d".to_string()),
                ("--priority".to_string(), "h".to_string())
            ]
        );
    }

    #[test]
    fn parse_missing_flag_value_fails() {
        let result = parse_args(&args(&["task", "edit", "3", "-s"]));
        assert!(result.unwrap_err().to_string().contains("Missing value"));
        assert!(parse_args(&args(&["task", "edit", "3", "-s", "-p", "h"])).is_err());
    }

    #[test]
    fn negative_numbers_are_not_flags() {
        let parsed = parse_args(&args(&["task", "show", "-1"])).unwrap();
        assert_eq!(parsed.positional, vec!["task", "show", "-1"]);
        assert!(parse_local_id("-1").is_err());
    }

    #[test]
    fn quoted_words_are_rejoined() {
        assert_eq!(
            join_quoted(&args(&["-s", "\"in", "progress\"", "'x'"])),
            vec!["-s", "in progress", "x"]
        );
        assert_eq!(join_quoted(&args(&["\"never", "closed"])), vec!["never closed"]);
        assert_eq!(join_quoted(&args(&["plain"])), vec!["plain"]);
    }

    #[test]
    fn parse_unicode_words() {
        let parsed = parse_args(&args(&["task", "create", "修复登录", "bug", "🐛"])).unwrap();
        assert_eq!(parsed.positional[2..].join(" "), "修复登录 bug 🐛");
    }

    #[test]
    fn shorthands_expand_to_labels() {
        assert_eq!(status_value("d"), Some("Done"));
        assert_eq!(status_value("In Progress"), Some("In Progress"));
        assert_eq!(status_value("rm"), Some("Removed"));
        assert_eq!(priority_value("c"), Some("Critical"));
        assert_eq!(type_value("q"), Some("Quality"));
        assert_eq!(type_value("s"), Some("Security"));
        assert_eq!(status_value("nope"), None);
    }

    #[test]
    fn parse_edits_validates_every_flag() {
        let flags = vec![
            ("-status".to_string(), "p".to_string()),
            ("-t".to_string(), "b".to_string()),
        ];
        let edits = parse_edits(&flags).unwrap();
        assert_eq!(edits.status.as_deref(), Some("In Progress"));
        assert_eq!(edits.kind.as_deref(), Some("Bug"));
        assert_eq!(edits.priority, None);

        let bad = vec![("-p".to_string(), "urgent".to_string())];
        assert!(parse_edits(&bad).unwrap_err().to_string().contains("Invalid priority"));
        let unknown = vec![("-x".to_string(), "1".to_string())];
        assert!(parse_edits(&unknown).unwrap_err().to_string().contains("Unknown flag"));
    }

    #[test]
    fn local_ids_must_be_positive() {
        assert_eq!(parse_local_id("12").unwrap(), 12);
        assert!(parse_local_id("0").is_err());
        assert!(parse_local_id("abc").is_err());
    }

    #[tokio::test]
    async fn filter_commands_persist_config() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, MockApi::new("B1"));

        s.run(&args(&["config", "addf", "status", "blacklist", "\"Waiting", "for", "review\""]))
            .await
            .unwrap();
        s.run(&args(&["cfg", "add-filter", "priority", "whitelist", "High"]))
            .await
            .unwrap();
        let saved = config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(saved.filters.status_blacklist, vec!["waiting for review"]);
        assert_eq!(saved.filters.priority_whitelist, vec!["high"]);

        s.run(&args(&["config", "clrf", "priority", "whitelist"]))
            .await
            .unwrap();
        s.run(&args(&["config", "remf", "status", "blacklist", "waiting for review"]))
            .await
            .unwrap();
        let saved = config::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(saved.filters.is_empty());
    }

    #[tokio::test]
    async fn invalid_filter_type_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, MockApi::new("B1"));
        let err = s
            .run(&args(&["config", "addf", "colour", "whitelist", "red"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid filter type"));
        assert!(s.config.filters.is_empty());
        assert!(!dir.path().join("config.toml").exists());
    }

    #[tokio::test]
    async fn user_info_enables_filter_to_me() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, MockApi::new("B1"));

        assert!(s.run(&args(&["config", "me"])).await.is_err());
        s.run(&args(&["user", "info"])).await.unwrap();
        s.run(&args(&["config", "me"])).await.unwrap();

        assert_eq!(s.config.filters.user_name_whitelist, vec!["ada lovelace"]);
        let saved = config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(saved.user.map(|u| u.id), Some("77".to_string()));
    }

    #[tokio::test]
    async fn fetch_edit_and_create_through_commands() {
        let dir = TempDir::new().unwrap();
        let api = MockApi::new("B1")
            .with_item("r1", "Write docs", "Done")
            .with_item("r2", "Fix login", "Stuck");
        let updates = api.updates.clone();
        let mut s = session(&dir, api);

        s.run(&args(&["tasks", "f"])).await.unwrap();
        s.run(&args(&["tasks", "ls"])).await.unwrap();
        s.run(&args(&["t", "s", "2"])).await.unwrap();
        s.run(&args(&["tasks", "sprints"])).await.unwrap();
        s.run(&args(&["task", "edit", "2", "-s", "d"])).await.unwrap();
        assert_eq!(updates.lock().unwrap().len(), 1);

        s.run(&args(&["task", "c", "New", "thing", "-p", "h"])).await.unwrap();
        let store = TaskStore::open(dir.path().join("tasks.json")).unwrap();
        let (task, _) = store.get_by_local_id("B1", 3).unwrap();
        assert_eq!(task.name, "New thing");
        assert_eq!(task.priority.as_str(), "High");
        assert_eq!(store.get_by_local_id("B1", 2).unwrap().0.status.as_str(), "Done");
    }

    #[tokio::test]
    async fn invalid_edit_flag_makes_no_remote_call() {
        let dir = TempDir::new().unwrap();
        let api = MockApi::new("B1").with_item("r1", "Write docs", "Stuck");
        let updates = api.updates.clone();
        let mut s = session(&dir, api);
        s.run(&args(&["tasks", "fetch"])).await.unwrap();

        let err = s
            .run(&args(&["task", "edit", "1", "-s", "d", "-p", "urgent"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid priority"));
        assert!(updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_command_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, MockApi::new("B1"));
        assert!(s.run(&args(&["frobnicate"])).await.is_err());
        assert!(s.run(&args(&["config", "show", "-x", "1"])).await.is_err());
        s.run(&args(&[])).await.unwrap();
    }

    #[tokio::test]
    async fn tasks_list_before_fetch_explains_what_to_do() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, MockApi::new("B1"));
        let err = s.run(&args(&["tasks", "list"])).await.unwrap_err();
        assert!(err.to_string().contains("tasks fetch"));
    }
}
