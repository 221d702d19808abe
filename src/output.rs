use chrono::{DateTime, Utc};
use crossterm::style::{Color, Stylize};
use std::fmt::Write;

use crate::config::{mask_api_key, AppConfig};
use crate::filter::{FilterDimension, Filters, ListKind};
use crate::model::item::User;
use crate::model::task::Task;

const RULE_WIDTH: usize = 50;

/// First entry whose needles occur in the lower-cased `value`.
fn lookup<T: Copy>(value: &str, table: &[(&[&str], T)], fallback: T) -> T {
    let value = value.to_lowercase();
    table
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| value.contains(n)))
        .map_or(fallback, |(_, found)| *found)
}

pub fn status_color(status: &str) -> Color {
    lookup(
        status,
        &[
            (&["done", "completed"], Color::Green),
            (&["progress"], Color::Blue),
            (&["review"], Color::Magenta),
            (&["stuck", "blocked"], Color::Red),
            (&["testing"], Color::Cyan),
            (&["not started", "removed"], Color::DarkGrey),
        ],
        Color::White,
    )
}

pub fn priority_color(priority: &str) -> Color {
    lookup(
        priority,
        &[
            (&["critical"], Color::Red),
            (&["high"], Color::Yellow),
            (&["medium"], Color::Blue),
            (&["low"], Color::Green),
        ],
        Color::White,
    )
}

pub fn status_icon(status: &str) -> &'static str {
    lookup(
        status,
        &[
            (&["done", "completed"], "✅"),
            (&["progress"], "🔄"),
            (&["stuck", "blocked"], "🚫"),
            (&["review"], "👀"),
            (&["testing", "not started"], "🧪"),
            (&["removed"], "🗑️"),
        ],
        "📋",
    )
}

pub fn type_icon(kind: &str) -> &'static str {
    lookup(
        kind,
        &[
            (&["bug"], "🐛"),
            (&["feature"], "✨"),
            (&["test"], "🧪"),
            (&["security"], "🔒"),
            (&["quality", "improvement"], "📈"),
        ],
        "📝",
    )
}

/// Center a priority label in a fixed-width cell so columns line up.
fn pad_priority(priority: &str) -> String {
    format!(" {priority:^8} ")
}

fn rule(c: char) -> String {
    std::iter::repeat(c).take(RULE_WIDTH + 1).collect()
}

pub fn task_line(task: &Task) -> String {
    let local_id = task
        .local_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".into());
    let priority = task.priority.as_str();
    format!(
        "{local_id:>4}. {} [{}] {}, ({}, {})",
        type_icon(task.kind.as_str()),
        pad_priority(priority).with(priority_color(priority)),
        task.name,
        task.user_name,
        task.user_email,
    )
}

/// Tasks grouped under a header per status run, followed by the active count.
/// Expects `tasks` already ordered.
pub fn task_list(tasks: &[Task]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "👤 Found {} tasks matching filters:", tasks.len());

    let mut current: Option<&str> = None;
    for task in tasks {
        let status = task.status.as_str();
        if current != Some(status) {
            current = Some(status);
            let label = if status.is_empty() { "None" } else { status };
            let _ = writeln!(
                out,
                "\n{} {}",
                status_icon(status),
                label.with(status_color(status))
            );
        }
        let _ = writeln!(out, "{}", task_line(task));
    }

    let active = tasks.iter().filter(|t| t.is_active()).count();
    let _ = writeln!(out, "{}", rule('='));
    let _ = write!(out, "📊 Active tasks: {active}");
    out
}

pub fn task_detail(task: &Task) -> String {
    let mut out = task_line(task);
    let field = |out: &mut String, name: &str, value: &str| {
        if !value.is_empty() {
            let _ = write!(out, "\n      {name}: {value}");
        }
    };
    field(&mut out, "Status", task.status.as_str());
    field(&mut out, "Type", task.kind.as_str());
    field(&mut out, "Sprint", &task.sprint);
    field(&mut out, "Item ID", &task.id);
    if let Some(updated_at) = task.updated_at {
        field(&mut out, "Updated", &updated_at.to_rfc3339());
    }
    out
}

pub fn cached_at(label: &str, timestamp: DateTime<Utc>) -> String {
    format!("{label} cached at: {}", timestamp.to_rfc3339())
}

pub fn user_info(user: &User) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "👤 User Information");
    let _ = writeln!(out, "{}", rule('-'));
    let _ = writeln!(out, "🆔 ID: {}", user.id);
    let _ = writeln!(out, "👤 Name: {}", user.name);
    let _ = writeln!(out, "📧 Email: {}", user.email);
    if let Some(title) = user.title.as_deref().filter(|t| !t.is_empty()) {
        let _ = writeln!(out, "💼 Title: {title}");
    }
    let _ = write!(out, "{}", rule('='));
    out
}

fn list_or_empty(values: &[String]) -> String {
    if values.is_empty() {
        "(empty)".into()
    } else {
        values.join(", ")
    }
}

pub fn filter_listing(filters: &Filters) -> String {
    let mut out = String::from("Current filters:");
    for dimension in FilterDimension::ALL {
        let _ = write!(out, "\n\n{dimension}:");
        let _ = write!(
            out,
            "\n  ✅ Whitelist: {}",
            list_or_empty(filters.values(dimension, ListKind::Whitelist))
        );
        let _ = write!(
            out,
            "\n  ❌ Blacklist: {}",
            list_or_empty(filters.values(dimension, ListKind::Blacklist))
        );
    }
    out
}

pub fn config_summary(config: &AppConfig) -> String {
    let or_unset = |v: &str| {
        if v.is_empty() {
            "(not set)".to_string()
        } else {
            v.to_string()
        }
    };
    let mut out = String::from("Current configuration:");
    let _ = write!(out, "\n  API key: {}", or_unset(&mask_api_key(&config.api_key)));
    let _ = write!(out, "\n  Base URL: {}", config.base_url);
    let _ = write!(out, "\n  Timeout: {}s", config.timeout_seconds);
    let _ = write!(out, "\n  Board ID: {}", or_unset(&config.board_id));
    let _ = write!(out, "\n  Sprint ID: {}", or_unset(&config.sprint_id));
    let _ = write!(out, "\n  Sprint board ID: {}", or_unset(config.sprint_board()));
    match &config.user {
        Some(user) => {
            let _ = write!(out, "\n  User: {} <{}> ({})", user.name, user.email, user.id);
        }
        None => {
            let _ = write!(out, "\n  User: (not set)");
        }
    }
    out
}
