//! Column role inference.
//!
//! The service has no fixed schema: which column holds the status or the
//! sprint is only discoverable from column IDs and titles. Roles are decided
//! by an ordered list of substring rules, first match wins.

use serde_json::{json, Map, Value};

use crate::model::item::{Column, Item};
use crate::model::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Status,
    Priority,
    Type,
    Sprint,
    UserName,
    UserEmail,
    /// A people column; its text is the assignee's display name.
    Person,
}

impl ColumnRole {
    /// Board column types that can hold this role's values.
    fn column_kinds(self) -> &'static [&'static str] {
        match self {
            ColumnRole::Status | ColumnRole::Priority | ColumnRole::Type => &["status", "color"],
            ColumnRole::Person => &["people", "multiple-person"],
            ColumnRole::UserEmail => &["email"],
            ColumnRole::Sprint | ColumnRole::UserName => &[],
        }
    }

    fn fits(self, column: &Column) -> bool {
        column
            .kind
            .as_deref()
            .is_some_and(|kind| self.column_kinds().contains(&kind))
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    needles: Vec<String>,
    role: ColumnRole,
}

impl Rule {
    pub fn new(needles: &[&str], role: ColumnRole) -> Self {
        Self {
            needles: needles.iter().map(|n| n.to_lowercase()).collect(),
            role,
        }
    }

    fn matches(&self, key: &str) -> bool {
        self.needles.iter().any(|n| key.contains(n.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMapper {
    rules: Vec<Rule>,
}

impl Default for ColumnMapper {
    fn default() -> Self {
        Self::new(vec![
            Rule::new(&["user_email", "email"], ColumnRole::UserEmail),
            Rule::new(&["user_name"], ColumnRole::UserName),
            Rule::new(&["status"], ColumnRole::Status),
            Rule::new(&["priority"], ColumnRole::Priority),
            Rule::new(
                &["sprint", "iteration", "cycle", "release", "milestone", "phase"],
                ColumnRole::Sprint,
            ),
            Rule::new(&["type"], ColumnRole::Type),
            Rule::new(&["person", "user", "owner", "assign"], ColumnRole::Person),
        ])
    }
}

impl ColumnMapper {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn role_of(&self, key: &str) -> Option<ColumnRole> {
        let key = key.to_lowercase();
        self.rules.iter().find(|r| r.matches(&key)).map(|r| r.role)
    }

    /// Role of a column value, trying its ID first and then the board title
    /// for that ID when the board's columns are known. A typed column that
    /// is not a people column never supplies the assignee.
    fn role_of_column(&self, column_id: &str, columns: &[Column]) -> Option<ColumnRole> {
        let column = columns.iter().find(|c| c.id == column_id);
        let role = self
            .role_of(column_id)
            .or_else(|| column.and_then(|c| self.role_of(&c.title)))?;
        match column {
            Some(c) if role == ColumnRole::Person && c.kind.is_some() && !role.fits(c) => None,
            _ => Some(role),
        }
    }

    fn named_for(&self, column: &Column, role: ColumnRole) -> bool {
        self.role_of(&column.title).or_else(|| self.role_of(&column.id)) == Some(role)
    }

    /// Normalize a raw item. `columns` may be empty when the board layout
    /// was not fetched. The local ID is left unassigned.
    pub fn to_task(&self, item: &Item, columns: &[Column]) -> Task {
        let mut task = Task::new(item.id.clone(), item.name.clone());
        task.updated_at = item.updated_at;

        let mut person = None;
        for cv in &item.column_values {
            let text = cv.text().trim();
            if text.is_empty() {
                continue;
            }
            match self.role_of_column(&cv.id, columns) {
                Some(ColumnRole::Status) => task.status = text.into(),
                Some(ColumnRole::Priority) => task.priority = text.into(),
                Some(ColumnRole::Type) => task.kind = text.into(),
                Some(ColumnRole::Sprint) => task.sprint = text.to_string(),
                Some(ColumnRole::UserName) => task.user_name = text.to_string(),
                Some(ColumnRole::UserEmail) => task.user_email = text.to_string(),
                Some(ColumnRole::Person) => {
                    person.get_or_insert_with(|| text.to_string());
                }
                None => {}
            }
        }
        if task.user_name.is_empty() {
            if let Some(person) = person {
                task.user_name = person;
            }
        }
        task
    }

    pub fn to_tasks(&self, items: &[Item], columns: &[Column]) -> Vec<Task> {
        items.iter().map(|item| self.to_task(item, columns)).collect()
    }

    /// Board column to write a role's value to.
    ///
    /// A column whose type fits the role and whose title names it wins.
    /// Any people column is next for the assignee, since that type is
    /// unambiguous. Title and ID rules alone are the last resort.
    pub fn find_column<'a>(&self, columns: &'a [Column], role: ColumnRole) -> Option<&'a Column> {
        columns
            .iter()
            .find(|c| role.fits(c) && self.named_for(c, role))
            .or_else(|| {
                (role == ColumnRole::Person)
                    .then(|| columns.iter().find(|c| role.fits(c)))
                    .flatten()
            })
            .or_else(|| columns.iter().find(|c| self.named_for(c, role)))
    }
}

/// Field values to write to an item. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEdits {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub kind: Option<String>,
}

impl TaskEdits {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.priority.is_none() && self.kind.is_none()
    }

    /// Write the edited fields onto a cached task.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(status) = &self.status {
            task.status = status.as_str().into();
        }
        if let Some(priority) = &self.priority {
            task.priority = priority.as_str().into();
        }
        if let Some(kind) = &self.kind {
            task.kind = kind.as_str().into();
        }
    }

    /// Encode as the service's `column_values` object. Fields whose column
    /// cannot be found on the board are skipped.
    pub fn to_column_values(&self, mapper: &ColumnMapper, columns: &[Column]) -> Map<String, Value> {
        let mut values = Map::new();
        let fields = [
            (ColumnRole::Status, &self.status),
            (ColumnRole::Priority, &self.priority),
            (ColumnRole::Type, &self.kind),
        ];
        for (role, value) in fields {
            let Some(label) = value else { continue };
            match mapper.find_column(columns, role) {
                Some(column) => {
                    values.insert(column.id.clone(), json!({ "label": label }));
                }
                None => tracing::warn!(?role, "No matching column on board, skipping"),
            }
        }
        values
    }
}

/// Column value assigning an item to a single person.
pub fn owner_value(user_id: &str) -> Value {
    let id: Value = user_id
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(user_id));
    json!({
        "personsAndTeams": [{ "id": id, "kind": "person" }],
        "changed_at": chrono::Utc::now().to_rfc3339(),
    })
}
