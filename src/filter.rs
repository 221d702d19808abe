use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FilterError;
use crate::model::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDimension {
    Status,
    Priority,
    Type,
    Sprint,
    UserName,
    UserEmail,
}

impl FilterDimension {
    pub const ALL: [FilterDimension; 6] = [
        FilterDimension::Status,
        FilterDimension::Priority,
        FilterDimension::Type,
        FilterDimension::Sprint,
        FilterDimension::UserName,
        FilterDimension::UserEmail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterDimension::Status => "status",
            FilterDimension::Priority => "priority",
            FilterDimension::Type => "type",
            FilterDimension::Sprint => "sprint",
            FilterDimension::UserName => "user_name",
            FilterDimension::UserEmail => "user_email",
        }
    }

    fn value_of<'a>(&self, task: &'a Task) -> &'a str {
        match self {
            FilterDimension::Status => task.status.as_str(),
            FilterDimension::Priority => task.priority.as_str(),
            FilterDimension::Type => task.kind.as_str(),
            FilterDimension::Sprint => &task.sprint,
            FilterDimension::UserName => &task.user_name,
            FilterDimension::UserEmail => &task.user_email,
        }
    }
}

impl fmt::Display for FilterDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterDimension {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterDimension::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| FilterError::UnknownDimension(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Whitelist,
    Blacklist,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Whitelist => "whitelist",
            ListKind::Blacklist => "blacklist",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whitelist" => Ok(ListKind::Whitelist),
            "blacklist" => Ok(ListKind::Blacklist),
            other => Err(FilterError::UnknownListKind(other.to_string())),
        }
    }
}

/// Whitelist and blacklist per dimension. An empty list imposes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub status_whitelist: Vec<String>,
    pub status_blacklist: Vec<String>,
    pub priority_whitelist: Vec<String>,
    pub priority_blacklist: Vec<String>,
    pub type_whitelist: Vec<String>,
    pub type_blacklist: Vec<String>,
    pub sprint_whitelist: Vec<String>,
    pub sprint_blacklist: Vec<String>,
    pub user_name_whitelist: Vec<String>,
    pub user_name_blacklist: Vec<String>,
    pub user_email_whitelist: Vec<String>,
    pub user_email_blacklist: Vec<String>,
}

impl Filters {
    pub fn values(&self, dimension: FilterDimension, kind: ListKind) -> &[String] {
        use FilterDimension as D;
        use ListKind as K;
        match (dimension, kind) {
            (D::Status, K::Whitelist) => &self.status_whitelist,
            (D::Status, K::Blacklist) => &self.status_blacklist,
            (D::Priority, K::Whitelist) => &self.priority_whitelist,
            (D::Priority, K::Blacklist) => &self.priority_blacklist,
            (D::Type, K::Whitelist) => &self.type_whitelist,
            (D::Type, K::Blacklist) => &self.type_blacklist,
            (D::Sprint, K::Whitelist) => &self.sprint_whitelist,
            (D::Sprint, K::Blacklist) => &self.sprint_blacklist,
            (D::UserName, K::Whitelist) => &self.user_name_whitelist,
            (D::UserName, K::Blacklist) => &self.user_name_blacklist,
            (D::UserEmail, K::Whitelist) => &self.user_email_whitelist,
            (D::UserEmail, K::Blacklist) => &self.user_email_blacklist,
        }
    }

    fn values_mut(&mut self, dimension: FilterDimension, kind: ListKind) -> &mut Vec<String> {
        use FilterDimension as D;
        use ListKind as K;
        match (dimension, kind) {
            (D::Status, K::Whitelist) => &mut self.status_whitelist,
            (D::Status, K::Blacklist) => &mut self.status_blacklist,
            (D::Priority, K::Whitelist) => &mut self.priority_whitelist,
            (D::Priority, K::Blacklist) => &mut self.priority_blacklist,
            (D::Type, K::Whitelist) => &mut self.type_whitelist,
            (D::Type, K::Blacklist) => &mut self.type_blacklist,
            (D::Sprint, K::Whitelist) => &mut self.sprint_whitelist,
            (D::Sprint, K::Blacklist) => &mut self.sprint_blacklist,
            (D::UserName, K::Whitelist) => &mut self.user_name_whitelist,
            (D::UserName, K::Blacklist) => &mut self.user_name_blacklist,
            (D::UserEmail, K::Whitelist) => &mut self.user_email_whitelist,
            (D::UserEmail, K::Blacklist) => &mut self.user_email_blacklist,
        }
    }

    /// Adds a lower-cased value. Returns false if it was already present.
    pub fn add(&mut self, dimension: FilterDimension, kind: ListKind, value: &str) -> bool {
        let value = value.to_lowercase();
        let list = self.values_mut(dimension, kind);
        if list.contains(&value) {
            return false;
        }
        list.push(value);
        true
    }

    /// Returns false if the value was not in the list.
    pub fn remove(&mut self, dimension: FilterDimension, kind: ListKind, value: &str) -> bool {
        let value = value.to_lowercase();
        let list = self.values_mut(dimension, kind);
        let before = list.len();
        list.retain(|v| *v != value);
        list.len() != before
    }

    pub fn clear(&mut self, dimension: FilterDimension, kind: ListKind) {
        self.values_mut(dimension, kind).clear();
    }

    pub fn clear_all(&mut self) {
        *self = Filters::default();
    }

    pub fn is_empty(&self) -> bool {
        FilterDimension::ALL.iter().all(|d| {
            self.values(*d, ListKind::Whitelist).is_empty()
                && self.values(*d, ListKind::Blacklist).is_empty()
        })
    }

    /// Whether `task` satisfies every active whitelist and blacklist.
    pub fn passes(&self, task: &Task) -> bool {
        FilterDimension::ALL.iter().all(|dimension| {
            let value = dimension.value_of(task).to_lowercase();
            let whitelist = self.values(*dimension, ListKind::Whitelist);
            let blacklist = self.values(*dimension, ListKind::Blacklist);
            if !whitelist.is_empty() && !contains_ignore_case(whitelist, &value) {
                return false;
            }
            !contains_ignore_case(blacklist, &value)
        })
    }

    pub fn apply(&self, tasks: impl IntoIterator<Item = Task>) -> Vec<Task> {
        tasks.into_iter().filter(|t| self.passes(t)).collect()
    }
}

fn contains_ignore_case(list: &[String], lower: &str) -> bool {
    list.iter().any(|v| v.to_lowercase() == lower)
}
