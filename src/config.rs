use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FilterError;
use crate::filter::{FilterDimension, Filters, ListKind};
use crate::model::item::User;
use crate::providers::monday::DEFAULT_BASE_URL;

const APP_DIR: &str = "monday-cli";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub board_id: String,
    /// Group ID of the current sprint.
    pub sprint_id: String,
    /// Board holding the sprint group, when it is not `board_id`.
    pub sprint_board_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub filters: Filters,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30,
            board_id: String::new(),
            sprint_id: String::new(),
            sprint_board_id: String::new(),
            user: None,
            filters: Filters::default(),
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn load_config() -> Result<AppConfig> {
    load_from(&config_path())
}

/// Load the config at `path`, writing a default one first if it is missing.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        let config = AppConfig::default();
        config
            .save_to(path)
            .context("Failed to create default config")?;
        tracing::info!(path = %path.display(), "Created default config");
        return Ok(config);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

impl AppConfig {
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn require_api_key(&self) -> Result<&str> {
        if self.api_key.is_empty() {
            bail!("API key not set. Run `config set-api-key <key>` first");
        }
        Ok(&self.api_key)
    }

    pub fn require_board_id(&self) -> Result<&str> {
        if self.board_id.is_empty() {
            bail!("Board ID not set. Run `config set-board-id <id>` first");
        }
        Ok(&self.board_id)
    }

    pub fn require_sprint_id(&self) -> Result<&str> {
        if self.sprint_id.is_empty() {
            return Err(FilterError::NoCurrentSprint.into());
        }
        Ok(&self.sprint_id)
    }

    /// Board the sprint group lives on; defaults to the main board.
    pub fn sprint_board(&self) -> &str {
        if self.sprint_board_id.is_empty() {
            &self.board_id
        } else {
            &self.sprint_board_id
        }
    }

    fn current_user(&self) -> Result<&User, FilterError> {
        self.user
            .as_ref()
            .filter(|u| !u.name.is_empty() || !u.email.is_empty())
            .ok_or(FilterError::NoCurrentUser)
    }

    /// Replace the user filters with a whitelist of the current user.
    pub fn filter_to_me(&mut self) -> Result<(), FilterError> {
        let user = self.current_user()?.clone();
        for dimension in [FilterDimension::UserName, FilterDimension::UserEmail] {
            self.filters.clear(dimension, ListKind::Whitelist);
            self.filters.clear(dimension, ListKind::Blacklist);
        }
        self.whitelist_user(&user);
        Ok(())
    }

    pub fn add_me(&mut self) -> Result<(), FilterError> {
        let user = self.current_user()?.clone();
        self.whitelist_user(&user);
        Ok(())
    }

    pub fn remove_me(&mut self) -> Result<(), FilterError> {
        let user = self.current_user()?.clone();
        self.filters
            .remove(FilterDimension::UserName, ListKind::Whitelist, &user.name);
        self.filters
            .remove(FilterDimension::UserEmail, ListKind::Whitelist, &user.email);
        Ok(())
    }

    fn whitelist_user(&mut self, user: &User) {
        if !user.name.is_empty() {
            self.filters
                .add(FilterDimension::UserName, ListKind::Whitelist, &user.name);
        }
        if !user.email.is_empty() {
            self.filters
                .add(FilterDimension::UserEmail, ListKind::Whitelist, &user.email);
        }
    }

    /// Replace the sprint filters with a whitelist of `label`, or of the
    /// configured sprint when no label is given.
    pub fn filter_to_sprint(&mut self, label: Option<&str>) -> Result<(), FilterError> {
        let label = match label {
            Some(label) => label.to_string(),
            None if !self.sprint_id.is_empty() => self.sprint_id.clone(),
            None => return Err(FilterError::NoCurrentSprint),
        };
        self.filters.clear(FilterDimension::Sprint, ListKind::Whitelist);
        self.filters.clear(FilterDimension::Sprint, ListKind::Blacklist);
        self.filters
            .add(FilterDimension::Sprint, ListKind::Whitelist, &label);
        Ok(())
    }
}

/// Hide all but the last four characters.
pub fn mask_api_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{visible}", "*".repeat(chars.len() - 4))
}
