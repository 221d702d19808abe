pub mod monday;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::model::item::{Board, Item, User};

pub use monday::MondayClient;

/// Remote board service. Everything returned is raw; mapping to tasks
/// happens in the caller.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn fetch_board(&self, board_id: &str) -> Result<Board>;
    /// Every item on the board, following pagination to the end.
    async fn fetch_board_items(&self, board_id: &str) -> Result<Vec<Item>>;
    /// Items in the sprint group `sprint_id` of `board_id`.
    async fn fetch_sprint_items(&self, board_id: &str, sprint_id: &str) -> Result<Vec<Item>>;
    async fn fetch_item(&self, item_id: &str) -> Result<Item>;
    /// Create an item and return its remote ID.
    async fn create_item(
        &self,
        board_id: &str,
        name: &str,
        column_values: &Map<String, Value>,
    ) -> Result<String>;
    async fn update_item_columns(
        &self,
        board_id: &str,
        item_id: &str,
        column_values: &Map<String, Value>,
    ) -> Result<()>;
    async fn fetch_current_user(&self) -> Result<User>;
}
