use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::BoardApi;
use crate::model::item::{Board, Item, User};

pub const DEFAULT_BASE_URL: &str = "https://api.monday.com/v2";
const PAGE_SIZE: usize = 25;

pub struct MondayClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl MondayClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }

    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let body = json!({ "query": query, "variables": variables });
        let resp = self
            .client
            .post(&self.base_url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("monday.com API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("monday.com API returned {status}: {text}");
        }

        let gql: GqlResponse<T> = resp
            .json()
            .await
            .context("Failed to parse monday.com response")?;
        gql.into_data()
    }

    /// Drain an `items_page` cursor. `page` runs one request for the given
    /// cursor and returns that page.
    async fn paginate<F, Fut>(&self, mut page: F) -> Result<Vec<Item>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: std::future::Future<Output = Result<ItemsPage>>,
    {
        let mut items = Vec::new();
        let mut cursor = None;
        loop {
            let ItemsPage {
                items: batch,
                cursor: next,
            } = page(cursor).await?;
            let short_page = batch.len() < PAGE_SIZE;
            items.extend(batch);
            match next.filter(|c| !c.is_empty()) {
                Some(next) if !short_page => {
                    tracing::debug!(fetched = items.len(), "Fetching next page");
                    cursor = Some(next);
                }
                _ => break,
            }
        }
        Ok(items)
    }
}

const BOARD_QUERY: &str = r#"
query GetBoard($boardId: ID!) {
  boards(ids: [$boardId]) {
    id name description state
    columns { id title type }
  }
}"#;

const BOARD_ITEMS_QUERY: &str = r#"
query GetBoardItems($boardId: ID!, $limit: Int!, $cursor: String) {
  boards(ids: [$boardId]) {
    items_page(limit: $limit, cursor: $cursor) {
      items { id name column_values { id text value } updated_at }
      cursor
    }
  }
}"#;

const SPRINT_ITEMS_QUERY: &str = r#"
query GetSprintItems($boardId: ID!, $groupId: String!, $limit: Int!, $cursor: String) {
  boards(ids: [$boardId]) {
    groups(ids: [$groupId]) {
      items_page(limit: $limit, cursor: $cursor) {
        items { id name column_values { id text value } updated_at }
        cursor
      }
    }
  }
}"#;

const ITEM_QUERY: &str = r#"
query GetItem($itemId: ID!) {
  items(ids: [$itemId]) { id name column_values { id text value } updated_at }
}"#;

const CREATE_ITEM_MUTATION: &str = r#"
mutation CreateItem($boardId: ID!, $itemName: String!, $columnValues: JSON!) {
  create_item(board_id: $boardId, item_name: $itemName, column_values: $columnValues) { id }
}"#;

const UPDATE_COLUMNS_MUTATION: &str = r#"
mutation UpdateItem($boardId: ID!, $itemId: ID!, $columnValues: JSON!) {
  change_multiple_column_values(board_id: $boardId, item_id: $itemId, column_values: $columnValues) { id }
}"#;

const ME_QUERY: &str = r#"
query Me {
  me { id name email title }
}"#;

#[derive(Deserialize)]
struct GqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GqlError>,
}

#[derive(Deserialize)]
struct GqlError {
    message: String,
}

impl<T> GqlResponse<T> {
    fn into_data(self) -> Result<T> {
        if !self.errors.is_empty() {
            let messages: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
            bail!("monday.com API error: {}", messages.join("; "));
        }
        self.data.context("No data in monday.com response")
    }
}

#[derive(Deserialize)]
struct BoardsData<B> {
    boards: Vec<B>,
}

#[derive(Deserialize)]
struct BoardItems {
    items_page: ItemsPage,
}

#[derive(Deserialize)]
struct BoardGroups {
    groups: Vec<BoardItems>,
}

#[derive(Deserialize)]
struct ItemsPage {
    #[serde(default)]
    items: Vec<Item>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct ItemsData {
    items: Vec<Item>,
}

#[derive(Deserialize)]
struct CreatedData {
    create_item: CreatedItem,
}

#[derive(Deserialize)]
struct CreatedItem {
    id: String,
}

#[derive(Deserialize)]
struct MeData {
    me: User,
}

/// The service takes `column_values` as a JSON-encoded string.
fn encode_column_values(column_values: &Map<String, Value>) -> Result<String> {
    serde_json::to_string(column_values).context("Failed to encode column values")
}

fn first_board<B>(data: BoardsData<B>, board_id: &str) -> Result<B> {
    data.boards
        .into_iter()
        .next()
        .with_context(|| format!("Board {board_id} not found"))
}

#[async_trait]
impl BoardApi for MondayClient {
    async fn fetch_board(&self, board_id: &str) -> Result<Board> {
        let data: BoardsData<Board> = self
            .execute(BOARD_QUERY, json!({ "boardId": board_id }))
            .await?;
        first_board(data, board_id)
    }

    async fn fetch_board_items(&self, board_id: &str) -> Result<Vec<Item>> {
        let items = self
            .paginate(move |cursor| async move {
                let data: BoardsData<BoardItems> = self
                    .execute(
                        BOARD_ITEMS_QUERY,
                        json!({ "boardId": board_id, "limit": PAGE_SIZE, "cursor": cursor }),
                    )
                    .await?;
                Ok(first_board(data, board_id)?.items_page)
            })
            .await?;
        tracing::info!(board_id, count = items.len(), "Fetched board items");
        Ok(items)
    }

    async fn fetch_sprint_items(&self, board_id: &str, sprint_id: &str) -> Result<Vec<Item>> {
        let items = self
            .paginate(move |cursor| async move {
                let data: BoardsData<BoardGroups> = self
                    .execute(
                        SPRINT_ITEMS_QUERY,
                        json!({
                            "boardId": board_id,
                            "groupId": sprint_id,
                            "limit": PAGE_SIZE,
                            "cursor": cursor,
                        }),
                    )
                    .await?;
                let group = first_board(data, board_id)?
                    .groups
                    .into_iter()
                    .next()
                    .with_context(|| format!("Sprint {sprint_id} not found on board {board_id}"))?;
                Ok(group.items_page)
            })
            .await?;
        tracing::info!(board_id, sprint_id, count = items.len(), "Fetched sprint items");
        Ok(items)
    }

    async fn fetch_item(&self, item_id: &str) -> Result<Item> {
        let data: ItemsData = self
            .execute(ITEM_QUERY, json!({ "itemId": item_id }))
            .await?;
        data.items
            .into_iter()
            .next()
            .with_context(|| format!("Item {item_id} not found"))
    }

    async fn create_item(
        &self,
        board_id: &str,
        name: &str,
        column_values: &Map<String, Value>,
    ) -> Result<String> {
        let data: CreatedData = self
            .execute(
                CREATE_ITEM_MUTATION,
                json!({
                    "boardId": board_id,
                    "itemName": name,
                    "columnValues": encode_column_values(column_values)?,
                }),
            )
            .await
            .context("Failed to create item")?;
        Ok(data.create_item.id)
    }

    async fn update_item_columns(
        &self,
        board_id: &str,
        item_id: &str,
        column_values: &Map<String, Value>,
    ) -> Result<()> {
        let _: Value = self
            .execute(
                UPDATE_COLUMNS_MUTATION,
                json!({
                    "boardId": board_id,
                    "itemId": item_id,
                    "columnValues": encode_column_values(column_values)?,
                }),
            )
            .await
            .with_context(|| format!("Failed to update item {item_id}"))?;
        Ok(())
    }

    async fn fetch_current_user(&self) -> Result<User> {
        let data: MeData = self.execute(ME_QUERY, json!({})).await?;
        Ok(data.me)
    }
}
