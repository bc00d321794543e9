use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{generate_token, Store};
use crate::error::{AppError, Result};
use crate::models::{NewPushItem, PushItem};

#[derive(Default)]
struct MemoryState {
    tokens: HashSet<String>,
    /// Item plus its soft-delete flag, in creation order
    items: Vec<(PushItem, bool)>,
    next_id: i64,
    /// gcm_id -> token
    mobile_clients: BTreeMap<String, String>,
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_token(&self, token: impl Into<String>) {
        self.state.write().await.tokens.insert(token.into());
    }

    /// Look an item up by id, including soft-deleted ones.
    pub async fn item(&self, id: i64) -> Option<PushItem> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|(item, _)| item.id == id)
            .map(|(item, _)| item.clone())
    }

    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn token_exists(&self, token: &str) -> Result<bool> {
        Ok(self.state.read().await.tokens.contains(token))
    }

    async fn issue_token(&self) -> Result<String> {
        let mut state = self.state.write().await;
        loop {
            let token = generate_token();
            if state.tokens.insert(token.clone()) {
                return Ok(token);
            }
        }
    }

    async fn save_item(&self, item: NewPushItem) -> Result<PushItem> {
        let valid = item.validate()?;
        let mut state = self.state.write().await;
        if !state.tokens.contains(&valid.token) {
            return Err(AppError::UnknownToken);
        }

        state.next_id += 1;
        let item = PushItem {
            id: state.next_id,
            created_at: Utc::now(),
            unix_timestamp: valid.unix_timestamp,
            title: valid.title,
            body: valid.body,
            url: valid.url,
            token: valid.token,
            priority: valid.priority,
            sound: true,
            accessed: false,
        };
        state.items.push((item.clone(), false));
        Ok(item)
    }

    async fn mobile_recipients(&self, token: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .mobile_clients
            .iter()
            .filter(|(_, owner)| owner.as_str() == token)
            .map(|(gcm_id, _)| gcm_id.clone())
            .collect())
    }

    async fn mark_delivered(&self, item: &PushItem) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some((stored, _)) = state.items.iter_mut().find(|(s, _)| s.id == item.id) {
            stored.sound = false;
        }
        Ok(())
    }

    async fn take_pending(&self, token: &str) -> Result<Vec<PushItem>> {
        let mut state = self.state.write().await;
        let mut pending = Vec::new();
        for (item, deleted) in state.items.iter_mut() {
            if !*deleted && item.token == token {
                item.accessed = true;
                *deleted = true;
                pending.push(item.clone());
            }
        }
        Ok(pending)
    }

    async fn register_mobile_client(&self, gcm_id: &str, token: &str) -> Result<()> {
        if gcm_id.is_empty() || token.is_empty() {
            return Err(AppError::Validation("gcmid and token required".to_string()));
        }
        let mut state = self.state.write().await;
        if !state.tokens.contains(token) {
            return Err(AppError::UnknownToken);
        }
        state
            .mobile_clients
            .insert(gcm_id.to_string(), token.to_string());
        Ok(())
    }
}
