use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};

use super::{generate_token, Store};
use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::models::{NewPushItem, Priority, PushItem};

const ISSUE_TOKEN_ATTEMPTS: usize = 4;

#[derive(Debug, sqlx::FromRow)]
struct PushItemRow {
    id: i64,
    created_at: DateTime<Utc>,
    unix_timestamp: i64,
    title: String,
    body: String,
    url: Option<String>,
    token: String,
    priority: i16,
    sound: bool,
    accessed: bool,
}

impl From<PushItemRow> for PushItem {
    fn from(row: PushItemRow) -> Self {
        PushItem {
            id: row.id,
            created_at: row.created_at,
            unix_timestamp: row.unix_timestamp,
            title: row.title,
            body: row.body,
            url: row.url,
            token: row.token,
            priority: Priority::from(row.priority as i64),
            sound: row.sound,
            accessed: row.accessed,
        }
    }
}

/// Postgres-backed store
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Connect and apply the embedded migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations").run(&db).await?;
        info!("Database migrations applied");

        Ok(Self::new(db))
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl Store for PgStore {
    async fn token_exists(&self, token: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tokens WHERE token = $1 AND deleted_at IS NULL)",
        )
        .bind(token)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }

    /// Retries on the unlikely collision.
    async fn issue_token(&self) -> Result<String> {
        let mut last_error = None;
        for _ in 0..ISSUE_TOKEN_ATTEMPTS {
            let token = generate_token();
            let inserted = sqlx::query(
                "INSERT INTO tokens (token) VALUES ($1) ON CONFLICT (token) DO NOTHING",
            )
            .bind(&token)
            .execute(&self.db)
            .await;

            match inserted {
                Ok(done) if done.rows_affected() == 1 => return Ok(token),
                Ok(_) => continue,
                Err(e) => last_error = Some(e),
            }
        }

        error!("Couldn't generate new token: {:?}", last_error);
        Err(last_error.map(AppError::from).unwrap_or(AppError::Internal))
    }

    async fn save_item(&self, item: NewPushItem) -> Result<PushItem> {
        let valid = item.validate()?;
        if !self.token_exists(&valid.token).await? {
            return Err(AppError::UnknownToken);
        }

        let query = r#"
            INSERT INTO push_items (unix_timestamp, title, body, url, token, priority, sound, accessed)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, FALSE)
            RETURNING id, created_at, unix_timestamp, title, body, url, token, priority, sound, accessed
        "#;

        let row = sqlx::query_as::<_, PushItemRow>(query)
            .bind(valid.unix_timestamp)
            .bind(&valid.title)
            .bind(&valid.body)
            .bind(&valid.url)
            .bind(&valid.token)
            .bind(valid.priority.as_i16())
            .fetch_one(&self.db)
            .await
            .map_err(|e| {
                error!("Failed to save push item: {}", e);
                AppError::from(e)
            })?;

        Ok(row.into())
    }

    async fn mobile_recipients(&self, token: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT gcm_id FROM mobile_clients WHERE token = $1 AND deleted_at IS NULL ORDER BY gcm_id",
        )
        .bind(token)
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }

    async fn mark_delivered(&self, item: &PushItem) -> Result<()> {
        sqlx::query("UPDATE push_items SET sound = FALSE WHERE id = $1")
            .bind(item.id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn take_pending(&self, token: &str) -> Result<Vec<PushItem>> {
        let mut tx = self.db.begin().await?;

        let query = r#"
            UPDATE push_items
            SET accessed = TRUE, deleted_at = NOW()
            WHERE token = $1 AND deleted_at IS NULL
            RETURNING id, created_at, unix_timestamp, title, body, url, token, priority, sound, accessed
        "#;

        let mut rows = sqlx::query_as::<_, PushItemRow>(query)
            .bind(token)
            .fetch_all(&mut *tx)
            .await?;

        sqlx::query("UPDATE tokens SET accessed_at = NOW() WHERE token = $1")
            .bind(token)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        rows.sort_by_key(|row| row.id);
        Ok(rows.into_iter().map(PushItem::from).collect())
    }

    async fn register_mobile_client(&self, gcm_id: &str, token: &str) -> Result<()> {
        if gcm_id.is_empty() || token.is_empty() {
            return Err(AppError::Validation("gcmid and token required".to_string()));
        }
        if !self.token_exists(token).await? {
            return Err(AppError::UnknownToken);
        }

        let query = r#"
            INSERT INTO mobile_clients (gcm_id, token)
            VALUES ($1, $2)
            ON CONFLICT (gcm_id) DO UPDATE
            SET token = EXCLUDED.token, updated_at = NOW(), deleted_at = NULL
        "#;

        sqlx::query(query)
            .bind(gcm_id)
            .bind(token)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
