use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[async_trait]
pub trait CollectionRepo: Send + Sync {
    async fn create(&self, name: &str) -> AppResult<Collection>;
    async fn list(&self) -> AppResult<Vec<Collection>>;
    async fn rename(&self, id: Uuid, name: &str) -> AppResult<Option<Collection>>;
    /// Returns false when nothing was deleted.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgCollectionRepo {
    db: PgPool,
}

impl PgCollectionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CollectionRepo for PgCollectionRepo {
    async fn create(&self, name: &str) -> AppResult<Collection> {
        let row = sqlx::query_as::<_, Collection>(
            r#"
            INSERT INTO collections (name)
            VALUES ($1)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(name)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn list(&self) -> AppResult<Vec<Collection>> {
        let rows = sqlx::query_as::<_, Collection>(
            r#"
            SELECT id, name, created_at, updated_at
            FROM collections
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn rename(&self, id: Uuid, name: &str) -> AppResult<Option<Collection>> {
        let row = sqlx::query_as::<_, Collection>(
            r#"
            UPDATE collections
               SET name = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() == 1)
    }
}

#[cfg(test)]
pub use memory::MemoryCollectionRepo;
