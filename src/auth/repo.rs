use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{PendingReset, User, UserRow};
use crate::error::{AppError, AppResult};

/// Row to insert; the hash is produced by `CredentialStore`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Persistence for user records. Works on hashes only, never on plaintext.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn insert(&self, new: NewUser) -> AppResult<User>;
    async fn find_by_email(&self, email: &str, with_password: bool) -> AppResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    /// Returns false if the user does not exist.
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<bool>;
    /// Sets or clears both reset columns in one write.
    async fn set_pending_reset(&self, id: Uuid, reset: Option<&PendingReset>) -> AppResult<bool>;
    /// Atomically: match an unexpired digest, store the new hash, clear the reset.
    async fn consume_reset(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> AppResult<Option<User>>;
}

const PUBLIC_COLUMNS: &str = "id, name, email, NULL::text AS password_hash, role, \
     forgot_password_token_hash, forgot_password_expiry, created_at, updated_at";

const ALL_COLUMNS: &str = "id, name, email, password_hash, role, \
     forgot_password_token_hash, forgot_password_expiry, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn insert(&self, new: NewUser) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {PUBLIC_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.password_hash)
            .fetch_one(&self.db)
            .await;
        match row {
            Ok(r) => Ok(r.into()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::Conflict("User already exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str, with_password: bool) -> AppResult<Option<User>> {
        let columns = if with_password { ALL_COLUMNS } else { PUBLIC_COLUMNS };
        let sql = format!("SELECT {columns} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let sql = format!("SELECT {PUBLIC_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> AppResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn set_pending_reset(&self, id: Uuid, reset: Option<&PendingReset>) -> AppResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET forgot_password_token_hash = $2,
                   forgot_password_expiry = $3,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reset.map(|r| r.token_hash.as_str()))
        .bind(reset.map(|r| r.expires_at))
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn consume_reset(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> AppResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
               SET password_hash = $3,
                   forgot_password_token_hash = NULL,
                   forgot_password_expiry = NULL,
                   updated_at = now()
             WHERE forgot_password_token_hash = $1
               AND forgot_password_expiry > $2
            RETURNING {PUBLIC_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(token_hash)
            .bind(now)
            .bind(password_hash)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Into::into))
    }
}

#[cfg(test)]
pub use memory::{MemoryUserRepo, UnavailableUserRepo};
