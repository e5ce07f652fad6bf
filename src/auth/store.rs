use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    password::PasswordHasher,
    repo::{NewUser, UserRepo},
    repo_types::{PendingReset, User},
};
use crate::error::{AppError, AppResult};

/// User persistence with hash-on-write: callers hand over plaintext
/// passwords and only hashes reach the repository.
#[derive(Clone)]
pub struct CredentialStore {
    repo: Arc<dyn UserRepo>,
    hasher: PasswordHasher,
}

impl CredentialStore {
    pub fn new(repo: Arc<dyn UserRepo>, hasher: PasswordHasher) -> Self {
        Self { repo, hasher }
    }

    pub async fn create(&self, name: &str, email: &str, password: &str) -> AppResult<User> {
        let password_hash = self.hasher.hash(password)?;
        self.repo
            .insert(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await
    }

    pub async fn find_by_email(
        &self,
        email: &str,
        include_password_hash: bool,
    ) -> AppResult<Option<User>> {
        self.repo.find_by_email(email, include_password_hash).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        self.repo.find_by_id(id).await
    }

    /// `user` must have been loaded with its password hash.
    pub fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let hash = user
            .password_hash
            .as_deref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("password hash not loaded")))?;
        Ok(self.hasher.verify(password, hash)?)
    }

    /// Burns one verification for a login with no matching account.
    pub fn verify_missing_user(&self, password: &str) {
        self.hasher.verify_decoy(password);
    }

    /// Returns false when the user no longer exists.
    pub async fn set_password(&self, id: Uuid, password: &str) -> AppResult<bool> {
        let password_hash = self.hasher.hash(password)?;
        self.repo.update_password_hash(id, &password_hash).await
    }

    pub async fn begin_reset(&self, id: Uuid, reset: &PendingReset) -> AppResult<bool> {
        self.repo.set_pending_reset(id, Some(reset)).await
    }

    pub async fn clear_reset(&self, id: Uuid) -> AppResult<bool> {
        self.repo.set_pending_reset(id, None).await
    }

    /// Swaps in the new password if `token_hash` is pending and unexpired.
    pub async fn consume_reset(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        new_password: &str,
    ) -> AppResult<Option<User>> {
        let password_hash = self.hasher.hash(new_password)?;
        self.repo.consume_reset(token_hash, now, &password_hash).await
    }
}
