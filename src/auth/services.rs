use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    jwt::JwtKeys,
    repo_types::{PendingReset, User},
    reset,
    store::CredentialStore,
};
use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    mail::{Email, Mailer},
};

pub const NAME_MAX_CHARS: usize = 50;
pub const PASSWORD_MIN_CHARS: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_new_password(password: &str, confirm: &str) -> AppResult<()> {
    if password.is_empty() || confirm.is_empty() {
        return Err(AppError::Validation("Please fill all the fields".into()));
    }
    if password != confirm {
        return Err(AppError::Validation(
            "Password and confirm password do not match".into(),
        ));
    }
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(AppError::Validation(format!(
            "Password must be at least {PASSWORD_MIN_CHARS} characters"
        )));
    }
    Ok(())
}

/// A user together with a freshly issued session token.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Signup, login and password recovery.
#[derive(Clone)]
pub struct AuthService {
    store: CredentialStore,
    keys: JwtKeys,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    public_url: String,
}

impl AuthService {
    pub fn new(
        store: CredentialStore,
        keys: JwtKeys,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            keys,
            mailer,
            clock,
            public_url: public_url.into(),
        }
    }

    /// Lifetime of issued session tokens; the auth cookie uses the same.
    pub fn session_ttl(&self) -> Duration {
        self.keys.ttl()
    }

    fn open_session(&self, user: User) -> AppResult<Session> {
        let token = self.keys.sign(user.id, user.role)?;
        Ok(Session { user, token })
    }

    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> AppResult<Session> {
        let name = name.trim();
        let email = normalize_email(email);
        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("Please fill all the fields".into()));
        }
        if name.chars().count() > NAME_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "Name can't be longer than {NAME_MAX_CHARS} characters"
            )));
        }
        if !is_valid_email(&email) {
            return Err(AppError::Validation("Email is invalid".into()));
        }
        if password.chars().count() < PASSWORD_MIN_CHARS {
            return Err(AppError::Validation(format!(
                "Password must be at least {PASSWORD_MIN_CHARS} characters"
            )));
        }

        if self.store.find_by_email(&email, false).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::Conflict("User already exists".into()));
        }

        // the unique index still catches a concurrent signup
        let user = self.store.create(name, &email, password).await?;
        info!(user_id = %user.id, email = %user.email, "user signed up");
        self.open_session(user)
    }

    pub async fn log_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("Please fill all the fields".into()));
        }

        let Some(mut user) = self.store.find_by_email(&email, true).await? else {
            self.store.verify_missing_user(password);
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };
        if !self.store.verify_password(&user, password)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }
        user.password_hash = None;

        info!(user_id = %user.id, "user logged in");
        self.open_session(user)
    }

    /// Emails a reset link and returns the address it went to.
    pub async fn forgot_password(&self, email: &str) -> AppResult<String> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AppError::Validation("Email is required".into()));
        }

        let user = self
            .store
            .find_by_email(&email, false)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let token = reset::generate(self.clock.now());
        let pending = PendingReset {
            token_hash: token.digest,
            expires_at: token.expires_at,
        };
        if !self.store.begin_reset(user.id, &pending).await? {
            warn!(user_id = %user.id, "user vanished before reset could be stored");
            return Err(AppError::NotFound("User not found".into()));
        }

        let url = format!("{}/api/auth/password/reset/{}", self.public_url, token.raw);
        let message = Email {
            to: user.email.clone(),
            subject: "Password reset".into(),
            body: format!(
                "Hello {},\n\nUse the link below to reset your password:\n\n{}\n\n\
                 The link expires in {} minutes. If you did not ask for this, ignore this email.\n",
                user.name,
                url,
                reset::RESET_TTL.whole_minutes()
            ),
        };

        if let Err(e) = self.mailer.send(message).await {
            error!(error = %e, user_id = %user.id, "reset email failed; rolling back");
            if let Err(clear_err) = self.store.clear_reset(user.id).await {
                error!(error = %clear_err, user_id = %user.id, "failed to clear pending reset");
            }
            return Err(AppError::DispatchFailure(e));
        }

        info!(user_id = %user.id, "password reset email sent");
        Ok(user.email)
    }

    pub async fn reset_password(
        &self,
        raw_token: &str,
        password: &str,
        confirm_password: &str,
    ) -> AppResult<Session> {
        validate_new_password(password, confirm_password)?;

        let token_hash = reset::digest(raw_token);
        let user = self
            .store
            .consume_reset(&token_hash, self.clock.now(), password)
            .await?
            .ok_or(AppError::InvalidOrExpiredToken)?;

        info!(user_id = %user.id, "password reset");
        self.open_session(user)
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        password: &str,
        confirm_password: &str,
    ) -> AppResult<()> {
        validate_new_password(password, confirm_password)?;

        if self.store.find_by_id(user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".into()));
        }
        if !self.store.set_password(user_id, password).await? {
            return Err(AppError::NotFound("User not found".into()));
        }
        info!(user_id = %user_id, "password changed");
        Ok(())
    }

    /// Resolves a bearer token to its user. Used by the auth gate.
    pub async fn authenticate(&self, token: &str) -> AppResult<User> {
        let claims = self.keys.verify(token)?;
        self.store.find_by_id(claims.sub).await?.ok_or_else(|| {
            warn!(user_id = %claims.sub, "token for missing user");
            AppError::Unauthorized
        })
    }
}

/// Profile of whoever the gate attached, if anyone.
pub fn profile(identity: Option<User>) -> AppResult<User> {
    identity.ok_or(AppError::Unauthorized)
}
