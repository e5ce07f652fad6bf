use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::{
    jwt::JwtKeys, password::PasswordHasher, repo::PgUserRepo, services::AuthService,
    store::CredentialStore,
};
use crate::clock::{Clock, SystemClock};
use crate::collections::repo::{CollectionRepo, PgCollectionRepo};
use crate::config::AppConfig;
use crate::db;
use crate::mail::{LogMailer, Mailer, SmtpMailer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub collections: Arc<dyn CollectionRepo>,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let pool = db::connect(&config.database_url).await?;

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                tracing::warn!("SMTP_HOST not set; reset emails will only be logged");
                Arc::new(LogMailer)
            }
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = CredentialStore::new(
            Arc::new(PgUserRepo::new(pool.clone())),
            PasswordHasher::new(&config.hashing)?,
        );
        let auth = AuthService::new(
            store,
            JwtKeys::new(&config.jwt, clock.clone()),
            mailer,
            clock,
            config.public_url.clone(),
        );

        Ok(Self {
            config,
            auth,
            collections: Arc::new(PgCollectionRepo::new(pool)),
        })
    }
}
