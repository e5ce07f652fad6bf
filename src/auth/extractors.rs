use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::CookieJar;
use tracing::debug;

use super::{repo_types::User, services::AuthService};
use crate::{error::AppError, state::AppState};

/// Name of the cookie carrying the session token.
#[derive(Debug, Clone)]
pub struct CookieName(pub String);

impl FromRef<AppState> for CookieName {
    fn from_ref(state: &AppState) -> Self {
        CookieName(state.config.cookie_name.clone())
    }
}

/// Bearer header first, then the auth cookie.
pub(crate) fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Authenticated user, without any secret fields. Rejects with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
    CookieName: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CookieName(cookie_name) = CookieName::from_ref(state);
        let token = session_token(&parts.headers, &cookie_name).ok_or_else(|| {
            debug!("no session token on request");
            AppError::Unauthorized
        })?;

        let user = AuthService::from_ref(state).authenticate(&token).await?;
        Ok(AuthUser(user))
    }
}
