use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar, WithRejection,
};
use time::{Duration, OffsetDateTime};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
            ResetPasswordRequest, SignUpRequest,
        },
        extractors::AuthUser,
        services::{self, Session},
    },
    error::{AppError, AppResult},
    state::AppState,
};

type JsonBody<T> = WithRejection<Json<T>, AppError>;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(sign_up))
        .route("/login", post(log_in))
        .route("/logout", get(log_out))
        .route("/password/forgot", put(forgot_password))
        .route("/password/reset/:reset_token", put(reset_password))
        .route("/password/change", put(change_password))
        .route("/profile", get(get_profile))
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((state.config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!state.config.dev_mode)
        .max_age(state.auth.session_ttl())
        .build()
}

fn expired_cookie(state: &AppState) -> Cookie<'static> {
    Cookie::build((state.config.cookie_name.clone(), ""))
        .path("/")
        .http_only(true)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

fn with_session(
    state: &AppState,
    jar: CookieJar,
    session: Session,
) -> (CookieJar, Json<AuthResponse>) {
    let jar = jar.add(session_cookie(state, session.token.clone()));
    (jar, Json(AuthResponse::session(session.user.into(), session.token)))
}

#[instrument(skip_all)]
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(body), _): JsonBody<SignUpRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = state
        .auth
        .sign_up(&body.name, &body.email, &body.password)
        .await?;
    Ok(with_session(&state, jar, session))
}

#[instrument(skip_all)]
pub async fn log_in(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(body), _): JsonBody<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = state.auth.log_in(&body.email, &body.password).await?;
    Ok(with_session(&state, jar, session))
}

/// Only drops the cookie; the token itself stays valid until it expires.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn log_out(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
) -> (CookieJar, Json<AuthResponse>) {
    (
        jar.add(expired_cookie(&state)),
        Json(AuthResponse::message("Logged out")),
    )
}

#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<ForgotPasswordRequest>,
) -> AppResult<Json<AuthResponse>> {
    let sent_to = state.auth.forgot_password(&body.email).await?;
    Ok(Json(AuthResponse::message(format!("Email sent to {sent_to}"))))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(reset_token): Path<String>,
    jar: CookieJar,
    WithRejection(Json(body), _): JsonBody<ResetPasswordRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = state
        .auth
        .reset_password(&reset_token, &body.password, &body.confirm_password)
        .await?;
    Ok(with_session(&state, jar, session))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    WithRejection(Json(body), _): JsonBody<ChangePasswordRequest>,
) -> AppResult<Json<AuthResponse>> {
    state
        .auth
        .change_password(user.id, &body.password, &body.confirm_password)
        .await?;
    Ok(Json(AuthResponse::message("Password changed successfully")))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_profile(AuthUser(user): AuthUser) -> AppResult<Json<AuthResponse>> {
    let user = services::profile(Some(user))?;
    Ok(Json(AuthResponse::user(user.into())))
}
