use std::net::SocketAddr;

use axum::{middleware, routing::get, Router};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::error::{expose_error_detail, handle_panic, AppError};
use crate::state::AppState;
use crate::{auth, collections};

async fn fallback() -> AppError {
    AppError::NotFound("Route not found".into())
}

pub fn build_app(state: AppState) -> Router {
    let dev_mode = state.config.dev_mode;

    let app = Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(collections::router())
                .route("/health", get(|| async { "ok" })),
        )
        .fallback(fallback)
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic));

    let app = if dev_mode {
        app.layer(middleware::from_fn(expose_error_detail))
    } else {
        app
    };

    app.layer(CorsLayer::permissive()).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
            })
            .on_response(
                |res: &axum::http::Response<_>,
                 _latency: std::time::Duration,
                 span: &tracing::Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    if status.is_server_error() {
                        tracing::error!(%status, "response");
                    } else {
                        tracing::info!(%status, "response");
                    }
                },
            ),
    )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use time::Duration;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{
        jwt::JwtKeys, password::cheap_hasher, repo::UnavailableUserRepo, services::AuthService,
        store::CredentialStore,
    };
    use crate::state::fake::FakeState;

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        req.body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value, Response<()>) {
        let res = app.clone().oneshot(req).await.unwrap();
        let (parts, body) = res.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (parts.status, json, Response::from_parts(parts, ()))
    }

    fn set_cookie(res: &Response<()>) -> String {
        res.headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    async fn sign_up(app: &Router, email: &str, password: &str) -> String {
        let (status, body, _) = send(
            app,
            json_request(
                Method::POST,
                "/api/auth/signup",
                None,
                json!({"name": "Ann", "email": email, "password": password}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake().state);
        let res = app
            .oneshot(empty_request(Method::GET, "/api/health", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn account_scenario_over_http() {
        let FakeState {
            state, users, mailer, ..
        } = AppState::fake();
        let app = build_app(state);

        let (status, body, res) = send(
            &app,
            json_request(
                Method::POST,
                "/api/auth/signup",
                None,
                json!({"name": "Ann", "email": "ann@x.com", "password": "secretpw1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
        assert!(body["user"].get("password").is_none());
        assert!(body["user"].get("password_hash").is_none());
        let cookie = set_cookie(&res);
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));

        let (status, body, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/auth/signup",
                None,
                json!({"name": "Ann", "email": "ann@x.com", "password": "secretpw1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(users.count_by_email("ann@x.com"), 1);

        let login = |pw: &'static str| {
            json_request(
                Method::POST,
                "/api/auth/login",
                None,
                json!({"email": "ann@x.com", "password": pw}),
            )
        };
        let (status, wrong_body, _) = send(&app, login("wrong")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, unknown_body, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/auth/login",
                None,
                json!({"email": "nobody@x.com", "password": "secretpw1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(wrong_body, unknown_body);

        let (status, body, _) = send(&app, login("secretpw1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());

        let (status, _, _) = send(
            &app,
            json_request(
                Method::PUT,
                "/api/auth/password/forgot",
                None,
                json!({"email": "ann@x.com"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(users.raw_by_email("ann@x.com").unwrap().pending_reset.is_some());

        let raw = mailer.last_reset_secret().unwrap();
        let (status, body, res) = send(
            &app,
            json_request(
                Method::PUT,
                &format!("/api/auth/password/reset/{raw}"),
                None,
                json!({"password": "newpw123", "confirmPassword": "newpw123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body["token"].is_string());
        assert!(set_cookie(&res).starts_with("token="));
        assert!(users.raw_by_email("ann@x.com").unwrap().pending_reset.is_none());

        let (status, _, _) = send(&app, login("newpw123")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = send(&app, login("secretpw1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn gate_rejects_missing_and_bad_tokens() {
        let app = build_app(AppState::fake().state);

        let (status, body, _) = send(&app, empty_request(Method::GET, "/api/auth/profile", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _, _) = send(
            &app,
            empty_request(Method::GET, "/api/auth/profile", Some("garbage")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = send(
            &app,
            json_request(
                Method::PUT,
                "/api/auth/password/change",
                None,
                json!({"password": "newpw123", "confirmPassword": "newpw123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile_via_header_or_cookie() {
        let app = build_app(AppState::fake().state);
        let token = sign_up(&app, "ann@x.com", "secretpw1").await;

        let (status, body, _) = send(
            &app,
            empty_request(Method::GET, "/api/auth/profile", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "ann@x.com");
        assert_eq!(body["user"]["role"], "user");

        let req = Request::builder()
            .uri("/api/auth/profile")
            .header(header::COOKIE, format!("token={token}"))
            .body(Body::empty())
            .unwrap();
        let (status, body, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Ann");
    }

    #[tokio::test]
    async fn store_outage_on_gated_routes_is_500() {
        let FakeState {
            mut state,
            mailer,
            clock,
            ..
        } = AppState::fake();
        let token = sign_up(&build_app(state.clone()), "ann@x.com", "secretpw1").await;

        state.auth = AuthService::new(
            CredentialStore::new(Arc::new(UnavailableUserRepo), cheap_hasher()),
            JwtKeys::new(&state.config.jwt, clock.clone()),
            mailer,
            clock,
            state.config.public_url.clone(),
        );
        let app = build_app(state);

        for uri in ["/api/auth/profile", "/api/auth/logout"] {
            let (status, body, _) =
                send(&app, empty_request(Method::GET, uri, Some(&token))).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            assert_eq!(body["success"], false);
            assert_eq!(body["message"], "Internal Server Error");
        }
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let FakeState { state, clock, .. } = AppState::fake();
        let app = build_app(state);
        let token = sign_up(&app, "ann@x.com", "secretpw1").await;

        clock.advance(Duration::minutes(61));
        let (status, _, _) = send(
            &app,
            empty_request(Method::GET, "/api/auth/profile", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_clears_cookie_but_token_lives_on() {
        let app = build_app(AppState::fake().state);
        let token = sign_up(&app, "ann@x.com", "secretpw1").await;

        let (status, body, res) = send(
            &app,
            empty_request(Method::GET, "/api/auth/logout", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let cookie = set_cookie(&res);
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));

        let (status, _, _) = send(
            &app,
            empty_request(Method::GET, "/api/auth/profile", Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn change_password_over_http() {
        let app = build_app(AppState::fake().state);
        let token = sign_up(&app, "ann@x.com", "secretpw1").await;

        let (status, body, _) = send(
            &app,
            json_request(
                Method::PUT,
                "/api/auth/password/change",
                Some(&token),
                json!({"password": "newpw123", "confirmPassword": "other999"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body, res) = send(
            &app,
            json_request(
                Method::PUT,
                "/api/auth/password/change",
                Some(&token),
                json!({"password": "newpw123", "confirmPassword": "newpw123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Password changed successfully");
        assert!(body.get("token").is_none());
        assert!(set_cookie(&res).is_empty());
    }

    #[tokio::test]
    async fn forgot_password_dispatch_failure_is_500() {
        let FakeState { state, users, mailer, .. } = AppState::fake();
        let app = build_app(state);
        sign_up(&app, "ann@x.com", "secretpw1").await;
        mailer.set_failing(true);

        let (status, body, _) = send(
            &app,
            json_request(
                Method::PUT,
                "/api/auth/password/forgot",
                None,
                json!({"email": "ann@x.com"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to send password reset email");
        assert!(body.get("detail").is_none());
        assert!(users.raw_by_email("ann@x.com").unwrap().pending_reset.is_none());
    }

    #[tokio::test]
    async fn malformed_json_uses_envelope() {
        let app = build_app(AppState::fake().state);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_uses_envelope() {
        let app = build_app(AppState::fake().state);
        let (status, body, _) = send(&app, empty_request(Method::GET, "/api/nope", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn dev_mode_adds_error_detail() {
        let FakeState { mut state, mailer, .. } = AppState::fake();
        let mut config = (*state.config).clone();
        config.dev_mode = true;
        state.config = Arc::new(config);
        let app = build_app(state);
        sign_up(&app, "ann@x.com", "secretpw1").await;
        mailer.set_failing(true);

        let (status, body, _) = send(
            &app,
            json_request(
                Method::PUT,
                "/api/auth/password/forgot",
                None,
                json!({"email": "ann@x.com"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("mail server unavailable"));
    }

    async fn boom() -> &'static str {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn panicking_handler_becomes_500_envelope() {
        let app: Router = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(handle_panic));
        let (status, body, _) = send(&app, empty_request(Method::GET, "/boom", None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal Server Error");
        assert!(!body.to_string().contains("kaboom"));
    }

    #[tokio::test]
    async fn collections_crud() {
        let app = build_app(AppState::fake().state);

        let (status, _, _) = send(
            &app,
            json_request(Method::POST, "/api/collection/create", None, json!({"name": "Summer"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = sign_up(&app, "ann@x.com", "secretpw1").await;
        let t = Some(token.as_str());

        let (status, body, _) = send(
            &app,
            json_request(Method::POST, "/api/collection/create", t, json!({"name": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Collection name is required");

        let (status, body, _) = send(
            &app,
            json_request(Method::POST, "/api/collection/create", t, json!({"name": "Summer"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["collection"]["id"].as_str().unwrap().to_string();

        let (status, body, _) = send(
            &app,
            json_request(
                Method::PUT,
                &format!("/api/collection/update/{id}"),
                t,
                json!({"name": "Winter"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collection"]["name"], "Winter");

        let (status, body, _) = send(&app, empty_request(Method::GET, "/api/collection/get", t)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["collections"].as_array().unwrap().len(), 1);

        let (status, _, _) = send(
            &app,
            empty_request(Method::DELETE, &format!("/api/collection/delete/{id}"), t),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body, _) = send(
            &app,
            empty_request(Method::DELETE, &format!("/api/collection/delete/{id}"), t),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Collection not found");

        let (status, body, _) = send(
            &app,
            empty_request(Method::DELETE, "/api/collection/delete/not-a-uuid", t),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
