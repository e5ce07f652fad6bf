use std::any::Any;

use axum::{
    body::Body,
    extract::{
        rejection::{JsonRejection, PathRejection},
        Request,
    },
    http::{header::CONTENT_LENGTH, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

const INTERNAL_MESSAGE: &str = "Internal Server Error";

/// Every failure a handler can surface. Rendered once, in `into_response`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Unknown email or wrong password; both render the same message.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not authorized to access this route")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Password reset token is invalid or has expired")]
    InvalidOrExpiredToken,

    #[error("Failed to send password reset email")]
    DispatchFailure(#[source] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Full error chain, stashed on the response for the development-mode layer.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Conflict(_)
            | Self::InvalidCredentials
            | Self::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DispatchFailure(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message the client is allowed to see.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::DispatchFailure(e) | Self::Internal(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self.detail(), %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }

        let body = ErrorBody {
            success: false,
            message: self.public_message(),
            detail: None,
        };
        let mut res = (status, Json(body)).into_response();
        res.extensions_mut().insert(ErrorDetail(self.detail()));
        res
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Handler for `CatchPanicLayer`: a panicking handler still answers with the
/// normal 500 envelope.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    AppError::Internal(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}

/// Development-only layer: copies the error chain into the JSON body.
pub async fn expose_error_detail(req: Request, next: Next) -> Response {
    let res = next.run(req).await;
    let Some(ErrorDetail(detail)) = res.extensions().get::<ErrorDetail>().cloned() else {
        return res;
    };

    let (mut parts, body) = res.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return Response::from_parts(parts, Body::empty());
    };
    let mut json: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    json["detail"] = serde_json::Value::String(detail);

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(json.to_string()))
}
