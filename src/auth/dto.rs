use serde::{Deserialize, Serialize};

use super::repo_types::PublicUser;

/// Request body for signup. Missing fields deserialize as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: String,
    #[serde(alias = "confirm_password")]
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub password: String,
    #[serde(alias = "confirm_password")]
    pub confirm_password: String,
}

/// Envelope for every successful auth response.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl AuthResponse {
    pub fn session(user: PublicUser, token: String) -> Self {
        Self {
            success: true,
            message: None,
            user: Some(user),
            token: Some(token),
        }
    }

    pub fn user(user: PublicUser) -> Self {
        Self {
            success: true,
            message: None,
            user: Some(user),
            token: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            user: None,
            token: None,
        }
    }
}
