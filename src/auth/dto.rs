use serde::{Deserialize, Serialize};

use crate::users::repo::User;

/// Request body for the login endpoint. Fields are optional so their absence
/// yields the combined 400, not a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for the token refresh endpoint.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Denormalized user summary returned with a token pair so the caller does
/// not need a second request.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Response for a successful login.
#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserSummary,
}

/// Response for a successful refresh.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}
