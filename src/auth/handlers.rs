use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::auth::dto::{RefreshRequest, RefreshResponse, TokenPairResponse, TokenRequest, UserSummary};
use crate::auth::jwt::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::User;
use crate::users::service;

pub fn token_routes() -> Router<AppState> {
    Router::new()
        .route("/token/", post(obtain_token_pair))
        .route("/token/refresh/", post(refresh_access_token))
}

/// POST /token/ — email/password login issuing an access/refresh pair plus a
/// denormalized user summary. Bad credentials are a 400, not a 500: wrong
/// input, not a server fault.
#[instrument(skip(state, payload))]
pub async fn obtain_token_pair(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        warn!("login with missing email or password");
        return Err(ApiError::Credentials("Se requiere email y contraseña"));
    };

    let user = service::authenticate(&state.db, &email, &password)
        .await
        .map_err(ApiError::internal("Error interno"))?
        .ok_or(ApiError::Credentials(
            "Credenciales incorrectas o usuario inactivo",
        ))?;

    let keys = JwtKeys::from_ref(&state);
    let access = keys
        .sign_access(user.id, &user.email)
        .map_err(ApiError::internal("Error interno"))?;
    let refresh = keys
        .sign_refresh(user.id, &user.email)
        .map_err(ApiError::internal("Error interno"))?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(Json(TokenPairResponse {
        access,
        refresh,
        user: UserSummary::from(&user),
    }))
}

/// POST /token/refresh/ — trade a valid refresh token for a new access
/// token. The user must still exist and be active.
#[instrument(skip(state, payload))]
pub async fn refresh_access_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        ApiError::Unauthorized("Token de actualización inválido")
    })?;

    let user = User::find_by_id(&state.db, claims.user_id)
        .await
        .map_err(ApiError::internal("Error interno"))?
        .filter(|u| u.is_active)
        .ok_or(ApiError::Unauthorized("El usuario no existe"))?;

    let access = keys
        .sign_access(user.id, &user.email)
        .map_err(ApiError::internal("Error interno"))?;

    info!(user_id = user.id, "access token refreshed");
    Ok(Json(RefreshResponse { access }))
}
