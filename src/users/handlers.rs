use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use tracing::{info, instrument};

use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::{CreateUserRequest, UpdateUserRequest, UserOut};
use crate::users::export::export_users_csv;
use crate::users::repo::User;
use crate::users::service::{self, UserError};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", get(list_users).post(create_user))
        .route("/users/:id/", put(update_user).delete(delete_user))
        .route("/users/export/csv/", get(export_users_csv))
}

/// GET /users/ — the whole table, no pagination.
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let users = User::list_all(&state.db)
        .await
        .map_err(ApiError::internal("Error interno"))?;
    let data: Vec<UserOut> = users.iter().map(UserOut::from).collect();
    Ok(Json(json!({ "data": data })))
}

/// POST /users/ — gated behind an existing session: this is admin
/// provisioning, not public sign-up.
#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let user = service::create_user(&state.db, payload)
        .await
        .map_err(|e| match e {
            UserError::Invalid(fields) => ApiError::Validation {
                mensaje: "Error al crear el usuario",
                fields,
            },
            UserError::Db(source) => ApiError::Internal {
                mensaje: "Error interno al crear el usuario",
                source,
            },
        })?;

    info!(user_id = user.id, email = %user.email, "user created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "mensaje": "El usuario se creó correctamente",
            "data": UserOut::from(&user),
        })),
    ))
}

/// PUT /users/:id/ — partial update; password re-hashed only when supplied.
#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await
        .map_err(ApiError::internal("Error interno"))?
        .ok_or(ApiError::NotFound("El usuario no existe"))?;

    let updated = service::update_user(&state.db, user, payload)
        .await
        .map_err(|e| match e {
            UserError::Invalid(fields) => ApiError::Validation {
                mensaje: "Error al actualizar el usuario",
                fields,
            },
            UserError::Db(source) => ApiError::Internal {
                mensaje: "Error interno",
                source,
            },
        })?;

    info!(user_id = updated.id, "user updated");
    Ok(Json(json!({
        "mensaje": "El usuario se actualizó correctamente",
        "data": UserOut::from(&updated),
    })))
}

/// DELETE /users/:id/ — unconditional delete, no soft-delete. Replies with a
/// bare 204; the original paired a JSON body with 204, which HTTP forbids
/// (decision recorded in DESIGN.md).
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = User::delete(&state.db, id)
        .await
        .map_err(ApiError::internal("Error interno"))?;
    if !deleted {
        return Err(ApiError::NotFound("El usuario no existe"));
    }
    info!(user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
