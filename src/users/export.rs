use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use time::format_description::FormatItem;
use time::macros::format_description;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::User;

const CSV_HEADER: [&str; 6] = ["id", "email", "first_name", "last_name", "phone", "date_joined"];
const CSV_TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Render all users as a six-column CSV table, header row first. Missing
/// values become empty strings. The whole table is materialized in memory.
pub fn render_users_csv(users: &[User]) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for user in users {
        writer.write_record([
            user.id.to_string(),
            user.email.clone(),
            user.first_name.clone(),
            user.last_name.clone(),
            user.phone.clone().unwrap_or_default(),
            user.date_joined.format(CSV_TIMESTAMP)?,
        ])?;
    }
    let bytes = writer.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}

/// GET /users/export/csv/ — the one route without a token guard, matching
/// the original service. Flagged in DESIGN.md.
#[instrument(skip(state))]
pub async fn export_users_csv(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let users = User::list_all(&state.db)
        .await
        .map_err(ApiError::internal("Error interno"))?;
    let body = render_users_csv(&users).map_err(ApiError::internal("Error interno"))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"users.csv\"",
            ),
        ],
        body,
    ))
}
