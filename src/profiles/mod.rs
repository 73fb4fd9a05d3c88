mod new;
mod page;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new", post(new::new_profile))
        .route("/{uuid}", get(page::profile))
}

#[derive(Debug, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub handle: String,
    pub alias: String,
}

/// Maps an authenticated caller to their marketplace profile. Every mutating
/// chat/message operation resolves through here first; a caller without a
/// profile cannot message at all.
pub async fn resolve_profile(db_pool: &SqlitePool, user_id: &str) -> AppResult<Uuid> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM profiles WHERE user_id=?")
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;

    let (id,) = row.ok_or(AppError::ProfileRequired)?;
    Ok(Uuid::parse_str(&id).map_err(anyhow::Error::from)?)
}

pub async fn profile_exists(db_pool: &SqlitePool, profile_id: Uuid) -> AppResult<bool> {
    Ok(
        sqlx::query_as::<_, ()>("SELECT 1 FROM profiles WHERE id=?")
            .bind(profile_id.to_string())
            .fetch_optional(db_pool)
            .await?
            .is_some(),
    )
}
