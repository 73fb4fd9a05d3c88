use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppError, AppResult};

use super::Profile;

#[debug_handler]
pub(crate) async fn profile(
    Path(profile_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Profile>> {
    let Some((handle, alias)): Option<(String, String)> =
        sqlx::query_as("SELECT handle,alias FROM profiles WHERE id=?")
            .bind(profile_id.to_string())
            .fetch_optional(&db_pool)
            .await?
    else {
        return Err(AppError::NotFound);
    };

    Ok(Json(Profile {
        id: profile_id,
        handle,
        alias,
    }))
}
