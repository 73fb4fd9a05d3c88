use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppError, AppResult, profiles, session};

use super::{Chat, pair_key};

#[derive(Debug, Deserialize)]
pub(crate) struct NewChatQuery {
    participant_id: Uuid,
    name: Option<String>,
}

#[debug_handler]
pub(crate) async fn new_chat(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(NewChatQuery {
        participant_id,
        name,
    }): Json<NewChatQuery>,
) -> AppResult<Json<Chat>> {
    let user_id = session::current_user(&session).await?;
    let creator_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    let chat = create_chat(&db_pool, creator_id, participant_id, name).await?;
    Ok(Json(chat))
}

/// Opens the one chat between two profiles. A second call for the same pair,
/// in either order, is `Conflict`; the caller is expected to fetch the
/// existing chat instead.
pub async fn create_chat(
    db_pool: &SqlitePool,
    creator_id: Uuid,
    participant_id: Uuid,
    name: Option<String>,
) -> AppResult<Chat> {
    if creator_id == participant_id {
        return Err(AppError::BadRequest(
            "a chat needs two distinct profiles".to_owned(),
        ));
    }

    if !profiles::profile_exists(db_pool, participant_id).await? {
        return Err(AppError::NotFound);
    }

    let id = Uuid::now_v7();
    let key = pair_key(creator_id, participant_id);

    // Chat and both memberships land together or not at all. The pair_key
    // UNIQUE constraint decides concurrent creations from both sides.
    let mut tx = db_pool.begin().await?;

    sqlx::query("INSERT INTO chats (id,creator_profile_id,name,published,pair_key) VALUES (?,?,?,1,?)")
        .bind(id.to_string())
        .bind(creator_id.to_string())
        .bind(&name)
        .bind(&key)
        .execute(&mut *tx)
        .await
        .map_err(AppError::conflict_on_unique)?;

    for profile_id in [creator_id, participant_id] {
        sqlx::query("INSERT INTO chat_members (chat_id,profile_id) VALUES (?,?)")
            .bind(id.to_string())
            .bind(profile_id.to_string())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!("chat {id} opened by {creator_id} with {participant_id}");

    Ok(Chat {
        id: id.to_string(),
        creator_profile_id: creator_id.to_string(),
        name,
        published: true,
        last_message_id: None,
    })
}
