use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppError, AppResult, profiles, session};

use super::{Chat, is_member};

#[debug_handler]
pub(crate) async fn chats(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Vec<Chat>>> {
    let user_id = session::current_user(&session).await?;
    let caller_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    Ok(Json(list_chats(&db_pool, caller_id).await?))
}

#[debug_handler]
pub(crate) async fn chat(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<Chat>> {
    let user_id = session::current_user(&session).await?;
    let caller_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    Ok(Json(get_chat(&db_pool, chat_id, caller_id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatPatch {
    /// Absent field keeps the current name; an explicit null clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    pub published: Option<bool>,
}

fn double_option<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(de).map(Some)
}

#[debug_handler]
pub(crate) async fn update(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(patch): Json<ChatPatch>,
) -> AppResult<Json<Chat>> {
    let user_id = session::current_user(&session).await?;
    let caller_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    Ok(Json(update_chat(&db_pool, chat_id, caller_id, patch).await?))
}

#[debug_handler]
pub(crate) async fn leave(
    Path((chat_id, target_id)): Path<(Uuid, Uuid)>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<()> {
    let user_id = session::current_user(&session).await?;
    let caller_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    remove_member(&db_pool, chat_id, caller_id, target_id).await
}

/// Caller's chats, most recent activity first. A `last_message_id` left
/// dangling by a hard delete joins to nothing and sorts last.
pub async fn list_chats(db_pool: &SqlitePool, caller_id: Uuid) -> AppResult<Vec<Chat>> {
    Ok(sqlx::query_as(
        "SELECT c.id,c.creator_profile_id,c.name,c.published,c.last_message_id \
         FROM chats c \
         JOIN chat_members cm ON cm.chat_id=c.id AND cm.profile_id=? \
         LEFT JOIN messages m ON m.id=c.last_message_id \
         WHERE c.published=1 \
         ORDER BY m.created_at IS NULL, m.created_at DESC",
    )
    .bind(caller_id.to_string())
    .fetch_all(db_pool)
    .await?)
}

/// A non-member gets the same `NotFound` as a missing chat, so existence is
/// never disclosed to outsiders.
pub async fn get_chat(db_pool: &SqlitePool, chat_id: Uuid, caller_id: Uuid) -> AppResult<Chat> {
    let Some(chat): Option<Chat> = sqlx::query_as(
        "SELECT id,creator_profile_id,name,published,last_message_id FROM chats WHERE id=?",
    )
    .bind(chat_id.to_string())
    .fetch_optional(db_pool)
    .await?
    else {
        return Err(AppError::NotFound);
    };

    if !is_member(db_pool, chat_id, caller_id).await? {
        return Err(AppError::NotFound);
    }

    Ok(chat)
}

/// Rename / publish-toggle, creator only.
pub async fn update_chat(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    caller_id: Uuid,
    patch: ChatPatch,
) -> AppResult<Chat> {
    let chat = get_chat(db_pool, chat_id, caller_id).await?;

    if chat.creator_profile_id != caller_id.to_string() {
        tracing::debug!("chat {chat_id} update denied: {caller_id} is not the creator");
        return Err(AppError::Forbidden);
    }

    let name = match patch.name {
        Some(name) => name,
        None => chat.name,
    };
    let published = patch.published.unwrap_or(chat.published);

    sqlx::query("UPDATE chats SET name=?, published=? WHERE id=?")
        .bind(&name)
        .bind(published)
        .bind(chat_id.to_string())
        .execute(db_pool)
        .await?;

    Ok(Chat {
        name,
        published,
        ..chat
    })
}

/// The creator may remove anyone; everyone may remove themself.
pub async fn remove_member(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    caller_id: Uuid,
    target_id: Uuid,
) -> AppResult<()> {
    let chat = get_chat(db_pool, chat_id, caller_id).await?;

    let is_creator = chat.creator_profile_id == caller_id.to_string();
    if !is_creator && caller_id != target_id {
        tracing::debug!("chat {chat_id}: {caller_id} may not remove {target_id}");
        return Err(AppError::Forbidden);
    }

    // Removal also retires the dedup key: the chat no longer holds the full
    // pair, so a fresh chat between those two profiles must be possible.
    let mut tx = db_pool.begin().await?;

    let done = sqlx::query("DELETE FROM chat_members WHERE chat_id=? AND profile_id=?")
        .bind(chat_id.to_string())
        .bind(target_id.to_string())
        .execute(&mut *tx)
        .await?;

    if done.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    sqlx::query("UPDATE chats SET pair_key=NULL WHERE id=?")
        .bind(chat_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}
