use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppError, AppResult, profiles, session};

use super::{Message, is_member, now_ts};

/// Authors may rewrite a message for this long after sending it.
pub(crate) const EDIT_WINDOW_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Deserialize)]
pub(crate) struct MessageBody {
    content: String,
}

#[debug_handler]
pub(crate) async fn send(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(MessageBody { content }): Json<MessageBody>,
) -> AppResult<Json<Message>> {
    let user_id = session::current_user(&session).await?;
    let author_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    let msg = send_message(&db_pool, chat_id, author_id, content).await?;
    Ok(Json(msg))
}

#[debug_handler]
pub(crate) async fn edit(
    Path(message_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(MessageBody { content }): Json<MessageBody>,
) -> AppResult<Json<Message>> {
    let user_id = session::current_user(&session).await?;
    let caller_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    let msg = edit_message(&db_pool, message_id, caller_id, content).await?;
    Ok(Json(msg))
}

#[debug_handler]
pub(crate) async fn remove(
    Path(message_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<()> {
    let user_id = session::current_user(&session).await?;
    let caller_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    delete_message(&db_pool, message_id, caller_id).await
}

/// Appends to the chat's ledger and moves the recency cursor in the same
/// transaction, so `last_message_id` never points at a message that was
/// never committed.
pub async fn send_message(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    author_id: Uuid,
    content: String,
) -> AppResult<Message> {
    if sqlx::query_as::<_, ()>("SELECT 1 FROM chats WHERE id=?")
        .bind(chat_id.to_string())
        .fetch_optional(db_pool)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    if !is_member(db_pool, chat_id, author_id).await? {
        tracing::debug!("chat {chat_id} send denied: {author_id} is not a member");
        return Err(AppError::Forbidden);
    }

    let id = Uuid::now_v7();
    let now = now_ts();

    let mut tx = db_pool.begin().await?;

    sqlx::query(
        "INSERT INTO messages (id,chat_id,author_id,content,published,created_at,updated_at) \
         VALUES (?,?,?,?,1,?,?)",
    )
    .bind(id.to_string())
    .bind(chat_id.to_string())
    .bind(author_id.to_string())
    .bind(&content)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE chats SET last_message_id=? WHERE id=?")
        .bind(id.to_string())
        .bind(chat_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Message {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        author_id: author_id.to_string(),
        content,
        published: true,
        created_at: now,
        updated_at: now,
    })
}

pub(crate) fn edit_window_open(created_at: i64, now: i64) -> bool {
    now - created_at <= EDIT_WINDOW_SECS
}

/// Author-only, and only while the edit window is open. `updated_at` moves;
/// `created_at` never does.
pub async fn edit_message(
    db_pool: &SqlitePool,
    message_id: Uuid,
    caller_id: Uuid,
    content: String,
) -> AppResult<Message> {
    let mut msg = fetch_message(db_pool, message_id).await?;

    if msg.author_id != caller_id.to_string() {
        tracing::debug!("message {message_id} edit denied: {caller_id} is not the author");
        return Err(AppError::Forbidden);
    }

    let now = now_ts();
    if !edit_window_open(msg.created_at, now) {
        tracing::debug!("message {message_id} edit denied: window expired");
        return Err(AppError::Forbidden);
    }

    sqlx::query("UPDATE messages SET content=?, updated_at=? WHERE id=?")
        .bind(&content)
        .bind(now)
        .bind(message_id.to_string())
        .execute(db_pool)
        .await?;

    msg.content = content;
    msg.updated_at = now;
    Ok(msg)
}

/// Hard removal from the ledger, by the author or the chat's creator. A
/// `last_message_id` still naming the row is tolerated; readers resolve it
/// lazily.
pub async fn delete_message(
    db_pool: &SqlitePool,
    message_id: Uuid,
    caller_id: Uuid,
) -> AppResult<()> {
    let msg = fetch_message(db_pool, message_id).await?;

    let (creator_id,): (String,) =
        sqlx::query_as("SELECT creator_profile_id FROM chats WHERE id=?")
            .bind(&msg.chat_id)
            .fetch_one(db_pool)
            .await?;

    let caller = caller_id.to_string();
    if msg.author_id != caller && creator_id != caller {
        tracing::debug!("message {message_id} delete denied for {caller_id}");
        return Err(AppError::Forbidden);
    }

    sqlx::query("DELETE FROM messages WHERE id=?")
        .bind(message_id.to_string())
        .execute(db_pool)
        .await?;

    Ok(())
}

async fn fetch_message(db_pool: &SqlitePool, message_id: Uuid) -> AppResult<Message> {
    let Some(msg): Option<Message> = sqlx::query_as(
        "SELECT id,chat_id,author_id,content,published,created_at,updated_at \
         FROM messages WHERE id=?",
    )
    .bind(message_id.to_string())
    .fetch_optional(db_pool)
    .await?
    else {
        return Err(AppError::NotFound);
    };

    Ok(msg)
}
