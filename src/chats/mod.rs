mod chat;
mod msg;
mod new;
mod read;
pub mod unread;

use axum::{
    Router,
    routing::{delete, get, post},
};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppResult, AppState};

pub use chat::{ChatPatch, get_chat, list_chats, remove_member, update_chat};
pub use msg::{delete_message, edit_message, send_message};
pub use new::create_chat;
pub use read::{mark_all_read, mark_read};
pub use unread::unread_count;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(chat::chats))
        .route("/new", post(new::new_chat))
        .route("/{uuid}", get(chat::chat).post(chat::update))
        .route("/{uuid}/members/{profile_id}", delete(chat::leave))
        .route("/{uuid}/msg", post(msg::send))
        .route("/{uuid}/read_all", post(read::mark_all))
}

pub fn message_router() -> Router<AppState> {
    Router::new()
        .route("/{uuid}", post(msg::edit).delete(msg::remove))
        .route("/{uuid}/read", post(read::mark_one))
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Chat {
    pub id: String,
    pub creator_profile_id: String,
    pub name: Option<String>,
    pub published: bool,
    pub last_message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub author_id: String,
    pub content: String,
    pub published: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MessageRead {
    pub message_id: String,
    pub user_id: String,
    pub read_at: i64,
}

/// Unordered pair of member profiles, the dedup key for dyadic chats.
pub(crate) fn pair_key(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}:{hi}")
}

pub(crate) fn now_ts() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

pub(crate) async fn is_member(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    profile_id: Uuid,
) -> AppResult<bool> {
    Ok(
        sqlx::query_as::<_, ()>("SELECT 1 FROM chat_members WHERE chat_id=? AND profile_id=?")
            .bind(chat_id.to_string())
            .bind(profile_id.to_string())
            .fetch_optional(db_pool)
            .await?
            .is_some(),
    )
}
