use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppError, AppResult, profiles, session};

use super::{MessageRead, is_member, now_ts};

#[debug_handler]
pub(crate) async fn mark_one(
    Path(message_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<MessageRead>> {
    let user_id = session::current_user(&session).await?;
    let caller_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    let receipt = mark_read(&db_pool, message_id, caller_id, &user_id).await?;
    Ok(Json(receipt))
}

#[derive(Debug, Serialize)]
pub(crate) struct MarkedCount {
    marked_count: u64,
}

#[debug_handler]
pub(crate) async fn mark_all(
    Path(chat_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<MarkedCount>> {
    let user_id = session::current_user(&session).await?;
    let caller_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    let marked_count = mark_all_read(&db_pool, chat_id, caller_id, &user_id).await?;
    Ok(Json(MarkedCount { marked_count }))
}

/// Latches a read receipt for one message. Marking an already-read message
/// hands back the existing receipt instead of erroring.
pub async fn mark_read(
    db_pool: &SqlitePool,
    message_id: Uuid,
    caller_id: Uuid,
    user_id: &str,
) -> AppResult<MessageRead> {
    let Some((chat_id,)): Option<(String,)> =
        sqlx::query_as("SELECT chat_id FROM messages WHERE id=?")
            .bind(message_id.to_string())
            .fetch_optional(db_pool)
            .await?
    else {
        return Err(AppError::NotFound);
    };

    let chat_id = Uuid::parse_str(&chat_id).map_err(anyhow::Error::from)?;
    if !is_member(db_pool, chat_id, caller_id).await? {
        tracing::debug!("message {message_id} read denied: {caller_id} is not a member");
        return Err(AppError::Forbidden);
    }

    sqlx::query("INSERT OR IGNORE INTO message_reads (message_id,user_id,read_at) VALUES (?,?,?)")
        .bind(message_id.to_string())
        .bind(user_id)
        .bind(now_ts())
        .execute(db_pool)
        .await?;

    let receipt: MessageRead = sqlx::query_as(
        "SELECT message_id,user_id,read_at FROM message_reads WHERE message_id=? AND user_id=?",
    )
    .bind(message_id.to_string())
    .bind(user_id)
    .fetch_one(db_pool)
    .await?;

    Ok(receipt)
}

/// Receipts every message in the chat the caller did not author, in one
/// duplicate-skipping statement, and reports how many were new. Racing a
/// concurrent single [`mark_read`] is harmless on both sides.
pub async fn mark_all_read(
    db_pool: &SqlitePool,
    chat_id: Uuid,
    caller_id: Uuid,
    user_id: &str,
) -> AppResult<u64> {
    if sqlx::query_as::<_, ()>("SELECT 1 FROM chats WHERE id=?")
        .bind(chat_id.to_string())
        .fetch_optional(db_pool)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    if !is_member(db_pool, chat_id, caller_id).await? {
        tracing::debug!("chat {chat_id} read_all denied: {caller_id} is not a member");
        return Err(AppError::Forbidden);
    }

    let done = sqlx::query(
        "INSERT OR IGNORE INTO message_reads (message_id,user_id,read_at) \
         SELECT id,?,? FROM messages WHERE chat_id=? AND author_id<>?",
    )
    .bind(user_id)
    .bind(now_ts())
    .bind(chat_id.to_string())
    .bind(caller_id.to_string())
    .execute(db_pool)
    .await?;

    Ok(done.rows_affected())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::{
        AppError,
        chats::{send_message, test_support::seed_chat},
        db::test_support::{seed_profile, test_pool},
    };

    use super::{mark_all_read, mark_read};

    #[tokio::test]
    async fn marking_twice_keeps_one_receipt_and_never_errors() {
        let db_pool = test_pool().await;
        let (a, b, chat) = seed_chat(&db_pool).await;
        let chat_id = Uuid::parse_str(&chat.id).unwrap();

        let msg = send_message(&db_pool, chat_id, a, "hello".to_owned())
            .await
            .unwrap();
        let msg_id = Uuid::parse_str(&msg.id).unwrap();

        let first = mark_read(&db_pool, msg_id, b, "u-b").await.unwrap();
        let second = mark_read(&db_pool, msg_id, b, "u-b").await.unwrap();
        assert_eq!(first.read_at, second.read_at);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM message_reads")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn non_members_cannot_mark() {
        let db_pool = test_pool().await;
        let (a, _, chat) = seed_chat(&db_pool).await;
        let outsider = seed_profile(&db_pool, "u-c").await;
        let chat_id = Uuid::parse_str(&chat.id).unwrap();

        let msg = send_message(&db_pool, chat_id, a, "hello".to_owned())
            .await
            .unwrap();
        let msg_id = Uuid::parse_str(&msg.id).unwrap();

        let err = mark_read(&db_pool, msg_id, outsider, "u-c")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let err = mark_all_read(&db_pool, chat_id, outsider, "u-c")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn mark_all_skips_own_messages_and_existing_receipts() {
        let db_pool = test_pool().await;
        let (a, b, chat) = seed_chat(&db_pool).await;
        let chat_id = Uuid::parse_str(&chat.id).unwrap();

        for i in 0..3 {
            send_message(&db_pool, chat_id, a, format!("from a #{i}"))
                .await
                .unwrap();
        }
        let own = send_message(&db_pool, chat_id, b, "from b".to_owned())
            .await
            .unwrap();

        // one of a's messages was already read individually
        let (first_id,): (String,) =
            sqlx::query_as("SELECT id FROM messages WHERE author_id=? LIMIT 1")
                .bind(a.to_string())
                .fetch_one(&db_pool)
                .await
                .unwrap();
        mark_read(&db_pool, Uuid::parse_str(&first_id).unwrap(), b, "u-b")
            .await
            .unwrap();

        let marked = mark_all_read(&db_pool, chat_id, b, "u-b").await.unwrap();
        assert_eq!(marked, 2);

        // nothing receipted for b's own message
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM message_reads WHERE message_id=?")
                .bind(&own.id)
                .fetch_one(&db_pool)
                .await
                .unwrap();
        assert_eq!(count, 0);

        // a second sweep finds nothing new
        let marked = mark_all_read(&db_pool, chat_id, b, "u-b").await.unwrap();
        assert_eq!(marked, 0);
    }

    #[tokio::test]
    async fn overlapping_single_and_bulk_marks_both_succeed() {
        let db_pool = test_pool().await;
        let (a, b, chat) = seed_chat(&db_pool).await;
        let chat_id = Uuid::parse_str(&chat.id).unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            let msg = send_message(&db_pool, chat_id, a, format!("msg #{i}"))
                .await
                .unwrap();
            ids.push(Uuid::parse_str(&msg.id).unwrap());
        }

        let (single, bulk) = tokio::join!(
            mark_read(&db_pool, ids[2], b, "u-b"),
            mark_all_read(&db_pool, chat_id, b, "u-b"),
        );
        single.unwrap();
        bulk.unwrap();

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM message_reads WHERE user_id=?")
                .bind("u-b")
                .fetch_one(&db_pool)
                .await
                .unwrap();
        assert_eq!(count, 5);
    }
}
