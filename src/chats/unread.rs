use axum::{Json, debug_handler, extract::State};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppResult, profiles, session};

#[derive(Debug, Serialize)]
pub struct UnreadBody {
    unread: i64,
}

#[debug_handler]
pub async fn unread(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<UnreadBody>> {
    let user_id = session::current_user(&session).await?;
    let caller_id = profiles::resolve_profile(&db_pool, &user_id).await?;

    let unread = unread_count(&db_pool, caller_id, &user_id).await?;
    Ok(Json(UnreadBody { unread }))
}

/// Messages the caller can see (published chats they belong to), did not
/// author, and has no receipt for. One statement, one snapshot; never a sum
/// of per-chat counts.
pub async fn unread_count(
    db_pool: &SqlitePool,
    caller_id: Uuid,
    user_id: &str,
) -> AppResult<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM messages m \
         JOIN chats c ON c.id=m.chat_id AND c.published=1 \
         JOIN chat_members cm ON cm.chat_id=m.chat_id AND cm.profile_id=? \
         WHERE m.author_id<>? AND m.published=1 \
           AND NOT EXISTS (SELECT 1 FROM message_reads r \
                           WHERE r.message_id=m.id AND r.user_id=?)",
    )
    .bind(caller_id.to_string())
    .bind(caller_id.to_string())
    .bind(user_id)
    .fetch_one(db_pool)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use crate::{
        AppError,
        chats::{
            ChatPatch, edit_message, mark_all_read, send_message, test_support::seed_chat,
            update_chat,
        },
        db::test_support::test_pool,
    };

    use super::unread_count;

    #[tokio::test]
    async fn own_messages_never_count() {
        let db_pool = test_pool().await;
        let (a, b, chat) = seed_chat(&db_pool).await;
        let chat_id = Uuid::parse_str(&chat.id).unwrap();

        for i in 0..5 {
            send_message(&db_pool, chat_id, a, format!("msg #{i}"))
                .await
                .unwrap();
        }

        assert_eq!(unread_count(&db_pool, a, "u-a").await.unwrap(), 0);
        assert_eq!(unread_count(&db_pool, b, "u-b").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn hello_scenario() {
        let db_pool = test_pool().await;
        let (a, b, chat) = seed_chat(&db_pool).await;
        let chat_id = Uuid::parse_str(&chat.id).unwrap();

        let msg = send_message(&db_pool, chat_id, a, "hello".to_owned())
            .await
            .unwrap();
        assert_eq!(unread_count(&db_pool, b, "u-b").await.unwrap(), 1);

        let marked = mark_all_read(&db_pool, chat_id, b, "u-b").await.unwrap();
        assert_eq!(marked, 1);
        assert_eq!(unread_count(&db_pool, b, "u-b").await.unwrap(), 0);

        // b is not the author, so no edit for them
        let err = edit_message(
            &db_pool,
            Uuid::parse_str(&msg.id).unwrap(),
            b,
            "gotcha".to_owned(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn unpublished_chats_do_not_contribute() {
        let db_pool = test_pool().await;
        let (a, b, chat) = seed_chat(&db_pool).await;
        let chat_id = Uuid::parse_str(&chat.id).unwrap();

        send_message(&db_pool, chat_id, a, "hello".to_owned())
            .await
            .unwrap();
        assert_eq!(unread_count(&db_pool, b, "u-b").await.unwrap(), 1);

        update_chat(
            &db_pool,
            chat_id,
            a,
            ChatPatch {
                published: Some(false),
                ..ChatPatch::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(unread_count(&db_pool, b, "u-b").await.unwrap(), 0);
    }
}
