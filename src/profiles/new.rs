use axum::{Json, debug_handler, extract::State};
use rand::seq::IndexedRandom;
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppError, AppResult, session};

use super::Profile;

#[derive(Debug, Deserialize)]
pub(crate) struct NewProfileQuery {
    alias: Option<String>,
}

#[debug_handler]
pub(crate) async fn new_profile(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(NewProfileQuery { alias }): Json<NewProfileQuery>,
) -> AppResult<Json<Profile>> {
    let user_id = session::ensure_user(&session).await?;
    let profile = create_profile(&db_pool, &user_id, alias).await?;
    Ok(Json(profile))
}

pub async fn create_profile(
    db_pool: &SqlitePool,
    user_id: &str,
    alias: Option<String>,
) -> AppResult<Profile> {
    let id = Uuid::now_v7();
    let handle = "user".to_owned() + &id.simple().to_string();
    let alias = alias.unwrap_or_else(default_alias);

    sqlx::query("INSERT INTO profiles (id,user_id,handle,alias) VALUES (?,?,?,?)")
        .bind(id.to_string())
        .bind(user_id)
        .bind(&handle)
        .bind(&alias)
        .execute(db_pool)
        .await
        .map_err(AppError::conflict_on_unique)?;

    tracing::info!("added @{handle} for u/{user_id}");
    Ok(Profile { id, handle, alias })
}

fn default_alias() -> String {
    let adjectives = [
        "Quick", "Lazy", "Mysterious", "Jolly", "Brave", "Silent", "Witty", "Fierce",
        "Clever", "Gentle", "Wild", "Calm", "Bold", "Shy", "Proud", "Happy", "Sad",
        "Eager", "Fancy", "Rusty", "Golden", "Silver", "Bright", "Dark", "Lucky",
    ];

    let nouns = [
        "Fox", "Bear", "Eagle", "Wolf", "Dragon", "Tiger", "Lion", "Owl", "Rabbit",
        "Falcon", "Hawk", "Shark", "Panda", "Kitten", "Puppy", "Phoenix", "Griffin",
        "Unicorn", "Turtle", "Dolphin", "Whale", "Elephant", "Giraffe", "Zebra",
    ];

    format!(
        "{} {}",
        adjectives.choose(&mut rand::rng()).unwrap(),
        nouns.choose(&mut rand::rng()).unwrap()
    )
}

#[cfg(test)]
mod tests {
    use super::create_profile;
    use crate::{AppError, db::test_support::test_pool, profiles::resolve_profile};

    #[tokio::test]
    async fn created_profile_resolves_from_user_id() {
        let db_pool = test_pool().await;

        let profile = create_profile(&db_pool, "u-alice", None).await.unwrap();
        let resolved = resolve_profile(&db_pool, "u-alice").await.unwrap();

        assert_eq!(profile.id, resolved);
    }

    #[tokio::test]
    async fn second_profile_for_same_user_conflicts() {
        let db_pool = test_pool().await;

        create_profile(&db_pool, "u-alice", None).await.unwrap();
        let err = create_profile(&db_pool, "u-alice", None).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict));
    }

    #[tokio::test]
    async fn unknown_user_requires_profile() {
        let db_pool = test_pool().await;

        let err = resolve_profile(&db_pool, "u-nobody").await.unwrap_err();
        assert!(matches!(err, AppError::ProfileRequired));
    }
}
