use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppError, AppResult};

pub const USER_ID: &str = "user_id";

/// The opaque caller identity the surrounding auth layer put in the session.
pub async fn current_user(session: &Session) -> AppResult<String> {
    session
        .get::<String>(USER_ID)
        .await?
        .ok_or(AppError::Forbidden)
}

/// Like [`current_user`] but mints an identity for a fresh session. Only the
/// profile-creation entry point uses this; everything else requires an
/// already-established caller.
pub async fn ensure_user(session: &Session) -> AppResult<String> {
    if let Some(user_id) = session.get::<String>(USER_ID).await? {
        return Ok(user_id);
    }

    let user_id = Uuid::now_v7().to_string();
    session.insert(USER_ID, user_id.clone()).await?;
    Ok(user_id)
}
