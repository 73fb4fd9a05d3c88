use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

/// Error taxonomy of the messaging core. `Forbidden` is deliberately
/// reasonless on the wire; the specific denial is logged server-side.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("a profile is required for messaging")]
    ProfileRequired,
    #[error("conflict")]
    Conflict,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Surfaces a storage-level unique violation as `Conflict`, e.g. the
    /// loser of a chat-creation race on the member pair.
    pub(crate) fn conflict_on_unique(err: sqlx::Error) -> AppError {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict,
            _ => AppError::Db(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::ProfileRequired => (StatusCode::PRECONDITION_FAILED, self.to_string()),
            AppError::Conflict => (StatusCode::CONFLICT, self.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Db(err) => {
                tracing::error!("storage failure: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
            }
            AppError::Session(err) => {
                tracing::error!("session failure: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
            }
            AppError::Internal(err) => {
                tracing::error!("internal failure: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
            }
        };

        let body = Json(json!({
            "error": {
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
