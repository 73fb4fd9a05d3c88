use axum::{Router, routing::get};
use markethall::{AppState, chats, db, profiles};
use tower_http::cors::CorsLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(30)));

    let db_pool = db::connect(dotenv::var("DATABASE_URL").unwrap().as_str())
        .await
        .unwrap();

    let app_state = AppState { db_pool };

    let app = Router::new()
        .route("/unread", get(chats::unread::unread))
        .nest("/c", chats::router())
        .nest("/m", chats::message_router())
        .nest("/p", profiles::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
