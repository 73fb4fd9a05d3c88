use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

/// The whole store. Uuids go in as TEXT, timestamps as unix seconds.
///
/// `chats.pair_key` is the unordered member pair (`min_uuid:max_uuid`); its
/// UNIQUE constraint is what makes dyadic chats deduplicate, including under
/// concurrent creation from both sides. The key is retired (NULLed) once a
/// member leaves, since the chat no longer holds that exact pair.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profiles (
    id        TEXT PRIMARY KEY,
    user_id   TEXT NOT NULL UNIQUE,
    handle    TEXT NOT NULL,
    alias     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chats (
    id                  TEXT PRIMARY KEY,
    creator_profile_id  TEXT NOT NULL,
    name                TEXT,
    published           INTEGER NOT NULL DEFAULT 1,
    last_message_id     TEXT,
    pair_key            TEXT UNIQUE
);

CREATE TABLE IF NOT EXISTS chat_members (
    chat_id     TEXT NOT NULL,
    profile_id  TEXT NOT NULL,
    PRIMARY KEY (chat_id, profile_id)
);

CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY,
    chat_id     TEXT NOT NULL,
    author_id   TEXT NOT NULL,
    content     TEXT NOT NULL,
    published   INTEGER NOT NULL DEFAULT 1,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS message_reads (
    message_id  TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    read_at     INTEGER NOT NULL,
    PRIMARY KEY (message_id, user_id)
);
";

pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(url)
        .await?;
    init(&db_pool).await?;
    Ok(db_pool)
}

pub async fn init(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for stmt in SCHEMA.split(';') {
        if stmt.trim().is_empty() {
            continue;
        }
        sqlx::query(stmt).execute(db_pool).await?;
    }
    Ok(())
}
