//! End-to-end exercise of the tiered memory path: a real SQLite database as
//! the relational tier, an in-process cache, and registry-managed lifecycle.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;

use mneme::memory::adapters::{register_backends, RELATIONAL_STORE_KEY};
use mneme::memory::MemoryCache;
use mneme::{
    MemoryConfig, MessageRole, RelationalStoreConfig, ServiceRegistry, SessionCache,
    SessionMemoryStore,
};

async fn seed_database(path: &std::path::Path) {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS conversation_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
    )
    .execute(&pool)
    .await
    .unwrap();

    for (role, content, created_at) in [
        ("user", "what is my order status?", "2024-03-01T10:00:00Z"),
        ("assistant", "it shipped yesterday", "2024-03-01T10:00:05Z"),
    ] {
        sqlx::query(
            "INSERT INTO conversation_history (conversation_id, role, content, created_at) \
             VALUES ('t1', ?, ?, ?)",
        )
        .bind(role)
        .bind(content)
        .bind(created_at)
        .execute(&pool)
        .await
        .unwrap();
    }
    pool.close().await;
}

#[tokio::test]
async fn cold_cache_recovers_from_sqlite_and_stays_warm() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("history.db");
    seed_database(&db_path).await;

    let config = MemoryConfig {
        relational_store: RelationalStoreConfig {
            enabled: true,
            path: Some(db_path),
        },
        ..MemoryConfig::default()
    };

    let cache = MemoryCache::new(Duration::from_secs(300));
    let registry = Arc::new(ServiceRegistry::new());
    register_backends(&registry, &config).await.unwrap();

    // Nothing is constructed until first use.
    assert_eq!(
        registry.status().await,
        vec![(RELATIONAL_STORE_KEY.to_string(), false)]
    );

    let report = registry.initialize_all().await;
    assert!(report.all_ok());

    let store = SessionMemoryStore::new(
        SessionCache::Memory(cache.clone()),
        Arc::clone(&registry),
    );

    let history = store.get_messages("t1", None, false).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[0].content, "what is my order status?");
    assert_eq!(history[1].role, MessageRole::Assistant);

    // A second store sharing the cache but with no durable tiers at all
    // still sees the conversation: the fallback repopulated the cache.
    let cache_only = SessionMemoryStore::new(
        SessionCache::Memory(cache.clone()),
        Arc::new(ServiceRegistry::new()),
    );
    let warm = cache_only.get_messages("t1", None, false).await.unwrap();
    assert_eq!(warm, history);

    // Unknown conversations degrade to empty on every path.
    assert!(store.get_messages("t2", None, false).await.unwrap().is_empty());

    registry.shutdown_all().await;
    assert_eq!(
        registry.status().await,
        vec![(RELATIONAL_STORE_KEY.to_string(), false)]
    );
}
