//! Integration tests for SQLite-backed connection profiles.
//!
//! Each profile gets its own database file; writes through one profile's
//! context must never be visible through another's.

use db_context_mux::config::ProfileConfig;
use db_context_mux::db::{DbPool, SqlContext};
use db_context_mux::error::DbError;
use db_context_mux::models::DatabaseType;
use db_context_mux::mux::{Multiplexer, Services};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

fn sqlite(ctx: &SqlContext) -> &SqlitePool {
    match ctx.pool().unwrap() {
        DbPool::SQLite(pool) => pool,
        other => panic!("expected a SQLite pool, got {:?}", other.db_type()),
    }
}

fn url(dir: &TempDir, file: &str) -> String {
    format!("sqlite:{}", dir.path().join(file).display())
}

fn register(profiles: Vec<ProfileConfig>) -> Arc<Multiplexer<SqlContext>> {
    let mut services = Services::new();
    let mut builder = services.begin_registering_multiplexer::<SqlContext>();
    for profile in profiles {
        let name = profile.name.clone();
        builder
            .add_connection_profile(name, move |options| {
                options.use_profile_config(&profile);
            })
            .unwrap();
    }
    builder.finish().unwrap()
}

async fn write_marker(ctx: &SqlContext, marker: &str) {
    let pool = sqlite(ctx);
    sqlx::query("CREATE TABLE tenant (marker TEXT NOT NULL)")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO tenant (marker) VALUES (?)")
        .bind(marker)
        .execute(pool)
        .await
        .unwrap();
}

async fn read_markers(ctx: &SqlContext) -> Vec<String> {
    sqlx::query_scalar::<_, String>("SELECT marker FROM tenant ORDER BY marker")
        .fetch_all(sqlite(ctx))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_two_tenants_stay_separate() {
    let dir = TempDir::new().unwrap();
    let mux = register(vec![
        ProfileConfig::parse(&format!("tenant one={}?mode=rwc&writable=true", url(&dir, "one.db")))
            .unwrap(),
        ProfileConfig::parse(&format!("tenant two={}?mode=rwc&writable=true", url(&dir, "two.db")))
            .unwrap(),
    ]);
    assert_eq!(mux.names(), ["tenant one", "tenant two"]);

    {
        let one = mux.get("tenant one").await.unwrap();
        let two = mux.get("tenant two").await.unwrap();
        write_marker(&one, "first").await;
        write_marker(&two, "second").await;
    }

    let all = mux.get_all().await.unwrap();
    assert_eq!(read_markers(&all["tenant one"]).await, vec!["first"]);
    assert_eq!(read_markers(&all["tenant two"]).await, vec!["second"]);
    assert_eq!(all["tenant one"].profile(), "tenant one");

    assert!(dir.path().join("one.db").exists());
    assert!(dir.path().join("two.db").exists());
}

#[tokio::test]
async fn test_contexts_of_one_profile_share_a_database() {
    let dir = TempDir::new().unwrap();
    let mux = register(vec![
        ProfileConfig::parse(&format!("shared={}?writable=true", url(&dir, "shared.db"))).unwrap(),
    ]);

    let a = mux.get("shared").await.unwrap();
    let b = mux.get("shared").await.unwrap();
    write_marker(&a, "from a").await;
    assert_eq!(read_markers(&b).await, vec!["from a"]);

    let version = b.server_version().await.unwrap();
    assert!(version.starts_with('3'), "unexpected SQLite version {}", version);
    a.ping().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_profile_does_not_affect_others() {
    let dir = TempDir::new().unwrap();
    let mux = register(vec![
        // Read-only and missing: the file is never created.
        ProfileConfig::parse(&format!("missing={}", url(&dir, "missing.db"))).unwrap(),
        ProfileConfig::parse(&format!("present={}?writable=true", url(&dir, "present.db"))).unwrap(),
    ]);

    let err = mux.get("missing").await.unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }), "got {:?}", err);
    assert!(err.to_string().contains("missing"));
    assert!(err.suggestion().is_some());

    // A failed build is retried rather than cached.
    assert!(mux.get("missing").await.is_err());
    assert!(mux.pool("missing").unwrap().built_options().is_none());

    let ctx = mux.get("present").await.unwrap();
    ctx.ping().await.unwrap();
}

#[tokio::test]
async fn test_summaries_and_close() {
    let dir = TempDir::new().unwrap();
    let mux = register(vec![
        ProfileConfig::parse(&format!("a={}?writable=true", url(&dir, "a.db"))).unwrap(),
        ProfileConfig::parse(&format!("b={}?writable=true", url(&dir, "b.db"))).unwrap(),
    ]);

    drop(mux.get("a").await.unwrap());

    let summaries = mux.summaries();
    assert_eq!(summaries[0].db_type, Some(DatabaseType::SQLite));
    assert_eq!(summaries[0].created, 1);
    assert_eq!(summaries[1].db_type, None, "b has not been leased yet");

    let json = serde_json::to_string(&summaries).unwrap();
    assert!(!json.contains(dir.path().to_str().unwrap()), "no connection strings in summaries");

    mux.close_all().await;
    let pool = mux
        .pool("a")
        .unwrap()
        .built_options()
        .and_then(|o| o.pool())
        .unwrap();
    assert!(pool.is_closed());
    assert!(matches!(
        mux.get("a").await,
        Err(DbError::Connection { .. })
    ));
}
