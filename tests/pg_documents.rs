//! Postgres document engine against a live database.
//!
//! Needs `DATABASE_URL`; run with `cargo test -- --ignored`.

use std::sync::Arc;

use cachet::application::documents::{DocumentWriter, QueryEngine};
use cachet::application::query::{Filter, Query};
use cachet::cache::{CacheConfig, CacheOptions, CachedQueryEngine, MemoryKvStore};
use cachet::domain::actor::Actor;
use cachet::domain::blogs::{Blog, NewBlog};
use cachet::infra::db::PgDocuments;
use sqlx::PgPool;

fn blog(owner: &Actor, title: &str) -> Blog {
    Blog::new(
        owner,
        NewBlog {
            title: title.to_string(),
            content: String::new(),
        },
    )
    .expect("valid blog")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn containment_filters_match_owned_documents(pool: PgPool) {
    let documents = PgDocuments::new(pool);
    let u1 = Actor::new("u1").expect("actor");
    let u2 = Actor::new("u2").expect("actor");

    let first = blog(&u1, "first");
    documents.insert(&first).await.expect("insert");
    documents.insert(&blog(&u2, "other")).await.expect("insert");
    documents.insert(&blog(&u1, "second")).await.expect("insert");

    let mine: Vec<Blog> = documents
        .find(Filter::new().eq("_user", "u1"))
        .await
        .expect("find");
    let titles: Vec<&str> = mine.iter().map(|blog| blog.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "second"]);

    let found: Option<Blog> = documents
        .find_one(
            Filter::new()
                .eq("_user", "u1")
                .eq("_id", first.id.to_string()),
        )
        .await
        .expect("find one");
    assert_eq!(found, Some(first));

    documents.health_check().await.expect("database reachable");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn cached_reads_skip_the_database_on_hit(pool: PgPool) {
    let documents = PgDocuments::new(pool.clone());
    let u1 = Actor::new("u1").expect("actor");
    documents.insert(&blog(&u1, "first")).await.expect("insert");

    let store = Arc::new(MemoryKvStore::new());
    let cached = CachedQueryEngine::new(documents.clone(), store.clone(), CacheConfig::default());
    let query =
        Query::<Blog>::find(Filter::new().eq("_user", "u1")).cache(CacheOptions::for_actor(&u1));

    let before = cached.execute(&query).await.expect("miss").into_many();
    sqlx::query("DELETE FROM documents")
        .execute(&pool)
        .await
        .expect("truncate");
    let after = cached.execute(&query).await.expect("hit").into_many();

    assert_eq!(before, after, "hit is served from the cache");
    assert_eq!(store.group_len("u1"), 1);
}
