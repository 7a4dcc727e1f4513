#![cfg(feature = "sqlite")]

mod common;

use common::*;
use futures_util::future::join_all;
use sift_data::prelude::*;

const CALLERS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_find_or_create_inserts_once() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("race.db").display());
    let pool = sift_data_sqlx::connect(&url, 4).await.unwrap();
    create_schema(&pool).await;
    let repo = users(&pool);

    let handles = (0..CALLERS).map(|i| {
        let repo = repo.clone();
        tokio::spawn(async move {
            let cx = QueryCtx::new();
            let cond = Condition::eq("email", "race@example.com");
            let user = User::new(&format!("caller {i}"), "race@example.com", 30, "member");
            repo.find_or_create(&cx, &cond, &user, QueryOptions::default()).await
        })
    });
    let results: Vec<(User, bool)> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let created = results.iter().filter(|(_, created)| *created).count();
    assert_eq!(created, 1);
    let first_id = results[0].0.id;
    assert!(results.iter().all(|(user, _)| user.id == first_id));

    let cx = QueryCtx::new();
    assert_eq!(
        repo.count(&cx, Some(&Condition::eq("email", "race@example.com"))).await.unwrap(),
        1
    );
    pool.close().await;
}

#[tokio::test]
async fn test_find_or_create_ignores_soft_deleted_match() {
    let pool = memory_pool().await;
    let repo = users(&pool);
    let cx = QueryCtx::new();
    let cond = Condition::eq("name", "Ghost");

    let (ghost, _) = repo
        .find_or_create(&cx, &cond, &User::new("Ghost", "ghost@example.com", 40, "guest"), QueryOptions::default())
        .await
        .unwrap();
    repo.delete_by_id(&cx, &ghost.id).await.unwrap();

    let (again, created) = repo
        .find_or_create(&cx, &cond, &User::new("Ghost", "ghost2@example.com", 40, "guest"), QueryOptions::default())
        .await
        .unwrap();
    assert!(created);
    assert_ne!(again.id, ghost.id);
    assert_eq!(again.email, "ghost2@example.com");
}
