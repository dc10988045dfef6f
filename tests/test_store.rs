// tests/test_store.rs

use sqlx::SqlitePool;
use valqual::store::{self, SqliteStore, SubmissionRepository, UpvoteStore};
use valqual::{CategoryFilter, NewSubmission, SubmissionError};

/// Helper to create a test database with migrations
async fn create_test_db() -> SqlitePool {
    let pool = store::create_pool("sqlite::memory:", 1)
        .await
        .expect("Failed to create in-memory database");

    store::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

fn rating(name: &str, category: &str, value: f64, user: &str) -> NewSubmission {
    NewSubmission {
        value,
        quality: 100.0 - value,
        kind: "Restaurant".to_string(),
        category: category.to_string(),
        name: name.to_string(),
        location: "Downtown".to_string(),
        submitter_id: user.to_string(),
    }
}

#[tokio::test]
async fn test_submission_crud_operations() {
    let store = SqliteStore::new(create_test_db().await);

    let first = store
        .insert_submission(&rating("Luigi's", "Italian", 80.0, "alice@example.com"))
        .await
        .expect("Failed to insert submission");
    assert!(first.submitted_at.is_some());
    assert_eq!(first.quality, 20.0);

    for (name, category, value, user) in [
        ("Luigi's", "Italian", 60.0, "bob@example.com"),
        ("Bao House", "Chinese", 70.0, "Alice@Example.com"),
    ] {
        store
            .insert_submission(&rating(name, category, value, user))
            .await
            .unwrap();
    }

    let fetched = store
        .get_submission(first.id)
        .await
        .expect("Failed to get submission")
        .expect("Submission not found");
    assert_eq!(fetched.name, "Luigi's");
    assert_eq!(fetched.kind, "Restaurant");
    assert_eq!(fetched.submitter_id, "alice@example.com");

    let all = store.list_submissions(&CategoryFilter::All).await.unwrap();
    assert_eq!(all.len(), 3);

    let italian = store
        .list_submissions(&CategoryFilter::Only("Italian".to_string()))
        .await
        .unwrap();
    assert_eq!(italian.len(), 2);

    let entity = store.list_submissions_for_entity("Luigi's", "Italian").await.unwrap();
    assert_eq!(entity.len(), 2);
    assert!(store.list_submissions_for_entity("Luigi's", "Pizza").await.unwrap().is_empty());

    let mine = store.list_submissions_by_submitter("  ALICE@example.com ").await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(store.list_submissions_by_submitter("").await.unwrap().is_empty());

    assert!(store.delete_submission(first.id).await.unwrap());
    assert!(!store.delete_submission(first.id).await.unwrap());
    assert!(store.get_submission(first.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_submission_rejected() {
    let store = SqliteStore::new(create_test_db().await);

    let err = store
        .insert_submission(&rating("Luigi's", "Italian", 120.0, "alice@example.com"))
        .await
        .expect_err("value above 100 should be rejected");
    assert_eq!(
        err.downcast_ref::<SubmissionError>(),
        Some(&SubmissionError::ValueOutOfRange(120.0))
    );

    let long_name = "n".repeat(101);
    let err = store
        .insert_submission(&rating(&long_name, "Italian", 50.0, "alice@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::NameTooLong(101))
    ));

    assert!(store.list_submissions(&CategoryFilter::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upvote_rows_are_unique() {
    let store = SqliteStore::new(create_test_db().await);
    let sub = store
        .insert_submission(&rating("Luigi's", "Italian", 80.0, "alice@example.com"))
        .await
        .unwrap();

    assert!(store.add_upvote(sub.id, "bob", "Italian", "Restaurant").await.unwrap());
    assert!(!store.add_upvote(sub.id, "bob", "Italian", "Restaurant").await.unwrap());
    assert!(store.add_upvote(sub.id, "carol", "Italian", "Restaurant").await.unwrap());

    let upvotes = store.load_all_upvotes().await.unwrap();
    assert_eq!(upvotes.len(), 2);
    assert!(upvotes.iter().all(|u| u.submission_id == sub.id && u.timestamp.is_some()));

    assert!(store.remove_upvote(sub.id, "bob").await.unwrap());
    assert!(!store.remove_upvote(sub.id, "bob").await.unwrap());
    assert_eq!(store.load_all_upvotes().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_upvote_for_missing_submission_rejected() {
    let store = SqliteStore::new(create_test_db().await);

    let err = store
        .add_upvote(4242, "bob", "Italian", "Restaurant")
        .await
        .expect_err("upvote on a missing submission should fail");
    assert_eq!(
        err.downcast_ref::<SubmissionError>(),
        Some(&SubmissionError::NotFound(4242))
    );
    assert!(!store.remove_upvote(4242, "bob").await.unwrap());
    assert!(store.load_all_upvotes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_removes_upvotes() {
    let store = SqliteStore::new(create_test_db().await);
    let keep = store
        .insert_submission(&rating("Bao House", "Chinese", 40.0, "bob"))
        .await
        .unwrap();
    let doomed = store
        .insert_submission(&rating("Luigi's", "Italian", 80.0, "alice"))
        .await
        .unwrap();

    store.add_upvote(doomed.id, "bob", "Italian", "Restaurant").await.unwrap();
    store.add_upvote(keep.id, "alice", "Chinese", "Restaurant").await.unwrap();

    store.delete_submission(doomed.id).await.unwrap();

    let upvotes = store.load_all_upvotes().await.unwrap();
    assert_eq!(upvotes.len(), 1);
    assert_eq!(upvotes[0].submission_id, keep.id);
}

#[tokio::test]
async fn test_reassign_submitter() {
    let store = SqliteStore::new(create_test_db().await);
    for (name, category, value, user) in [
        ("Luigi's", "Italian", 80.0, "old@example.com"),
        ("Bao House", "Chinese", 40.0, "old@example.com"),
        ("Pho 1", "Vietnamese", 60.0, "other@example.com"),
    ] {
        store
            .insert_submission(&rating(name, category, value, user))
            .await
            .unwrap();
    }

    let changed = store.reassign_submitter("old@example.com", "Alice Smith").await.unwrap();
    assert_eq!(changed, 2);
    assert_eq!(store.list_submissions_by_submitter("alice smith").await.unwrap().len(), 2);
    assert!(store.list_submissions_by_submitter("old@example.com").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_legacy_rows_without_timestamp() {
    let pool = create_test_db().await;
    sqlx::query(
        "INSERT INTO submissions
             (value, quality, type, category, name, location, user_id, date_submitted)
         VALUES (50, 50, 'Restaurant', 'Italian', 'Old Place', 'Here', NULL, NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO submissions
             (value, quality, type, category, name, location, user_id, date_submitted)
         VALUES (60, 60, 'Restaurant', 'Italian', 'Old Place', 'Here', 'x', 'not a date')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let store = SqliteStore::new(pool);
    let subs = store.list_submissions_for_entity("Old Place", "Italian").await.unwrap();
    assert_eq!(subs.len(), 2);
    assert!(subs.iter().all(|s| s.submitted_at.is_none()));
    assert_eq!(subs[0].submitter_id, "");
}
