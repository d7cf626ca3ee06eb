//! Bulk writer tests: result order, error propagation and the in-flight
//! counter.

mod common;

use common::{ScriptedStore, ids};

use couchtato::database::Database;
use couchtato::document::{BulkResult, Document};
use couchtato::error::DbError;
use couchtato::store::{DocumentStore, InMemoryStore};
use rstest::rstest;
use std::sync::Arc;
use tokio::sync::Notify;

fn scripted(store: ScriptedStore) -> (Arc<ScriptedStore>, Arc<Database>) {
    let store = Arc::new(store);
    let shared: Arc<dyn DocumentStore> = store.clone();
    (store, Arc::new(Database::new(shared)))
}

// =============================================================================
// Results
// =============================================================================

#[rstest]
#[tokio::test]
async fn test_results_are_returned_in_input_order() {
    let (store, database) = scripted(ScriptedStore::new().with_bulk_response(Ok(vec![
        BulkResult::success("a", "2-a"),
        BulkResult::success("b", "2-b"),
    ])));

    let results = database
        .update(vec![Document::new("a"), Document::new("b")])
        .await
        .unwrap();

    let result_ids: Vec<&str> = results.iter().map(|result| result.id.as_str()).collect();
    assert_eq!(result_ids, vec!["a", "b"]);

    let calls = store.bulk_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(ids(&calls[0]), vec!["a", "b"]);
    assert_eq!(database.in_progress(), 0);
}

#[rstest]
#[tokio::test]
async fn test_request_failure_is_propagated() {
    let (store, database) = scripted(
        ScriptedStore::new()
            .with_bulk_response(Err(DbError::Transport("connection reset".to_string()))),
    );

    let result = database.update(vec![Document::new("a")]).await;

    assert_eq!(
        result,
        Err(DbError::Transport("connection reset".to_string()))
    );
    assert_eq!(store.bulk_calls().len(), 1);
    assert_eq!(database.in_progress(), 0);
    assert!(database.done());
}

#[rstest]
#[tokio::test]
async fn test_conflicts_are_passed_through() {
    let store = InMemoryStore::with_documents([Document::new("a"), Document::new("b")]);
    let current = store.get("b").await.unwrap();
    let database = Database::from_store(store.clone());

    let results = database
        .update(vec![
            Document::new("a").with_rev("9-stale").with_field("x", 1),
            current.with_field("x", 2),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_conflict());
    assert_eq!(results[0].id, "a");
    assert!(results[1].is_ok());
    assert!(results[1].rev.as_deref().unwrap().starts_with("2-"));
    assert!(store.get("a").await.unwrap().get("x").is_none());
}

#[rstest]
#[tokio::test]
async fn test_deleted_documents_carry_marker() {
    let (store, database) = scripted(ScriptedStore::new());
    let mut doc = Document::new("a").with_rev("1-a");
    doc.mark_deleted();

    database.update(vec![doc]).await.unwrap();

    let sent = &store.bulk_calls()[0][0];
    assert!(sent.is_deleted());
    assert_eq!(sent.to_value()["_deleted"], serde_json::json!(true));
}

#[rstest]
#[tokio::test]
async fn test_deleted_documents_leave_listing() {
    let store = InMemoryStore::with_documents([Document::new("a"), Document::new("b")]);
    let mut doc = store.get("a").await.unwrap();
    doc.mark_deleted();
    let database = Database::from_store(store.clone());

    let results = database.update(vec![doc]).await.unwrap();

    assert!(results[0].is_ok());
    assert!(store.get("a").await.is_none());
    assert_eq!(store.len().await, 1);
}

// =============================================================================
// In-flight counter
// =============================================================================

#[rstest]
fn test_fresh_database_is_done() {
    let database = Database::from_store(InMemoryStore::new());

    assert_eq!(database.in_progress(), 0);
    assert!(database.done());
}

#[rstest]
#[tokio::test]
async fn test_counter_covers_write_in_flight() {
    let gate = Arc::new(Notify::new());
    let (_store, database) = scripted(ScriptedStore::new().with_bulk_gate(Arc::clone(&gate)));

    let writer = {
        let database = Arc::clone(&database);
        tokio::spawn(async move { database.update(vec![Document::new("a")]).await })
    };

    while database.in_progress() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(database.in_progress(), 1);
    assert!(!database.done());

    gate.notify_one();
    let results = writer.await.unwrap().unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(database.in_progress(), 0);
    assert!(database.done());
}
