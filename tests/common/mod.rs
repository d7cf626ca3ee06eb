//! Common test helpers for integration tests.
//!
//! # Note
//!
//! The `#![allow(dead_code)]` attribute is necessary because Rust compiles each
//! integration test file as a separate crate, and not every file uses every
//! helper.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::Notify;

use couchtato::document::{BulkResult, Document, ListOptions, ListRow};
use couchtato::error::DbError;
use couchtato::store::{DocumentStore, StoreFuture};

// =============================================================================
// Scripted Store
// =============================================================================

/// Store that replays scripted responses and records every request.
///
/// Pages are answered in order; once the script runs out, `list` returns an
/// empty page. Without a scripted bulk response, `bulk` answers success for
/// every document.
#[derive(Default)]
pub struct ScriptedStore {
    pages: Mutex<VecDeque<Result<Vec<ListRow>, DbError>>>,
    bulk_responses: Mutex<VecDeque<Result<Vec<BulkResult>, DbError>>>,
    list_calls: Mutex<Vec<ListOptions>>,
    bulk_calls: Mutex<Vec<Vec<Document>>>,
    bulk_gate: Option<Arc<Notify>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a page of `_all_docs` rows for the given ids.
    pub fn with_page(self, ids: &[&str]) -> Self {
        self.with_rows(rows(ids))
    }

    /// Queues a page of arbitrary rows.
    pub fn with_rows(self, rows: Vec<ListRow>) -> Self {
        self.pages.lock().unwrap().push_back(Ok(rows));
        self
    }

    /// Queues a failing page fetch.
    pub fn with_list_error(self, error: DbError) -> Self {
        self.pages.lock().unwrap().push_back(Err(error));
        self
    }

    /// Queues a bulk response.
    pub fn with_bulk_response(self, response: Result<Vec<BulkResult>, DbError>) -> Self {
        self.bulk_responses.lock().unwrap().push_back(response);
        self
    }

    /// Makes every bulk call wait until `gate` is notified.
    pub fn with_bulk_gate(mut self, gate: Arc<Notify>) -> Self {
        self.bulk_gate = Some(gate);
        self
    }

    pub fn list_calls(&self) -> Vec<ListOptions> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn bulk_calls(&self) -> Vec<Vec<Document>> {
        self.bulk_calls.lock().unwrap().clone()
    }
}

impl DocumentStore for ScriptedStore {
    fn list(&self, options: ListOptions) -> StoreFuture<'_, Vec<ListRow>> {
        self.list_calls.lock().unwrap().push(options);
        let response = self
            .pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        async move { response }.boxed()
    }

    fn bulk(&self, docs: Vec<Document>) -> StoreFuture<'_, Vec<BulkResult>> {
        self.bulk_calls.lock().unwrap().push(docs.clone());
        let response = self
            .bulk_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(docs
                    .iter()
                    .map(|doc| BulkResult::success(doc.id.clone(), "2-scripted"))
                    .collect())
            });
        let gate = self.bulk_gate.clone();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            response
        }
        .boxed()
    }

    fn store_name(&self) -> &str {
        "scripted"
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// `_all_docs` rows for the given ids, each at revision `1-<id>`.
pub fn rows(ids: &[&str]) -> Vec<ListRow> {
    ids.iter()
        .map(|id| ListRow::from_document(Document::new(*id).with_rev(format!("1-{id}"))))
        .collect()
}

/// Documents with zero-padded ids `doc-000`, `doc-001`, ...
pub fn numbered_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|index| {
            Document::new(format!("doc-{index:03}"))
                .with_field("index", index)
                .with_field("type", if index % 2 == 0 { "even" } else { "odd" })
        })
        .collect()
}

pub fn ids(docs: &[Document]) -> Vec<&str> {
    docs.iter().map(|doc| doc.id.as_str()).collect()
}
