//! In-memory document store.
//!
//! Keeps documents in a `BTreeMap` ordered by id, which gives `_all_docs`
//! range semantics for free. Bulk writes follow CouchDB's revision rules:
//! a write must carry the current revision of an existing document, and a
//! successful write bumps the revision generation.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{DocumentStore, StoreFuture};
use crate::document::{BulkResult, Document, ListOptions, ListRow, ListSource};
use crate::error::DbError;
use crate::hash::document_fingerprint;

#[derive(Debug, Clone)]
struct StoredDocument {
    doc: Document,
    generation: u64,
}

/// Thread-safe in-memory store.
///
/// Clones share the same underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    documents: Arc<RwLock<BTreeMap<String, StoredDocument>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `docs`, each at revision generation 1.
    ///
    /// Any revision already carried by a seed document is replaced.
    #[must_use]
    pub fn with_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let documents = docs
            .into_iter()
            .map(|mut doc| {
                doc.rev = Some(next_rev(&doc, 1));
                (
                    doc.id.clone(),
                    StoredDocument { doc, generation: 1 },
                )
            })
            .collect();
        Self {
            documents: Arc::new(RwLock::new(documents)),
        }
    }

    /// Returns the live (non-deleted) document with the given id.
    pub async fn get(&self, id: &str) -> Option<Document> {
        self.documents
            .read()
            .await
            .get(id)
            .filter(|stored| !stored.doc.deleted)
            .map(|stored| stored.doc.clone())
    }

    /// Returns all live documents in id order.
    pub async fn documents(&self) -> Vec<Document> {
        self.documents
            .read()
            .await
            .values()
            .filter(|stored| !stored.doc.deleted)
            .map(|stored| stored.doc.clone())
            .collect()
    }

    /// Number of live documents.
    pub async fn len(&self) -> usize {
        self.documents
            .read()
            .await
            .values()
            .filter(|stored| !stored.doc.deleted)
            .count()
    }

    /// Whether the store holds no live documents.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn list_rows(&self, options: ListOptions) -> Result<Vec<ListRow>, DbError> {
        if let ListSource::View { design, view } = &options.source {
            return Err(DbError::Status {
                status: 404,
                error: "not_found".to_string(),
                reason: format!("missing view {design}/{view}"),
            });
        }

        let lower = range_bound(options.start_key.as_ref(), options.start_key_doc_id.as_deref());
        let upper = range_bound(options.end_key.as_ref(), options.end_key_doc_id.as_deref());
        if let (Some(lower), Some(upper)) = (&lower, &upper)
            && lower > upper
        {
            return Ok(Vec::new());
        }

        let documents = self.documents.read().await;
        let range = documents.range::<String, _>((
            lower.map_or(Bound::Unbounded, Bound::Included),
            upper.map_or(Bound::Unbounded, Bound::Included),
        ));

        Ok(range
            .filter(|(_, stored)| !stored.doc.deleted)
            .skip(options.skip)
            .take(options.limit)
            .map(|(_, stored)| ListRow::from_document(stored.doc.clone()))
            .collect())
    }

    async fn write_bulk(&self, docs: Vec<Document>) -> Result<Vec<BulkResult>, DbError> {
        let mut documents = self.documents.write().await;

        let results = docs
            .into_iter()
            .map(|doc| {
                let current = documents.get(&doc.id);
                let generation = match (current, &doc.rev) {
                    (Some(stored), rev) if stored.doc.rev == *rev => stored.generation,
                    (Some(stored), None) if stored.doc.deleted => stored.generation,
                    (None, None) => 0,
                    _ => {
                        return BulkResult::failure(doc.id, "conflict", "Document update conflict.");
                    }
                };

                let generation = generation + 1;
                let mut stored = if doc.deleted {
                    Document {
                        fields: Map::new(),
                        ..doc
                    }
                } else {
                    doc
                };
                let rev = next_rev(&stored, generation);
                stored.rev = Some(rev.clone());
                let id = stored.id.clone();
                documents.insert(
                    id.clone(),
                    StoredDocument {
                        doc: stored,
                        generation,
                    },
                );
                BulkResult::success(id, rev)
            })
            .collect();

        Ok(results)
    }
}

/// Lower/upper bound of an `_all_docs` range; the doc id wins over the key.
fn range_bound(key: Option<&Value>, doc_id: Option<&str>) -> Option<String> {
    doc_id
        .map(str::to_string)
        .or_else(|| key.and_then(Value::as_str).map(str::to_string))
}

fn next_rev(doc: &Document, generation: u64) -> String {
    let digest = document_fingerprint(&Document {
        rev: None,
        ..doc.clone()
    });
    format!("{generation}-{}", &digest[..32])
}

impl DocumentStore for InMemoryStore {
    fn list(&self, options: ListOptions) -> StoreFuture<'_, Vec<ListRow>> {
        self.list_rows(options).boxed()
    }

    fn bulk(&self, docs: Vec<Document>) -> StoreFuture<'_, Vec<BulkResult>> {
        self.write_bulk(docs).boxed()
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}
