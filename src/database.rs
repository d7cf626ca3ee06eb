//! Database access layer: cursor pagination and bulk writes.
//!
//! # Pagination
//!
//! A [`Pager`] walks a sorted key range in pages of `page_size` new
//! documents. Every request asks for `page_size + 1` rows so that the last
//! row of a page is fetched again as the first row of the next one:
//!
//! ```text
//! page 1: [1, 2, 3]        limit 3, full page -> continue from 3
//! page 2:       [3, 4]     limit 3, short page -> last page
//! ```
//!
//! Pages are delivered whole, overlap row included; consumers that need
//! exactly-once processing drop the boundary duplicate themselves.
//!
//! # Bulk writes
//!
//! [`Database::update`] submits a whole queue in one request and tracks the
//! number of writes in flight, so a driver can tell when it is safe to
//! consider the run finished ([`Database::done`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use crate::document::{BulkResult, Document, ListOptions, ListSource};
use crate::error::DbError;
use crate::store::DocumentStore;

// =============================================================================
// Page Request
// =============================================================================

/// Where and how to paginate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Leading rows to skip, on the first request only.
    pub skip: usize,
    /// Document id to start from (inclusive), first request only.
    pub start_key_doc_id: Option<String>,
    /// Document id to end at (inclusive).
    pub end_key_doc_id: Option<String>,
    /// Number of new documents per page.
    pub page_size: usize,
    /// Listing to walk.
    pub source: ListSource,
}

impl PageRequest {
    /// Paginates the whole `_all_docs` listing with the given page size.
    #[must_use]
    pub const fn new(page_size: usize) -> Self {
        Self {
            skip: 0,
            start_key_doc_id: None,
            end_key_doc_id: None,
            page_size,
            source: ListSource::AllDocs,
        }
    }

    /// Skips `skip` rows on the first page.
    #[must_use]
    pub const fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Starts from the given document id.
    #[must_use]
    pub fn starting_at(mut self, doc_id: Option<String>) -> Self {
        self.start_key_doc_id = doc_id;
        self
    }

    /// Stops at the given document id.
    #[must_use]
    pub fn ending_at(mut self, doc_id: Option<String>) -> Self {
        self.end_key_doc_id = doc_id;
        self
    }

    /// Walks `source` instead of `_all_docs`.
    #[must_use]
    pub fn with_source(mut self, source: ListSource) -> Self {
        self.source = source;
        self
    }

    /// Builds the options of the first fetch.
    fn first_options(&self) -> Result<ListOptions, DbError> {
        let limit = self
            .page_size
            .checked_add(1)
            .filter(|_| self.page_size > 0)
            .ok_or(DbError::InvalidPageSize(self.page_size))?;

        // In `_all_docs` the row key is the doc id; views only understand
        // the doc id bounds alongside a key, which the cursor supplies later.
        let as_key = |doc_id: &Option<String>| match self.source {
            ListSource::AllDocs => doc_id.clone().map(Value::String),
            ListSource::View { .. } => None,
        };

        Ok(ListOptions {
            source: self.source.clone(),
            start_key: as_key(&self.start_key_doc_id),
            start_key_doc_id: self.start_key_doc_id.clone(),
            end_key: as_key(&self.end_key_doc_id),
            end_key_doc_id: self.end_key_doc_id.clone(),
            limit,
            skip: self.skip,
            include_docs: true,
        })
    }
}

// =============================================================================
// Page
// =============================================================================

/// One fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// One-based page number.
    pub number: usize,
    /// Documents in listing order, overlap document included.
    pub documents: Vec<Document>,
    /// Whether this is the final page of the range.
    pub last: bool,
}

// =============================================================================
// Database
// =============================================================================

/// Pager and bulk writer over a [`DocumentStore`].
pub struct Database {
    store: Arc<dyn DocumentStore>,
    /// Bulk writes currently in flight.
    in_progress: AtomicUsize,
    /// Paginations that still have pages to fetch.
    open_cursors: AtomicUsize,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Database")
            .field("store", &self.store.store_name())
            .field("in_progress", &self.in_progress())
            .field("open_cursors", &self.open_cursors.load(Ordering::SeqCst))
            .finish()
    }
}

impl Database {
    /// Creates a database over a shared store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            in_progress: AtomicUsize::new(0),
            open_cursors: AtomicUsize::new(0),
        }
    }

    /// Creates a database owning `store`.
    #[must_use]
    pub fn from_store<S: DocumentStore + 'static>(store: S) -> Self {
        Self::new(Arc::new(store))
    }

    /// The underlying store, for ad-hoc operations.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Opens a cursor over the requested range.
    ///
    /// # Errors
    ///
    /// Returns `DbError::InvalidPageSize` if `page_size` is zero.
    pub fn pager(&self, request: &PageRequest) -> Result<Pager<'_>, DbError> {
        let options = request.first_options()?;
        if matches!(request.source, ListSource::View { .. })
            && (request.start_key_doc_id.is_some() || request.end_key_doc_id.is_some())
        {
            tracing::warn!(
                view = %request.source.path(),
                "Document id bounds without a view key are ignored by CouchDB"
            );
        }
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(Pager {
            database: self,
            options,
            pages: 0,
            finished: false,
        })
    }

    /// Fetches every page of the range in order and hands each page's
    /// documents to `on_page`.
    ///
    /// Pages are fetched strictly one after another; the next fetch starts
    /// only after `on_page` has returned. An empty range never calls
    /// `on_page`. Returns the number of pages delivered.
    ///
    /// # Errors
    ///
    /// A failed fetch stops pagination and is returned as is; `on_page` is
    /// not called for the failed fetch. An error from `on_page` also stops
    /// pagination and is returned.
    pub async fn paginate<F, E>(&self, request: &PageRequest, mut on_page: F) -> Result<usize, E>
    where
        F: FnMut(Vec<Document>) -> Result<(), E>,
        E: From<DbError>,
    {
        let mut pager = self.pager(request)?;
        while let Some(page) = pager.next_page().await? {
            on_page(page.documents)?;
        }
        Ok(pager.pages_fetched())
    }

    /// Writes `docs` in a single bulk request.
    ///
    /// Returns the per-document results in input order. Conflicts and other
    /// per-document failures are passed through untouched. An empty input
    /// returns an empty result without contacting the store.
    ///
    /// # Errors
    ///
    /// Returns the store error if the request as a whole fails; no partial
    /// results are reported in that case.
    pub async fn update(&self, docs: Vec<Document>) -> Result<Vec<BulkResult>, DbError> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let count = docs.len();
        let _guard = InProgressGuard::enter(&self.in_progress);
        tracing::debug!(count, store = self.store.store_name(), "Bulk update started");

        let results = self.store.bulk(docs).await?;

        let failed = results.iter().filter(|result| !result.is_ok()).count();
        tracing::debug!(count, failed, "Bulk update finished");
        Ok(results)
    }

    /// Number of bulk writes in flight.
    pub fn in_progress(&self) -> usize {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Whether no bulk write is in flight and no cursor has pages left.
    pub fn done(&self) -> bool {
        self.in_progress() == 0 && self.open_cursors.load(Ordering::SeqCst) == 0
    }
}

/// Holds one unit of the in-flight counter until dropped.
struct InProgressGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InProgressGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Pager
// =============================================================================

/// Cursor over a key range, advanced with [`Pager::next_page`].
#[derive(Debug)]
pub struct Pager<'a> {
    database: &'a Database,
    /// Options of the next fetch.
    options: ListOptions,
    pages: usize,
    finished: bool,
}

impl Pager<'_> {
    /// Fetches the next page.
    ///
    /// Returns `Ok(None)` once the range is exhausted. A fetch returning
    /// fewer rows than requested is the last one; after a full fetch the
    /// cursor restarts from the last row (inclusive) with no skip. Both
    /// decisions count every row, including rows that came back without a
    /// document; those rows are not delivered. A full fetch without any
    /// document is skipped over rather than delivered empty.
    ///
    /// # Errors
    ///
    /// Returns the store error; the cursor is closed afterwards.
    pub async fn next_page(&mut self) -> Result<Option<Page>, DbError> {
        while !self.finished {
            let rows = match self.database.store.list(self.options.clone()).await {
                Ok(rows) => rows,
                Err(error) => {
                    tracing::debug!(%error, page = self.pages + 1, "Page fetch failed");
                    self.finish();
                    return Err(error);
                }
            };

            let last = rows.len() < self.options.limit;
            if last {
                self.finish();
            } else if let Some(row) = rows.last() {
                self.options.start_key = Some(row.key.clone());
                self.options.start_key_doc_id = Some(row.id.clone());
                self.options.skip = 0;
            }

            let fetched = rows.len();
            let documents: Vec<Document> = rows.into_iter().filter_map(|row| row.doc).collect();
            if documents.len() < fetched {
                tracing::debug!(
                    rows = fetched,
                    missing = fetched - documents.len(),
                    "Rows without document skipped"
                );
            }
            if documents.is_empty() {
                continue;
            }

            self.pages += 1;
            tracing::debug!(page = self.pages, rows = fetched, last, "Page fetched");
            return Ok(Some(Page {
                number: self.pages,
                documents,
                last,
            }));
        }
        Ok(None)
    }

    /// Number of pages delivered so far.
    pub const fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Whether the cursor has no pages left.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Options the next fetch will use.
    pub const fn next_options(&self) -> &ListOptions {
        &self.options
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.database.open_cursors.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for Pager<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

// =============================================================================
// Tests
// =============================================================================
