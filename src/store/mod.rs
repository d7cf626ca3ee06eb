//! Document store abstraction.
//!
//! [`DocumentStore`] is the seam between the pager/bulk writer and the
//! database wire protocol. Two implementations are provided:
//!
//! - [`CouchStore`]: talks to a CouchDB database over HTTP
//! - [`InMemoryStore`]: an ordered in-process store for tests and dry runs
//!
//! Both operations resolve exactly once, with either the rows/results or
//! a [`DbError`].

mod couch;
mod memory;

pub use couch::CouchStore;
pub use memory::InMemoryStore;

use futures::future::BoxFuture;

use crate::document::{BulkResult, Document, ListOptions, ListRow};
use crate::error::DbError;

/// Future returned by store operations.
pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, DbError>>;

/// Trait for document stores.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait DocumentStore: Send + Sync {
    /// Fetches one page of rows, each embedding its full document when the
    /// database returned one.
    ///
    /// Rows come back in listing order, all of them: callers page on the
    /// raw row count, so rows without a document are kept with `doc: None`.
    fn list(&self, options: ListOptions) -> StoreFuture<'_, Vec<ListRow>>;

    /// Writes all `docs` in a single bulk request.
    ///
    /// Returns one [`BulkResult`] per input document, in input order.
    /// Per-document conflicts are reported in the results, not as errors.
    fn bulk(&self, docs: Vec<Document>) -> StoreFuture<'_, Vec<BulkResult>>;

    /// Returns the store name for logging.
    fn store_name(&self) -> &str;
}
