//! # couchtato
//!
//! A task runner for bulk-migrating documents in CouchDB.
//!
//! ## Overview
//!
//! A run walks a range of documents page by page, hands every document to
//! a set of user tasks, and writes whatever the tasks queued back to the
//! database in one bulk request per page:
//!
//! - **Pager**: cursor pagination with a one-document overlap between
//!   consecutive pages ([`database::Pager`])
//! - **Bulk writer**: one `_bulk_docs` request per flush, with per-document
//!   results ([`database::Database::update`])
//! - **Accumulator**: counters, audit records and the write queue shared
//!   with tasks ([`util::Util`])
//! - **Runner**: the driver tying them together ([`runner::Runner`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use couchtato::prelude::*;
//!
//! let store = CouchStore::new("http://localhost:5984/somedb", Duration::from_secs(30))?;
//! let database = Arc::new(Database::from_store(store));
//! let mut tasks = TaskSet::new().with(task("drop-legacy", |doc, util| {
//!     if doc.get("legacy").is_some() {
//!         util.remove(doc.clone());
//!     }
//!     Ok(())
//! }));
//! let mut util = Util::new().with_driver(Arc::clone(&database));
//! let summary = Runner::new(database, RunConfig::default())
//!     .run(&mut tasks, &mut util)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod hash;
pub mod logging;
pub mod runner;
pub mod store;
pub mod task;
pub mod util;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::database::{Database, Page, PageRequest, Pager};
    pub use crate::document::{BulkResult, Document, ListOptions, ListRow, ListSource};
    pub use crate::error::{DbError, RunError, TaskError};
    pub use crate::runner::{RunConfig, RunSummary, Runner};
    pub use crate::store::{CouchStore, DocumentStore, InMemoryStore};
    pub use crate::task::{FnTask, Task, TaskSet, task};
    pub use crate::util::{Stat, Util};
    pub use std::time::Duration;
}
