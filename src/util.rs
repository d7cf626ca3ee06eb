//! Run-scoped accumulator handed to every task callback.
//!
//! [`Util`] owns the counters, the audit list and the queue of documents
//! waiting for the next bulk write. It is created once per run by the
//! driver and passed by `&mut` to tasks, which report what they did
//! through it. Accessors return the live containers, not copies.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::database::Database;
use crate::document::Document;
use crate::error::TaskError;
use crate::hash::document_fingerprint;

/// Counter name to value.
pub type Stat = BTreeMap<String, i64>;

/// Documents queued with [`Util::save`].
pub const SAVE_COUNTER: &str = "_couchtato_save";
/// Documents queued with [`Util::remove`].
pub const REMOVE_COUNTER: &str = "_couchtato_remove";
/// Documents handed to tasks.
pub const DOCS_COUNTER: &str = "_couchtato_docs";
/// Pages processed.
pub const PAGES_COUNTER: &str = "_couchtato_pages";
/// Per-document bulk write successes.
pub const BULK_OK_COUNTER: &str = "_couchtato_bulk_ok";
/// Per-document bulk write failures, conflicts included.
pub const BULK_ERROR_COUNTER: &str = "_couchtato_bulk_error";

/// Log target of messages written by tasks.
pub const TASK_LOG_TARGET: &str = "couchtato::task";

/// Stats, audit trail and write queue of one run.
#[derive(Debug, Default)]
pub struct Util {
    stat: Stat,
    queue: Vec<Document>,
    audit_items: Vec<Value>,
    driver: Option<Arc<Database>>,
}

impl Util {
    /// Creates an accumulator with no counters, an empty queue and no driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing counters.
    #[must_use]
    pub fn with_stat(mut self, stat: Stat) -> Self {
        self.stat = stat;
        self
    }

    /// Starts from an existing queue.
    #[must_use]
    pub fn with_queue(mut self, queue: Vec<Document>) -> Self {
        self.queue = queue;
        self
    }

    /// Exposes `driver` to tasks for ad-hoc database operations.
    #[must_use]
    pub fn with_driver(mut self, driver: Arc<Database>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Adds `increment` to the counter at `key`, creating it at `increment`.
    ///
    /// Counters saturate at `i64::MIN` and `i64::MAX`.
    pub fn increment(&mut self, key: &str, increment: i64) {
        match self.stat.get_mut(key) {
            Some(value) => *value = value.saturating_add(increment),
            None => {
                self.stat.insert(key.to_string(), increment);
            }
        }
    }

    /// Increments the counter at `key` by one.
    pub fn count(&mut self, key: &str) {
        self.increment(key, 1);
    }

    /// Appends a record to the audit list.
    pub fn audit(&mut self, record: impl Into<Value>) {
        self.audit_items.push(record.into());
    }

    /// Serializes `record` and appends it to the audit list.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::Serialization` if `record` cannot be represented
    /// as JSON.
    pub fn audit_serialized<T: Serialize>(&mut self, record: &T) -> Result<(), TaskError> {
        let value = serde_json::to_value(record)?;
        self.audit_items.push(value);
        Ok(())
    }

    /// Content fingerprint of `doc`, see [`crate::hash`].
    pub fn hash(&self, doc: &Document) -> String {
        document_fingerprint(doc)
    }

    /// Queues `doc` for saving.
    pub fn save(&mut self, doc: Document) {
        self.count(SAVE_COUNTER);
        self.queue.push(doc);
    }

    /// Marks `doc` deleted and queues it.
    pub fn remove(&mut self, mut doc: Document) {
        self.count(REMOVE_COUNTER);
        doc.mark_deleted();
        self.queue.push(doc);
    }

    /// Writes an informational line to the run log.
    pub fn log(&self, message: &str) {
        tracing::info!(target: TASK_LOG_TARGET, "{message}");
    }

    /// Counters.
    pub const fn stat(&self) -> &Stat {
        &self.stat
    }

    /// Counters, mutable.
    pub const fn stat_mut(&mut self) -> &mut Stat {
        &mut self.stat
    }

    /// Value of one counter, zero when never incremented.
    pub fn stat_value(&self, key: &str) -> i64 {
        self.stat.get(key).copied().unwrap_or(0)
    }

    /// Audit records in insertion order.
    pub fn audit_items(&self) -> &[Value] {
        &self.audit_items
    }

    /// Audit records, mutable.
    pub const fn audit_items_mut(&mut self) -> &mut Vec<Value> {
        &mut self.audit_items
    }

    /// Documents waiting for the next bulk write.
    pub fn queue(&self) -> &[Document] {
        &self.queue
    }

    /// Write queue, mutable.
    pub const fn queue_mut(&mut self) -> &mut Vec<Document> {
        &mut self.queue
    }

    /// Empties the queue after a successful flush.
    pub fn reset_queue(&mut self) {
        self.queue.clear();
    }

    /// Database driver, when the run exposes one.
    pub const fn driver(&self) -> Option<&Arc<Database>> {
        self.driver.as_ref()
    }

    /// Consumes the accumulator, returning counters and audit records.
    pub fn into_report(self) -> (Stat, Vec<Value>) {
        (self.stat, self.audit_items)
    }
}
