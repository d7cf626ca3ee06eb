//! Migration driver.
//!
//! The [`Runner`] walks the configured range page by page, runs every task
//! on every document, and flushes the write queue through the bulk writer
//! after each page. The next page is fetched only once the flush has
//! completed. The boundary document shared by two consecutive pages is
//! handed to tasks once.
//!
//! The first error (fetch, task, or bulk write) aborts the run. A failed
//! bulk write leaves the queue untouched for inspection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::database::{Database, PageRequest};
use crate::document::ListSource;
use crate::error::RunError;
use crate::task::TaskSet;
use crate::util::{BULK_ERROR_COUNTER, BULK_OK_COUNTER, DOCS_COUNTER, PAGES_COUNTER, Util};

/// Default number of new documents per page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// What to iterate and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// New documents per page.
    pub page_size: usize,
    /// Stop after this many pages.
    pub num_pages: Option<usize>,
    /// First document id (inclusive).
    pub start_key: Option<String>,
    /// Last document id (inclusive).
    pub end_key: Option<String>,
    /// Rows to skip at the start.
    pub skip: usize,
    /// Pause between pages.
    pub interval: Duration,
    /// Listing to walk.
    pub source: ListSource,
    /// Queue and count writes without submitting them.
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            num_pages: None,
            start_key: None,
            end_key: None,
            skip: 0,
            interval: Duration::ZERO,
            source: ListSource::AllDocs,
            dry_run: false,
        }
    }
}

impl RunConfig {
    /// Pagination request for this configuration.
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page_size)
            .with_skip(self.skip)
            .starting_at(self.start_key.clone())
            .ending_at(self.end_key.clone())
            .with_source(self.source.clone())
    }
}

/// Totals of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages processed.
    pub pages: usize,
    /// Documents handed to tasks.
    pub documents: usize,
    /// Documents written successfully.
    pub written: usize,
    /// Documents the store rejected.
    pub failed: usize,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

/// Drives pagination, tasks and bulk writes.
#[derive(Debug)]
pub struct Runner {
    database: Arc<Database>,
    config: RunConfig,
}

impl Runner {
    /// Creates a runner over `database`.
    #[must_use]
    pub const fn new(database: Arc<Database>, config: RunConfig) -> Self {
        Self { database, config }
    }

    /// The run configuration.
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs `tasks` on every document of the configured range.
    ///
    /// Counters and audit records accumulate in `util`; after an error they
    /// reflect the work done up to the failure.
    ///
    /// # Errors
    ///
    /// Returns the first fetch, task or bulk write error.
    pub async fn run(&self, tasks: &mut TaskSet, util: &mut Util) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        let request = self.config.page_request();
        let mut pager = self.database.pager(&request)?;
        let mut summary = RunSummary::default();
        let mut boundary: Option<String> = None;

        tracing::info!(
            page_size = self.config.page_size,
            tasks = ?tasks.names(),
            dry_run = self.config.dry_run,
            "Run started"
        );

        while let Some(page) = pager.next_page().await? {
            util.count(PAGES_COUNTER);
            summary.pages += 1;

            let next_boundary = page.documents.last().map(|doc| doc.id.clone());
            let mut documents = page.documents.into_iter().peekable();
            let repeats_boundary = matches!(
                (documents.peek(), boundary.as_deref()),
                (Some(first), Some(id)) if first.id == id
            );
            if repeats_boundary {
                documents.next();
            }

            let mut processed = 0;
            for mut doc in documents {
                util.count(DOCS_COUNTER);
                tasks.run_all(&mut doc, util)?;
                processed += 1;
            }
            summary.documents += processed;
            boundary = next_boundary;

            tracing::info!(
                page = page.number,
                documents = processed,
                queued = util.queue().len(),
                "Page processed"
            );

            self.flush(util, &mut summary).await?;

            if self
                .config
                .num_pages
                .is_some_and(|limit| summary.pages >= limit)
            {
                tracing::info!(pages = summary.pages, "Page limit reached");
                break;
            }
            if !page.last && !self.config.interval.is_zero() {
                tokio::time::sleep(self.config.interval).await;
            }
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            pages = summary.pages,
            documents = summary.documents,
            written = summary.written,
            failed = summary.failed,
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Run finished"
        );
        Ok(summary)
    }

    /// Submits the queue as one bulk write and empties it on success.
    async fn flush(&self, util: &mut Util, summary: &mut RunSummary) -> Result<(), RunError> {
        if util.queue().is_empty() {
            return Ok(());
        }

        if self.config.dry_run {
            tracing::info!(count = util.queue().len(), "Dry run, bulk write skipped");
            util.reset_queue();
            return Ok(());
        }

        let results = self.database.update(util.queue().to_vec()).await?;
        for result in &results {
            if result.is_ok() {
                util.count(BULK_OK_COUNTER);
                summary.written += 1;
            } else {
                util.count(BULK_ERROR_COUNTER);
                summary.failed += 1;
                tracing::debug!(
                    id = %result.id,
                    error = result.error.as_deref().unwrap_or_default(),
                    reason = result.reason.as_deref().unwrap_or_default(),
                    "Document not written"
                );
            }
        }
        util.reset_queue();
        Ok(())
    }
}
