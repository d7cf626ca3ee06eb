//! Task callbacks.
//!
//! A [`Task`] sees one document at a time together with the run's
//! [`Util`]. It may mutate the document and report through the
//! accumulator (`save`, `remove`, `audit`, `count`, `hash`, `log`); it has
//! no other output. Returning an error aborts the run.
//!
//! ```rust,ignore
//! use couchtato::task::{TaskSet, task};
//!
//! let tasks = TaskSet::new().with(task("rename", |doc, util| {
//!     if let Some(name) = doc.remove_field("name") {
//!         doc.insert("title", name);
//!         util.save(doc.clone());
//!     }
//!     Ok(())
//! }));
//! ```

pub mod builtin;

use crate::document::Document;
use crate::error::TaskError;
use crate::util::Util;

/// A per-document transformation.
pub trait Task: Send {
    /// Name used in logs and for selection on the command line.
    fn name(&self) -> &str;

    /// Processes one document.
    ///
    /// # Errors
    ///
    /// Any error stops the remaining documents of the page and aborts the run.
    fn run(&mut self, doc: &mut Document, util: &mut Util) -> Result<(), TaskError>;
}

/// A [`Task`] backed by a closure.
pub struct FnTask<F> {
    name: String,
    function: F,
}

impl<F> std::fmt::Debug for FnTask<F> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FnTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F> Task for FnTask<F>
where
    F: FnMut(&mut Document, &mut Util) -> Result<(), TaskError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, doc: &mut Document, util: &mut Util) -> Result<(), TaskError> {
        (self.function)(doc, util)
    }
}

/// Wraps a closure as a named task.
pub fn task<F>(name: impl Into<String>, function: F) -> FnTask<F>
where
    F: FnMut(&mut Document, &mut Util) -> Result<(), TaskError> + Send,
{
    FnTask {
        name: name.into(),
        function,
    }
}

/// Ordered collection of tasks applied to every document.
#[derive(Default)]
pub struct TaskSet {
    tasks: Vec<Box<dyn Task>>,
}

impl std::fmt::Debug for TaskSet {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_list().entries(self.names()).finish()
    }
}

impl TaskSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the set with `task` appended.
    #[must_use]
    pub fn with(mut self, task: impl Task + 'static) -> Self {
        self.push(task);
        self
    }

    /// Appends `task`; tasks run in insertion order.
    pub fn push(&mut self, task: impl Task + 'static) {
        self.tasks.push(Box::new(task));
    }

    /// Appends an already boxed task.
    pub fn push_boxed(&mut self, task: Box<dyn Task>) {
        self.tasks.push(task);
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the set holds no task.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task names in run order.
    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }

    /// Runs every task on `doc`, in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first task error.
    pub fn run_all(&mut self, doc: &mut Document, util: &mut Util) -> Result<(), TaskError> {
        for task in &mut self.tasks {
            task.run(doc, util)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn test_tasks_run_in_order_and_share_document() {
        let mut tasks = TaskSet::new()
            .with(task("first", |doc, _| {
                doc.insert("step", 1);
                Ok(())
            }))
            .with(task("second", |doc, util| {
                if doc.get("step") == Some(&json!(1)) {
                    util.count("saw_first");
                }
                Ok(())
            }));
        let mut util = Util::new();
        let mut doc = Document::new("a");

        tasks.run_all(&mut doc, &mut util).unwrap();

        assert_eq!(tasks.names(), vec!["first", "second"]);
        assert_eq!(util.stat_value("saw_first"), 1);
    }

    #[rstest]
    fn test_run_all_stops_at_first_error() {
        let mut tasks = TaskSet::new()
            .with(task("fails", |_, _| Err(TaskError::failed("fails", "boom"))))
            .with(task("never", |_, util| {
                util.count("never");
                Ok(())
            }));
        let mut util = Util::new();

        let result = tasks.run_all(&mut Document::new("a"), &mut util);

        assert_eq!(result, Err(TaskError::failed("fails", "boom")));
        assert_eq!(util.stat_value("never"), 0);
    }

    #[rstest]
    fn test_closure_task_keeps_state_between_documents() {
        let mut seen = 0;
        let mut tasks = TaskSet::new().with(task("counter", move |_, util| {
            seen += 1;
            util.increment("seen_total", seen);
            Ok(())
        }));
        let mut util = Util::new();

        for id in ["a", "b", "c"] {
            tasks.run_all(&mut Document::new(id), &mut util).unwrap();
        }

        assert_eq!(util.stat_value("seen_total"), 1 + 2 + 3);
        assert_eq!(tasks.len(), 1);
        assert!(!tasks.is_empty());
    }
}
