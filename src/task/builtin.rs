//! Tasks shipped with the command-line runner.

use serde_json::{Value, json};

use super::{Task, TaskSet};
use crate::document::Document;
use crate::error::{RunError, TaskError};
use crate::util::Util;

/// Counts documents per `type` field as `type:<value>`.
///
/// Documents without a string `type` are counted as `type:untyped`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountByType;

impl CountByType {
    /// Task name.
    pub const NAME: &'static str = "count-by-type";
}

impl Task for CountByType {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&mut self, doc: &mut Document, util: &mut Util) -> Result<(), TaskError> {
        let key = match doc.get("type") {
            Some(Value::String(kind)) => format!("type:{kind}"),
            _ => "type:untyped".to_string(),
        };
        util.count(&key);
        Ok(())
    }
}

/// Audits `{ id, rev, hash }` for every document.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fingerprint;

impl Fingerprint {
    /// Task name.
    pub const NAME: &'static str = "fingerprint";
}

impl Task for Fingerprint {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&mut self, doc: &mut Document, util: &mut Util) -> Result<(), TaskError> {
        let hash = util.hash(doc);
        util.audit(json!({ "id": doc.id, "rev": doc.rev, "hash": hash }));
        Ok(())
    }
}

/// Names and one-line descriptions of the built-in tasks.
pub const CATALOG: [(&str, &str); 2] = [
    (
        CountByType::NAME,
        "count documents per `type` field (type:<value>)",
    ),
    (
        Fingerprint::NAME,
        "audit id, revision and content hash of every document",
    ),
];

fn by_name(name: &str) -> Option<Box<dyn Task>> {
    match name {
        CountByType::NAME => Some(Box::new(CountByType)),
        Fingerprint::NAME => Some(Box::new(Fingerprint)),
        _ => None,
    }
}

/// Builds a task set from built-in task names; all of them when `names`
/// is empty.
///
/// # Errors
///
/// Returns `RunError::UnknownTask` for a name that is not built in.
pub fn select(names: &[String]) -> Result<TaskSet, RunError> {
    let mut tasks = TaskSet::new();
    if names.is_empty() {
        for (name, _) in CATALOG {
            if let Some(task) = by_name(name) {
                tasks.push_boxed(task);
            }
        }
        return Ok(tasks);
    }

    for name in names {
        let task = by_name(name).ok_or_else(|| RunError::UnknownTask(name.clone()))?;
        tasks.push_boxed(task);
    }
    Ok(tasks)
}
