//! Document and wire types exchanged with the document store.
//!
//! A [`Document`] keeps the three fields this crate inspects (`_id`, `_rev`
//! and `_deleted`) typed, and carries every other field in an open JSON map
//! so that tasks can reshape documents without a schema.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Document
// =============================================================================

/// A schemaless document with a typed identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier (`_id`).
    #[serde(rename = "_id")]
    pub id: String,
    /// Revision token (`_rev`), absent for documents never written.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Deletion marker (`_deleted`), serialized only when set.
    #[serde(rename = "_deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    /// Every other field of the document.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // signature required by serde
const fn is_false(value: &bool) -> bool {
    !*value
}

impl Document {
    /// Creates an empty document with the given identifier and no revision.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            deleted: false,
            fields: Map::new(),
        }
    }

    /// Returns the document with the given revision.
    #[must_use]
    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    /// Returns the document with `key` set to `value`.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Looks up a non-reserved field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Sets a non-reserved field, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Removes a non-reserved field, returning its value.
    pub fn remove_field(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Marks the document as a deletion for the next bulk write.
    pub const fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Whether the document carries the deletion marker.
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Builds the JSON object form of the document, reserved fields included.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("_id".to_string(), Value::String(self.id.clone()));
        if let Some(rev) = &self.rev {
            object.insert("_rev".to_string(), Value::String(rev.clone()));
        }
        if self.deleted {
            object.insert("_deleted".to_string(), Value::Bool(true));
        }
        Value::Object(object)
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Which document listing the pager walks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListSource {
    /// The primary index (`_all_docs`), keyed by document id.
    #[default]
    AllDocs,
    /// A map view `_design/{design}/_view/{view}`.
    View {
        /// Design document name, without the `_design/` prefix.
        design: String,
        /// View name.
        view: String,
    },
}

impl ListSource {
    /// Parses `design/view` into a view source.
    pub fn parse_view(path: &str) -> Option<Self> {
        let (design, view) = path.split_once('/')?;
        let design = design.trim_start_matches("_design/");
        if design.is_empty() || view.is_empty() || view.contains('/') {
            return None;
        }
        Some(Self::View {
            design: design.to_string(),
            view: view.to_string(),
        })
    }

    /// Path of the listing relative to the database URL.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::AllDocs => "_all_docs".to_string(),
            Self::View { design, view } => format!("_design/{design}/_view/{view}"),
        }
    }
}

/// Parameters of a single page fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListOptions {
    /// Listing to read from.
    pub source: ListSource,
    /// Row key to start from (inclusive).
    pub start_key: Option<Value>,
    /// Document id to start from within `start_key` (inclusive).
    pub start_key_doc_id: Option<String>,
    /// Row key to end at (inclusive).
    pub end_key: Option<Value>,
    /// Document id to end at within `end_key` (inclusive).
    pub end_key_doc_id: Option<String>,
    /// Maximum number of rows to return.
    pub limit: usize,
    /// Number of leading rows to skip.
    pub skip: usize,
    /// Whether rows embed their full document.
    pub include_docs: bool,
}

/// A listing row and, when the database returned one, its document.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRow {
    /// Id of the document the row was emitted for.
    pub id: String,
    /// Row key; equal to the id for `_all_docs`.
    pub key: Value,
    /// The embedded document; `None` when the row came back with
    /// `"doc": null` (for example a view row whose document is gone).
    pub doc: Option<Document>,
}

impl ListRow {
    /// Wraps a document as an `_all_docs` row.
    #[must_use]
    pub fn from_document(doc: Document) -> Self {
        Self {
            id: doc.id.clone(),
            key: Value::String(doc.id.clone()),
            doc: Some(doc),
        }
    }

    /// A row that carries no document.
    #[must_use]
    pub fn without_document(id: impl Into<String>, key: Value) -> Self {
        Self {
            id: id.into(),
            key,
            doc: None,
        }
    }
}

// =============================================================================
// Bulk write
// =============================================================================

/// Body of a `_bulk_docs` request.
#[derive(Debug, Serialize)]
pub struct BulkRequest<'a> {
    /// Documents to write, deletions included.
    pub docs: &'a [Document],
}

/// Per-document outcome of a bulk write, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    /// Document id.
    pub id: String,
    /// New revision on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Success flag as reported by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// Error kind, e.g. `conflict`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable error reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BulkResult {
    /// A successful outcome.
    #[must_use]
    pub fn success(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: Some(rev.into()),
            ok: Some(true),
            error: None,
            reason: None,
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failure(
        id: impl Into<String>,
        error: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            rev: None,
            ok: None,
            error: Some(error.into()),
            reason: Some(reason.into()),
        }
    }

    /// Whether the write of this document succeeded.
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the write was rejected as a revision conflict.
    pub fn is_conflict(&self) -> bool {
        self.error.as_deref() == Some("conflict")
    }
}

// =============================================================================
// Tests
// =============================================================================
