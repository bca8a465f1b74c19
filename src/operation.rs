//! Correlation of the entries that belong to one logical operation.
//!
//! An [`OperationContext`] is created when a unit of work starts (usually one
//! RPC call) and handed to everything that logs on its behalf. Each entry
//! then carries a `logging.googleapis.com/operation` object with the shared
//! id, so the entries can be grouped after the fact.
//!
//! See <https://cloud.google.com/logging/docs/reference/v2/rest/v2/LogEntry#LogEntryOperation>.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::record::Field;
use crate::schema::OPERATION_KEY;

/// Name of the span field carrying the operation id to the tracing layer.
pub const SPAN_FIELD: &str = "operation.id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        OperationId(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(OperationId)
    }
}

impl Default for OperationId {
    fn default() -> Self {
        OperationId::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// Call-scoped context, possibly carrying an operation id.
///
/// Cheap to copy. Deriving a scope never touches the parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationContext {
    id: Option<OperationId>,
}

impl OperationContext {
    /// Context without an operation.
    pub fn background() -> Self {
        OperationContext::default()
    }

    /// Copy of `self` bound to a freshly generated operation id.
    pub fn with_operation(&self) -> Self {
        OperationContext { id: Some(OperationId::new()) }
    }

    /// Copy of `self` bound to a known id, e.g. one recovered from a span.
    pub fn with_id(&self, id: OperationId) -> Self {
        OperationContext { id: Some(id) }
    }

    pub fn id(&self) -> Option<OperationId> {
        self.id
    }

    /// Annotation for the first entry of the operation.
    pub fn first(&self, producer: &str) -> Operation {
        self.annotate(true, false, producer)
    }

    /// Annotation for an entry in the middle of the operation.
    pub fn interior(&self, producer: &str) -> Operation {
        self.annotate(false, false, producer)
    }

    /// Annotation for the last entry of the operation.
    pub fn last(&self, producer: &str) -> Operation {
        self.annotate(false, true, producer)
    }

    // Without a bound id every annotation gets its own, so it never fails.
    fn annotate(&self, first: bool, last: bool, producer: &str) -> Operation {
        Operation {
            id: self.id.unwrap_or_default(),
            first,
            last,
            producer: producer.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: OperationId,
    pub first: bool,
    pub last: bool,
    pub producer: String,
}

impl Operation {
    pub fn into_field(self) -> Field {
        Field::object(OPERATION_KEY, self)
    }
}

impl From<Operation> for Field {
    fn from(operation: Operation) -> Self {
        operation.into_field()
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id.to_string())?;
        map.serialize_entry("first", &self.first)?;
        map.serialize_entry("last", &self.last)?;
        if !self.producer.is_empty() {
            map.serialize_entry("producer", &self.producer)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_id_is_shared() {
        let ctx = OperationContext::background().with_operation();
        let id = ctx.id().unwrap();

        assert_eq!(ctx.first("").id, id);
        assert_eq!(ctx.interior("").id, id);
        assert_eq!(ctx.last("").id, id);
    }

    #[test]
    fn with_operation_leaves_parent_alone() {
        let parent = OperationContext::background();
        let child = parent.with_operation();
        let grandchild = child.with_operation();

        assert!(parent.id().is_none());
        assert_ne!(child.id(), grandchild.id());
    }

    #[test]
    fn background_synthesizes_ids() {
        let ctx = OperationContext::background();
        assert_ne!(ctx.first("").id, ctx.last("").id);
    }

    #[test]
    fn flags() {
        let ctx = OperationContext::background().with_operation();
        let first = ctx.first("");
        let interior = ctx.interior("");
        let last = ctx.last("");

        assert!(first.first && !first.last);
        assert!(!interior.first && !interior.last);
        assert!(!last.first && last.last);
    }

    #[test]
    fn serialization() {
        let id = OperationId::parse("6f1c0f0e-5b1a-4a53-9d7a-0f7f0c2a3b4d").unwrap();
        let ctx = OperationContext::background().with_id(id);

        assert_eq!(
            serde_json::to_value(ctx.first("")).unwrap(),
            json!({"id": "6f1c0f0e-5b1a-4a53-9d7a-0f7f0c2a3b4d", "first": true, "last": false})
        );
        assert_eq!(
            serde_json::to_value(ctx.last("billing")).unwrap(),
            json!({
                "id": "6f1c0f0e-5b1a-4a53-9d7a-0f7f0c2a3b4d",
                "first": false,
                "last": true,
                "producer": "billing",
            })
        );
    }
}
