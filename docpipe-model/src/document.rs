use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The default media type assigned to a document when none is given.
pub const DEFAULT_MEDIA_TYPE: &str = "text/plain";

/// The unit of persisted state flowing through a pipeline.
///
/// See spec.md §3 for the field-level invariants. `Document` is a pure
/// value type: the orchestrator and the persistence port exchange it by
/// value, and mutating a copy returned to a caller never affects what's
/// stored (spec.md §5, "document values are passed by value semantics").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Globally unique, immutable once assigned.
    pub id: Uuid,
    /// Name of the vertex of the state machine this document currently sits at.
    pub state: String,
    /// Opaque content, treated as a UTF-8 string; absent for link-only documents.
    pub content: Option<String>,
    /// MIME-ish media type, defaults to [`DEFAULT_MEDIA_TYPE`].
    pub media_type: String,
    /// Where the content originated from, if anywhere.
    pub url: Option<String>,
    /// `None` iff this document is a root.
    pub parent_id: Option<Uuid>,
    /// Ordered (insertion order), duplicate-free list of child ids.
    pub children: Vec<Uuid>,
    /// Arbitrary JSON-encodable metadata.
    pub metadata: json::Map<String, json::Value>,
}

impl Document {
    /// Builds a new root document in the given state, with no content.
    pub fn new<S: Into<String>>(state: S) -> Document {
        Document {
            id: Uuid::new_v4(),
            state: state.into(),
            content: None,
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            url: None,
            parent_id: None,
            children: Vec::new(),
            metadata: json::Map::new(),
        }
    }

    /// Sets the content, returning `self` for chained construction.
    pub fn with_content<S: Into<String>>(mut self, content: S) -> Document {
        self.content = Some(content.into());
        self
    }

    /// Sets the metadata map wholesale, returning `self` for chained construction.
    pub fn with_metadata(mut self, metadata: json::Map<String, json::Value>) -> Document {
        self.metadata = metadata;
        self
    }

    /// `true` iff this document has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// `true` iff this document has at least one child.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Appends a child id, preserving insertion order and rejecting duplicates
    /// (invariant I2 from spec.md §3).
    pub fn push_child(&mut self, child_id: Uuid) {
        if !self.children.contains(&child_id) {
            self.children.push(child_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_is_a_root_with_no_children() {
        let doc = Document::new("a");
        assert!(doc.is_root());
        assert!(!doc.has_children());
        assert_eq!(doc.media_type, DEFAULT_MEDIA_TYPE);
    }

    #[test]
    fn push_child_is_idempotent_and_order_preserving() {
        let mut doc = Document::new("a");
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        doc.push_child(c1);
        doc.push_child(c2);
        doc.push_child(c1);
        assert_eq!(doc.children, vec![c1, c2]);
    }
}
