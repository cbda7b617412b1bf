table! {
    /// The single table backing the document repository.
    ///
    /// `cmetadata` is named that way (rather than `metadata`) to dodge
    /// ORM-reserved names, matching the naming convention spec.md §6 calls
    /// for; the conceptual field remains `metadata` everywhere above the
    /// storage layer. `seq` is an ordering-only surrogate (see spec_full.md
    /// §6) used to read `children` back in creation order; it is never
    /// exposed outside this crate.
    documents (id) {
        /// Text-encoded UUID, primary key.
        id -> Text,
        /// Name of the state-machine vertex this document currently sits at.
        state -> Text,
        /// Opaque content, absent for link-only documents.
        content -> Nullable<Text>,
        /// Defaults to `"text/plain"`.
        media_type -> Text,
        url -> Nullable<Text>,
        /// Text-encoded UUID of the parent document, null iff this is a root.
        parent_id -> Nullable<Text>,
        /// JSON-encoded metadata map.
        cmetadata -> Text,
        /// Monotonic insertion-order surrogate.
        seq -> BigInt,
    }
}
