use docpipe_model::{Document, DEFAULT_MEDIA_TYPE};
use uuid::Uuid;

use crate::error::Error;
use crate::schema::documents;

/// The on-disk row shape for a document, as stored/queried through Diesel.
///
/// Distinct from [`Document`]: `children` isn't a column here (spec.md §9:
/// "do not attempt to maintain an independent `children` column"), and
/// `metadata` is stored pre-serialized as `cmetadata`.
#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[table_name = "documents"]
pub struct DocumentRow {
    pub id: String,
    pub state: String,
    pub content: Option<String>,
    pub media_type: String,
    pub url: Option<String>,
    pub parent_id: Option<String>,
    pub cmetadata: String,
    pub seq: i64,
}

impl DocumentRow {
    /// Builds a row from a [`Document`], assigning the given sequence number.
    pub fn from_document(doc: &Document, seq: i64) -> Result<DocumentRow, Error> {
        Ok(DocumentRow {
            id: doc.id.to_string(),
            state: doc.state.clone(),
            content: doc.content.clone(),
            media_type: if doc.media_type.is_empty() {
                DEFAULT_MEDIA_TYPE.to_string()
            } else {
                doc.media_type.clone()
            },
            url: doc.url.clone(),
            parent_id: doc.parent_id.map(|id| id.to_string()),
            cmetadata: json::to_string(&doc.metadata)?,
            seq,
        })
    }

    /// Rebuilds a [`Document`] from the row plus its children ids (fetched separately).
    pub fn into_document(self, children: Vec<Uuid>, include_content: bool) -> Result<Document, Error> {
        let id = Uuid::parse_str(&self.id)?;
        let parent_id = self.parent_id.as_deref().map(Uuid::parse_str).transpose()?;
        let metadata = json::from_str(&self.cmetadata)?;
        Ok(Document {
            id,
            state: self.state,
            content: if include_content { self.content } else { None },
            media_type: self.media_type,
            url: self.url,
            parent_id,
            children,
            metadata,
        })
    }
}
