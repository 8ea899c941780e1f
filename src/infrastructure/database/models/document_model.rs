use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;

use crate::domain::entities::{Document as DomainDocument, NewDocument};
use crate::domain::repositories::PendingDeletion;
use crate::domain::value_objects::{ContentHash, DocumentStatus};
use crate::infrastructure::database::schema::{documents, pending_deletions};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DocumentModel {
    pub id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_hash: String,
    pub uploaded_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
    pub status: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewDocumentModel {
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_hash: String,
    pub uploaded_at: NaiveDateTime,
    pub status: String,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = documents)]
#[diesel(treat_none_as_null = true)]
pub struct DocumentStatusChangeset {
    pub status: String,
    pub processed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = pending_deletions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PendingDeletionModel {
    pub document_id: i64,
    pub file_path: String,
    pub requested_at: NaiveDateTime,
}

impl From<&NewDocument> for NewDocumentModel {
    fn from(document: &NewDocument) -> Self {
        Self {
            file_name: document.file_name.clone(),
            file_path: document.file_path.clone(),
            file_size: document.file_size,
            content_hash: document.content_hash.as_str().to_string(),
            uploaded_at: document.uploaded_at.naive_utc(),
            status: document.status.as_str().to_string(),
        }
    }
}

impl TryFrom<DocumentModel> for DomainDocument {
    type Error = String;

    fn try_from(model: DocumentModel) -> Result<Self, Self::Error> {
        let content_hash = ContentHash::new(model.content_hash)
            .map_err(|e| format!("Invalid content hash for document {}: {}", model.id, e))?;
        let status = model
            .status
            .parse::<DocumentStatus>()
            .map_err(|e| format!("Invalid status for document {}: {}", model.id, e))?;

        Ok(DomainDocument::restore(
            model.id,
            model.file_name,
            model.file_path,
            model.file_size,
            content_hash,
            model.uploaded_at.and_utc(),
            model.processed_at.map(|t| t.and_utc()),
            status,
        ))
    }
}

impl From<PendingDeletionModel> for PendingDeletion {
    fn from(model: PendingDeletionModel) -> Self {
        Self {
            document_id: model.document_id,
            file_path: model.file_path,
            requested_at: model.requested_at.and_utc(),
        }
    }
}

impl DocumentStatusChangeset {
    pub fn new(status: DocumentStatus, processed_at: Option<DateTime<Utc>>) -> Self {
        Self {
            status: status.as_str().to_string(),
            processed_at: processed_at.map(|t| t.naive_utc()),
        }
    }
}
