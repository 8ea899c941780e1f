use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entities::{Document, NewDocument};
use crate::domain::value_objects::DocumentStatus;

#[derive(Debug)]
pub enum DocumentRepositoryError {
    NotFound(i64),
    HashNotFound(String),
    /// Duplicate `file_path` or `content_hash`.
    UniqueViolation(String),
    DatabaseError(String),
    /// The row exists but could not be turned into a [`Document`].
    DecodeError(String),
}

impl DocumentRepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DocumentRepositoryError::NotFound(_) | DocumentRepositoryError::HashNotFound(_)
        )
    }
}

impl std::fmt::Display for DocumentRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentRepositoryError::NotFound(id) => write!(f, "Document not found: {}", id),
            DocumentRepositoryError::HashNotFound(hash) => {
                write!(f, "Document not found for content hash: {}", hash)
            }
            DocumentRepositoryError::UniqueViolation(msg) => write!(f, "Unique violation: {}", msg),
            DocumentRepositoryError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            DocumentRepositoryError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for DocumentRepositoryError {}

/// A deletion that was started but not yet confirmed finished.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeletion {
    pub document_id: i64,
    pub file_path: String,
    pub requested_at: DateTime<Utc>,
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, document: &NewDocument) -> Result<Document, DocumentRepositoryError>;
    async fn get_by_id(&self, id: i64) -> Result<Document, DocumentRepositoryError>;
    async fn get_by_content_hash(&self, hash: &str) -> Result<Document, DocumentRepositoryError>;
    async fn find_by_content_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Document>, DocumentRepositoryError>;
    async fn find_by_path(&self, path: &str) -> Result<Option<Document>, DocumentRepositoryError>;
    /// Newest upload first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Document>, DocumentRepositoryError>;
    /// Oldest upload first.
    async fn get_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<Document>, DocumentRepositoryError>;
    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<(), DocumentRepositoryError>;
    async fn delete(&self, id: i64) -> Result<bool, DocumentRepositoryError>;
    async fn count(&self) -> Result<i64, DocumentRepositoryError>;

    async fn record_pending_deletion(
        &self,
        document_id: i64,
        file_path: &str,
    ) -> Result<(), DocumentRepositoryError>;
    async fn find_pending_deletion(
        &self,
        document_id: i64,
    ) -> Result<Option<PendingDeletion>, DocumentRepositoryError>;
    async fn clear_pending_deletion(&self, document_id: i64) -> Result<(), DocumentRepositoryError>;
    async fn list_pending_deletions(&self) -> Result<Vec<PendingDeletion>, DocumentRepositoryError>;
}
