use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ContentHash, DocumentStatus};

/// A catalogued upload. Rows are only ever built by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: i64,
    file_name: String,
    file_path: String,
    file_size: i64,
    content_hash: ContentHash,
    uploaded_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    status: DocumentStatus,
}

impl Document {
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: i64,
        file_name: String,
        file_path: String,
        file_size: i64,
        content_hash: ContentHash,
        uploaded_at: DateTime<Utc>,
        processed_at: Option<DateTime<Utc>>,
        status: DocumentStatus,
    ) -> Self {
        Self {
            id,
            file_name,
            file_path,
            file_size,
            content_hash,
            uploaded_at,
            processed_at,
            status,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn file_size(&self) -> i64 {
        self.file_size
    }

    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }
}

/// Everything the catalog needs to insert a row; the id is assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_hash: ContentHash,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
}

impl NewDocument {
    pub fn pending(
        file_name: String,
        file_path: String,
        file_size: i64,
        content_hash: ContentHash,
    ) -> Self {
        Self {
            file_name,
            file_path,
            file_size,
            content_hash,
            uploaded_at: Utc::now(),
            status: DocumentStatus::Pending,
        }
    }
}
