use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::domain::entities::{Document, NewDocument};
use crate::domain::repositories::{DocumentRepository, DocumentRepositoryError, PendingDeletion};
use crate::domain::value_objects::DocumentStatus;
use crate::infrastructure::database::models::{
    DocumentModel, DocumentStatusChangeset, NewDocumentModel, PendingDeletionModel,
};
use crate::infrastructure::database::schema::{documents, pending_deletions};
use crate::infrastructure::database::{DbConnection, DbPool, get_connection_from_pool};

pub struct SqliteDocumentRepository {
    pool: DbPool,
}

impl SqliteDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Runs a diesel query on the blocking pool; SQLite may sit in
    /// `busy_timeout` waiting for a writer.
    async fn run<T, F>(&self, query: F) -> Result<T, DocumentRepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut DbConnection) -> Result<T, DocumentRepositoryError> + Send + 'static,
    {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = get_connection_from_pool(&pool)
                .map_err(|e| DocumentRepositoryError::DatabaseError(e.to_string()))?;
            query(&mut conn)
        })
        .await
        .map_err(|e| DocumentRepositoryError::DatabaseError(format!("Task join error: {}", e)))?
    }
}

fn map_diesel_error(error: DieselError) -> DocumentRepositoryError {
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            DocumentRepositoryError::UniqueViolation(info.message().to_string())
        }
        other => DocumentRepositoryError::DatabaseError(other.to_string()),
    }
}

fn to_domain(model: DocumentModel) -> Result<Document, DocumentRepositoryError> {
    Document::try_from(model).map_err(DocumentRepositoryError::DecodeError)
}

fn to_domain_list(models: Vec<DocumentModel>) -> Result<Vec<Document>, DocumentRepositoryError> {
    models.into_iter().map(to_domain).collect()
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn insert(&self, document: &NewDocument) -> Result<Document, DocumentRepositoryError> {
        let new_document = NewDocumentModel::from(document);

        let inserted = self
            .run(move |conn| {
                diesel::insert_into(documents::table)
                    .values(&new_document)
                    .returning(DocumentModel::as_returning())
                    .get_result(conn)
                    .map_err(map_diesel_error)
            })
            .await?;

        tracing::debug!(
            document_id = inserted.id,
            content_hash = %inserted.content_hash,
            "inserted document row"
        );

        to_domain(inserted)
    }

    async fn get_by_id(&self, id: i64) -> Result<Document, DocumentRepositoryError> {
        let result = self
            .run(move |conn| {
                documents::table
                    .find(id)
                    .select(DocumentModel::as_select())
                    .first(conn)
                    .optional()
                    .map_err(map_diesel_error)
            })
            .await?;

        match result {
            Some(model) => to_domain(model),
            None => Err(DocumentRepositoryError::NotFound(id)),
        }
    }

    async fn get_by_content_hash(&self, hash: &str) -> Result<Document, DocumentRepositoryError> {
        self.find_by_content_hash(hash)
            .await?
            .ok_or_else(|| DocumentRepositoryError::HashNotFound(hash.to_string()))
    }

    async fn find_by_content_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        let hash = hash.to_string();

        self.run(move |conn| {
            documents::table
                .filter(documents::content_hash.eq(hash))
                .select(DocumentModel::as_select())
                .first(conn)
                .optional()
                .map_err(map_diesel_error)
        })
        .await?
        .map(to_domain)
        .transpose()
    }

    async fn find_by_path(&self, path: &str) -> Result<Option<Document>, DocumentRepositoryError> {
        let path = path.to_string();

        self.run(move |conn| {
            documents::table
                .filter(documents::file_path.eq(path))
                .select(DocumentModel::as_select())
                .first(conn)
                .optional()
                .map_err(map_diesel_error)
        })
        .await?
        .map(to_domain)
        .transpose()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Document>, DocumentRepositoryError> {
        let models = self
            .run(move |conn| {
                documents::table
                    .order((documents::uploaded_at.desc(), documents::id.desc()))
                    .limit(limit)
                    .offset(offset)
                    .select(DocumentModel::as_select())
                    .load(conn)
                    .map_err(map_diesel_error)
            })
            .await?;

        to_domain_list(models)
    }

    async fn get_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<Document>, DocumentRepositoryError> {
        let models = self
            .run(move |conn| {
                documents::table
                    .filter(documents::status.eq(status.as_str()))
                    .order((documents::uploaded_at.asc(), documents::id.asc()))
                    .select(DocumentModel::as_select())
                    .load(conn)
                    .map_err(map_diesel_error)
            })
            .await?;

        to_domain_list(models)
    }

    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<(), DocumentRepositoryError> {
        let changeset = DocumentStatusChangeset::new(status, processed_at);

        let updated = self
            .run(move |conn| {
                diesel::update(documents::table.find(id))
                    .set(&changeset)
                    .execute(conn)
                    .map_err(map_diesel_error)
            })
            .await?;

        if updated == 0 {
            return Err(DocumentRepositoryError::NotFound(id));
        }

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, DocumentRepositoryError> {
        let deleted_count = self
            .run(move |conn| {
                diesel::delete(documents::table.find(id))
                    .execute(conn)
                    .map_err(map_diesel_error)
            })
            .await?;

        Ok(deleted_count > 0)
    }

    async fn count(&self) -> Result<i64, DocumentRepositoryError> {
        self.run(|conn| {
            documents::table
                .count()
                .get_result(conn)
                .map_err(map_diesel_error)
        })
        .await
    }

    async fn record_pending_deletion(
        &self,
        document_id: i64,
        file_path: &str,
    ) -> Result<(), DocumentRepositoryError> {
        let entry = PendingDeletionModel {
            document_id,
            file_path: file_path.to_string(),
            requested_at: Utc::now().naive_utc(),
        };

        self.run(move |conn| {
            diesel::replace_into(pending_deletions::table)
                .values(&entry)
                .execute(conn)
                .map_err(map_diesel_error)
        })
        .await?;

        Ok(())
    }

    async fn find_pending_deletion(
        &self,
        document_id: i64,
    ) -> Result<Option<PendingDeletion>, DocumentRepositoryError> {
        let model = self
            .run(move |conn| {
                pending_deletions::table
                    .find(document_id)
                    .select(PendingDeletionModel::as_select())
                    .first(conn)
                    .optional()
                    .map_err(map_diesel_error)
            })
            .await?;

        Ok(model.map(PendingDeletion::from))
    }

    async fn clear_pending_deletion(&self, document_id: i64) -> Result<(), DocumentRepositoryError> {
        self.run(move |conn| {
            diesel::delete(pending_deletions::table.find(document_id))
                .execute(conn)
                .map_err(map_diesel_error)
        })
        .await?;

        Ok(())
    }

    async fn list_pending_deletions(&self) -> Result<Vec<PendingDeletion>, DocumentRepositoryError> {
        let models = self
            .run(|conn| {
                pending_deletions::table
                    .order(pending_deletions::requested_at.asc())
                    .select(PendingDeletionModel::as_select())
                    .load(conn)
                    .map_err(map_diesel_error)
            })
            .await?;

        Ok(models.into_iter().map(PendingDeletion::from).collect())
    }
}
