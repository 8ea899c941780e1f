use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;

use crate::application::ports::BlobStorage;
use crate::application::ports::blob_storage::BlobStorageError;
use crate::domain::entities::{Document, NewDocument};
use crate::domain::repositories::{DocumentRepository, document_repository::DocumentRepositoryError};
use crate::domain::value_objects::DocumentStatus;

#[derive(Debug)]
pub enum DocumentStoreError {
    NotFound(String),
    Conflict(String),
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },
    StorageError(String),
    RepositoryError(String),
}

impl std::fmt::Display for DocumentStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStoreError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DocumentStoreError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            DocumentStoreError::InvalidTransition { from, to } => {
                write!(f, "Invalid status transition: {} -> {}", from, to)
            }
            DocumentStoreError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            DocumentStoreError::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
        }
    }
}

impl std::error::Error for DocumentStoreError {}

impl From<DocumentRepositoryError> for DocumentStoreError {
    fn from(error: DocumentRepositoryError) -> Self {
        match error {
            e if e.is_not_found() => DocumentStoreError::NotFound(e.to_string()),
            DocumentRepositoryError::UniqueViolation(msg) => DocumentStoreError::Conflict(msg),
            other => DocumentStoreError::RepositoryError(other.to_string()),
        }
    }
}

impl From<BlobStorageError> for DocumentStoreError {
    fn from(error: BlobStorageError) -> Self {
        DocumentStoreError::StorageError(error.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub temp_files_removed: usize,
    pub deletions_completed: usize,
    pub orphan_blobs_removed: usize,
    /// Journal entries or orphans that could not be cleaned up this time.
    pub failed: usize,
}

/// Keeps the catalog and the blob store in step: every catalog row points at
/// exactly one blob, and a blob is never left behind by a failed upload.
pub struct DocumentStore {
    repository: Arc<dyn DocumentRepository>,
    blob_storage: Arc<dyn BlobStorage>,
}

impl DocumentStore {
    pub fn new(repository: Arc<dyn DocumentRepository>, blob_storage: Arc<dyn BlobStorage>) -> Self {
        Self {
            repository,
            blob_storage,
        }
    }

    /// Stores an upload. Uploading content that is already catalogued returns
    /// the existing document and keeps no second copy.
    pub async fn store_document(
        &self,
        file_name: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<Document, DocumentStoreError> {
        let blob = self.blob_storage.save(file_name, content).await?;

        let existing = match self.live_document_with_hash(blob.hash.as_str()).await {
            Ok(existing) => existing,
            Err(e) => {
                self.discard_blob(&blob.path).await;
                return Err(e);
            }
        };
        if let Some(document) = existing {
            tracing::info!(
                document_id = document.id(),
                content_hash = %blob.hash,
                "duplicate upload, returning existing document"
            );
            self.discard_blob(&blob.path).await;
            return Ok(document);
        }

        let file_size = match i64::try_from(blob.size) {
            Ok(size) => size,
            Err(_) => {
                self.discard_blob(&blob.path).await;
                return Err(DocumentStoreError::StorageError(format!(
                    "blob too large: {} bytes",
                    blob.size
                )));
            }
        };

        let draft = NewDocument::pending(
            file_name.to_string(),
            blob.path.clone(),
            file_size,
            blob.hash.clone(),
        );

        match self.repository.insert(&draft).await {
            Ok(document) => {
                tracing::info!(
                    document_id = document.id(),
                    file_path = %document.file_path(),
                    size = file_size,
                    "document stored"
                );
                Ok(document)
            }
            Err(DocumentRepositoryError::UniqueViolation(msg)) => {
                // A concurrent upload of the same content may have won the insert.
                let winner = self.repository.find_by_content_hash(blob.hash.as_str()).await;
                self.discard_blob(&blob.path).await;
                match winner? {
                    Some(document) => {
                        tracing::info!(
                            document_id = document.id(),
                            "lost insert race, returning concurrent upload"
                        );
                        Ok(document)
                    }
                    None => Err(DocumentStoreError::Conflict(msg)),
                }
            }
            Err(e) => {
                self.discard_blob(&blob.path).await;
                Err(e.into())
            }
        }
    }

    /// A row whose deletion is journaled but unfinished is not a usable
    /// duplicate: its deletion is completed and `None` returned.
    async fn live_document_with_hash(
        &self,
        hash: &str,
    ) -> Result<Option<Document>, DocumentStoreError> {
        let Some(document) = self.repository.find_by_content_hash(hash).await? else {
            return Ok(None);
        };

        if self
            .repository
            .find_pending_deletion(document.id())
            .await?
            .is_some()
        {
            tracing::info!(
                document_id = document.id(),
                "duplicate is mid-deletion, finishing it first"
            );
            self.finish_deletion(document.id(), document.file_path())
                .await?;
            return Ok(None);
        }

        Ok(Some(document))
    }

    async fn discard_blob(&self, path: &str) {
        match self.blob_storage.delete(path).await {
            Ok(()) => tracing::debug!(file_path = path, "discarded uploaded blob"),
            Err(e) => tracing::error!(file_path = path, error = %e, "failed to discard uploaded blob"),
        }
    }

    pub async fn get_document(&self, id: i64) -> Result<Document, DocumentStoreError> {
        Ok(self.repository.get_by_id(id).await?)
    }

    pub async fn list_documents(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        Ok(self.repository.list(limit, offset).await?)
    }

    pub async fn get_pending_documents(&self) -> Result<Vec<Document>, DocumentStoreError> {
        self.get_documents_by_status(DocumentStatus::Pending).await
    }

    pub async fn get_documents_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        Ok(self.repository.get_by_status(status).await?)
    }

    pub async fn count_documents(&self) -> Result<i64, DocumentStoreError> {
        Ok(self.repository.count().await?)
    }

    pub async fn update_document_status(
        &self,
        id: i64,
        status: DocumentStatus,
    ) -> Result<Document, DocumentStoreError> {
        let document = self.repository.get_by_id(id).await?;
        if !document.status().can_transition_to(status) {
            return Err(DocumentStoreError::InvalidTransition {
                from: document.status(),
                to: status,
            });
        }

        self.repository
            .update_status(id, status, Some(Utc::now()))
            .await?;

        tracing::info!(document_id = id, from = %document.status(), to = %status, "status updated");
        Ok(self.repository.get_by_id(id).await?)
    }

    /// Removes the blob and then the row. The intent is journaled first so an
    /// interrupted deletion is finished by [`recover`](Self::recover).
    pub async fn delete_document(&self, id: i64) -> Result<(), DocumentStoreError> {
        let document = self.repository.get_by_id(id).await?;

        self.repository
            .record_pending_deletion(id, document.file_path())
            .await?;

        self.finish_deletion(id, document.file_path()).await?;

        tracing::info!(document_id = id, file_path = %document.file_path(), "document deleted");
        Ok(())
    }

    async fn finish_deletion(&self, id: i64, file_path: &str) -> Result<(), DocumentStoreError> {
        match self.blob_storage.delete(file_path).await {
            Ok(()) | Err(BlobStorageError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!(document_id = id, error = %e, "blob deletion failed, keeping journal entry");
                return Err(e.into());
            }
        }

        if !self.repository.delete(id).await? {
            tracing::debug!(document_id = id, "row already gone");
        }
        self.repository.clear_pending_deletion(id).await?;
        Ok(())
    }

    /// Cleans up after a crash: stale temp files, unfinished deletions and
    /// blobs no row points to. Run before serving traffic.
    pub async fn recover(&self, grace: Duration) -> Result<RecoveryReport, DocumentStoreError> {
        let mut report = RecoveryReport {
            temp_files_removed: self.blob_storage.sweep_temp_files(grace).await?,
            ..RecoveryReport::default()
        };

        for pending in self.repository.list_pending_deletions().await? {
            match self
                .finish_deletion(pending.document_id, &pending.file_path)
                .await
            {
                Ok(()) => report.deletions_completed += 1,
                Err(e) => {
                    tracing::error!(
                        document_id = pending.document_id,
                        file_path = %pending.file_path,
                        error = %e,
                        "failed to replay journaled deletion"
                    );
                    report.failed += 1;
                }
            }
        }

        let now = Utc::now();
        for blob in self.blob_storage.list_blobs().await? {
            let age = now
                .signed_duration_since(blob.modified_at)
                .to_std()
                .unwrap_or_default();
            if age < grace {
                continue;
            }
            if self.repository.find_by_path(&blob.path).await?.is_some() {
                continue;
            }

            match self.blob_storage.delete(&blob.path).await {
                Ok(()) => {
                    tracing::info!(file_path = %blob.path, "removed orphan blob");
                    report.orphan_blobs_removed += 1;
                }
                Err(BlobStorageError::NotFound(_)) => {}
                Err(e) => {
                    tracing::error!(file_path = %blob.path, error = %e, "failed to remove orphan blob");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            temp_files_removed = report.temp_files_removed,
            deletions_completed = report.deletions_completed,
            orphan_blobs_removed = report.orphan_blobs_removed,
            failed = report.failed,
            "recovery finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::blob_storage::{BlobEntry, StoredBlob};
    use crate::domain::repositories::document_repository::PendingDeletion;
    use crate::infrastructure::database::{
        SqliteDocumentRepository, create_connection_pool, run_migrations,
    };
    use crate::infrastructure::file_system::LocalBlobStorage;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Real catalog with injectable insert failures and hidden hash lookups.
    struct ScriptedRepository {
        inner: SqliteDocumentRepository,
        insert_error: Mutex<Option<DocumentRepositoryError>>,
        hidden_hash_lookups: AtomicUsize,
    }

    impl ScriptedRepository {
        fn fail_next_insert(&self, error: DocumentRepositoryError) {
            *self.insert_error.lock().unwrap() = Some(error);
        }

        fn hide_next_hash_lookups(&self, count: usize) {
            self.hidden_hash_lookups.store(count, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DocumentRepository for ScriptedRepository {
        async fn insert(&self, document: &NewDocument) -> Result<Document, DocumentRepositoryError> {
            let scripted = self.insert_error.lock().unwrap().take();
            match scripted {
                Some(error) => Err(error),
                None => self.inner.insert(document).await,
            }
        }

        async fn get_by_id(&self, id: i64) -> Result<Document, DocumentRepositoryError> {
            self.inner.get_by_id(id).await
        }

        async fn get_by_content_hash(&self, hash: &str) -> Result<Document, DocumentRepositoryError> {
            self.inner.get_by_content_hash(hash).await
        }

        async fn find_by_content_hash(
            &self,
            hash: &str,
        ) -> Result<Option<Document>, DocumentRepositoryError> {
            let hidden = self
                .hidden_hash_lookups
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if hidden {
                return Ok(None);
            }
            self.inner.find_by_content_hash(hash).await
        }

        async fn find_by_path(&self, path: &str) -> Result<Option<Document>, DocumentRepositoryError> {
            self.inner.find_by_path(path).await
        }

        async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Document>, DocumentRepositoryError> {
            self.inner.list(limit, offset).await
        }

        async fn get_by_status(
            &self,
            status: DocumentStatus,
        ) -> Result<Vec<Document>, DocumentRepositoryError> {
            self.inner.get_by_status(status).await
        }

        async fn update_status(
            &self,
            id: i64,
            status: DocumentStatus,
            processed_at: Option<DateTime<Utc>>,
        ) -> Result<(), DocumentRepositoryError> {
            self.inner.update_status(id, status, processed_at).await
        }

        async fn delete(&self, id: i64) -> Result<bool, DocumentRepositoryError> {
            self.inner.delete(id).await
        }

        async fn count(&self) -> Result<i64, DocumentRepositoryError> {
            self.inner.count().await
        }

        async fn record_pending_deletion(
            &self,
            document_id: i64,
            file_path: &str,
        ) -> Result<(), DocumentRepositoryError> {
            self.inner.record_pending_deletion(document_id, file_path).await
        }

        async fn find_pending_deletion(
            &self,
            document_id: i64,
        ) -> Result<Option<PendingDeletion>, DocumentRepositoryError> {
            self.inner.find_pending_deletion(document_id).await
        }

        async fn clear_pending_deletion(&self, document_id: i64) -> Result<(), DocumentRepositoryError> {
            self.inner.clear_pending_deletion(document_id).await
        }

        async fn list_pending_deletions(&self) -> Result<Vec<PendingDeletion>, DocumentRepositoryError> {
            self.inner.list_pending_deletions().await
        }
    }

    /// Local blob storage whose deletes can be switched to fail.
    struct ScriptedBlobStorage {
        inner: LocalBlobStorage,
        fail_deletes: AtomicBool,
    }

    #[async_trait]
    impl BlobStorage for ScriptedBlobStorage {
        async fn save(
            &self,
            file_name: &str,
            content: &mut (dyn AsyncRead + Send + Unpin),
        ) -> Result<StoredBlob, BlobStorageError> {
            self.inner.save(file_name, content).await
        }

        async fn delete(&self, path: &str) -> Result<(), BlobStorageError> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(BlobStorageError::IoError("disk unavailable".to_string()));
            }
            self.inner.delete(path).await
        }

        async fn exists(&self, path: &str) -> Result<bool, BlobStorageError> {
            self.inner.exists(path).await
        }

        async fn list_blobs(&self) -> Result<Vec<BlobEntry>, BlobStorageError> {
            self.inner.list_blobs().await
        }

        async fn sweep_temp_files(&self, grace: Duration) -> Result<usize, BlobStorageError> {
            self.inner.sweep_temp_files(grace).await
        }
    }

    struct Fixture {
        _dir: TempDir,
        repository: Arc<ScriptedRepository>,
        blobs: Arc<ScriptedBlobStorage>,
        store: DocumentStore,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("rag.db").to_string_lossy().to_string();
        let pool = create_connection_pool(&url, 4).unwrap();
        run_migrations(&pool).unwrap();

        let repository = Arc::new(ScriptedRepository {
            inner: SqliteDocumentRepository::new(pool),
            insert_error: Mutex::new(None),
            hidden_hash_lookups: AtomicUsize::new(0),
        });
        let blobs = Arc::new(ScriptedBlobStorage {
            inner: LocalBlobStorage::open(dir.path().join("blobs")).await.unwrap(),
            fail_deletes: AtomicBool::new(false),
        });
        let store = DocumentStore::new(repository.clone(), blobs.clone());

        Fixture {
            _dir: dir,
            repository,
            blobs,
            store,
        }
    }

    async fn upload(store: &DocumentStore, name: &str, content: &[u8]) -> Result<Document, DocumentStoreError> {
        let mut reader = content;
        store.store_document(name, &mut reader).await
    }

    async fn blob_count(fixture: &Fixture) -> usize {
        fixture.blobs.list_blobs().await.unwrap().len()
    }

    #[tokio::test]
    async fn test_store_document_creates_pending_row_and_blob() {
        let fx = fixture().await;

        let document = upload(&fx.store, "notes.txt", b"hello world").await.unwrap();

        assert_eq!(document.file_name(), "notes.txt");
        assert_eq!(document.file_size(), 11);
        assert_eq!(document.status(), DocumentStatus::Pending);
        assert!(document.processed_at().is_none());
        assert_eq!(
            document.content_hash().as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert!(fx.blobs.exists(document.file_path()).await.unwrap());
        assert_eq!(fx.store.get_document(document.id()).await.unwrap(), document);
    }

    #[tokio::test]
    async fn test_identical_content_is_stored_once() {
        let fx = fixture().await;

        let first = upload(&fx.store, "a.txt", b"same bytes").await.unwrap();
        let second = upload(&fx.store, "b.txt", b"same bytes").await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(second.file_name(), "a.txt");
        assert_eq!(blob_count(&fx).await, 1);
        assert_eq!(fx.store.count_documents().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_distinct_content_gets_distinct_documents() {
        let fx = fixture().await;

        let first = upload(&fx.store, "same.txt", b"one").await.unwrap();
        let second = upload(&fx.store, "same.txt", b"two").await.unwrap();

        assert_ne!(first.id(), second.id());
        assert_ne!(first.content_hash(), second.content_hash());
        assert_ne!(first.file_path(), second.file_path());
        assert_eq!(blob_count(&fx).await, 2);
    }

    #[tokio::test]
    async fn test_failed_insert_removes_blob() {
        let fx = fixture().await;
        fx.repository
            .fail_next_insert(DocumentRepositoryError::DatabaseError("disk full".to_string()));

        let result = upload(&fx.store, "notes.txt", b"content").await;

        assert!(matches!(result, Err(DocumentStoreError::RepositoryError(_))));
        assert_eq!(blob_count(&fx).await, 0);
        assert_eq!(fx.store.count_documents().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lost_insert_race_returns_winner() {
        let fx = fixture().await;
        let winner = upload(&fx.store, "first.txt", b"raced").await.unwrap();

        // The pre-insert lookup misses, as if the winner committed just after it.
        fx.repository.hide_next_hash_lookups(1);
        let loser = upload(&fx.store, "second.txt", b"raced").await.unwrap();

        assert_eq!(loser.id(), winner.id());
        assert_eq!(blob_count(&fx).await, 1);
        assert!(fx.blobs.exists(winner.file_path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_violation_without_winner_is_conflict() {
        let fx = fixture().await;
        fx.repository
            .fail_next_insert(DocumentRepositoryError::UniqueViolation("file_path".to_string()));

        let result = upload(&fx.store, "notes.txt", b"content").await;

        assert!(matches!(result, Err(DocumentStoreError::Conflict(_))));
        assert_eq!(blob_count(&fx).await, 0);
    }

    #[tokio::test]
    async fn test_invalid_file_name_is_storage_error() {
        let fx = fixture().await;

        let result = upload(&fx.store, "..", b"content").await;

        assert!(matches!(result, Err(DocumentStoreError::StorageError(_))));
        assert_eq!(fx.store.count_documents().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_transitions_are_enforced() {
        let fx = fixture().await;
        let document = upload(&fx.store, "notes.txt", b"content").await.unwrap();

        let processing = fx
            .store
            .update_document_status(document.id(), DocumentStatus::Processing)
            .await
            .unwrap();
        assert_eq!(processing.status(), DocumentStatus::Processing);
        assert!(processing.processed_at().is_some());

        let completed = fx
            .store
            .update_document_status(document.id(), DocumentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status(), DocumentStatus::Completed);

        let result = fx
            .store
            .update_document_status(document.id(), DocumentStatus::Pending)
            .await;
        assert!(matches!(
            result,
            Err(DocumentStoreError::InvalidTransition {
                from: DocumentStatus::Completed,
                to: DocumentStatus::Pending
            })
        ));

        let missing = fx
            .store
            .update_document_status(9999, DocumentStatus::Processing)
            .await;
        assert!(matches!(missing, Err(DocumentStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_queries_by_status() {
        let fx = fixture().await;
        let first = upload(&fx.store, "a.txt", b"a").await.unwrap();
        let second = upload(&fx.store, "b.txt", b"b").await.unwrap();
        fx.store
            .update_document_status(second.id(), DocumentStatus::Failed)
            .await
            .unwrap();

        let pending = fx.store.get_pending_documents().await.unwrap();
        let failed = fx
            .store
            .get_documents_by_status(DocumentStatus::Failed)
            .await
            .unwrap();

        assert_eq!(pending.iter().map(Document::id).collect::<Vec<_>>(), vec![first.id()]);
        assert_eq!(failed.iter().map(Document::id).collect::<Vec<_>>(), vec![second.id()]);
        assert_eq!(fx.store.list_documents(10, 0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_document_removes_row_and_blob() {
        let fx = fixture().await;
        let document = upload(&fx.store, "notes.txt", b"content").await.unwrap();

        fx.store.delete_document(document.id()).await.unwrap();

        assert!(matches!(
            fx.store.get_document(document.id()).await,
            Err(DocumentStoreError::NotFound(_))
        ));
        assert!(!fx.blobs.exists(document.file_path()).await.unwrap());
        assert!(fx.repository.list_pending_deletions().await.unwrap().is_empty());
        assert!(matches!(
            fx.store.delete_document(document.id()).await,
            Err(DocumentStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_blob() {
        let fx = fixture().await;
        let document = upload(&fx.store, "notes.txt", b"content").await.unwrap();
        fx.blobs.delete(document.file_path()).await.unwrap();

        fx.store.delete_document(document.id()).await.unwrap();

        assert_eq!(fx.store.count_documents().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_interrupted_delete_is_finished_by_recover() {
        let fx = fixture().await;
        let document = upload(&fx.store, "notes.txt", b"content").await.unwrap();

        fx.blobs.fail_deletes.store(true, Ordering::SeqCst);
        let result = fx.store.delete_document(document.id()).await;
        assert!(matches!(result, Err(DocumentStoreError::StorageError(_))));
        assert!(fx.store.get_document(document.id()).await.is_ok());
        assert_eq!(fx.repository.list_pending_deletions().await.unwrap().len(), 1);

        fx.blobs.fail_deletes.store(false, Ordering::SeqCst);
        let report = fx.store.recover(Duration::from_secs(3600)).await.unwrap();

        assert_eq!(report.deletions_completed, 1);
        assert!(fx.store.get_document(document.id()).await.is_err());
        assert!(!fx.blobs.exists(document.file_path()).await.unwrap());
        assert!(fx.repository.list_pending_deletions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recover_removes_orphans_and_temp_files() {
        let fx = fixture().await;
        let kept = upload(&fx.store, "kept.txt", b"catalogued").await.unwrap();

        let mut orphan_content: &[u8] = b"no row";
        let orphan = fx.blobs.inner.save("orphan.txt", &mut orphan_content).await.unwrap();
        tokio::fs::write(fx.blobs.inner.root().join("upload_stale.tmp"), b"partial")
            .await
            .unwrap();

        let report = fx.store.recover(Duration::ZERO).await.unwrap();

        assert_eq!(
            report,
            RecoveryReport {
                temp_files_removed: 1,
                deletions_completed: 0,
                orphan_blobs_removed: 1,
                failed: 0,
            }
        );
        assert!(!fx.blobs.exists(&orphan.path).await.unwrap());
        assert!(fx.blobs.exists(kept.file_path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_recover_respects_grace_period() {
        let fx = fixture().await;
        let mut orphan_content: &[u8] = b"fresh upload";
        let orphan = fx.blobs.inner.save("fresh.txt", &mut orphan_content).await.unwrap();

        let report = fx.store.recover(Duration::from_secs(3600)).await.unwrap();

        assert_eq!(report, RecoveryReport::default());
        assert!(fx.blobs.exists(&orphan.path).await.unwrap());
    }

    #[tokio::test]
    async fn test_reupload_during_unfinished_delete_stores_new_copy() {
        let fx = fixture().await;
        let original = upload(&fx.store, "payload.txt", b"payload").await.unwrap();

        // State left behind by a crash between journaling and removing the row.
        fx.repository
            .record_pending_deletion(original.id(), original.file_path())
            .await
            .unwrap();
        fx.blobs.delete(original.file_path()).await.unwrap();

        let reuploaded = upload(&fx.store, "payload.txt", b"payload").await.unwrap();

        assert_ne!(reuploaded.id(), original.id());
        assert!(fx.blobs.exists(reuploaded.file_path()).await.unwrap());
        assert!(fx.store.get_document(original.id()).await.is_err());
        assert!(fx.repository.list_pending_deletions().await.unwrap().is_empty());

        fx.store.recover(Duration::ZERO).await.unwrap();

        let kept = fx.store.get_document(reuploaded.id()).await.unwrap();
        assert!(fx.blobs.exists(kept.file_path()).await.unwrap());
        assert_eq!(blob_count(&fx).await, 1);
    }

    #[tokio::test]
    async fn test_recover_skips_unreplayable_journal_entries() {
        let fx = fixture().await;
        let broken = upload(&fx.store, "broken.txt", b"broken").await.unwrap();
        let doomed = upload(&fx.store, "doomed.txt", b"doomed").await.unwrap();

        fx.repository
            .record_pending_deletion(broken.id(), "/outside/documents/broken.txt")
            .await
            .unwrap();
        fx.repository
            .record_pending_deletion(doomed.id(), doomed.file_path())
            .await
            .unwrap();

        let report = fx.store.recover(Duration::from_secs(3600)).await.unwrap();

        assert_eq!(report.deletions_completed, 1);
        assert_eq!(report.failed, 1);
        assert!(fx.store.get_document(doomed.id()).await.is_err());
        assert!(fx.store.get_document(broken.id()).await.is_ok());
        assert_eq!(fx.repository.list_pending_deletions().await.unwrap().len(), 1);
    }
}
