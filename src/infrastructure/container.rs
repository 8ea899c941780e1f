use std::{path::Path, sync::Arc};

use crate::{
    application::{
        ports::{BlobStorage, VectorBackend},
        services::{ChunkIndexService, DocumentStore},
    },
    config::AppConfig,
    domain::repositories::DocumentRepository,
    infrastructure::{
        database::{DbPool, SqliteDocumentRepository, create_connection_pool, run_migrations},
        file_system::LocalBlobStorage,
        vector_index::ChromaBackend,
    },
};

pub struct AppContainer {
    pub config: AppConfig,
    pub db_pool: DbPool,

    pub document_repository: Arc<dyn DocumentRepository>,
    pub blob_storage: Arc<dyn BlobStorage>,
    pub vector_backend: Arc<dyn VectorBackend>,

    pub document_store: Arc<DocumentStore>,
    pub chunk_index: Arc<ChunkIndexService>,
}

impl AppContainer {
    pub async fn new(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let vector_backend: Arc<dyn VectorBackend> = Arc::new(
            ChromaBackend::new(config.chroma.clone())
                .map_err(|e| format!("Failed to create Chroma client: {}", e))?,
        );

        Self::with_vector_backend(config, vector_backend).await
    }

    pub async fn with_vector_backend(
        config: AppConfig,
        vector_backend: Arc<dyn VectorBackend>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let blob_storage: Arc<dyn BlobStorage> = Arc::new(
            LocalBlobStorage::open(&config.data_dir)
                .await
                .map_err(|e| format!("Failed to open blob storage: {}", e))?,
        );

        if let Some(parent) = Path::new(&config.database_url).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let db_pool = create_connection_pool(&config.database_url, config.database_pool_size)?;
        run_migrations(&db_pool).map_err(|e| format!("Failed to run database migrations: {}", e))?;

        let document_repository: Arc<dyn DocumentRepository> =
            Arc::new(SqliteDocumentRepository::new(db_pool.clone()));

        let document_store = Arc::new(DocumentStore::new(
            document_repository.clone(),
            blob_storage.clone(),
        ));

        let chunk_index = Arc::new(
            ChunkIndexService::connect(vector_backend.clone(), &config.collection_name)
                .await
                .map_err(|e| format!("Failed to connect vector index: {}", e))?,
        );

        tracing::info!(
            data_dir = %config.data_dir.display(),
            database_url = %config.database_url,
            collection = %config.collection_name,
            "container ready"
        );

        Ok(Self {
            config,
            db_pool,
            document_repository,
            blob_storage,
            vector_backend,
            document_store,
            chunk_index,
        })
    }
}
