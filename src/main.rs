use std::path::Path;

use docstore::{AppConfig, AppContainer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env()?;
    let grace = config.orphan_grace;
    let container = AppContainer::new(config).await?;

    let report = container.document_store.recover(grace).await?;
    tracing::info!(
        temp_files_removed = report.temp_files_removed,
        deletions_completed = report.deletions_completed,
        orphan_blobs_removed = report.orphan_blobs_removed,
        failed = report.failed,
        "startup recovery done"
    );

    for arg in std::env::args().skip(1) {
        let path = Path::new(&arg);
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            tracing::warn!(path = %arg, "skipping argument without a file name");
            continue;
        };

        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(path = %arg, error = %e, "failed to open file");
                continue;
            }
        };

        match container
            .document_store
            .store_document(&file_name, &mut file)
            .await
        {
            Ok(document) => tracing::info!(
                document_id = document.id(),
                content_hash = %document.content_hash(),
                status = %document.status(),
                "stored {}",
                arg
            ),
            Err(e) => tracing::error!(path = %arg, error = %e, "failed to store file"),
        }
    }

    let documents = container.document_store.count_documents().await?;
    let index = container.chunk_index.stats().await?;
    tracing::info!(
        documents,
        collection = %index.name,
        indexed_chunks = index.count,
        "catalog summary"
    );

    Ok(())
}
