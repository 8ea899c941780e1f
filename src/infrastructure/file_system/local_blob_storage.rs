use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::application::ports::blob_storage::{
    BlobEntry, BlobStorage, BlobStorageError, StoredBlob,
};
use crate::domain::value_objects::ContentHash;

const DOCUMENTS_DIR: &str = "documents";
const TEMP_PREFIX: &str = "upload_";
const TEMP_SUFFIX: &str = ".tmp";
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Blobs live at `<root>/documents/<timestamp>_<name>`; uploads are staged as
/// `<root>/upload_<uuid>.tmp` and only become visible once fully written.
pub struct LocalBlobStorage {
    root: PathBuf,
    documents_dir: PathBuf,
}

impl LocalBlobStorage {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, BlobStorageError> {
        let root = std::path::absolute(root.as_ref()).map_err(io_error)?;
        let documents_dir = root.join(DOCUMENTS_DIR);

        fs::create_dir_all(&documents_dir).await.map_err(io_error)?;

        Ok(Self {
            root,
            documents_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    fn temp_path(&self) -> PathBuf {
        self.root
            .join(format!("{}{}{}", TEMP_PREFIX, Uuid::new_v4().simple(), TEMP_SUFFIX))
    }

    /// Rejects anything that does not resolve inside the documents directory.
    fn blob_path(&self, path: &str) -> Result<PathBuf, BlobStorageError> {
        let candidate = Path::new(path);
        let inside = candidate.parent() == Some(self.documents_dir.as_path())
            && candidate.file_name().is_some();

        if inside {
            Ok(candidate.to_path_buf())
        } else {
            Err(BlobStorageError::InvalidPath(path.to_string()))
        }
    }

    async fn write_temp(
        &self,
        temp_path: &Path,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(ContentHash, u64), BlobStorageError> {
        let mut file = fs::File::create(temp_path).await.map_err(io_error)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut size = 0u64;

        loop {
            let read = content.read(&mut buffer).await.map_err(io_error)?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read]).await.map_err(io_error)?;
            hasher.update(&buffer[..read]);
            size += read as u64;
        }

        file.flush().await.map_err(io_error)?;
        file.sync_all().await.map_err(io_error)?;

        Ok((ContentHash::from_digest(hasher.finalize()), size))
    }

    /// Links the finished temp file under its final name without ever
    /// replacing an existing blob, then drops the temp name.
    async fn publish(&self, temp_path: &Path, file_name: &str) -> Result<PathBuf, BlobStorageError> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");

        for attempt in 0u32.. {
            let candidate = if attempt == 0 {
                self.documents_dir.join(format!("{}_{}", timestamp, file_name))
            } else {
                self.documents_dir
                    .join(format!("{}_{}_{}", timestamp, attempt, file_name))
            };

            match fs::hard_link(temp_path, &candidate).await {
                Ok(()) => {
                    fs::remove_file(temp_path).await.map_err(io_error)?;
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_error(e)),
            }
        }

        Err(BlobStorageError::IoError(format!(
            "no free file name for {}",
            file_name
        )))
    }
}

fn io_error(error: std::io::Error) -> BlobStorageError {
    BlobStorageError::IoError(error.to_string())
}

/// Keeps only the final path component of an uploaded name.
pub fn sanitize_file_name(file_name: &str) -> Result<String, BlobStorageError> {
    let last = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if last.is_empty() || last == "." || last == ".." {
        return Err(BlobStorageError::InvalidName(file_name.to_string()));
    }

    Ok(last.to_string())
}

fn is_older_than(modified: SystemTime, grace: Duration) -> bool {
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age >= grace)
        .unwrap_or(grace.is_zero())
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn save(
        &self,
        file_name: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<StoredBlob, BlobStorageError> {
        let file_name = sanitize_file_name(file_name)?;
        let temp_path = self.temp_path();

        let written = self.write_temp(&temp_path, content).await;
        let published = match written {
            Ok((hash, size)) => self
                .publish(&temp_path, &file_name)
                .await
                .map(|path| (path, hash, size)),
            Err(e) => Err(e),
        };

        match published {
            Ok((path, hash, size)) => {
                tracing::debug!(path = %path.display(), %hash, size, "blob published");
                Ok(StoredBlob {
                    path: path.to_string_lossy().to_string(),
                    hash,
                    size,
                })
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await {
                    if cleanup.kind() != ErrorKind::NotFound {
                        tracing::warn!(
                            path = %temp_path.display(),
                            error = %cleanup,
                            "failed to remove temp upload"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn delete(&self, path: &str) -> Result<(), BlobStorageError> {
        let blob_path = self.blob_path(path)?;

        match fs::remove_file(&blob_path).await {
            Ok(()) => {
                tracing::debug!(path, "blob removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BlobStorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(io_error(e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobStorageError> {
        let blob_path = self.blob_path(path)?;
        fs::try_exists(&blob_path).await.map_err(io_error)
    }

    async fn list_blobs(&self) -> Result<Vec<BlobEntry>, BlobStorageError> {
        let mut entries = fs::read_dir(&self.documents_dir).await.map_err(io_error)?;
        let mut blobs = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let metadata = entry.metadata().await.map_err(io_error)?;
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata.modified().map_err(io_error)?;
            blobs.push(BlobEntry {
                path: entry.path().to_string_lossy().to_string(),
                modified_at: DateTime::<Utc>::from(modified),
            });
        }

        Ok(blobs)
    }

    async fn sweep_temp_files(&self, grace: Duration) -> Result<usize, BlobStorageError> {
        let mut entries = fs::read_dir(&self.root).await.map_err(io_error)?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)) {
                continue;
            }

            let metadata = entry.metadata().await.map_err(io_error)?;
            if !metadata.is_file() || !is_older_than(metadata.modified().map_err(io_error)?, grace) {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(e)),
            }
        }

        if removed > 0 {
            tracing::info!(removed, "swept stale temp uploads");
        }

        Ok(removed)
    }
}
