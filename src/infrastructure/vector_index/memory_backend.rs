use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::ports::vector_backend::{
    CollectionHandle, DeleteFilter, DistanceMetric, QueryHits, UpsertRecords, VectorBackend,
    VectorBackendError,
};

#[derive(Debug, Clone)]
struct StoredRecord {
    id: String,
    document: String,
    metadata: HashMap<String, String>,
    embedding: Vec<f32>,
}

#[derive(Debug)]
struct MemoryCollection {
    name: String,
    metric: DistanceMetric,
    records: Vec<StoredRecord>,
}

/// Process-local stand-in for a vector server, with the same contract as the
/// HTTP backend: upserting an existing id replaces the stored record.
#[derive(Debug)]
pub struct InMemoryVectorBackend {
    collections: RwLock<HashMap<String, MemoryCollection>>,
    available: AtomicBool,
    write_calls: AtomicUsize,
}

impl Default for InMemoryVectorBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryVectorBackend {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// While unavailable every call fails as if the server were down.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of upsert/delete requests that reached the backend.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), VectorBackendError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(VectorBackendError::Unavailable(
                "in-memory backend switched off".to_string(),
            ))
        }
    }
}

fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        // Squared euclidean, as hnswlib reports it.
        DistanceMetric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
    }
}

#[async_trait]
impl VectorBackend for InMemoryVectorBackend {
    async fn heartbeat(&self) -> Result<(), VectorBackendError> {
        self.check_available()
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<CollectionHandle, VectorBackendError> {
        self.check_available()?;
        let mut collections = self.collections.write().await;

        if let Some((id, collection)) = collections.iter().find(|(_, c)| c.name == name) {
            return Ok(CollectionHandle {
                id: id.clone(),
                name: collection.name.clone(),
            });
        }

        let id = Uuid::new_v4().to_string();
        collections.insert(
            id.clone(),
            MemoryCollection {
                name: name.to_string(),
                metric,
                records: Vec::new(),
            },
        );

        Ok(CollectionHandle {
            id,
            name: name.to_string(),
        })
    }

    async fn upsert(
        &self,
        collection: &CollectionHandle,
        records: UpsertRecords,
    ) -> Result<(), VectorBackendError> {
        self.check_available()?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let n = records.ids.len();
        if records.documents.len() != n || records.metadatas.len() != n || records.embeddings.len() != n
        {
            return Err(VectorBackendError::RequestError(
                "upsert requires equal-length ids, documents, metadatas and embeddings".to_string(),
            ));
        }

        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(&collection.id)
            .ok_or_else(|| VectorBackendError::CollectionNotFound(collection.name.clone()))?;

        let dimension = target
            .records
            .first()
            .map(|r| r.embedding.len())
            .or_else(|| records.embeddings.first().map(Vec::len));
        if let Some(dimension) = dimension {
            if records.embeddings.iter().any(|e| e.len() != dimension) {
                return Err(VectorBackendError::RequestError(format!(
                    "embedding dimension mismatch, collection expects {}",
                    dimension
                )));
            }
        }

        let UpsertRecords {
            ids,
            documents,
            metadatas,
            embeddings,
        } = records;

        for (((id, document), metadata), embedding) in
            ids.into_iter().zip(documents).zip(metadatas).zip(embeddings)
        {
            target.records.retain(|r| r.id != id);
            target.records.push(StoredRecord {
                id,
                document,
                metadata,
                embedding,
            });
        }

        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<QueryHits, VectorBackendError> {
        self.check_available()?;
        let collections = self.collections.read().await;
        let target = collections
            .get(&collection.id)
            .ok_or_else(|| VectorBackendError::CollectionNotFound(collection.name.clone()))?;

        let mut scored: Vec<(f32, &StoredRecord)> = target
            .records
            .iter()
            .map(|r| (distance(target.metric, embedding, &r.embedding), r))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(n_results);

        let mut hits = QueryHits::default();
        for (distance, record) in scored {
            hits.ids.push(record.id.clone());
            hits.documents.push(Some(record.document.clone()));
            hits.metadatas.push(Some(
                record
                    .metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            ));
            hits.distances.push(distance);
        }

        Ok(hits)
    }

    async fn delete(
        &self,
        collection: &CollectionHandle,
        filter: DeleteFilter,
    ) -> Result<(), VectorBackendError> {
        self.check_available()?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(&collection.id)
            .ok_or_else(|| VectorBackendError::CollectionNotFound(collection.name.clone()))?;

        match filter {
            DeleteFilter::Ids(ids) => target.records.retain(|r| !ids.contains(&r.id)),
            DeleteFilter::MetadataEquals { key, value } => target
                .records
                .retain(|r| r.metadata.get(&key) != Some(&value)),
        }

        Ok(())
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<u64, VectorBackendError> {
        self.check_available()?;
        let collections = self.collections.read().await;
        collections
            .get(&collection.id)
            .map(|c| c.records.len() as u64)
            .ok_or_else(|| VectorBackendError::CollectionNotFound(collection.name.clone()))
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorBackendError> {
        self.check_available()?;
        let mut collections = self.collections.write().await;
        let before = collections.len();
        collections.retain(|_, c| c.name != name);

        if collections.len() == before {
            return Err(VectorBackendError::CollectionNotFound(name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(ids: &[&str], embeddings: Vec<Vec<f32>>) -> UpsertRecords {
        UpsertRecords {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            documents: ids.iter().map(|s| format!("text of {}", s)).collect(),
            metadatas: ids
                .iter()
                .map(|s| HashMap::from([("source".to_string(), s.to_string())]))
                .collect(),
            embeddings,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let backend = InMemoryVectorBackend::new();
        let first = backend
            .get_or_create_collection("chunks", DistanceMetric::L2)
            .await
            .unwrap();
        let second = backend
            .get_or_create_collection("chunks", DistanceMetric::L2)
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_query_orders_by_squared_l2() {
        let backend = InMemoryVectorBackend::new();
        let handle = backend
            .get_or_create_collection("chunks", DistanceMetric::L2)
            .await
            .unwrap();
        backend
            .upsert(
                &handle,
                records(&["far", "near"], vec![vec![3.0, 0.0], vec![1.0, 0.0]]),
            )
            .await
            .unwrap();

        let hits = backend.query(&handle, &[0.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.ids, vec!["near", "far"]);
        assert_eq!(hits.distances, vec![1.0, 9.0]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_id_and_checks_dimension() {
        let backend = InMemoryVectorBackend::new();
        let handle = backend
            .get_or_create_collection("chunks", DistanceMetric::L2)
            .await
            .unwrap();

        backend.upsert(&handle, records(&["a"], vec![vec![1.0]])).await.unwrap();
        backend.upsert(&handle, records(&["a"], vec![vec![2.0]])).await.unwrap();
        assert_eq!(backend.count(&handle).await.unwrap(), 1);

        let result = backend.upsert(&handle, records(&["b"], vec![vec![1.0, 2.0]])).await;
        assert!(matches!(result, Err(VectorBackendError::RequestError(_))));
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let backend = InMemoryVectorBackend::new();
        backend.set_available(false);

        assert!(matches!(
            backend.heartbeat().await,
            Err(VectorBackendError::Unavailable(_))
        ));
    }
}
