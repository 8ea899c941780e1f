use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::application::ports::vector_backend::{
    CollectionHandle, DeleteFilter, DistanceMetric, QueryHits, UpsertRecords, VectorBackend,
    VectorBackendError,
};

const API_PREFIX: &str = "/api/v1";
const DISTANCE_METADATA_KEY: &str = "hnsw:space";

#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    metadata: HashMap<&'static str, &'static str>,
    get_or_create: bool,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct UpsertRequest {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    metadatas: Vec<HashMap<String, String>>,
    documents: Vec<String>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: [&'a [f32]; 1],
    n_results: usize,
    include: [&'static str; 3],
}

/// Chroma answers with one inner list per query embedding; any field that
/// was not included comes back as `null`.
#[derive(Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Map<String, serde_json::Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

#[derive(Serialize, Default)]
struct DeleteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<Vec<String>>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    where_filter: Option<HashMap<String, String>>,
}

/// HTTP transport for a Chroma server (REST API v1).
#[derive(Debug, Clone)]
pub struct ChromaBackend {
    client: Client,
    config: ChromaConfig,
}

impl ChromaBackend {
    pub fn new(config: ChromaConfig) -> Result<Self, VectorBackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VectorBackendError::RequestError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.config.base_url.trim_end_matches('/'),
            API_PREFIX,
            path
        )
    }

    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response, VectorBackendError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                VectorBackendError::Unavailable(e.without_url().to_string())
            } else {
                VectorBackendError::RequestError(e.without_url().to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(VectorBackendError::ResponseError {
            status: status.as_u16(),
            body,
        })
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, VectorBackendError> {
        self.execute(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| VectorBackendError::ParseError(e.to_string()))
    }
}

/// The single row answering our one query embedding. A field we asked for
/// must be present and line up with `ids`.
fn first_row<T>(
    field: &'static str,
    rows: Option<Vec<Vec<T>>>,
    expected: usize,
) -> Result<Vec<T>, VectorBackendError> {
    let row = rows
        .ok_or_else(|| VectorBackendError::ParseError(format!("query response has no {}", field)))?
        .into_iter()
        .next()
        .unwrap_or_default();

    if row.len() != expected {
        return Err(VectorBackendError::ParseError(format!(
            "query response has {} {} for {} ids",
            row.len(),
            field,
            expected
        )));
    }

    Ok(row)
}

impl TryFrom<QueryResponse> for QueryHits {
    type Error = VectorBackendError;

    fn try_from(response: QueryResponse) -> Result<Self, Self::Error> {
        let ids = response.ids.into_iter().next().unwrap_or_default();
        let expected = ids.len();

        Ok(QueryHits {
            documents: first_row("documents", response.documents, expected)?,
            metadatas: first_row("metadatas", response.metadatas, expected)?,
            distances: first_row("distances", response.distances, expected)?,
            ids,
        })
    }
}

#[async_trait]
impl VectorBackend for ChromaBackend {
    async fn heartbeat(&self) -> Result<(), VectorBackendError> {
        self.execute(self.client.get(self.url("/heartbeat"))).await?;
        Ok(())
    }

    async fn get_or_create_collection(
        &self,
        name: &str,
        metric: DistanceMetric,
    ) -> Result<CollectionHandle, VectorBackendError> {
        let body = CreateCollectionRequest {
            name,
            metadata: HashMap::from([(DISTANCE_METADATA_KEY, metric.as_str())]),
            get_or_create: true,
        };

        let collection: CollectionResponse = self
            .execute_json(self.client.post(self.url("/collections")).json(&body))
            .await?;

        Ok(CollectionHandle {
            id: collection.id,
            name: collection.name,
        })
    }

    async fn upsert(
        &self,
        collection: &CollectionHandle,
        records: UpsertRecords,
    ) -> Result<(), VectorBackendError> {
        let body = UpsertRequest {
            ids: records.ids,
            embeddings: records.embeddings,
            metadatas: records.metadatas,
            documents: records.documents,
        };

        let url = self.url(&format!("/collections/{}/upsert", collection.id));
        self.execute(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<QueryHits, VectorBackendError> {
        let body = QueryRequest {
            query_embeddings: [embedding],
            n_results,
            include: ["documents", "metadatas", "distances"],
        };

        let url = self.url(&format!("/collections/{}/query", collection.id));
        let response: QueryResponse = self.execute_json(self.client.post(url).json(&body)).await?;

        QueryHits::try_from(response)
    }

    async fn delete(
        &self,
        collection: &CollectionHandle,
        filter: DeleteFilter,
    ) -> Result<(), VectorBackendError> {
        let body = match filter {
            DeleteFilter::Ids(ids) => DeleteRequest {
                ids: Some(ids),
                ..Default::default()
            },
            DeleteFilter::MetadataEquals { key, value } => DeleteRequest {
                where_filter: Some(HashMap::from([(key, value)])),
                ..Default::default()
            },
        };

        let url = self.url(&format!("/collections/{}/delete", collection.id));
        self.execute(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<u64, VectorBackendError> {
        let url = self.url(&format!("/collections/{}/count", collection.id));
        self.execute_json(self.client.get(url)).await
    }

    async fn delete_collection(&self, name: &str) -> Result<(), VectorBackendError> {
        let url = self.url(&format!("/collections/{}", name));
        match self.execute(self.client.delete(url)).await {
            Ok(_) => Ok(()),
            Err(VectorBackendError::ResponseError { status: 404, .. }) => {
                Err(VectorBackendError::CollectionNotFound(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
