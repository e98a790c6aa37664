//! Zilliz Cloud / Milvus REST v2 vector index
//!
//! Every endpoint is a POST with a JSON body. The service answers HTTP 200
//! with a non-zero `code` on logical errors, so both layers are checked.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::{EntryId, IndexEntry, RetrievalResult, ScoredId};

use super::vector_index::VectorIndex;

/// Zilliz REST client implementing [`VectorIndex`]
pub struct ZillizIndex {
    client: Client,
    base_url: String,
}

/// Envelope shared by every v2 response
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

/// Primary keys come back as numbers or, for large int64, as strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Int(u64),
    Str(String),
}

impl WireId {
    fn into_id(self) -> Result<EntryId> {
        match self {
            WireId::Int(id) => Ok(id),
            WireId::Str(s) => s
                .parse()
                .map_err(|_| Error::retrieval_unavailable(format!("Non-numeric entry id '{}'", s))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: WireId,
    #[serde(default)]
    distance: f32,
}

#[derive(Debug, Deserialize)]
struct StoredEntity {
    id: WireId,
    #[serde(default)]
    vector: Vec<f32>,
    #[serde(default)]
    text: String,
}

/// Row count reported by `collections/get_stats`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CollectionStats {
    #[serde(rename = "rowCount", default)]
    pub row_count: u64,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    id: EntryId,
    vector: &'a [f32],
    text: &'a str,
}

impl ZillizIndex {
    /// Create a client from configuration. Requires an API key and either
    /// `endpoint` or `cluster_id`.
    pub fn new(config: &VectorDbConfig) -> Result<Self> {
        let base_url = match (&config.endpoint, &config.cluster_id) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, Some(cluster_id)) => Self::serverless_url(cluster_id, &config.region),
            (None, None) => {
                return Err(Error::config(
                    "Zilliz backend needs vector_db.endpoint or a cluster id",
                ))
            }
        };

        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::config("Zilliz API key is not set (ZILLIZ_API_KEY)"))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .map_err(|e| Error::config(format!("Invalid Zilliz API key: {}", e)))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Serverless endpoint for a cluster
    pub fn serverless_url(cluster_id: &str, region: &str) -> String {
        format!(
            "https://{}.serverless.{}.cloud.zilliz.com/v2",
            cluster_id, region
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<Option<T>> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::retrieval_unavailable(format!("{} request failed: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::retrieval_unavailable(format!(
                "{} failed: HTTP {} - {}",
                endpoint, status, body
            )));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            Error::retrieval_unavailable(format!("Failed to parse {} response: {}", endpoint, e))
        })?;

        if envelope.code != 0 {
            return Err(Error::retrieval_unavailable(format!(
                "{} returned code {}: {}",
                endpoint,
                envelope.code,
                envelope.message.unwrap_or_default()
            )));
        }

        Ok(envelope.data)
    }

    /// Create a cosine-metric collection with `id` primary key and `vector` field
    pub async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        self.post::<Value>(
            "vectordb/collections/create",
            json!({
                "collectionName": collection,
                "dimension": dimension,
                "metricType": "COSINE",
                "primaryField": "id",
                "vectorField": "vector",
            }),
        )
        .await?;

        tracing::info!(collection, dimension, "Created Zilliz collection");
        Ok(())
    }

    /// List collection names in the cluster
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self
            .post::<Vec<String>>("vectordb/collections/list", json!({}))
            .await?
            .unwrap_or_default())
    }

    /// Raw collection description
    pub async fn describe_collection(&self, collection: &str) -> Result<Value> {
        Ok(self
            .post::<Value>(
                "vectordb/collections/describe",
                json!({ "collectionName": collection }),
            )
            .await?
            .unwrap_or(Value::Null))
    }

    /// Number of rows stored in a collection
    pub async fn collection_stats(&self, collection: &str) -> Result<CollectionStats> {
        self.post::<CollectionStats>(
            "vectordb/collections/get_stats",
            json!({ "collectionName": collection }),
        )
        .await?
        .ok_or_else(|| {
            Error::retrieval_unavailable(format!("No statistics returned for '{}'", collection))
        })
    }

    /// Every stored entry, paged `page_size` rows at a time. Vectors are not
    /// returned.
    pub async fn query_all(&self, collection: &str, page_size: usize) -> Result<Vec<IndexEntry>> {
        let page_size = page_size.max(1);
        let mut entries = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .post::<Vec<StoredEntity>>(
                    "vectordb/entities/query",
                    json!({
                        "collectionName": collection,
                        "filter": "id >= 0",
                        "outputFields": ["id", "text"],
                        "limit": page_size,
                        "offset": offset,
                    }),
                )
                .await?
                .unwrap_or_default();

            let fetched = page.len();
            for entity in page {
                entries.push(IndexEntry {
                    id: entity.id.into_id()?,
                    vector: entity.vector,
                    text: entity.text,
                });
            }

            if fetched < page_size {
                break;
            }
            offset += page_size;
        }

        tracing::debug!(collection, rows = entries.len(), "Queried all entries");
        Ok(entries)
    }
}

#[async_trait]
impl VectorIndex for ZillizIndex {
    async fn insert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let rows: Vec<InsertRow<'_>> = entries
            .iter()
            .map(|entry| InsertRow {
                id: entry.id,
                vector: &entry.vector,
                text: &entry.text,
            })
            .collect();

        self.post::<Value>(
            "vectordb/entities/insert",
            json!({
                "collectionName": collection,
                "data": rows,
            }),
        )
        .await?;

        tracing::debug!(collection, inserted = entries.len(), "Inserted entries");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<RetrievalResult> {
        let hits = self
            .post::<Vec<SearchHit>>(
                "vectordb/entities/search",
                json!({
                    "collectionName": collection,
                    "data": [vector],
                    "annsField": "vector",
                    "limit": top_k,
                    "outputFields": ["id"],
                }),
            )
            .await?
            .unwrap_or_default();

        hits.into_iter()
            .take(top_k)
            .map(|hit| {
                Ok(ScoredId {
                    id: hit.id.into_id()?,
                    score: hit.distance,
                })
            })
            .collect()
    }

    async fn fetch(&self, collection: &str, ids: &[EntryId]) -> Result<Vec<IndexEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let entities = self
            .post::<Vec<StoredEntity>>(
                "vectordb/entities/get",
                json!({
                    "collectionName": collection,
                    "id": ids,
                    "outputFields": ["id", "text"],
                }),
            )
            .await?
            .unwrap_or_default();

        entities
            .into_iter()
            .map(|entity| {
                Ok(IndexEntry {
                    id: entity.id.into_id()?,
                    vector: entity.vector,
                    text: entity.text,
                })
            })
            .collect()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.list_collections().await.is_ok())
    }

    fn name(&self) -> &str {
        "zilliz"
    }
}
