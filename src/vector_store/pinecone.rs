//! Pinecone serverless index over its REST API.
//!
//! Index management goes through the control plane; upserts and queries go to
//! the per-index data-plane host, which is looked up once and cached.

use super::{DistanceMetric, MetadataFilter, VectorEntry, VectorIndex, VectorMatch, VectorMetadata};
use crate::config::VectorStoreSettings;
use crate::error::{Result, TubechatError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

const CONTROL_PLANE: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2025-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const READY_MAX_POLLS: u32 = 150;

/// Environment variable holding the Pinecone API key.
pub const API_KEY_ENV: &str = "PINECONE_API_KEY";

/// A named Pinecone index.
pub struct PineconeIndex {
    client: reqwest::Client,
    index_name: String,
    cloud: String,
    region: String,
    host: OnceCell<String>,
}

impl PineconeIndex {
    /// Create a client for the index named in `settings`.
    pub fn new(api_key: &str, settings: &VectorStoreSettings) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(TubechatError::Config("Pinecone API key is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|e| TubechatError::Config(format!("Invalid Pinecone API key: {}", e)))?,
        );
        headers.insert("x-pinecone-api-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            index_name: settings.index_name.clone(),
            cloud: settings.cloud.clone(),
            region: settings.region.clone(),
            host: OnceCell::new(),
        })
    }

    /// Create a client using the API key from `PINECONE_API_KEY`.
    pub fn from_env(settings: &VectorStoreSettings) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| TubechatError::Config(format!("{} is not set", API_KEY_ENV)))?;
        Self::new(&api_key, settings)
    }

    /// Describe the index, or `None` if it does not exist.
    async fn describe(&self) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", CONTROL_PLANE, self.index_name);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn create(&self, dimension: usize, metric: DistanceMetric) -> Result<()> {
        let request = CreateIndexRequest {
            name: &self.index_name,
            dimension,
            metric,
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.cloud,
                    region: &self.region,
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/indexes", CONTROL_PLANE))
            .json(&request)
            .send()
            .await?;

        // Another process created it first.
        if response.status() == StatusCode::CONFLICT {
            debug!("Index {} already exists", self.index_name);
            return Ok(());
        }

        check_status(response).await?;
        info!(
            "Created Pinecone index {} ({} dims, {}, {}/{})",
            self.index_name, dimension, metric, self.cloud, self.region
        );
        Ok(())
    }

    async fn wait_until_ready(&self) -> Result<IndexDescription> {
        for attempt in 0..READY_MAX_POLLS {
            if let Some(description) = self.describe().await? {
                if description.status.ready {
                    return Ok(description);
                }
                debug!(
                    "Index {} not ready (state {:?}), poll {}",
                    self.index_name, description.status.state, attempt
                );
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        Err(TubechatError::VectorIndex(format!(
            "Index {} did not become ready",
            self.index_name
        )))
    }

    /// Data-plane host, resolved on first use.
    async fn host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = self.describe().await?.ok_or_else(|| {
                    TubechatError::VectorIndex(format!("Index {} does not exist", self.index_name))
                })?;
                description.data_plane_host(&self.index_name)
            })
            .await?;
        Ok(host.as_str())
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    #[instrument(skip(self), fields(index = %self.index_name))]
    async fn ensure_index(&self, dimension: usize, metric: DistanceMetric) -> Result<()> {
        let existing = self.describe().await?;

        let description = match existing {
            Some(description) if description.status.ready => description,
            Some(_) => self.wait_until_ready().await?,
            None => {
                self.create(dimension, metric).await?;
                self.wait_until_ready().await?
            }
        };

        if let Some(existing) = description.dimension {
            if existing != dimension {
                return Err(TubechatError::VectorIndex(format!(
                    "Index {} has dimension {}, expected {}",
                    self.index_name, existing, dimension
                )));
            }
        }

        let host = description.data_plane_host(&self.index_name)?;
        if self.host.set(host).is_err() {
            debug!("Data-plane host already cached");
        }
        Ok(())
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/vectors/upsert", self.host().await?);
        let response = self
            .client
            .post(&url)
            .json(&UpsertRequest { vectors: entries })
            .send()
            .await?;

        let body: UpsertResponse = check_status(response).await?.json().await?;
        if body.upserted_count != entries.len() {
            warn!(
                "Pinecone reported {} upserted of {} sent",
                body.upserted_count,
                entries.len()
            );
        }
        Ok(body.upserted_count)
    }

    #[instrument(skip(self, vector, filter))]
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &MetadataFilter,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>> {
        let url = format!("{}/query", self.host().await?);
        let request = QueryRequest {
            vector,
            top_k,
            filter: filter_json(filter),
            include_metadata,
            include_values: false,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let body: QueryResponse = check_status(response).await?.json().await?;

        Ok(body
            .matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect())
    }
}

/// Turn an unsuccessful response into an error carrying the body.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(TubechatError::VectorIndex(format!(
        "Pinecone request failed ({}): {}",
        status, body
    )))
}

/// Pinecone's `{"field": {"$eq": value}}` filter form.
fn filter_json(filter: &MetadataFilter) -> serde_json::Value {
    let mut condition = serde_json::Map::new();
    condition.insert("$eq".to_string(), serde_json::Value::from(filter.value()));

    let mut root = serde_json::Map::new();
    root.insert(filter.field().to_string(), serde_json::Value::Object(condition));
    serde_json::Value::Object(root)
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: DistanceMetric,
    spec: IndexSpec<'a>,
}

#[derive(Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: IndexStatus,
}

impl IndexDescription {
    fn data_plane_host(&self, index_name: &str) -> Result<String> {
        match self.host.as_deref() {
            Some(host) if !host.trim().is_empty() => Ok(normalize_host(host)),
            _ => Err(TubechatError::VectorIndex(format!(
                "Index {} has no data-plane host",
                index_name
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorEntry],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    filter: serde_json::Value,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RawMatch>,
}

#[derive(Deserialize)]
struct RawMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<VectorMetadata>,
}
