//! Artifacts may come through an untrusted mirror, so every download is
//! decompressed and checked against the digest from the trusted registry
//! before anything else sees it.

use std::{io::Write, sync::Arc, time::Instant};

use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzDecoder;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use serde::de::DeserializeOwned;
use tokio::task;
use tracing::debug;

use super::{RemoteArtifact, verify::verify_digest};
use crate::error::ServiceError;

pub type ByteStream = BoxStream<'static, Result<Bytes, ServiceError>>;

/// Transport used for every remote read.
///
/// Implementations fail with `ServiceError::Transport` for network errors
/// and non-success statuses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<ByteStream, ServiceError>;
}

/// `reqwest` backed transport. No request timeout is applied.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ServiceError::network("<client>", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<ByteStream, ServiceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ServiceError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Transport {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!(
                    "HTTP {} - {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                ),
            });
        }

        let url = url.to_string();
        Ok(response
            .bytes_stream()
            .map_err(move |e| ServiceError::network(&url, e))
            .boxed())
    }
}

#[derive(Clone)]
pub struct ArtifactFetcher {
    transport: Arc<dyn Transport>,
}

impl ArtifactFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Downloads, gunzips and verifies one artifact. Inflation and hashing
    /// run on the blocking pool.
    pub async fn fetch_verified(&self, artifact: &RemoteArtifact) -> Result<Vec<u8>, ServiceError> {
        let start = Instant::now();
        let chunks: Vec<Bytes> = self.transport.get(&artifact.url).await?.try_collect().await?;
        let compressed_size = chunks.iter().map(Bytes::len).sum::<usize>();

        let target = artifact.clone();
        let verified = task::spawn_blocking(move || inflate_and_verify(&target, &chunks)).await??;
        debug!(
            name = %artifact.name,
            compressed_size,
            size = verified.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "artifact downloaded and verified"
        );
        Ok(verified)
    }

    /// Fetches an uncompressed JSON document.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ServiceError> {
        let body: Vec<Bytes> = self.transport.get(url).await?.try_collect().await?;
        let raw = body.concat();
        serde_json::from_slice(&raw)
            .map_err(|e| ServiceError::Registry(format!("invalid JSON from {url}: {e}")))
    }
}

fn inflate_and_verify(artifact: &RemoteArtifact, chunks: &[Bytes]) -> Result<Vec<u8>, ServiceError> {
    let mut decoder = GzDecoder::new(Vec::new());
    for chunk in chunks {
        decoder
            .write_all(chunk)
            .map_err(|source| decompression(&artifact.url, source))?;
    }
    let bytes = decoder
        .finish()
        .map_err(|source| decompression(&artifact.url, source))?;
    verify_digest(&artifact.name, bytes, &artifact.expected_hash)
}

fn decompression(url: &str, source: std::io::Error) -> ServiceError {
    ServiceError::Decompression {
        url: url.to_string(),
        source,
    }
}
