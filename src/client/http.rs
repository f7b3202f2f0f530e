//! HTTP gateway broker client
//!
//! Each issued request becomes a future held in a `FuturesUnordered`; the
//! futures only make progress inside [`BrokerClient::poll`], which keeps the
//! whole client single-threaded and free of background tasks.

use super::wire::{
    ConsumeBody, ConsumeResponse, DiscoverResponse, FaultEnvelope, ProduceBody, ProduceResponse,
    WireBatch, WireFetch,
};
use super::{BrokerClient, Completions, FetchRequest, ProduceBatch};
use crate::config::ClientSettings;
use crate::error::{Error, Result};
use crate::fault::{Fault, FaultKind};
use crate::types::RequestId;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Port assumed when an endpoint does not name one
pub const DEFAULT_PORT: u16 = 11011;

/// Parse `host`, `host:port` or an `http(s)://` URL into a base URL
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(Error::invalid_endpoint(endpoint));
    }

    let candidate = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    };

    let mut url = Url::parse(&candidate).map_err(|_| Error::invalid_endpoint(endpoint))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().map_or(true, str::is_empty) {
        return Err(Error::invalid_endpoint(endpoint));
    }
    if url.port().is_none() && !endpoint.contains("://") {
        url.set_port(Some(DEFAULT_PORT))
            .map_err(|()| Error::invalid_endpoint(endpoint))?;
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

type PendingRequest = BoxFuture<'static, Completions>;

/// Broker client speaking the JSON/HTTP gateway protocol
pub struct HttpBrokerClient {
    client: Client,
    base_url: Url,
    endpoint: String,
    next_request_id: RequestId,
    pending: FuturesUnordered<PendingRequest>,
}

impl HttpBrokerClient {
    /// Create a client for `endpoint`
    pub fn new(endpoint: &str, settings: &ClientSettings) -> Result<Self> {
        let base_url = parse_endpoint(endpoint)?;
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .connect_timeout(settings.connect_timeout())
            .user_agent(&settings.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url,
            endpoint: endpoint.to_string(),
            next_request_id: 1,
            pending: FuturesUnordered::new(),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn allocate_request_id(&mut self) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        id
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }
}

impl std::fmt::Debug for HttpBrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBrokerClient")
            .field("base_url", &self.base_url.as_str())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BrokerClient for HttpBrokerClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn discover_partitions(&mut self, topic: &str) -> Result<RequestId> {
        let mut url = self.url("v1/topics/")?;
        url.path_segments_mut()
            .map_err(|()| Error::invalid_endpoint(&self.endpoint))?
            .pop_if_empty()
            .extend([topic, "partitions"]);

        let request_id = self.allocate_request_id();
        let request = self.client.get(url);
        let topic = topic.to_string();
        debug!(request_id, topic = %topic, "discover partitions");

        self.pending.push(
            async move {
                match exchange::<DiscoverResponse>(request).await {
                    Ok(response) => response.into_completions(request_id, topic),
                    Err(kind) => Completions::fault(Fault::new(request_id, kind).with_topic(topic)),
                }
            }
            .boxed(),
        );
        Ok(request_id)
    }

    fn consume(
        &mut self,
        fetches: Vec<FetchRequest>,
        max_wait: Duration,
        min_size: u32,
    ) -> Result<RequestId> {
        if fetches.is_empty() {
            return Err(Error::schedule("consume", &self.endpoint));
        }

        let url = self.url("v1/consume")?;
        let request_id = self.allocate_request_id();
        let body = ConsumeBody {
            max_wait_ms: max_wait.as_millis() as u64,
            min_size,
            fetches: fetches.into_iter().map(WireFetch::from).collect(),
        };
        debug!(request_id, partitions = body.fetches.len(), "consume");
        let request = self.client.post(url).json(&body);

        self.pending.push(
            async move {
                match exchange::<ConsumeResponse>(request).await {
                    Ok(response) => response.into_completions(request_id),
                    Err(kind) => Completions::fault(Fault::new(request_id, kind)),
                }
            }
            .boxed(),
        );
        Ok(request_id)
    }

    fn produce(&mut self, batches: Vec<ProduceBatch>) -> Result<RequestId> {
        if batches.is_empty() {
            return Err(Error::schedule("produce", &self.endpoint));
        }

        let url = self.url("v1/produce")?;
        let request_id = self.allocate_request_id();
        let body = ProduceBody {
            batches: batches.into_iter().map(WireBatch::from).collect(),
        };
        debug!(request_id, batches = body.batches.len(), "produce");
        let request = self.client.post(url).json(&body);

        self.pending.push(
            async move {
                match exchange::<ProduceResponse>(request).await {
                    Ok(response) => response.into_completions(request_id),
                    Err(kind) => Completions::fault(Fault::new(request_id, kind)),
                }
            }
            .boxed(),
        );
        Ok(request_id)
    }

    fn should_poll(&self) -> bool {
        !self.pending.is_empty()
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Completions> {
        let mut completions = Completions::default();
        if self.pending.is_empty() {
            return Ok(completions);
        }

        match tokio::time::timeout(timeout, self.pending.next()).await {
            Ok(Some(done)) => completions.merge(done),
            Ok(None) | Err(_) => return Ok(completions),
        }

        // Collect whatever else is already finished without waiting again
        while let Some(Some(done)) = self.pending.next().now_or_never() {
            completions.merge(done);
        }
        Ok(completions)
    }
}

/// Send a request and decode its JSON body, mapping failures to fault kinds
async fn exchange<T: DeserializeOwned>(request: RequestBuilder) -> std::result::Result<T, FaultKind> {
    let response = request.send().await.map_err(|e| {
        warn!("Broker request failed: {e}");
        FaultKind::Network
    })?;

    let status = response.status();
    let body = response.bytes().await.map_err(|e| {
        warn!("Failed to read broker response: {e}");
        FaultKind::Network
    })?;

    if !status.is_success() {
        let envelope: FaultEnvelope = serde_json::from_slice(&body).unwrap_or_default();
        return Err(envelope
            .faults
            .into_iter()
            .next()
            .map_or_else(|| status_fault(status), |f| f.kind));
    }

    serde_json::from_slice(&body).map_err(|e| {
        warn!("Malformed broker response: {e}");
        FaultKind::Other
    })
}

/// Fault kind for a non-2xx response without a fault body
fn status_fault(status: StatusCode) -> FaultKind {
    match status.as_u16() {
        400 => FaultKind::InvalidReq,
        401 | 403 => FaultKind::Access,
        404 => FaultKind::UnknownTopic,
        _ => FaultKind::SystemFail,
    }
}
