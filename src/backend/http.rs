use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::models::{ActivityLogEntry, Device, NewDevice, TrustHistoryEntry};

use super::{BackendError, TrustBackend};

const ENABLE_LOGS: bool = true;
const LOG_TARGET: &str = "trust_monitor::backend";

use crate::log_debug;

/// `TrustBackend` over the backend's JSON HTTP API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let parsed = Url::parse(base_url).map_err(|err| BackendError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;

        if parsed.cannot_be_a_base() {
            return Err(BackendError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "url cannot carry a path".into(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Client)?;

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base url.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> (String, RequestBuilder) {
        let url = self.endpoint(segments);
        let label = format!("{method} /{}", segments.join("/"));
        log_debug!("{} -> {}", label, url);
        (label, self.client.request(method, url))
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Vec<u8>, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| BackendError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;
        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, BackendError> {
        let (endpoint, request) = self.request(Method::GET, segments);
        let body = self.send(&endpoint, request).await?;
        serde_json::from_slice(&body).map_err(|source| BackendError::Decode { endpoint, source })
    }
}

#[async_trait]
impl TrustBackend for HttpBackend {
    async fn list_devices(&self) -> Result<Vec<Device>, BackendError> {
        self.get_json(&["devices"]).await
    }

    async fn get_device(&self, device_id: &str) -> Result<Device, BackendError> {
        self.get_json(&["device", device_id]).await
    }

    async fn coordinator(&self) -> Result<Device, BackendError> {
        self.get_json(&["coordinator"]).await
    }

    async fn device_history(&self, device_id: &str) -> Result<Vec<TrustHistoryEntry>, BackendError> {
        self.get_json(&["device", device_id, "history"]).await
    }

    async fn create_device(&self, device: &NewDevice) -> Result<(), BackendError> {
        let (endpoint, request) = self.request(Method::POST, &["device"]);
        self.send(&endpoint, request.json(device)).await.map(|_| ())
    }

    async fn leave_device(&self, device_id: &str) -> Result<(), BackendError> {
        let (endpoint, request) = self.request(Method::POST, &["device", device_id, "leave"]);
        self.send(&endpoint, request).await.map(|_| ())
    }

    async fn activity_log(&self) -> Result<Vec<ActivityLogEntry>, BackendError> {
        self.get_json(&["log_activity"]).await
    }
}
