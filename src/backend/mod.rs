mod error;
pub mod http;

pub use error::BackendError;
pub use http::HttpBackend;

use async_trait::async_trait;

use crate::models::{ActivityLogEntry, Device, NewDevice, TrustHistoryEntry};

/// Request/response contract of the trust backend.
///
/// The client never interprets how scores are computed; it only moves these
/// payloads in and out of its stores.
#[async_trait]
pub trait TrustBackend: Send + Sync {
    /// `GET /devices`
    async fn list_devices(&self) -> Result<Vec<Device>, BackendError>;

    /// `GET /device/{id}`
    async fn get_device(&self, device_id: &str) -> Result<Device, BackendError>;

    /// `GET /coordinator`
    async fn coordinator(&self) -> Result<Device, BackendError>;

    /// `GET /device/{id}/history`, ascending by timestamp.
    async fn device_history(&self, device_id: &str) -> Result<Vec<TrustHistoryEntry>, BackendError>;

    /// `POST /device`
    async fn create_device(&self, device: &NewDevice) -> Result<(), BackendError>;

    /// `POST /device/{id}/leave`
    async fn leave_device(&self, device_id: &str) -> Result<(), BackendError>;

    /// `GET /log_activity`
    async fn activity_log(&self) -> Result<Vec<ActivityLogEntry>, BackendError>;
}
