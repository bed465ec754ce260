#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use types::{DeviceConfig, ProtocolVersion, RawValue};

pub mod fake;

pub use fake::FakeClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect to {address} failed: {reason}")]
    Connect { address: String, reason: String },
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Full status response from a meter: one raw value per data point, plus an
/// error marker when the device answered but flagged the payload.
#[derive(Debug, Clone, Default)]
pub struct StatusPayload {
    pub points: HashMap<String, RawValue>,
    pub error: Option<String>,
}

impl StatusPayload {
    pub fn new(points: HashMap<String, RawValue>) -> Self {
        Self {
            points,
            error: None,
        }
    }
}

/// One established session with a meter.
///
/// The session speaks whichever protocol generation was last selected with
/// `set_version`; on a mismatch the device drops the connection or returns
/// garbage, surfaced here as `ClientError`.
#[async_trait]
pub trait DeviceSession: Send {
    /// Bound every subsequent network operation on this session.
    fn set_timeout(&mut self, timeout: Duration);

    /// Select the protocol generation for subsequent requests.
    fn set_version(&mut self, version: ProtocolVersion);

    /// Ask the device to refresh the given data points before the next
    /// status query. Some points only update on request.
    async fn refresh_points(&mut self, points: &[&str]) -> Result<(), ClientError>;

    /// Request a full status snapshot.
    async fn status(&mut self) -> Result<StatusPayload, ClientError>;
}

/// Factory for device sessions. The wire protocol and encryption live behind
/// this boundary; the workspace only consumes it.
#[async_trait]
pub trait DeviceClient: Send + Sync + 'static {
    type Session: DeviceSession;

    async fn connect(&self, device: &DeviceConfig) -> Result<Self::Session, ClientError>;
}
