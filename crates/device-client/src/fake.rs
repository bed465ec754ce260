//! Scripted in-memory device backend.
//!
//! Stands in for real meters in tests and in the binary's simulate mode:
//! the session only answers on one configured protocol generation, any
//! other selection fails the way a mismatched real device does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use types::{DeviceConfig, ProtocolVersion, RawValue};

use crate::{ClientError, DeviceClient, DeviceSession, StatusPayload};

#[derive(Default)]
struct FakeState {
    accepted: Option<ProtocolVersion>,
    points: HashMap<String, RawValue>,
    payload_error: Option<String>,
    refuse_connect: bool,
    attempts: Vec<ProtocolVersion>,
    refreshed: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeClient {
    state: Arc<Mutex<FakeState>>,
}

impl FakeClient {
    /// Device that answers only on `version`.
    pub fn accepting(version: ProtocolVersion) -> Self {
        let client = Self::default();
        client.lock().accepted = Some(version);
        client
    }

    /// Device that accepts connections but answers on no generation at all.
    pub fn answering_none() -> Self {
        Self::default()
    }

    /// Device that refuses the TCP connection outright.
    pub fn unreachable() -> Self {
        let client = Self::default();
        client.lock().refuse_connect = true;
        client
    }

    pub fn with_points(self, points: HashMap<String, RawValue>) -> Self {
        self.lock().points = points;
        self
    }

    pub fn with_point(self, key: &str, value: RawValue) -> Self {
        self.lock().points.insert(key.to_string(), value);
        self
    }

    /// Make every status response carry a device-side error marker.
    pub fn with_payload_error(self, message: &str) -> Self {
        self.lock().payload_error = Some(message.to_string());
        self
    }

    pub fn set_accepted(&self, version: Option<ProtocolVersion>) {
        self.lock().accepted = version;
    }

    pub fn replace_points(&self, points: HashMap<String, RawValue>) {
        self.lock().points = points;
    }

    /// Protocol generations attempted so far, in `set_version` order.
    pub fn attempted_versions(&self) -> Vec<ProtocolVersion> {
        self.lock().attempts.clone()
    }

    pub fn clear_attempts(&self) {
        self.lock().attempts.clear();
    }

    /// Point ids passed to `refresh_points` so far.
    pub fn refreshed_points(&self) -> Vec<String> {
        self.lock().refreshed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

#[async_trait]
impl DeviceClient for FakeClient {
    type Session = FakeSession;

    async fn connect(&self, device: &DeviceConfig) -> Result<Self::Session, ClientError> {
        if self.lock().refuse_connect {
            return Err(ClientError::Connect {
                address: device.address.clone(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(FakeSession {
            state: Arc::clone(&self.state),
            version: None,
            timeout: Duration::from_secs(3),
        })
    }
}

pub struct FakeSession {
    state: Arc<Mutex<FakeState>>,
    version: Option<ProtocolVersion>,
    timeout: Duration,
}

impl FakeSession {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn version_matches(&self) -> bool {
        let state = self.lock();
        self.version.is_some() && self.version == state.accepted
    }
}

#[async_trait]
impl DeviceSession for FakeSession {
    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn set_version(&mut self, version: ProtocolVersion) {
        self.version = Some(version);
        self.lock().attempts.push(version);
    }

    async fn refresh_points(&mut self, points: &[&str]) -> Result<(), ClientError> {
        if !self.version_matches() {
            return Err(ClientError::Protocol(
                "no response to refresh request".to_string(),
            ));
        }
        let mut state = self.lock();
        state
            .refreshed
            .extend(points.iter().map(|point| point.to_string()));
        Ok(())
    }

    async fn status(&mut self) -> Result<StatusPayload, ClientError> {
        if !self.version_matches() {
            return Err(ClientError::Protocol(
                "status response failed integrity check".to_string(),
            ));
        }
        let state = self.lock();
        Ok(StatusPayload {
            points: state.points.clone(),
            error: state.payload_error.clone(),
        })
    }
}

/// Plausible two-channel meter snapshot for the simulate mode.
pub fn demo_points() -> HashMap<String, RawValue> {
    let mut points = HashMap::new();
    points.insert("101".to_string(), RawValue::Int(2381));
    points.insert("102".to_string(), RawValue::Int(4998));
    points.insert("103".to_string(), RawValue::Int(12450));
    points.insert("1".to_string(), RawValue::Int(532_410));
    points.insert("2".to_string(), RawValue::Int(1_204));
    points.insert("104".to_string(), RawValue::Int(97));
    points.insert("105".to_string(), RawValue::Int(3215));
    points.insert("106".to_string(), RawValue::Int(7563));
    points.insert("107".to_string(), RawValue::Int(310_220));
    points.insert("108".to_string(), RawValue::Int(820));
    points.insert("109".to_string(), RawValue::Int(93));
    points.insert("110".to_string(), RawValue::Int(2104));
    points.insert("111".to_string(), RawValue::Int(4887));
    points.insert("112".to_string(), RawValue::Int(222_190));
    points.insert("113".to_string(), RawValue::Int(384));
    points.insert("124".to_string(), RawValue::Int(1));
    points.insert("125".to_string(), RawValue::Int(0));
    points
}
